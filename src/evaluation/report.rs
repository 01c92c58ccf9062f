//! ユーザー・日ごとのスコアの集計と TSV 出力。
use std::collections::BTreeMap;
use std::io::{self, LineWriter, Write};

use serde::Serialize;

use super::metrics::BinaryScore;
use crate::corpus::UserId;

/// 採点された1ユーザー1日分の結果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayScore {
    pub user_id: UserId,
    pub day: usize,
    pub score: BinaryScore,
}

impl DayScore {
    /// `precision \t recall \t f1 \t day \t user_id` の1行。
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{:.3}\t{:.3}\t{:.3}\t{}\t{}\n",
            self.score.precision, self.score.recall, self.score.f1, self.day, self.user_id
        )
    }
}

/// コーパス全体のマクロ平均。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroSummary {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub users_scored: usize,
    pub user_days_scored: usize,
}

impl MacroSummary {
    /// 最終行。日とユーザーの欄は -1。
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{:.3}\t{:.3}\t{:.3}\t-1\t-1\n",
            self.precision, self.recall, self.f1
        )
    }
}

/// 実験全体の採点結果。
#[derive(Debug, Clone, Default)]
pub struct ExperimentReport {
    scores: Vec<DayScore>,
}

impl ExperimentReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: DayScore) {
        self.scores.push(score);
    }

    /// ユーザー昇順、日昇順に並べた結果。
    #[must_use]
    pub fn ordered(&self) -> Vec<DayScore> {
        let mut scores = self.scores.clone();
        scores.sort_by_key(|score| (score.user_id, score.day));
        scores
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// 採点された日があるユーザーごとの (平均適合率, 平均再現率)。
    #[must_use]
    pub fn per_user_averages(&self) -> BTreeMap<UserId, (f64, f64)> {
        let mut sums: BTreeMap<UserId, (f64, f64, usize)> = BTreeMap::new();
        for score in &self.scores {
            let entry = sums.entry(score.user_id).or_insert((0.0, 0.0, 0));
            entry.0 += score.score.precision;
            entry.1 += score.score.recall;
            entry.2 += 1;
        }
        sums.into_iter()
            .map(|(user_id, (precision, recall, days))| {
                #[allow(clippy::cast_precision_loss)]
                let days = days as f64;
                (user_id, (precision / days, recall / days))
            })
            .collect()
    }

    /// ユーザー平均の平均。F1 はマクロ適合率とマクロ再現率の調和平均。
    #[must_use]
    pub fn macro_summary(&self) -> MacroSummary {
        let averages = self.per_user_averages();
        if averages.is_empty() {
            return MacroSummary::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let users = averages.len() as f64;
        let precision = averages.values().map(|(p, _)| p).sum::<f64>() / users;
        let recall = averages.values().map(|(_, r)| r).sum::<f64>() / users;
        let score = BinaryScore::from_precision_recall(precision, recall);
        MacroSummary {
            precision: score.precision,
            recall: score.recall,
            f1: score.f1,
            users_scored: averages.len(),
            user_days_scored: self.scores.len(),
        }
    }

    /// 全行を書き出す。1行は1回の書き込みで出力される。
    ///
    /// # Errors
    /// 書き込みに失敗した場合。
    pub fn write_tsv<W: Write>(&self, writer: W) -> io::Result<MacroSummary> {
        let mut writer = LineWriter::new(writer);
        for score in self.ordered() {
            writer.write_all(score.to_line().as_bytes())?;
        }
        let summary = self.macro_summary();
        writer.write_all(summary.to_line().as_bytes())?;
        writer.flush()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_score(user_id: UserId, day: usize, precision: f64, recall: f64) -> DayScore {
        DayScore {
            user_id,
            day,
            score: BinaryScore::from_precision_recall(precision, recall),
        }
    }

    #[test]
    fn macro_is_average_of_user_averages() {
        let mut report = ExperimentReport::new();
        report.push(day_score(0, 0, 1.0, 0.5));
        report.push(day_score(0, 1, 0.5, 0.5));
        report.push(day_score(1, 0, 0.25, 1.0));

        let summary = report.macro_summary();
        // user0: (0.75, 0.5), user1: (0.25, 1.0)
        assert!((summary.precision - 0.5).abs() < 1e-12);
        assert!((summary.recall - 0.75).abs() < 1e-12);
        assert!((summary.f1 - 0.6).abs() < 1e-12);
        assert_eq!(summary.users_scored, 2);
        assert_eq!(summary.user_days_scored, 3);
    }

    #[test]
    fn empty_report_has_zero_summary() {
        let report = ExperimentReport::new();
        assert_eq!(report.macro_summary(), MacroSummary::default());
        assert_eq!(report.macro_summary().to_line(), "0.000\t0.000\t0.000\t-1\t-1\n");
    }

    #[test]
    fn rows_are_ordered_by_user_then_day() {
        let mut report = ExperimentReport::new();
        report.push(day_score(1, 0, 1.0, 1.0));
        report.push(day_score(0, 0, 0.5, 1.0));
        report.push(day_score(0, 1, 0.0, 0.0));

        let mut buffer = Vec::new();
        report.write_tsv(&mut buffer).expect("write to memory");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "0.500\t1.000\t0.667\t0\t0");
        assert_eq!(lines[1], "0.000\t0.000\t0.000\t1\t0");
        assert_eq!(lines[2], "1.000\t1.000\t1.000\t0\t1");
        assert!(lines[3].ends_with("\t-1\t-1"));
    }
}
