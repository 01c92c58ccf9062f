use serde::Serialize;

use crate::classifier::Label;

/// 既読クラス（+1）に対する適合率・再現率・F1。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BinaryScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl BinaryScore {
    /// 分母が0の指標は0とする。
    #[must_use]
    pub fn from_precision_recall(precision: f64, recall: f64) -> Self {
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

/// 混同行列のうち既読クラスに関わる3つのカウント。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn push(&mut self, expected: Label, predicted: Label) {
        match (expected, predicted) {
            (Label::Positive, Label::Positive) => self.true_positive += 1,
            (Label::Negative, Label::Positive) => self.false_positive += 1,
            (Label::Positive, Label::Negative) => self.false_negative += 1,
            (Label::Negative, Label::Negative) => {}
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self) -> BinaryScore {
        let tp = self.true_positive as f64;
        let precision = if self.true_positive + self.false_positive > 0 {
            tp / (self.true_positive + self.false_positive) as f64
        } else {
            0.0
        };
        let recall = if self.true_positive + self.false_negative > 0 {
            tp / (self.true_positive + self.false_negative) as f64
        } else {
            0.0
        };
        BinaryScore::from_precision_recall(precision, recall)
    }
}

/// 正解ラベルと予測ラベルを先頭から対応づけて採点する。
#[must_use]
pub fn score_predictions(expected: &[Label], predicted: &[Label]) -> BinaryScore {
    let mut counts = ConfusionCounts::default();
    for (&truth, &guess) in expected.iter().zip(predicted) {
        counts.push(truth, guess);
    }
    counts.score()
}
