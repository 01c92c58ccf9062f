use crate::corpus::Timestamp;

/// 学習（過去）と予測（未来）を分ける日ごとの境界。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCursor {
    pub day: usize,
    /// `earliest + (day + 1) * seconds_per_day`
    pub boundary: Timestamp,
    seconds_per_day: Timestamp,
}

impl DayCursor {
    #[must_use]
    pub fn new(day: usize, earliest: Timestamp, seconds_per_day: Timestamp) -> Self {
        let boundary = Timestamp::try_from(day + 1).map_or(Timestamp::MAX, |days| {
            earliest.saturating_add(days.saturating_mul(seconds_per_day))
        });
        Self {
            day,
            boundary,
            seconds_per_day,
        }
    }

    /// `0..max_days` の各日の境界。
    pub fn days(
        max_days: usize,
        earliest: Timestamp,
        seconds_per_day: Timestamp,
    ) -> impl Iterator<Item = Self> {
        (0..max_days).map(move |day| Self::new(day, earliest, seconds_per_day))
    }

    /// 翌日の境界。誤分類された負例はこの時刻以前のものだけ再選択キューに入る。
    #[must_use]
    pub fn next_boundary(&self) -> Timestamp {
        self.boundary.saturating_add(self.seconds_per_day)
    }
}
