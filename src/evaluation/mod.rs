//! 予測結果の採点と集計。
pub mod metrics;
pub mod report;

pub use metrics::{BinaryScore, ConfusionCounts, score_predictions};
pub use report::{DayScore, ExperimentReport, MacroSummary};
