//! バッチ内での語IDごとの Z-score 正規化。
use rustc_hash::FxHashMap;

use super::sparse::{SparseVector, TermId};

/// 語IDごとの平均と標準偏差。
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub mean: FxHashMap<TermId, f64>,
    pub std: FxHashMap<TermId, f64>,
}

impl BatchStats {
    /// 平均は出現値の総和 / 文書数、標準偏差は中心化後の出現値の二乗和 / 文書数の平方根。
    #[must_use]
    pub fn from_batch(batch: &[SparseVector]) -> Self {
        if batch.is_empty() {
            return Self::default();
        }
        #[allow(clippy::cast_precision_loss)]
        let n = batch.len() as f64;

        let mut mean: FxHashMap<TermId, f64> = FxHashMap::default();
        for document in batch {
            for (id, value) in document.iter() {
                *mean.entry(id).or_insert(0.0) += value;
            }
        }
        for sum in mean.values_mut() {
            *sum /= n;
        }

        let mut std: FxHashMap<TermId, f64> = FxHashMap::default();
        for document in batch {
            for (id, value) in document.iter() {
                let centered = value - mean[&id];
                *std.entry(id).or_insert(0.0) += centered * centered;
            }
        }
        for sum in std.values_mut() {
            *sum = (*sum / n).sqrt();
        }

        Self { mean, std }
    }
}

/// 疎ベクトルのバッチを Z-score 正規化する。順序は保たれる。
///
/// 分散が0の語は中心化のみ行い、スケーリングしない。
#[must_use]
pub fn z_score(mut batch: Vec<SparseVector>) -> Vec<SparseVector> {
    let stats = BatchStats::from_batch(&batch);
    for document in &mut batch {
        for (id, value) in document.values_mut() {
            *value -= stats.mean[&id];
            let deviation = stats.std[&id];
            if deviation != 0.0 {
                *value /= deviation;
            }
        }
    }
    batch
}
