//! 3種類のバックエンドを共通の学習・予測インターフェースで扱う。
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::classification::{SparseVector, z_score};

mod kernel;
mod linear;
mod similarity;

pub use kernel::{KernelModel, KernelParams, KernelType};
pub use linear::LinearModel;
pub use similarity::{SimilarityIndex, SimilarityModel};

/// 全バックエンド共通のコストパラメータ C。
pub const DEFAULT_COST: f64 = 1.0;

/// 既読 (+1) / 未読 (-1)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }

    /// 決定値が正なら既読とみなす。
    #[must_use]
    pub fn from_decision(value: f64) -> Self {
        if value > 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("unknown backend `{0}` (expected liblinear, libsvm or similarity)")]
    UnknownBackend(String),
    #[error("unsupported kernel type {0} (expected 0, 1, 2 or 3)")]
    UnsupportedKernel(i64),
    #[error("training batch has {vectors} vectors but {labels} labels")]
    LengthMismatch { vectors: usize, labels: usize },
}

/// バックエンドの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Linear,
    Kernel,
    Similarity,
}

impl BackendKind {
    /// 出力ファイル名に使う名前。
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "liblinear",
            Self::Kernel => "libsvm",
            Self::Similarity => "similarity",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ClassifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "liblinear" | "linear" => Ok(Self::Linear),
            "libsvm" | "kernel" => Ok(Self::Kernel),
            "similarity" => Ok(Self::Similarity),
            _ => Err(ClassifierError::UnknownBackend(value.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 学習・予測の設定。線形バックエンドはカーネル種別を無視する。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backend {
    pub kind: BackendKind,
    pub kernel: KernelType,
    pub cost: f64,
}

impl Backend {
    #[must_use]
    pub fn new(kind: BackendKind, kernel: KernelType) -> Self {
        Self {
            kind,
            kernel,
            cost: DEFAULT_COST,
        }
    }

    /// TF-IDF ベクトルとラベルから学習する。正規化はここで行う。
    ///
    /// 1クラスしかない（または空の）バッチはそのクラスを常に返すモデルになる。
    ///
    /// # Errors
    /// ベクトル数とラベル数が一致しない場合。
    pub fn train(
        &self,
        vectors: Vec<SparseVector>,
        labels: &[Label],
    ) -> Result<TrainedModel, ClassifierError> {
        if vectors.len() != labels.len() {
            return Err(ClassifierError::LengthMismatch {
                vectors: vectors.len(),
                labels: labels.len(),
            });
        }
        let Some(&first) = labels.first() else {
            return Ok(TrainedModel::Constant(Label::Negative));
        };
        if labels.iter().all(|label| *label == first) {
            return Ok(TrainedModel::Constant(first));
        }

        let model = match self.kind {
            BackendKind::Linear => {
                TrainedModel::Linear(LinearModel::train(&z_score(vectors), labels, self.cost))
            }
            BackendKind::Kernel => TrainedModel::Kernel(KernelModel::train(
                &z_score(vectors),
                labels,
                self.kernel,
                self.cost,
            )),
            BackendKind::Similarity => TrainedModel::Similarity(SimilarityModel::train(
                &vectors,
                labels,
                self.kernel,
                self.cost,
            )),
        };
        Ok(model)
    }
}

/// 1ユーザー1日分の学習済みモデル。保存はしない。
#[derive(Debug, Clone)]
pub enum TrainedModel {
    Constant(Label),
    Linear(LinearModel),
    Kernel(KernelModel),
    Similarity(SimilarityModel),
}

/// 予測ラベルと決定値（入力と同じ順序）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub labels: Vec<Label>,
    pub scores: Vec<f64>,
}

impl Prediction {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl TrainedModel {
    /// 予測バッチを自身の統計量で正規化してから分類する。
    #[must_use]
    pub fn predict(&self, vectors: Vec<SparseVector>) -> Prediction {
        let scores: Vec<f64> = match self {
            Self::Constant(label) => vec![label.sign(); vectors.len()],
            Self::Linear(model) => z_score(vectors)
                .iter()
                .map(|vector| model.decision_value(vector))
                .collect(),
            Self::Kernel(model) => z_score(vectors)
                .iter()
                .map(|vector| model.decision_value(vector))
                .collect(),
            Self::Similarity(model) => model
                .transform(&vectors)
                .iter()
                .map(|vector| model.kernel_model().decision_value(vector))
                .collect(),
        };
        let labels = scores.iter().map(|score| Label::from_decision(*score)).collect();
        Prediction { labels, scores }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn vector(pairs: &[(u32, f64)]) -> SparseVector {
        SparseVector::from_unsorted(pairs.iter().copied())
    }

    fn batch() -> (Vec<SparseVector>, Vec<Label>) {
        (
            vec![
                vector(&[(0, 0.9), (2, 0.1)]),
                vector(&[(0, 0.8), (3, 0.2)]),
                vector(&[(1, 0.9), (3, 0.1)]),
                vector(&[(1, 0.7), (2, 0.3)]),
            ],
            vec![
                Label::Positive,
                Label::Positive,
                Label::Negative,
                Label::Negative,
            ],
        )
    }

    #[rstest]
    #[case("liblinear", BackendKind::Linear)]
    #[case("LINEAR", BackendKind::Linear)]
    #[case("libsvm", BackendKind::Kernel)]
    #[case("kernel", BackendKind::Kernel)]
    #[case("Similarity", BackendKind::Similarity)]
    fn backend_names(#[case] name: &str, #[case] expected: BackendKind) {
        assert_eq!(name.parse::<BackendKind>(), Ok(expected));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert_eq!(
            "bayes".parse::<BackendKind>(),
            Err(ClassifierError::UnknownBackend("bayes".to_string()))
        );
    }

    #[test]
    fn single_class_training_is_constant() {
        let backend = Backend::new(BackendKind::Kernel, KernelType::Rbf);
        let model = backend
            .train(vec![vector(&[(0, 1.0)])], &[Label::Positive])
            .expect("train");
        let prediction = model.predict(vec![vector(&[(5, 1.0)]), SparseVector::new()]);
        assert_eq!(prediction.labels, vec![Label::Positive; 2]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let backend = Backend::new(BackendKind::Linear, KernelType::Linear);
        let error = backend
            .train(vec![SparseVector::new()], &[])
            .expect_err("length mismatch");
        assert_eq!(
            error,
            ClassifierError::LengthMismatch {
                vectors: 1,
                labels: 0
            }
        );
    }

    #[rstest]
    #[case(BackendKind::Linear)]
    #[case(BackendKind::Kernel)]
    fn recovers_training_labels(#[case] kind: BackendKind) {
        let (vectors, labels) = batch();
        let backend = Backend::new(kind, KernelType::Linear);
        let model = backend.train(vectors.clone(), &labels).expect("train");
        let prediction = model.predict(vectors);
        assert_eq!(prediction.labels, labels);
        assert_eq!(prediction.scores.len(), 4);
    }

    #[test]
    fn similarity_backend_predicts_every_vector() {
        let (vectors, labels) = batch();
        let backend = Backend::new(BackendKind::Similarity, KernelType::Linear);
        let model = backend.train(vectors.clone(), &labels).expect("train");
        let prediction = model.predict(vectors);
        assert_eq!(prediction.len(), 4);
        assert!(matches!(model, TrainedModel::Similarity(_)));
    }
}
