//! 正例とのコサイン類似度を特徴量とするハイブリッド分類器。
use super::kernel::{KernelModel, KernelType};
use super::Label;
use crate::classification::{SparseVector, TermId, z_score};

/// 正例の学習ベクトルを単位長に正規化して保持するインデックス。
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    documents: Vec<SparseVector>,
}

impl SimilarityIndex {
    pub fn new<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a SparseVector>,
    {
        Self {
            documents: documents.into_iter().map(SparseVector::unit).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// インデックス内の各文書とのコサイン類似度。0 の成分は持たない。
    #[must_use]
    pub fn features(&self, query: &SparseVector) -> SparseVector {
        let query = query.unit();
        let entries: Vec<(TermId, f64)> = (0..)
            .zip(&self.documents)
            .filter_map(|(position, document)| {
                let similarity = query.dot(document);
                (similarity != 0.0).then_some((position, similarity))
            })
            .collect();
        SparseVector::from_sorted(entries)
    }

    pub fn features_all(&self, queries: &[SparseVector]) -> Vec<SparseVector> {
        queries.iter().map(|query| self.features(query)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityModel {
    index: SimilarityIndex,
    inner: KernelModel,
}

impl SimilarityModel {
    /// 正例で索引を作り、類似度特徴を正規化してカーネルSVMに渡す。
    #[must_use]
    pub fn train(
        vectors: &[SparseVector],
        labels: &[Label],
        kernel: KernelType,
        cost: f64,
    ) -> Self {
        let index = SimilarityIndex::new(
            vectors
                .iter()
                .zip(labels)
                .filter(|(_, label)| **label == Label::Positive)
                .map(|(vector, _)| vector),
        );
        let features = z_score(index.features_all(vectors));
        let inner = KernelModel::train(&features, labels, kernel, cost);
        tracing::trace!(indexed = index.len(), "similarity index built");
        Self { index, inner }
    }

    /// 予測バッチを類似度特徴に変換し、バッチ内で正規化した値を返す。
    #[must_use]
    pub fn transform(&self, vectors: &[SparseVector]) -> Vec<SparseVector> {
        z_score(self.index.features_all(vectors))
    }

    #[must_use]
    pub fn kernel_model(&self) -> &KernelModel {
        &self.inner
    }
}
