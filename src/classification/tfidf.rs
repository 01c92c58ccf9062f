//! 日ごとのコーパスに当てはめる TF-IDF 重み付け。
use super::sparse::{SparseVector, TermId};
use super::vocabulary::{BagOfWords, Vocabulary};
use crate::corpus::{CorpusStore, Timestamp};

/// 絶対値がこれ以下の重みは捨てる。
const WEIGHT_EPSILON: f64 = 1e-12;

/// 1日分の TF-IDF モデル。
#[derive(Debug, Clone, Default)]
pub struct TfidfModel {
    idf: Vec<f64>,
    num_docs: usize,
}

impl TfidfModel {
    /// 文書集合の文書頻度から IDF = log2(N / df) を求める。
    pub fn fit<'a, I>(corpus: I) -> Self
    where
        I: IntoIterator<Item = &'a BagOfWords>,
    {
        let mut doc_freq: Vec<usize> = Vec::new();
        let mut num_docs = 0usize;
        for bow in corpus {
            num_docs += 1;
            for (id, _) in bow.iter() {
                let slot = id as usize;
                if slot >= doc_freq.len() {
                    doc_freq.resize(slot + 1, 0);
                }
                doc_freq[slot] += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let total = num_docs as f64;
        let idf = doc_freq
            .into_iter()
            .map(|df| {
                if df == 0 {
                    0.0
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let df = df as f64;
                    (total / df).log2()
                }
            })
            .collect();

        Self { idf, num_docs }
    }

    /// `cursor` 以前の記事を語彙で bag-of-words 化し、モデルを当てはめる。
    #[must_use]
    pub fn for_day(corpus: &CorpusStore, vocabulary: &Vocabulary, cursor: Timestamp) -> Self {
        let bows: Vec<BagOfWords> = corpus
            .stories_until(cursor)
            .map(|story| vocabulary.doc2bow(story.tokens()))
            .collect();
        Self::fit(&bows)
    }

    #[must_use]
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    #[must_use]
    pub fn idf(&self, id: TermId) -> Option<f64> {
        self.idf.get(id as usize).copied()
    }

    /// 出現回数 × IDF を計算し、L2正規化する。
    #[must_use]
    pub fn transform(&self, bow: &BagOfWords) -> SparseVector {
        let weighted: Vec<(TermId, f64)> = bow
            .iter()
            .filter_map(|(id, count)| {
                let weight = f64::from(count) * self.idf(id)?;
                (weight.abs() > WEIGHT_EPSILON).then_some((id, weight))
            })
            .collect();

        let norm = weighted
            .iter()
            .map(|(_, weight)| weight * weight)
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 {
            return SparseVector::new();
        }
        SparseVector::from_sorted(
            weighted
                .into_iter()
                .map(|(id, weight)| (id, weight / norm))
                .collect(),
        )
    }

    pub fn transform_all<'a, I>(&self, bows: I) -> Vec<SparseVector>
    where
        I: IntoIterator<Item = &'a BagOfWords>,
    {
        bows.into_iter().map(|bow| self.transform(bow)).collect()
    }
}
