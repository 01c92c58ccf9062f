//! 記事タイトルの語彙・TF-IDF・正規化。
mod normalize;
mod sparse;
mod tfidf;
mod vocabulary;

pub use normalize::{BatchStats, z_score};
pub use sparse::{SparseVector, TermId};
pub use tfidf::TfidfModel;
pub use vocabulary::{BagOfWords, STOPLIST, Vocabulary};
