//! 日ごとの語彙（語 ↔ ID）を構築する。
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::sparse::TermId;
use crate::corpus::{CorpusStore, Timestamp};

/// 語彙から除外する英語の機能語。
pub const STOPLIST: [&str; 128] = [
    "a", "able", "about", "across", "after", "all", "almost", "also", "am", "among", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "but", "by", "can", "cannot", "could",
    "dear", "did", "do", "does", "either", "else", "ever", "every", "for", "from", "get", "got",
    "had", "has", "have", "he", "her", "hers", "him", "his", "how", "however", "i", "if", "in",
    "into", "is", "it", "its", "just", "least", "let", "like", "likely", "may", "me", "might",
    "most", "must", "my", "neither", "no", "nor", "not", "of", "off", "often", "on", "only", "or",
    "other", "our", "own", "rather", "said", "say", "says", "she", "should", "since", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "tis", "to", "too", "twas", "us", "wa", "want", "wants", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "yet", "you",
    "your", "s", "ve", "d", "re", "ll", "t", "nt",
];

/// 語IDごとの出現回数（ID昇順）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BagOfWords {
    counts: Vec<(TermId, u32)>,
}

impl BagOfWords {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, u32)> + '_ {
        self.counts.iter().copied()
    }
}

/// ある日の時点で読まれていた記事タイトルから作る語彙。
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    token_to_id: FxHashMap<String, TermId>,
    tokens: Vec<String>,
    num_docs: usize,
    unpruned_len: usize,
}

impl Vocabulary {
    /// トークン化済み文書から語彙を構築し、ストップワードと文書頻度1の語を除いてIDを詰め直す。
    pub fn build<'a, D, T>(documents: D) -> Self
    where
        D: IntoIterator<Item = T>,
        T: IntoIterator<Item = &'a str>,
    {
        let mut token_to_id: FxHashMap<&'a str, usize> = FxHashMap::default();
        let mut tokens: Vec<&'a str> = Vec::new();
        let mut doc_freq: Vec<usize> = Vec::new();
        let mut num_docs = 0usize;

        for document in documents {
            num_docs += 1;
            let unique: BTreeSet<&'a str> = document.into_iter().collect();
            for token in unique {
                let id = *token_to_id.entry(token).or_insert_with(|| {
                    tokens.push(token);
                    doc_freq.push(0);
                    tokens.len() - 1
                });
                doc_freq[id] += 1;
            }
        }

        let unpruned_len = tokens.len();
        let stopwords: BTreeSet<&str> = STOPLIST.iter().copied().collect();

        let mut vocabulary = Self {
            num_docs,
            unpruned_len,
            ..Self::default()
        };
        for (token, df) in tokens.into_iter().zip(doc_freq) {
            if df == 1 || stopwords.contains(token) {
                continue;
            }
            let id = TermId::try_from(vocabulary.tokens.len()).unwrap_or(TermId::MAX);
            vocabulary.token_to_id.insert(token.to_string(), id);
            vocabulary.tokens.push(token.to_string());
        }
        vocabulary
    }

    /// `cursor` 以前に読まれた記事のタイトルから語彙を作る。
    #[must_use]
    pub fn for_day(corpus: &CorpusStore, cursor: Timestamp) -> Self {
        Self::build(corpus.stories_until(cursor).map(|story| story.tokens()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 刈り込み前の異なり語数。
    #[must_use]
    pub fn unpruned_len(&self) -> usize {
        self.unpruned_len
    }

    /// 語彙構築に使った文書数。
    #[must_use]
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    #[must_use]
    pub fn id(&self, token: &str) -> Option<TermId> {
        self.token_to_id.get(token).copied()
    }

    /// 語彙にないトークンは無視して出現回数を数える。
    pub fn doc2bow<'a, T>(&self, tokens: T) -> BagOfWords
    where
        T: IntoIterator<Item = &'a str>,
    {
        let mut counts: FxHashMap<TermId, u32> = FxHashMap::default();
        for token in tokens {
            if let Some(id) = self.id(token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(TermId, u32)> = counts.into_iter().collect();
        counts.sort_unstable_by_key(|(id, _)| *id);
        BagOfWords { counts }
    }
}
