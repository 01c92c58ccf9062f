//! 誤分類された負例を翌日以降の学習に再投入するためのキュー。
use std::collections::BTreeMap;

use rand::Rng;

use super::random::sample_without_replacement;
use crate::corpus::{StoryId, Timestamp};

/// 負例候補（タイトル・記事ID・最初に読まれた時刻）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NegativeCandidate {
    pub title: String,
    pub story_id: StoryId,
    pub timestamp: Timestamp,
}

/// ユーザーごとの再選択キュー。
///
/// 記事IDで重複を排除する集合で、実行中は追加のみ行われる。
/// 抽出してもエントリは消えない。
#[derive(Debug, Clone, Default)]
pub struct ReselectionQueue {
    entries: BTreeMap<StoryId, NegativeCandidate>,
}

impl ReselectionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 新規に追加された場合に `true` を返す。
    pub fn insert(&mut self, candidate: NegativeCandidate) -> bool {
        if self.entries.contains_key(&candidate.story_id) {
            return false;
        }
        self.entries.insert(candidate.story_id, candidate);
        true
    }

    /// 追加された件数を返す。
    pub fn extend<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = NegativeCandidate>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.insert(candidate.clone()))
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, story_id: StoryId) -> bool {
        self.entries.contains_key(&story_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NegativeCandidate> {
        self.entries.values()
    }

    /// 最大 `quota` 件を取り出す。超過時は一様ランダムに選ぶ。
    pub fn draw<R: Rng + ?Sized>(&self, quota: usize, rng: &mut R) -> Vec<NegativeCandidate> {
        let pool: Vec<NegativeCandidate> = self.entries.values().cloned().collect();
        sample_without_replacement(&pool, quota, rng)
    }
}
