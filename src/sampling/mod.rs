//! ユーザー・日ごとの正例／負例サンプルの選択。
use std::collections::{BTreeSet, HashSet};

use rand::Rng;

use crate::classification::{BagOfWords, Vocabulary};
use crate::classifier::Label;
use crate::corpus::{CorpusStore, Timestamp, UserId};

mod random;
mod reselect;

pub use random::sample_without_replacement;
pub use reselect::{NegativeCandidate, ReselectionQueue};

/// 境界時刻で分けた学習用（過去）と予測用（未来）の区間。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Training,
    Prediction,
}

impl Partition {
    /// 学習区間は `timestamp <= cursor`、予測区間は `timestamp > cursor`。
    #[must_use]
    pub fn contains(self, timestamp: Timestamp, cursor: Timestamp) -> bool {
        match self {
            Self::Training => timestamp <= cursor,
            Self::Prediction => timestamp > cursor,
        }
    }
}

/// 正例の bag-of-words と、それらの記事が属するフィード一覧。
#[derive(Debug, Clone, Default)]
pub struct PositiveSamples<'a> {
    pub documents: Vec<BagOfWords>,
    pub feeds: BTreeSet<&'a str>,
}

/// 1区間分のラベル付きサンプル。正例が先、負例が後に並ぶ。
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    pub positives: Vec<BagOfWords>,
    pub negatives: Vec<BagOfWords>,
    /// 負例の記事（`negatives` と同じ順序）。
    pub chosen_negatives: Vec<NegativeCandidate>,
}

impl SampleSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.positives.len() + self.negatives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn documents(&self) -> impl Iterator<Item = &BagOfWords> {
        self.positives.iter().chain(&self.negatives)
    }

    #[must_use]
    pub fn labels(&self) -> Vec<Label> {
        let mut labels = vec![Label::Positive; self.positives.len()];
        labels.resize(self.len(), Label::Negative);
        labels
    }
}

/// 優先順位に従って負例を選ぶ。
///
/// 1. 再選択キューから最大 `quota` 件
/// 2. 残りを、キューから選んだ記事を除いた新規候補から非復元抽出
///
/// 新規候補が足りなければ全件を使う。
pub fn choose_negatives<R: Rng + ?Sized>(
    candidates: &[NegativeCandidate],
    quota: usize,
    queue: Option<&ReselectionQueue>,
    rng: &mut R,
) -> Vec<NegativeCandidate> {
    let mut chosen = queue.map_or_else(Vec::new, |queue| queue.draw(quota, rng));
    let remaining = quota - chosen.len();
    if remaining == 0 {
        return chosen;
    }

    let drawn: HashSet<_> = chosen.iter().map(|candidate| candidate.story_id).collect();
    let fresh: Vec<NegativeCandidate> = candidates
        .iter()
        .filter(|candidate| !drawn.contains(&candidate.story_id))
        .cloned()
        .collect();
    chosen.extend(sample_without_replacement(&fresh, remaining, rng));
    chosen
}

/// コーパスと当日の語彙からサンプルを組み立てる。
#[derive(Debug, Clone, Copy)]
pub struct SampleSelector<'a> {
    corpus: &'a CorpusStore,
    vocabulary: &'a Vocabulary,
}

impl<'a> SampleSelector<'a> {
    #[must_use]
    pub fn new(corpus: &'a CorpusStore, vocabulary: &'a Vocabulary) -> Self {
        Self { corpus, vocabulary }
    }

    /// 区間内のイベントごとに正例を作る。同じ記事を複数回読めばその回数分入る。
    #[must_use]
    pub fn positives(
        &self,
        user_id: UserId,
        cursor: Timestamp,
        partition: Partition,
    ) -> PositiveSamples<'a> {
        let mut samples = PositiveSamples::default();
        for event in self.corpus.events_for_user(user_id) {
            if !partition.contains(event.timestamp, cursor) {
                continue;
            }
            let story = self.corpus.story(event.story_id);
            samples.documents.push(self.vocabulary.doc2bow(story.tokens()));
            samples.feeds.insert(story.feed_url.as_str());
        }
        samples
    }

    /// フィード一覧に含まれ、ユーザーが一度も読んでいない記事のうち区間内のもの。
    ///
    /// フィードURL昇順、記事ID昇順に並ぶ。
    #[must_use]
    pub fn negative_candidates(
        &self,
        user_id: UserId,
        cursor: Timestamp,
        partition: Partition,
        feeds: &BTreeSet<&str>,
    ) -> Vec<NegativeCandidate> {
        let read: HashSet<_> = self
            .corpus
            .events_for_user(user_id)
            .iter()
            .map(|event| event.story_id)
            .collect();

        feeds
            .iter()
            .flat_map(|feed| self.corpus.stories_in_feed(feed))
            .filter(|story_id| !read.contains(*story_id))
            .filter_map(|&story_id| {
                let story = self.corpus.story(story_id);
                partition
                    .contains(story.timestamp, cursor)
                    .then(|| NegativeCandidate {
                        title: story.title.clone(),
                        story_id,
                        timestamp: story.timestamp,
                    })
            })
            .collect()
    }

    /// 正例と、同数を上限とする負例を選ぶ。
    ///
    /// 再選択キューは学習区間でのみ使われる。
    pub fn select<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        cursor: Timestamp,
        partition: Partition,
        queue: Option<&ReselectionQueue>,
        rng: &mut R,
    ) -> SampleSet {
        let positives = self.positives(user_id, cursor, partition);
        let candidates = self.negative_candidates(user_id, cursor, partition, &positives.feeds);
        let queue = match partition {
            Partition::Training => queue,
            Partition::Prediction => None,
        };
        let chosen_negatives =
            choose_negatives(&candidates, positives.documents.len(), queue, rng);
        let negatives = chosen_negatives
            .iter()
            .map(|candidate| self.vocabulary.doc2bow(candidate.title.split_whitespace()))
            .collect();

        SampleSet {
            positives: positives.documents,
            negatives,
            chosen_negatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::corpus::{Event, Story};

    fn story(feed: &str, title: &str, timestamp: Timestamp) -> Story {
        Story {
            feed_url: feed.to_string(),
            feed_title: feed.to_string(),
            story_url: format!("{feed}/{timestamp}"),
            title: title.to_string(),
            timestamp,
        }
    }

    fn candidate(story_id: usize) -> NegativeCandidate {
        NegativeCandidate {
            title: format!("title {story_id}"),
            story_id,
            timestamp: 0,
        }
    }

    /// ユーザー0はフィード a の記事0,1 を読む。フィード a, b の残りは未読。
    fn corpus() -> CorpusStore {
        let stories = vec![
            story("a", "rust release notes", 10),
            story("a", "rust compiler news", 20),
            story("a", "rust async news", 30),
            story("a", "compiler release", 40),
            story("a", "async runtime release", 200),
            story("b", "weather news", 15),
        ];
        let events = vec![
            Event {
                user_id: 0,
                story_id: 0,
                timestamp: 10,
            },
            Event {
                user_id: 0,
                story_id: 1,
                timestamp: 20,
            },
            Event {
                user_id: 0,
                story_id: 1,
                timestamp: 25,
            },
            Event {
                user_id: 1,
                story_id: 5,
                timestamp: 15,
            },
        ];
        CorpusStore::new(stories, events).expect("corpus")
    }

    #[test]
    fn partitions_split_on_cursor() {
        assert!(Partition::Training.contains(100, 100));
        assert!(!Partition::Prediction.contains(100, 100));
        assert!(Partition::Prediction.contains(101, 100));
    }

    #[test]
    fn repeat_reads_count_as_separate_positives() {
        let corpus = corpus();
        let vocabulary = Vocabulary::for_day(&corpus, 100);
        let selector = SampleSelector::new(&corpus, &vocabulary);
        let positives = selector.positives(0, 100, Partition::Training);
        assert_eq!(positives.documents.len(), 3);
        assert_eq!(positives.feeds.iter().copied().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn candidates_exclude_read_stories_and_respect_partition() {
        let corpus = corpus();
        let vocabulary = Vocabulary::for_day(&corpus, 100);
        let selector = SampleSelector::new(&corpus, &vocabulary);
        let feeds = BTreeSet::from(["a"]);

        let training = selector.negative_candidates(0, 100, Partition::Training, &feeds);
        let ids: Vec<_> = training.iter().map(|c| c.story_id).collect();
        assert_eq!(ids, vec![2, 3]);

        let prediction = selector.negative_candidates(0, 100, Partition::Prediction, &feeds);
        let ids: Vec<_> = prediction.iter().map(|c| c.story_id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn negatives_never_exceed_positives() {
        let corpus = corpus();
        let vocabulary = Vocabulary::for_day(&corpus, 100);
        let selector = SampleSelector::new(&corpus, &vocabulary);
        let mut rng = StdRng::seed_from_u64(7);

        let samples = selector.select(0, 100, Partition::Training, None, &mut rng);
        assert_eq!(samples.positives.len(), 3);
        // 候補は2件しかない
        assert_eq!(samples.negatives.len(), 2);
        assert_eq!(samples.labels().len(), 5);
        assert_eq!(samples.labels()[3], Label::Negative);
    }

    #[test]
    fn reselection_entries_come_first() {
        let mut queue = ReselectionQueue::new();
        queue.insert(candidate(90));
        let pool: Vec<_> = (0..10).map(candidate).collect();
        let mut rng = StdRng::seed_from_u64(1);

        let chosen = choose_negatives(&pool, 3, Some(&queue), &mut rng);
        assert_eq!(chosen.len(), 3);
        assert_eq!(chosen[0].story_id, 90);
    }

    #[test]
    fn drawn_entries_are_not_sampled_twice() {
        let mut queue = ReselectionQueue::new();
        queue.extend([candidate(0), candidate(1)]);
        let pool: Vec<_> = (0..4).map(candidate).collect();
        let mut rng = StdRng::seed_from_u64(11);

        let chosen = choose_negatives(&pool, 4, Some(&queue), &mut rng);
        let unique: BTreeSet<_> = chosen.iter().map(|c| c.story_id).collect();
        assert_eq!(chosen.len(), 4);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn queue_beyond_quota_is_subsampled() {
        let mut queue = ReselectionQueue::new();
        queue.extend((10..20).map(candidate));
        let mut rng = StdRng::seed_from_u64(2);

        let chosen = choose_negatives(&[candidate(1)], 2, Some(&queue), &mut rng);
        assert_eq!(chosen.len(), 2);
        assert!(chosen.iter().all(|c| c.story_id >= 10));
    }

    #[test]
    fn same_seed_same_selection() {
        let pool: Vec<_> = (0..30).map(candidate).collect();
        let first = choose_negatives(&pool, 5, None, &mut StdRng::seed_from_u64(4));
        let second = choose_negatives(&pool, 5, None, &mut StdRng::seed_from_u64(4));
        assert_eq!(first, second);
    }
}
