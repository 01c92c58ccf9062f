//! 計測・評価用の合成コーパス。
use std::io;
use std::path::Path;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::corpus::{
    CorpusError, CorpusStore, Event, READS_FILENAME, STORIES_FILENAME, Story, Timestamp,
    write_events, write_stories,
};

/// 合成コーパスの規模。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticSpec {
    pub num_users: usize,
    pub stories_per_feed: usize,
    pub num_days: usize,
    pub earliest_timestamp: Timestamp,
    pub seconds_per_day: Timestamp,
    /// 好みのフィードの記事を読む確率（百分率）
    pub read_percent: u32,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            num_users: 8,
            stories_per_feed: 60,
            num_days: 5,
            earliest_timestamp: 1_312_156_800,
            seconds_per_day: 86_400,
            read_percent: 40,
            seed: 42,
        }
    }
}

const TOPICS: [(&str, [&str; 8]); 6] = [
    (
        "tech",
        ["rust", "compiler", "release", "kernel", "linux", "startup", "chip", "cloud"],
    ),
    (
        "sports",
        ["league", "final", "striker", "coach", "season", "transfer", "derby", "goal"],
    ),
    (
        "markets",
        ["stocks", "rally", "bond", "yields", "earnings", "merger", "dollar", "oil"],
    ),
    (
        "science",
        ["genome", "telescope", "fusion", "climate", "vaccine", "quantum", "fossil", "probe"],
    ),
    (
        "politics",
        ["senate", "vote", "budget", "election", "minister", "policy", "summit", "treaty"],
    ),
    (
        "food",
        ["recipe", "bakery", "coffee", "noodles", "vegan", "chef", "harvest", "spice"],
    ),
];

const SHARED_WORDS: [&str; 10] = [
    "new", "report", "week", "update", "plan", "review", "record", "city", "study", "guide",
];

const FILLERS: [&str; 4] = ["the", "of", "in", "for"];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, words: &[&'a str]) -> &'a str {
    words[rng.random_range(0..words.len())]
}

/// 記事を生成する。記事はフィード→記事URLの昇順に並ぶ。
fn synthetic_stories<R: Rng + ?Sized>(spec: &SyntheticSpec, rng: &mut R) -> Vec<Story> {
    let span = Timestamp::try_from(spec.num_days)
        .unwrap_or(Timestamp::MAX)
        .saturating_mul(spec.seconds_per_day)
        .max(1);
    let mut stories = Vec::with_capacity(TOPICS.len() * spec.stories_per_feed);
    for (feed_idx, (topic, words)) in TOPICS.iter().enumerate() {
        let feed_url = format!("http://feed-{feed_idx:02}.example.com/rss");
        for story_idx in 0..spec.stories_per_feed {
            let length = rng.random_range(3..=6);
            let mut title: Vec<&str> = Vec::with_capacity(length + 1);
            for position in 0..length {
                let word = match rng.random_range(0..10) {
                    0..=5 => pick(rng, words),
                    6..=8 => pick(rng, &SHARED_WORDS),
                    _ if position > 0 => pick(rng, &FILLERS),
                    _ => pick(rng, words),
                };
                title.push(word);
            }
            stories.push(Story {
                feed_url: feed_url.clone(),
                feed_title: format!("{topic} daily"),
                story_url: format!("{feed_url}/story-{story_idx:05}"),
                title: title.join(" "),
                timestamp: spec.earliest_timestamp + rng.random_range(0..span),
            });
        }
    }
    stories
}

/// 各ユーザーは1〜2個の好みのフィードを持ち、その記事を一定確率で読む。
fn synthetic_events<R: Rng + ?Sized>(
    spec: &SyntheticSpec,
    stories: &[Story],
    rng: &mut R,
) -> Vec<Event> {
    let mut events = Vec::new();
    for user_id in 0..spec.num_users {
        let first = user_id % TOPICS.len();
        let second = rng.random_range(0..TOPICS.len());
        let favourites = [
            format!("http://feed-{first:02}.example.com/rss"),
            format!("http://feed-{second:02}.example.com/rss"),
        ];
        let mut read_any = false;
        for (story_id, story) in stories.iter().enumerate() {
            if !favourites.contains(&story.feed_url) {
                continue;
            }
            if rng.random_range(0..100) < spec.read_percent {
                events.push(Event {
                    user_id,
                    story_id,
                    timestamp: story.timestamp + rng.random_range(0..3_600),
                });
                read_any = true;
            }
        }
        // 全ユーザーがイベントに現れるようにする
        if read_any {
            continue;
        }
        if let Some(story_id) = stories.iter().position(|s| s.feed_url == favourites[0]) {
            events.push(Event {
                user_id,
                story_id,
                timestamp: stories[story_id].timestamp,
            });
        }
    }
    events
}

/// シードから決定的に合成コーパスを作る。
///
/// # Errors
/// 生成したイベントが存在しない記事を参照した場合（通常は起こらない）。
pub fn synthetic_corpus(spec: &SyntheticSpec) -> Result<CorpusStore, CorpusError> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let stories = synthetic_stories(spec, &mut rng);
    let events = synthetic_events(spec, &stories, &mut rng);
    CorpusStore::new(stories, events)
}

/// 合成コーパスを入力ディレクトリの形式で書き出す。
///
/// # Errors
/// ファイルの書き込みに失敗した場合。
pub fn write_synthetic_logs(dir: &Path, corpus: &CorpusStore) -> io::Result<()> {
    write_stories(&dir.join(STORIES_FILENAME), corpus.stories())?;
    write_events(&dir.join(READS_FILENAME), corpus.events())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_corpus() {
        let spec = SyntheticSpec::default();
        let first = synthetic_corpus(&spec).expect("corpus");
        let second = synthetic_corpus(&spec).expect("corpus");
        assert_eq!(first.stories(), second.stories());
        assert_eq!(first.events(), second.events());
    }

    #[test]
    fn every_user_has_events() {
        let spec = SyntheticSpec {
            num_users: 5,
            read_percent: 0,
            ..SyntheticSpec::default()
        };
        let corpus = synthetic_corpus(&spec).expect("corpus");
        assert_eq!(corpus.num_users(), 5);
        assert_eq!(corpus.stories().len(), TOPICS.len() * spec.stories_per_feed);
    }

    #[test]
    fn stories_are_sorted_by_feed_then_url() {
        let corpus = synthetic_corpus(&SyntheticSpec::default()).expect("corpus");
        assert!(corpus.stories().windows(2).all(|pair| {
            (&pair[0].feed_url, &pair[0].story_url) < (&pair[1].feed_url, &pair[1].story_url)
        }));
    }
}
