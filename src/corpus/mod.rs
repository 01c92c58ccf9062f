//! 整形済みの記事ログとユーザーイベントを保持するストア。
use std::collections::BTreeSet;
use std::ops::Range;

use rustc_hash::FxHashMap;

mod loader;
mod writer;

pub use loader::{
    CLICKTHROUGHS_FILENAME, CorpusError, DELIMITER, EventSource, InputPaths, READS_FILENAME,
    STEMMED_STORIES_EXTENSION, STORIES_FILENAME, load_events, load_stories,
};
pub use writer::{write_events, write_stories};

/// 記事ID（整形済み記事ファイルの行番号）。
pub type StoryId = usize;
/// ユーザーID（0始まりの連番）。
pub type UserId = usize;
/// Unix秒。
pub type Timestamp = i64;

/// 整形済み記事ファイルの1行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub feed_url: String,
    pub feed_title: String,
    pub story_url: String,
    pub title: String,
    pub timestamp: Timestamp,
}

impl Story {
    /// 空白区切りでタイトルをトークン化する。
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.title.split_whitespace()
    }
}

/// ユーザーが記事を読んだ（またはクリックした）イベント。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Event {
    pub user_id: UserId,
    pub story_id: StoryId,
    pub timestamp: Timestamp,
}

/// 実行中は不変の記事・イベントストア。
#[derive(Debug, Clone)]
pub struct CorpusStore {
    stories: Vec<Story>,
    events: Vec<Event>,
    stories_by_feed: FxHashMap<String, Vec<StoryId>>,
    num_users: usize,
}

impl CorpusStore {
    /// 記事とイベントからストアを構築する。
    ///
    /// イベントは (user, story, timestamp) 昇順に並べ替えられる。
    ///
    /// # Errors
    /// 存在しない記事IDを参照するイベントがある場合は [`CorpusError::UnknownStory`] を返す。
    pub fn new(stories: Vec<Story>, mut events: Vec<Event>) -> Result<Self, CorpusError> {
        if let Some(event) = events.iter().find(|event| event.story_id >= stories.len()) {
            return Err(CorpusError::UnknownStory {
                story_id: event.story_id,
                user_id: event.user_id,
                num_stories: stories.len(),
            });
        }
        if !events.is_sorted() {
            events.sort_unstable();
        }

        let mut stories_by_feed: FxHashMap<String, Vec<StoryId>> = FxHashMap::default();
        for (story_id, story) in stories.iter().enumerate() {
            stories_by_feed
                .entry(story.feed_url.clone())
                .or_default()
                .push(story_id);
        }

        let num_users = events
            .iter()
            .map(|event| event.user_id)
            .collect::<BTreeSet<_>>()
            .len();

        Ok(Self {
            stories,
            events,
            stories_by_feed,
            num_users,
        })
    }

    /// 入力ディレクトリから記事とイベントを読み込む。
    ///
    /// # Errors
    /// ファイルが開けない、行が壊れている、または参照整合性が崩れている場合。
    pub fn load(paths: &InputPaths) -> Result<Self, CorpusError> {
        let stories = load_stories(&paths.stories)?;
        let events = load_events(&paths.events)?;
        let store = Self::new(stories, events)?;
        tracing::info!(
            stories = store.stories.len(),
            events = store.events.len(),
            users = store.num_users,
            stories_path = %paths.stories.display(),
            events_path = %paths.events.display(),
            "corpus loaded"
        );
        Ok(store)
    }

    #[must_use]
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    #[must_use]
    pub fn story(&self, story_id: StoryId) -> &Story {
        &self.stories[story_id]
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// イベントに現れる異なるユーザー数。
    #[must_use]
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// 最初に読まれた時刻が `cursor` 以下の記事を返す。
    pub fn stories_until(&self, cursor: Timestamp) -> impl Iterator<Item = &Story> {
        self.stories
            .iter()
            .filter(move |story| story.timestamp <= cursor)
    }

    /// 指定ユーザーのイベント範囲を二分探索で求める。
    #[must_use]
    pub fn user_event_range(&self, user_id: UserId) -> Range<usize> {
        let start = self.events.partition_point(|event| event.user_id < user_id);
        let end = self.events.partition_point(|event| event.user_id <= user_id);
        start..end
    }

    #[must_use]
    pub fn events_for_user(&self, user_id: UserId) -> &[Event] {
        &self.events[self.user_event_range(user_id)]
    }

    /// フィードに属する記事IDを昇順で返す。
    #[must_use]
    pub fn stories_in_feed(&self, feed_url: &str) -> &[StoryId] {
        self.stories_by_feed
            .get(feed_url)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
