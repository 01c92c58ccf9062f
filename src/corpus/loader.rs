//! タブ区切りの整形済みログを読み込む。
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use super::{Event, Story};

pub const DELIMITER: char = '\t';
pub const STORIES_FILENAME: &str = "stories_v2.log";
pub const READS_FILENAME: &str = "user_story_reads_v2.log";
pub const CLICKTHROUGHS_FILENAME: &str = "user_story_clickthroughs_v2.log";
pub const STEMMED_STORIES_EXTENSION: &str = ".stemmed";

const STORY_FIELDS: usize = 5;
const EVENT_FIELDS: usize = 3;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("event of user {user_id} references story {story_id}, but only {num_stories} stories exist")]
    UnknownStory {
        story_id: usize,
        user_id: usize,
        num_stories: usize,
    },
}

/// どちらのイベントログを使うか。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSource {
    #[default]
    Reads,
    Clickthroughs,
}

impl EventSource {
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::Reads => READS_FILENAME,
            Self::Clickthroughs => CLICKTHROUGHS_FILENAME,
        }
    }
}

impl FromStr for EventSource {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_lowercase().as_str() {
            "reads" | "read" => Ok(Self::Reads),
            "clickthroughs" | "clickthrough" | "clicks" => Ok(Self::Clickthroughs),
            other => Err(format!("unknown event source: {other}")),
        }
    }
}

/// 入力ファイルのパス一式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub stories: PathBuf,
    pub events: PathBuf,
}

impl InputPaths {
    #[must_use]
    pub fn new(log_dir: &Path, stemmed: bool, source: EventSource) -> Self {
        let stories = if stemmed {
            log_dir.join(format!("{STORIES_FILENAME}{STEMMED_STORIES_EXTENSION}"))
        } else {
            log_dir.join(STORIES_FILENAME)
        };
        Self {
            stories,
            events: log_dir.join(source.filename()),
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, CorpusError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn for_each_row<F>(path: &Path, mut on_row: F) -> Result<(), CorpusError>
where
    F: FnMut(usize, Vec<&str>) -> Result<(), String>,
{
    let reader = open(path)?;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        on_row(idx + 1, fields).map_err(|reason| CorpusError::Malformed {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
    }
    Ok(())
}

fn parse_field<T: FromStr>(raw: &str, name: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| format!("invalid {name} '{raw}': {error}"))
}

/// 記事ファイルを読み込む。各フィールドは小文字化される。
///
/// # Errors
/// 読み込み失敗、フィールド数の不一致、タイムスタンプのパース失敗。
pub fn load_stories(path: &Path) -> Result<Vec<Story>, CorpusError> {
    let mut stories = Vec::new();
    for_each_row(path, |_, fields| {
        if fields.len() != STORY_FIELDS {
            return Err(format!(
                "expected {STORY_FIELDS} fields, found {}",
                fields.len()
            ));
        }
        stories.push(Story {
            feed_url: fields[0].to_lowercase(),
            feed_title: fields[1].to_lowercase(),
            story_url: fields[2].to_lowercase(),
            title: fields[3].to_lowercase(),
            timestamp: parse_field(fields[4], "timestamp")?,
        });
        Ok(())
    })?;
    Ok(stories)
}

/// イベントファイルを読み込む。
///
/// # Errors
/// 読み込み失敗、フィールド数の不一致、整数のパース失敗。
pub fn load_events(path: &Path) -> Result<Vec<Event>, CorpusError> {
    let mut events = Vec::new();
    for_each_row(path, |_, fields| {
        if fields.len() != EVENT_FIELDS {
            return Err(format!(
                "expected {EVENT_FIELDS} fields, found {}",
                fields.len()
            ));
        }
        events.push(Event {
            user_id: parse_field(fields[0], "user_id")?,
            story_id: parse_field(fields[1], "story_id")?,
            timestamp: parse_field(fields[2], "timestamp")?,
        });
        Ok(())
    })?;
    Ok(events)
}
