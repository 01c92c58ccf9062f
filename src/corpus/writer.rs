//! 記事・イベントを読み込みと同じタブ区切り形式で書き出す。
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::loader::DELIMITER;
use super::{Event, Story};

/// # Errors
/// ファイルの作成・書き込みに失敗した場合。
pub fn write_stories(path: &Path, stories: &[Story]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for story in stories {
        writeln!(
            writer,
            "{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            story.feed_url, story.feed_title, story.story_url, story.title, story.timestamp
        )?;
    }
    writer.flush()
}

/// # Errors
/// ファイルの作成・書き込みに失敗した場合。
pub fn write_events(path: &Path, events: &[Event]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for event in events {
        writeln!(
            writer,
            "{}{DELIMITER}{}{DELIMITER}{}",
            event.user_id, event.story_id, event.timestamp
        )?;
    }
    writer.flush()
}
