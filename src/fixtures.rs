//! 一部のユーザーだけを含む小さな入力ディレクトリ（フィクスチャ）を作る。
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::corpus::{
    CLICKTHROUGHS_FILENAME, CorpusError, Event, READS_FILENAME, STEMMED_STORIES_EXTENSION,
    STORIES_FILENAME, StoryId, UserId, load_events, write_events,
};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("min_user_id is {min} but must be less than or equal to max_user_id ({max})")]
    InvalidRange { min: UserId, max: UserId },
    #[error("no user ids in [{min}, {max}] were found in the processed data")]
    NoUsersInRange { min: UserId, max: UserId },
    #[error("max_user_id is {requested} but the largest user id in the processed data is {largest}")]
    MaxUserNotFound { requested: UserId, largest: UserId },
    #[error("event references story {story_id}, which is missing from {path}")]
    MissingStory { story_id: StoryId, path: PathBuf },
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 書き出したフィクスチャの概要。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureOutput {
    pub directory: PathBuf,
    pub reads: usize,
    pub clickthroughs: usize,
    pub stories: usize,
}

/// `<processed_dir>/fixtures_users_<min>-<max>/`
#[must_use]
pub fn fixture_directory(processed_dir: &Path, min: UserId, max: UserId) -> PathBuf {
    processed_dir.join(format!("fixtures_users_{min}-{max}"))
}

/// ユーザー `min..=max` の既読・クリックと、それらが参照する記事だけを書き出す。
///
/// ユーザーIDは0から、記事IDは元の順序のまま詰めて振り直す。
/// 記事行は元のファイルの内容をそのまま写す。
///
/// # Errors
/// 範囲が不正、範囲内のユーザーがいない、`max` が実在する最大IDより大きい、
/// または入出力に失敗した場合。
pub fn create_fixtures(
    processed_dir: &Path,
    min: UserId,
    max: UserId,
) -> Result<FixtureOutput, FixtureError> {
    if min > max {
        return Err(FixtureError::InvalidRange { min, max });
    }
    let in_range = |event: &Event| (min..=max).contains(&event.user_id);
    let reads: Vec<Event> = load_events(&processed_dir.join(READS_FILENAME))?
        .into_iter()
        .filter(in_range)
        .collect();
    let clickthroughs: Vec<Event> = load_events(&processed_dir.join(CLICKTHROUGHS_FILENAME))?
        .into_iter()
        .filter(in_range)
        .collect();

    let largest = reads
        .iter()
        .chain(&clickthroughs)
        .map(|event| event.user_id)
        .max()
        .ok_or(FixtureError::NoUsersInRange { min, max })?;
    if largest < max {
        return Err(FixtureError::MaxUserNotFound {
            requested: max,
            largest,
        });
    }

    // 元の記事ID → 新しい記事ID（昇順のまま詰める）
    let mut story_ids: BTreeMap<StoryId, StoryId> = reads
        .iter()
        .chain(&clickthroughs)
        .map(|event| (event.story_id, 0))
        .collect();
    for (new_id, slot) in story_ids.values_mut().enumerate() {
        *slot = new_id;
    }

    let directory = fixture_directory(processed_dir, min, max);
    fs::create_dir_all(&directory).map_err(|source| FixtureError::Io {
        path: directory.clone(),
        source,
    })?;

    let stories = copy_story_lines(
        &processed_dir.join(STORIES_FILENAME),
        &directory.join(STORIES_FILENAME),
        &story_ids,
    )?;
    let stemmed_name = format!("{STORIES_FILENAME}{STEMMED_STORIES_EXTENSION}");
    let stemmed_input = processed_dir.join(&stemmed_name);
    if stemmed_input.exists() {
        copy_story_lines(&stemmed_input, &directory.join(&stemmed_name), &story_ids)?;
    }

    let renumber = |events: &[Event]| -> Vec<Event> {
        events
            .iter()
            .map(|event| Event {
                user_id: event.user_id - min,
                story_id: story_ids[&event.story_id],
                timestamp: event.timestamp,
            })
            .collect()
    };
    let reads_path = directory.join(READS_FILENAME);
    write_events(&reads_path, &renumber(&reads)).map_err(|source| FixtureError::Io {
        path: reads_path.clone(),
        source,
    })?;
    let clickthroughs_path = directory.join(CLICKTHROUGHS_FILENAME);
    write_events(&clickthroughs_path, &renumber(&clickthroughs)).map_err(|source| {
        FixtureError::Io {
            path: clickthroughs_path.clone(),
            source,
        }
    })?;

    tracing::info!(
        directory = %directory.display(),
        reads = reads.len(),
        clickthroughs = clickthroughs.len(),
        stories,
        "fixtures written"
    );
    Ok(FixtureOutput {
        directory,
        reads: reads.len(),
        clickthroughs: clickthroughs.len(),
        stories,
    })
}

/// 行番号が `story_ids` に含まれる行だけを写す。写した行数を返す。
fn copy_story_lines(
    input: &Path,
    output: &Path,
    story_ids: &BTreeMap<StoryId, StoryId>,
) -> Result<usize, FixtureError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| FixtureError::Io { path, source }
    };
    let reader = BufReader::new(File::open(input).map_err(io_error(input))?);
    let mut writer = BufWriter::new(File::create(output).map_err(io_error(output))?);

    let mut copied = 0;
    for (story_id, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(input))?;
        if story_ids.contains_key(&story_id) {
            writeln!(writer, "{line}").map_err(io_error(output))?;
            copied += 1;
        }
    }
    writer.flush().map_err(io_error(output))?;

    if copied < story_ids.len() {
        let missing = story_ids.keys().nth(copied).copied().unwrap_or_default();
        return Err(FixtureError::MissingStory {
            story_id: missing,
            path: input.to_path_buf(),
        });
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).expect("write input");
    }

    fn processed_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            STORIES_FILENAME,
            "a\tA\ta/0\tZero\t10\na\tA\ta/1\tOne\t20\nb\tB\tb/2\tTwo\t30\nb\tB\tb/3\tThree\t40\n",
        );
        write(
            dir.path(),
            READS_FILENAME,
            "0\t0\t11\n1\t1\t21\n1\t3\t41\n2\t2\t31\n",
        );
        write(dir.path(), CLICKTHROUGHS_FILENAME, "2\t3\t42\n");
        dir
    }

    #[test]
    fn extracts_and_renumbers_user_range() {
        let dir = processed_dir();
        let output = create_fixtures(dir.path(), 1, 2).expect("fixtures");

        assert_eq!(output.directory, dir.path().join("fixtures_users_1-2"));
        assert_eq!(output.reads, 3);
        assert_eq!(output.clickthroughs, 1);
        assert_eq!(output.stories, 3);

        let reads = fs::read_to_string(output.directory.join(READS_FILENAME)).expect("reads");
        assert_eq!(reads, "0\t0\t21\n0\t2\t41\n1\t1\t31\n");
        let clicks =
            fs::read_to_string(output.directory.join(CLICKTHROUGHS_FILENAME)).expect("clicks");
        assert_eq!(clicks, "1\t2\t42\n");
        let stories = fs::read_to_string(output.directory.join(STORIES_FILENAME)).expect("stories");
        assert_eq!(stories, "a\tA\ta/1\tOne\t20\nb\tB\tb/2\tTwo\t30\nb\tB\tb/3\tThree\t40\n");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let dir = processed_dir();
        assert!(matches!(
            create_fixtures(dir.path(), 2, 1),
            Err(FixtureError::InvalidRange { min: 2, max: 1 })
        ));
    }

    #[test]
    fn range_beyond_data_is_rejected() {
        let dir = processed_dir();
        assert!(matches!(
            create_fixtures(dir.path(), 1, 5),
            Err(FixtureError::MaxUserNotFound {
                requested: 5,
                largest: 2
            })
        ));
        assert!(matches!(
            create_fixtures(dir.path(), 7, 9),
            Err(FixtureError::NoUsersInRange { min: 7, max: 9 })
        ));
    }
}
