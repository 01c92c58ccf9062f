// 入力ディレクトリから結果ファイルまでを通しで実行するテスト。
use std::fs;
use std::path::Path;

use pulse_reselect::analysis::{SyntheticSpec, synthetic_corpus, write_synthetic_logs};
use pulse_reselect::classifier::{BackendKind, KernelType};
use pulse_reselect::config::Config;
use pulse_reselect::corpus::{READS_FILENAME, STORIES_FILENAME};
use pulse_reselect::pipeline;
use pulse_reselect::util::error::{ErrorKind, classify_error};
use rstest::rstest;

fn write_tiny_logs(dir: &Path) {
    fs::write(
        dir.join(STORIES_FILENAME),
        "http://a.example\tA\thttp://a.example/0\tRust compiler release\t50\n\
         http://a.example\tA\thttp://a.example/1\tRust compiler news\t150\n\
         http://a.example\tA\thttp://a.example/2\tRust weekly news\t250\n",
    )
    .expect("write stories");
    fs::write(
        dir.join(READS_FILENAME),
        "0\t0\t50\n0\t1\t150\n1\t0\t60\n1\t2\t250\n",
    )
    .expect("write reads");
}

fn tiny_config(log_dir: &Path, output_dir: &Path, kind: BackendKind) -> Config {
    Config::new(kind, false, KernelType::Linear, 2, log_dir)
        .with_max_days(2)
        .with_earliest_timestamp(0)
        .with_seconds_per_day(100)
        .with_seed(17)
        .with_output_dir(output_dir)
}

#[test]
fn similarity_run_writes_one_line_per_scored_user_day() {
    let logs = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    write_tiny_logs(logs.path());

    let config = tiny_config(logs.path(), output.path(), BackendKind::Similarity);
    let summary = pipeline::run(&config).expect("run");

    let name = summary
        .output
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(name.starts_with("reselect_similarity_n_0_2_"));
    assert!(name.ends_with(".tsv"));

    let text = fs::read_to_string(&summary.output).expect("read results");
    let lines: Vec<&str> = text.lines().collect();
    // 0日目: ユーザー0と1、1日目: ユーザー1のみ（ユーザー0は予測対象がない）
    assert_eq!(summary.rows, 3);
    assert_eq!(lines.len(), summary.rows + 1);
    assert!(lines[lines.len() - 1].ends_with("\t-1\t-1"));

    let keys: Vec<(String, String)> = lines[..summary.rows]
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 5);
            (fields[4].to_string(), fields[3].to_string())
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            ("0".to_string(), "0".to_string()),
            ("1".to_string(), "0".to_string()),
            ("1".to_string(), "1".to_string()),
        ]
    );
}

/// 両ユーザーが両日とも採点される入力。
fn write_busy_logs(dir: &Path) {
    fs::write(
        dir.join(STORIES_FILENAME),
        "http://a.example\tA\thttp://a.example/0\tRust compiler release\t50\n\
         http://a.example\tA\thttp://a.example/1\tRust compiler news\t150\n\
         http://a.example\tA\thttp://a.example/2\tRust weekly news\t250\n\
         http://a.example\tA\thttp://a.example/3\tRust weekly release\t260\n",
    )
    .expect("write stories");
    fs::write(
        dir.join(READS_FILENAME),
        "0\t0\t50\n0\t1\t150\n0\t2\t250\n1\t0\t60\n1\t3\t260\n",
    )
    .expect("write reads");
}

#[test]
fn two_lines_per_fully_scored_day_plus_summary() {
    let logs = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    write_busy_logs(logs.path());

    let config = tiny_config(logs.path(), output.path(), BackendKind::Similarity);
    let summary = pipeline::run(&config).expect("run");
    let text = fs::read_to_string(&summary.output).expect("read results");
    let lines: Vec<&str> = text.lines().collect();

    let scored_days = 2;
    assert_eq!(summary.rows, 4);
    assert_eq!(lines.len(), 2 * scored_days + 1);
    assert!(lines[lines.len() - 1].ends_with("\t-1\t-1"));
    let days: Vec<&str> = lines[..summary.rows]
        .iter()
        .map(|line| line.split('\t').nth(3).expect("day column"))
        .collect();
    assert_eq!(days, vec!["0", "1", "0", "1"]);
}

#[rstest]
#[case(BackendKind::Linear)]
#[case(BackendKind::Kernel)]
fn every_backend_completes_the_tiny_run(#[case] kind: BackendKind) {
    let logs = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    write_tiny_logs(logs.path());

    let summary = pipeline::run(&tiny_config(logs.path(), output.path(), kind)).expect("run");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.seed, 17);
}

#[test]
fn fixed_seed_reproduces_output_byte_for_byte() {
    let logs = tempfile::tempdir().expect("tempdir");
    let spec = SyntheticSpec {
        num_users: 4,
        stories_per_feed: 30,
        num_days: 4,
        ..SyntheticSpec::default()
    };
    let corpus = synthetic_corpus(&spec).expect("synthetic corpus");
    write_synthetic_logs(logs.path(), &corpus).expect("write logs");

    let run_once = || {
        let output = tempfile::tempdir().expect("tempdir");
        let config = Config::new(BackendKind::Kernel, false, KernelType::Rbf, 4, logs.path())
            .with_max_days(3)
            .with_earliest_timestamp(spec.earliest_timestamp)
            .with_seconds_per_day(spec.seconds_per_day)
            .with_seed(99)
            .with_output_dir(output.path());
        let summary = pipeline::run(&config).expect("run");
        fs::read(&summary.output).expect("read results")
    };

    let first = run_once();
    let second = run_once();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn too_many_users_is_rejected_after_loading() {
    let logs = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");
    write_tiny_logs(logs.path());

    let config = Config::new(BackendKind::Linear, false, KernelType::Linear, 3, logs.path())
        .with_output_dir(output.path());
    let error = pipeline::run(&config).expect_err("only two users exist");
    assert_eq!(classify_error(&error), ErrorKind::Usage);
    assert!(fs::read_dir(output.path()).expect("read dir").next().is_none());
}

#[test]
fn missing_input_is_an_io_error() {
    let logs = tempfile::tempdir().expect("tempdir");
    let output = tempfile::tempdir().expect("tempdir");

    let config = Config::new(BackendKind::Linear, false, KernelType::Linear, 1, logs.path())
        .with_output_dir(output.path());
    let error = pipeline::run(&config).expect_err("no input files");
    assert_eq!(classify_error(&error), ErrorKind::Io);
    assert!(format!("{error:#}").contains(STORIES_FILENAME));
}
