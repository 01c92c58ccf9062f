use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::config::Config;
use crate::corpus::CorpusStore;
use crate::evaluation::MacroSummary;

pub mod cursor;
pub mod experiment;

pub use cursor::DayCursor;
pub use experiment::{DayStats, ExperimentError, ExperimentRunner};

/// 実行結果の要約。最後のログ行に JSON で出す。
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub backend: String,
    pub stemmed: bool,
    pub kernel: i64,
    pub num_users: usize,
    pub max_days: usize,
    pub seed: u64,
    pub output: PathBuf,
    pub rows: usize,
    #[serde(rename = "macro")]
    pub macro_scores: MacroSummary,
    pub elapsed_ms: u128,
}

/// コーパスを読み込み、実験を実行して結果ファイルを書き出す。
///
/// # Errors
/// 入力の読み込み、ユーザー数の検証、学習、または出力の書き込みに失敗した場合。
pub fn run(config: &Config) -> Result<RunSummary> {
    let started = Instant::now();
    let paths = config.input_paths();
    let corpus = CorpusStore::load(&paths).context("failed to load corpus")?;

    let seed = config.seed().unwrap_or_else(rand::random);
    tracing::info!(
        seed,
        backend = %config.backend_kind(),
        kernel = %config.kernel(),
        stemmed = config.stemmed(),
        num_users = config.num_users(),
        max_days = config.max_days(),
        "experiment starting"
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let mut runner = ExperimentRunner::new(config, &corpus)?;
    let report = runner.run(&mut rng).context("experiment failed")?;

    fs::create_dir_all(config.output_dir()).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir().display()
        )
    })?;
    let output = config.output_path(chrono::Utc::now().timestamp());
    let file = File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let macro_scores = report
        .write_tsv(file)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(path = %output.display(), rows = report.len(), "results written");

    Ok(RunSummary {
        backend: config.backend_kind().to_string(),
        stemmed: config.stemmed(),
        kernel: config.kernel().code(),
        num_users: config.num_users(),
        max_days: config.max_days(),
        seed,
        output,
        rows: report.len(),
        macro_scores,
        elapsed_ms: started.elapsed().as_millis(),
    })
}
