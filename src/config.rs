use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::classifier::{Backend, BackendKind, KernelType};
use crate::corpus::{EventSource, InputPaths, Timestamp};
use crate::observability::LogFormat;

/// 位置引数の数。
pub const EXPECTED_ARGS: usize = 5;

pub const USAGE: &str = "usage: pulse-reselect <backend: liblinear|libsvm|similarity> \
<stemming: y|n> <kernel_type: 0-3> <num_users> <log_directory>";

/// 2011-08-01 00:00:00 UTC。
pub const DEFAULT_EARLIEST_TIMESTAMP: Timestamp = 1_312_156_800;
pub const DEFAULT_SECONDS_PER_DAY: Timestamp = 86_400;
pub const DEFAULT_MAX_DAYS: usize = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("too many arguments: expected {EXPECTED_ARGS}, got {0}")]
    TooManyArguments(usize),
    #[error("too few arguments: expected {EXPECTED_ARGS}, got {0}")]
    TooFewArguments(usize),
    #[error("invalid argument <{name}>: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// 実験1回分の設定。実行中は変更しない。
#[derive(Debug, Clone)]
pub struct Config {
    backend: BackendKind,
    stemmed: bool,
    kernel: KernelType,
    num_users: usize,
    log_dir: PathBuf,
    max_days: usize,
    earliest_timestamp: Timestamp,
    seconds_per_day: Timestamp,
    seed: Option<u64>,
    output_dir: PathBuf,
    event_source: EventSource,
    skip_empty_vectors: bool,
    log_format: LogFormat,
}

impl Config {
    /// 環境変数の既定値を使わずに組み立てる。
    #[must_use]
    pub fn new(
        backend: BackendKind,
        stemmed: bool,
        kernel: KernelType,
        num_users: usize,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            stemmed,
            kernel,
            num_users,
            log_dir: log_dir.into(),
            max_days: DEFAULT_MAX_DAYS,
            earliest_timestamp: DEFAULT_EARLIEST_TIMESTAMP,
            seconds_per_day: DEFAULT_SECONDS_PER_DAY,
            seed: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            event_source: EventSource::Reads,
            skip_empty_vectors: false,
            log_format: LogFormat::Json,
        }
    }

    /// 位置引数（プログラム名を除く）と `PULSE_RESELECT_*` 環境変数から設定を読み込む。
    ///
    /// # Errors
    /// 引数の数が5でない、引数が解釈できない、または環境変数の値が不正な場合。
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();
        if args.len() > EXPECTED_ARGS {
            return Err(ConfigError::TooManyArguments(args.len()));
        }
        if args.len() < EXPECTED_ARGS {
            return Err(ConfigError::TooFewArguments(args.len()));
        }

        let backend = args[0]
            .as_ref()
            .parse::<BackendKind>()
            .map_err(|error| invalid_argument("backend", error))?;
        let stemmed = parse_yes_no(args[1].as_ref())?;
        let kernel = args[2]
            .as_ref()
            .parse::<i64>()
            .map_err(|error| invalid_argument("kernel_type", error))
            .and_then(|code| {
                KernelType::try_from(code).map_err(|error| invalid_argument("kernel_type", error))
            })?;
        let num_users = args[3]
            .as_ref()
            .parse::<usize>()
            .map_err(|error| invalid_argument("num_users", error))?;
        let log_dir = PathBuf::from(args[4].as_ref());

        let mut config = Self::new(backend, stemmed, kernel, num_users, log_dir);
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.max_days = parse_usize("PULSE_RESELECT_MAX_DAYS", DEFAULT_MAX_DAYS)?;
        self.earliest_timestamp =
            parse_i64("PULSE_RESELECT_EARLIEST_TIMESTAMP", DEFAULT_EARLIEST_TIMESTAMP)?;
        self.seconds_per_day = parse_i64("PULSE_RESELECT_SECONDS_PER_DAY", DEFAULT_SECONDS_PER_DAY)?;
        if self.seconds_per_day <= 0 {
            return Err(ConfigError::Invalid {
                name: "PULSE_RESELECT_SECONDS_PER_DAY",
                source: anyhow::anyhow!("must be greater than zero"),
            });
        }
        self.seed = parse_optional_u64("PULSE_RESELECT_SEED")?;
        self.output_dir = PathBuf::from(
            env::var("PULSE_RESELECT_OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
        );
        self.event_source = parse_from_str("PULSE_RESELECT_EVENTS", EventSource::Reads)?;
        self.skip_empty_vectors = parse_bool("PULSE_RESELECT_SKIP_EMPTY_VECTORS", false)?;
        self.log_format = parse_from_str("PULSE_RESELECT_LOG_FORMAT", LogFormat::Json)?;
        Ok(())
    }

    #[must_use]
    pub fn with_max_days(mut self, max_days: usize) -> Self {
        self.max_days = max_days;
        self
    }

    #[must_use]
    pub fn with_earliest_timestamp(mut self, earliest_timestamp: Timestamp) -> Self {
        self.earliest_timestamp = earliest_timestamp;
        self
    }

    #[must_use]
    pub fn with_seconds_per_day(mut self, seconds_per_day: Timestamp) -> Self {
        self.seconds_per_day = seconds_per_day;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn with_event_source(mut self, event_source: EventSource) -> Self {
        self.event_source = event_source;
        self
    }

    #[must_use]
    pub fn with_skip_empty_vectors(mut self, skip: bool) -> Self {
        self.skip_empty_vectors = skip;
        self
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        Backend::new(self.backend, self.kernel)
    }

    #[must_use]
    pub fn stemmed(&self) -> bool {
        self.stemmed
    }

    #[must_use]
    pub fn kernel(&self) -> KernelType {
        self.kernel
    }

    #[must_use]
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    #[must_use]
    pub fn max_days(&self) -> usize {
        self.max_days
    }

    #[must_use]
    pub fn earliest_timestamp(&self) -> Timestamp {
        self.earliest_timestamp
    }

    #[must_use]
    pub fn seconds_per_day(&self) -> Timestamp {
        self.seconds_per_day
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn event_source(&self) -> EventSource {
        self.event_source
    }

    #[must_use]
    pub fn skip_empty_vectors(&self) -> bool {
        self.skip_empty_vectors
    }

    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    #[must_use]
    pub fn input_paths(&self) -> InputPaths {
        InputPaths::new(&self.log_dir, self.stemmed, self.event_source)
    }

    /// `reselect_<backend>_<y|n>_<kernel>_<num_users>_<unix_time>.tsv`
    #[must_use]
    pub fn output_file_name(&self, unix_time: i64) -> String {
        format!(
            "reselect_{}_{}_{}_{}_{}.tsv",
            self.backend,
            if self.stemmed { "y" } else { "n" },
            self.kernel,
            self.num_users,
            unix_time
        )
    }

    #[must_use]
    pub fn output_path(&self, unix_time: i64) -> PathBuf {
        self.output_dir.join(self.output_file_name(unix_time))
    }
}

fn invalid_argument(name: &'static str, error: impl ToString) -> ConfigError {
    ConfigError::InvalidArgument {
        name,
        reason: error.to_string(),
    }
}

fn parse_yes_no(raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        other => Err(invalid_argument("stemming", format!("expected y or n, got `{other}`"))),
    }
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_i64(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<i64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_optional_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    env::var(name)
        .ok()
        .map(|raw| {
            raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
                name,
                source: anyhow::Error::new(error),
            })
        })
        .transpose()
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_from_str<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String>,
{
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|reason| ConfigError::Invalid {
            name,
            source: anyhow::anyhow!(reason),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 8] = [
        "PULSE_RESELECT_MAX_DAYS",
        "PULSE_RESELECT_EARLIEST_TIMESTAMP",
        "PULSE_RESELECT_SECONDS_PER_DAY",
        "PULSE_RESELECT_SEED",
        "PULSE_RESELECT_OUTPUT_DIR",
        "PULSE_RESELECT_EVENTS",
        "PULSE_RESELECT_SKIP_EMPTY_VECTORS",
        "PULSE_RESELECT_LOG_FORMAT",
    ];

    fn cleared<F: FnOnce()>(f: F) {
        temp_env::with_vars_unset(ENV_KEYS, f);
    }

    #[test]
    fn defaults_apply_without_env() {
        cleared(|| {
            let config =
                Config::from_args(["similarity", "n", "0", "2", "/logs"]).expect("valid args");
            assert_eq!(config.backend_kind(), BackendKind::Similarity);
            assert!(!config.stemmed());
            assert_eq!(config.kernel(), KernelType::Linear);
            assert_eq!(config.num_users(), 2);
            assert_eq!(config.max_days(), 30);
            assert_eq!(config.earliest_timestamp(), 1_312_156_800);
            assert_eq!(config.seconds_per_day(), 86_400);
            assert_eq!(config.seed(), None);
            assert_eq!(config.output_dir(), Path::new("results"));
            assert_eq!(config.event_source(), EventSource::Reads);
            assert!(!config.skip_empty_vectors());
            assert_eq!(config.log_format(), LogFormat::Json);
        });
    }

    #[test]
    fn env_overrides_are_read() {
        temp_env::with_vars(
            [
                ("PULSE_RESELECT_MAX_DAYS", Some("3")),
                ("PULSE_RESELECT_SEED", Some("42")),
                ("PULSE_RESELECT_EVENTS", Some("clickthroughs")),
                ("PULSE_RESELECT_SKIP_EMPTY_VECTORS", Some("true")),
                ("PULSE_RESELECT_LOG_FORMAT", Some("text")),
                ("PULSE_RESELECT_OUTPUT_DIR", Some("/tmp/out")),
            ],
            || {
                let config =
                    Config::from_args(["libsvm", "y", "2", "10", "/logs"]).expect("valid args");
                assert_eq!(config.max_days(), 3);
                assert_eq!(config.seed(), Some(42));
                assert_eq!(config.event_source(), EventSource::Clickthroughs);
                assert!(config.skip_empty_vectors());
                assert_eq!(config.log_format(), LogFormat::Text);
                assert_eq!(
                    config.input_paths().events,
                    Path::new("/logs/user_story_clickthroughs_v2.log")
                );
                assert_eq!(
                    config.output_path(1_700_000_000),
                    Path::new("/tmp/out/reselect_libsvm_y_2_10_1700000000.tsv")
                );
            },
        );
    }

    #[test]
    fn argument_count_is_checked() {
        cleared(|| {
            assert!(matches!(
                Config::from_args(["libsvm", "y", "2", "10"]),
                Err(ConfigError::TooFewArguments(4))
            ));
            assert!(matches!(
                Config::from_args(["libsvm", "y", "2", "10", "/a", "/b"]),
                Err(ConfigError::TooManyArguments(6))
            ));
        });
    }

    #[test]
    fn bad_arguments_are_rejected() {
        cleared(|| {
            for args in [
                ["svm", "y", "2", "1", "/a"],
                ["libsvm", "maybe", "2", "1", "/a"],
                ["libsvm", "y", "4", "1", "/a"],
                ["libsvm", "y", "x", "1", "/a"],
                ["libsvm", "y", "2", "-1", "/a"],
            ] {
                let error = Config::from_args(args).expect_err("invalid");
                assert!(matches!(error, ConfigError::InvalidArgument { .. }), "{args:?}");
            }
        });
    }

    #[test]
    fn invalid_env_value_names_the_variable() {
        temp_env::with_var("PULSE_RESELECT_SECONDS_PER_DAY", Some("0"), || {
            let error = Config::from_args(["liblinear", "n", "0", "1", "/a"]).expect_err("zero");
            assert!(error.to_string().contains("PULSE_RESELECT_SECONDS_PER_DAY"));
        });
    }
}
