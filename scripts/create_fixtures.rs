use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use pulse_reselect::config::ConfigError;
use pulse_reselect::fixtures::create_fixtures;
use pulse_reselect::observability::{self, LogFormat};
use pulse_reselect::util::error::exit_code;

const EXPECTED_ARGS: usize = 3;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            print_usage();
            ExitCode::from(u8::try_from(exit_code(&err)).unwrap_or(1))
        }
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() > EXPECTED_ARGS {
        return Err(ConfigError::TooManyArguments(args.len()).into());
    }
    if args.len() < EXPECTED_ARGS {
        return Err(ConfigError::TooFewArguments(args.len()).into());
    }
    let processed_dir = PathBuf::from(&args[0]);
    let min_user_id = parse_user_id("min_user_id", &args[1])?;
    let max_user_id = parse_user_id("max_user_id", &args[2])?;

    observability::init(LogFormat::Text).context("failed to initialize tracing")?;
    let started = Instant::now();
    let output = create_fixtures(&processed_dir, min_user_id, max_user_id)?;
    println!("Output fixtures in directory: {}", output.directory.display());
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis(),
        "fixture extraction finished"
    );
    Ok(())
}

fn parse_user_id(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.parse::<usize>()
        .map_err(|error| ConfigError::InvalidArgument {
            name,
            reason: format!("user id must be a non-negative integer but was `{raw}`: {error}"),
        })
}

fn print_usage() {
    eprintln!("Usage: create_fixtures <processed_log_directory> <min_user_id> <max_user_id>");
}
