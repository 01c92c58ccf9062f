use std::env;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};

use pulse_reselect::{
    config::{Config, USAGE},
    observability::{self, LogFormat},
    pipeline,
    util::error::{exit_code, is_usage_error},
};

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|panic_info| {
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");
        if let Some(location) = panic_info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            );
        } else {
            error!(message, "panic occurred without location information");
        }
    }));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = ?err, "pulse-reselect failed");
            eprintln!("error: {err:#}");
            if is_usage_error(&err) {
                eprintln!("{USAGE}");
            }
            let code = u8::try_from(exit_code(&err)).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let parsed = Config::from_args(env::args().skip(1));
    let log_format = parsed
        .as_ref()
        .map_or(LogFormat::default(), Config::log_format);
    observability::init(log_format).context("failed to initialize tracing")?;
    let config = parsed.context("invalid arguments")?;

    let summary = pipeline::run(&config)?;
    let summary_json =
        serde_json::to_string(&summary).context("failed to serialize run summary")?;
    info!(
        summary = %summary_json,
        elapsed_ms = summary.elapsed_ms,
        "experiment finished"
    );
    Ok(())
}
