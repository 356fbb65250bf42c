//! dumpling - crash dump upload/download client
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use dumpling_lib::cli::Cli;
use dumpling_lib::logging::{init_logging, Verbosity};
use dumpling_lib::{commands, HttpArtifactService, TransferSummary};
use log::{debug, error, info};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> ExitCode {
    let started = Instant::now();
    let cli = Cli::parse();

    if let Err(e) = init_logging(
        Verbosity::from_flags(cli.verbose, cli.squelch),
        cli.logpath.as_deref(),
    ) {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let code = match run(&cli) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            for failure in &summary.failures {
                error!("{} {}: {}", failure.kind, failure.target, failure.error);
            }
            error!(
                "{} of {} transfers failed",
                summary.failures.len(),
                summary.completed() + summary.failures.len()
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    };

    info!("total elapsed time {}", format_elapsed(started.elapsed()));
    code
}

fn run(cli: &Cli) -> Result<TransferSummary> {
    let config = cli.client_config().context("Invalid configuration")?;
    debug!(
        "service: {} max threads: {} missing paths: {}",
        config.service_url, config.max_threads, config.missing_paths
    );

    let service = HttpArtifactService::new(&config.service_url)
        .context("Failed to create service client")?;
    commands::execute(&cli.command, Arc::new(service), &config)
}

/// `h:mm:ss.ffffff`
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}
