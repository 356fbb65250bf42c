//! Log output for the command line client.
//!
//! The library logs through the `log` facade; this installs a `tracing-subscriber`
//! backend whose log bridge picks those records up. Output goes to stderr and,
//! when a log path is given, is appended to that file as plain text.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Which messages reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Critical messages only
    Squelch,
    /// Critical and standard messages
    #[default]
    Normal,
    /// Everything, including diagnostics
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, squelch: bool) -> Self {
        if squelch {
            Verbosity::Squelch
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn level(self) -> &'static str {
        match self {
            Verbosity::Squelch => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(verbosity: Verbosity, log_file: Option<&Path>) -> std::io::Result<()> {
    let level = verbosity.level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "dumpling={},dumpling_lib={},work_pool={}",
            level, level, level
        ))
    });
    let detailed = verbosity == Verbosity::Verbose;

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(detailed)
                    .with_thread_names(detailed),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(detailed)
                .with_thread_names(detailed),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| std::io::Error::other(e.to_string()))
}
