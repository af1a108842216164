// Strata backup system.
// Copyright 2024, 2025 Strata authors.

//! Logging setup for the command line tool.

use tracing::metadata::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

pub struct LoggingOptions {
    pub level: tracing::Level,
}

/// Install the global tracing subscriber.
///
/// Log lines go to stderr so that tabular command output on stdout
/// stays clean. `STRATA_LOG` overrides the level per module.
pub fn init(options: LoggingOptions) -> Result<(), String> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(options.level).into())
        .with_env_var("STRATA_LOG")
        .from_env_lossy();
    let subscriber = Registry::default().with(
        fmt::Layer::default()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter),
    );
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| "Failed to update global default logger".to_string())
}
