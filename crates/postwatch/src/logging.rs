//! Tracing subscriber setup.

use std::env;
use std::io::{self, IsTerminal};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::LogFormat;

/// Logging options resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub no_color: bool,
}

/// Level from CLI flags, falling back to the configured level name.
pub fn effective_level(
    quiet: bool,
    verbose: u8,
    debug: bool,
    trace: bool,
    configured: &str,
) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else if trace {
        LevelFilter::TRACE
    } else if debug {
        LevelFilter::DEBUG
    } else {
        match verbose {
            0 => configured.parse().unwrap_or(LevelFilter::WARN),
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for rendered output. `RUST_LOG` overrides the computed level.
pub fn init_logging(options: &LogOptions) {
    let level = options.level.to_string().to_lowercase();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("postwatch={level},postwatch_protocol={level}"))
    });

    match options.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .ok();
        }
        LogFormat::Text => {
            let disable_color = options.no_color
                || env::var_os("NO_COLOR").is_some()
                || !io::stderr().is_terminal();

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(false),
                )
                .try_init()
                .ok();
        }
    }
}
