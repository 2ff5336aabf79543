//! Diagnostic logging for the `vrfcheck` binary.
//!
//! Reports (`--output text|json`) are the only thing written to stdout, so a
//! JSON report can be piped straight into `jq`. Every tracing event, including
//! poll attempts and state transitions, goes to stderr.

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vrfcheck_core::config::GeneralConfig;

/// `general.log_format` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// One JSON object per event, for CI log collectors
    Json,
    /// Multi-line human-readable events
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
        }
    }
}

/// Install the stderr subscriber for this process.
///
/// A set `RUST_LOG` replaces `general.log_level` entirely.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::parse(&config.log_format)?;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };

    let events = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(events.json()).try_init(),
        LogFormat::Pretty => registry.with(events.pretty()).try_init(),
    }
    .with_context(|| format!("failed to install {} log subscriber", config.log_format))
}
