use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map the `-v` count to a log level, warnings are always shown
#[must_use]
pub const fn level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Build the filter from `RUST_LOG`, falling back to the verbosity level
/// with the drivers kept quiet
///
/// # Errors
///
/// Returns an error if the resulting directives are invalid
pub fn filter(verbosity: u8) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = level(verbosity);
    let mut directives = vec![level.to_string().to_lowercase()];
    if level != Level::TRACE {
        for noisy in ["sqlx", "rustls", "tokio_rustls"] {
            directives.push(format!("{noisy}=warn"));
        }
    }

    let filter = directives.join(",");
    EnvFilter::try_new(&filter).map_err(|e| anyhow!("invalid tracing filter '{filter}': {e}"))
}

/// Install the global subscriber, logs go to stderr so stdout only carries
/// the command output
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set
pub fn init(verbosity: u8) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity)?)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
