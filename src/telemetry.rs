//! Diagnostic logging setup.

use crate::config::LogLevel;
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: LogLevel,
    pub ansi_colors: bool,
    /// Include module targets, useful with `--verbose`.
    pub include_target: bool,
}

impl TelemetryConfig {
    pub fn new(level: LogLevel, verbose: bool, no_color: bool) -> Self {
        Self {
            level: if verbose { LogLevel::Debug } else { level },
            ansi_colors: !no_color,
            include_target: verbose,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_filter()))
    }
}

/// Install the global subscriber, writing to stderr so stdout stays
/// parseable for `--json` output. Call once at startup.
pub fn init(config: &TelemetryConfig) -> io::Result<()> {
    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        let config = TelemetryConfig::new(LogLevel::Error, true, false);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.include_target);
    }

    #[test]
    fn test_no_color_disables_ansi() {
        let config = TelemetryConfig::new(LogLevel::Info, false, true);
        assert_eq!(config.level, LogLevel::Info);
        assert!(!config.ansi_colors);
    }
}
