//! Structured logging for equistore operations
//!
//! The merge operations on [`TensorMap`](crate::TensorMap) are instrumented
//! with `tracing` spans and events. This module installs a
//! `tracing-subscriber` configured from the environment, for applications
//! (and bindings) that do not set up their own subscriber.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive (e.g. `RUST_LOG=equistore_core=debug`)
//! - `EQUISTORE_LOG_FORMAT`: output format, one of `pretty`, `compact` or
//!   `json` (default: `pretty`)
//!
//! # Example
//!
//! ```no_run
//! use equistore_core::tracing_support::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::default())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Environment variable used to select the output format
pub const LOG_FORMAT_ENV: &str = "EQUISTORE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "equistore_core=info,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line, human-readable format
    Pretty,
    /// Single line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl TracingFormat {
    /// Parse a format name, falling back to `Pretty` for unknown names
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "compact" => TracingFormat::Compact,
            _ => TracingFormat::Pretty,
        }
    }
}

/// Configuration for [`init_tracing`]
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format
    pub format: TracingFormat,
    /// Filter directive, using the `EnvFilter` syntax
    pub filter: String,
    /// Use ANSI colors in the output (ignored for JSON)
    pub with_ansi: bool,
    /// Show the module path of events
    pub with_target: bool,
    /// Show source file and line of events
    pub with_file: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .map(|name| TracingFormat::parse(&name))
            .unwrap_or(TracingFormat::Pretty);

        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        TracingConfig {
            format,
            filter,
            with_ansi: true,
            with_target: true,
            with_file: false,
        }
    }
}

/// Install a global tracing subscriber with the given configuration.
///
/// This fails if the filter directive is invalid, or if a global subscriber
/// was already installed.
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        TracingFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_filter(filter)
            .boxed(),
        TracingFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(config.with_ansi)
            .with_target(config.with_target)
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_filter(filter)
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .json()
            .with_target(config.with_target)
            .with_file(config.with_file)
            .with_line_number(config.with_file)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(TracingFormat::parse("json"), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("JSON "), TracingFormat::Json);
        assert_eq!(TracingFormat::parse("compact"), TracingFormat::Compact);
        assert_eq!(TracingFormat::parse("pretty"), TracingFormat::Pretty);
        assert_eq!(TracingFormat::parse("unknown"), TracingFormat::Pretty);
    }

    #[test]
    fn test_invalid_filter() {
        let config = TracingConfig {
            filter: "equistore_core=not-a-level".into(),
            ..TracingConfig::default()
        };

        assert!(init_tracing(config).is_err());
    }
}
