// ABOUTME: Structured logging setup built on tracing-subscriber
// ABOUTME: Format (json/pretty/compact) and level are environment-selected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TaskChat Contributors

//! Logging initialization with structured output.
//!
//! Level comes from `RUST_LOG` (default `info`), format from `LOG_FORMAT`
//! (`json`, `compact`, or the default pretty output).

use anyhow::Result;
use std::env;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log output format options
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// JSON format for production log aggregation
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    /// Read the format from the `LOG_FORMAT` environment variable
    #[must_use]
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            Ok("compact") => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber from environment variables.
///
/// # Errors
///
/// Returns an error if a subscriber is already installed.
pub fn init_from_env() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(LogFormat::from_env()))
        .try_init()?;

    Ok(())
}

/// Build the formatting layer for one output format.
///
/// The pretty arm uses the default fmt layer; the ANSI-decorated formatter
/// needs a feature this crate does not enable.
fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Pretty => fmt::layer().boxed(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;

    #[test]
    fn test_fmt_layer_builds_for_every_format() {
        for format in [LogFormat::Json, LogFormat::Compact, LogFormat::Pretty] {
            let _layer = fmt_layer::<Registry>(format);
        }
    }

    #[test]
    fn test_log_format_from_env_defaults_to_pretty() {
        // No LOG_FORMAT set in the test environment
        assert!(matches!(LogFormat::from_env(), LogFormat::Pretty));
    }
}
