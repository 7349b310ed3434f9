use std::env;

use concierge_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs go to stderr so command output and
/// the chat transcript on stdout stay clean.
pub fn init(config: &LoggingConfig) {
    let directive = filter_directive(&config.level, env::var("RUST_LOG").ok().as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed (tests, repeated runs); keep it.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// `RUST_LOG` takes precedence over the configured level.
fn filter_directive(configured_level: &str, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => configured_level.trim().to_lowercase(),
    }
}
