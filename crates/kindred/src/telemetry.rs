use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::{AppEnvironment, TelemetryConfig};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{directive}' is not a valid EnvFilter directive")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("global subscriber already installed: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// `RUST_LOG` wins; otherwise the configured level is parsed as a directive.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::Filter {
        directive: config.log_level.clone(),
        source,
    })
}

/// Install the global compact formatter. Call once per process.
pub fn init(config: &TelemetryConfig, environment: AppEnvironment) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    let development = environment == AppEnvironment::Development;

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_ansi(development)
        .with_target(environment != AppEnvironment::Production)
        .try_init()
        .map_err(TelemetryError::Install)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_used_without_rust_log() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let valid = TelemetryConfig {
            log_level: "kindred=debug,tower_http=warn".to_string(),
        };
        assert!(env_filter(&valid).is_ok());

        let malformed = TelemetryConfig {
            log_level: "kindred=verbose".to_string(),
        };
        match env_filter(&malformed) {
            Err(TelemetryError::Filter { directive, .. }) => assert_eq!(directive, "kindred=verbose"),
            other => panic!("expected a filter error, got {other:?}"),
        }
    }
}
