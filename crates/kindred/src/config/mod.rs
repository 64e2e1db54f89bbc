use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::activity::{ActivityKind, ScoringConfig};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;
const DEFAULT_TREE_MAX_GENERATIONS: u8 = 6;
const TREE_GENERATION_CEILING: u8 = 12;

/// Deployment stage, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl From<&str> for AppEnvironment {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnvironment::Production,
            "ci" | "test" => AppEnvironment::Test,
            _ => AppEnvironment::Development,
        }
    }
}

/// Everything the archive reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub archive: ArchiveConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let server = ServerConfig {
            host: var_or("APP_HOST", "127.0.0.1"),
            port: parse_var("APP_PORT", 3000u16, |_| true).ok_or(ConfigError::InvalidPort)?,
        };

        Ok(AppConfig {
            environment: AppEnvironment::from(var_or("APP_ENV", "development").as_str()),
            server,
            telemetry: TelemetryConfig {
                log_level: var_or("APP_LOG_LEVEL", "info"),
            },
            archive: ArchiveConfig::from_env()?,
            scoring: scoring_from_env()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `localhost` is accepted as an alias for the IPv4 loopback.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host.parse::<IpAddr>()?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Limits applied to uploaded media metadata and tree walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub max_upload_bytes: u64,
    pub tree_max_generations: u8,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            tree_max_generations: DEFAULT_TREE_MAX_GENERATIONS,
        }
    }
}

impl ArchiveConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_upload_bytes = parse_var(
            "KINDRED_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
            |bytes| *bytes > 0,
        )
        .ok_or(ConfigError::InvalidUploadLimit)?;
        let tree_max_generations = parse_var(
            "KINDRED_TREE_MAX_GENERATIONS",
            DEFAULT_TREE_MAX_GENERATIONS,
            |depth| (1..=TREE_GENERATION_CEILING).contains(depth),
        )
        .ok_or(ConfigError::InvalidTreeDepth)?;

        Ok(Self {
            max_upload_bytes,
            tree_max_generations,
        })
    }
}

fn scoring_from_env() -> Result<ScoringConfig, ConfigError> {
    let mut scoring = ScoringConfig::default();
    for kind in ActivityKind::ALL {
        let key = format!("KINDRED_POINTS_{}", kind.env_suffix());
        let points = parse_var(&key, scoring.points_for(kind), |_| true)
            .ok_or_else(|| ConfigError::InvalidPoints { key: key.clone() })?;
        scoring.set_points(kind, points);
    }
    Ok(scoring)
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// `Some(default)` when unset, `None` when set but unparsable or rejected.
fn parse_var<T: FromStr>(key: &str, default: T, accept: impl Fn(&T) -> bool) -> Option<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().ok().filter(|value| accept(value)),
        Err(_) => Some(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT is not a valid port number")]
    InvalidPort,
    #[error("APP_HOST is neither localhost nor an IP address")]
    InvalidHost(#[from] std::net::AddrParseError),
    #[error("KINDRED_MAX_UPLOAD_BYTES must be a positive integer")]
    InvalidUploadLimit,
    #[error("KINDRED_TREE_MAX_GENERATIONS must be between 1 and {}", TREE_GENERATION_CEILING)]
    InvalidTreeDepth,
    #[error("{key} must be a non-negative integer")]
    InvalidPoints { key: String },
}
