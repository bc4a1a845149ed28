use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::rates::RateBand;

const DEFAULT_CACHE_TTL_MINUTES: u64 = 4 * 60;
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 8;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rates: RatesConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rates: RatesConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Rate acquisition dials: cache lifetime, fallback step bounds, and backend endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RatesConfig {
    pub cache_ttl: Duration,
    pub step_timeout: Duration,
    pub sanity_band: RateBand,
    pub endpoints: RateEndpoints,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_MINUTES * 60),
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            sanity_band: RateBand::default(),
            endpoints: RateEndpoints::default(),
        }
    }
}

impl RatesConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = RateBand::default();
        let ttl_minutes = parse_env("RATES_CACHE_TTL_MINUTES", DEFAULT_CACHE_TTL_MINUTES)?;
        let step_secs = parse_env("RATES_STEP_TIMEOUT_SECS", DEFAULT_STEP_TIMEOUT_SECS)?;
        let min = parse_env("RATES_SANITY_MIN", defaults.min)?;
        let max = parse_env("RATES_SANITY_MAX", defaults.max)?;

        let sanity_band = RateBand::new(min, max).ok_or(ConfigError::InvalidSanityBand { min, max })?;

        Ok(Self {
            cache_ttl: Duration::from_secs(ttl_minutes * 60),
            step_timeout: Duration::from_secs(step_secs),
            sanity_band,
            endpoints: RateEndpoints {
                snapshot_url: optional_env("RATES_SNAPSHOT_URL"),
                scrape_url: optional_env("RATES_SCRAPE_URL"),
                inference_url: optional_env("RATES_INFERENCE_URL"),
            },
        })
    }
}

/// Backend endpoints for each fallback step; an absent URL removes that step from the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateEndpoints {
    pub snapshot_url: Option<String>,
    pub scrape_url: Option<String>,
    pub inference_url: Option<String>,
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_env(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidNumber { key }),
        None => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidSanityBand { min: f64, max: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a valid number"),
            ConfigError::InvalidSanityBand { min, max } => write!(
                f,
                "rate sanity band must satisfy 0 < min < max (found {min}..{max})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidSanityBand { .. } => None,
        }
    }
}
