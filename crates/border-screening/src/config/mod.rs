//! Environment-driven settings for the intake service.

use std::env;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_RESPONSES_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    #[default]
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    /// Unrecognised names fall back to development.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub screening: ScreeningConfig,
}

impl AppConfig {
    /// Reads `APP_*` variables, after loading `.env` when one is present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = env::var("APP_ENV")
            .map(|name| AppEnvironment::from_name(&name))
            .unwrap_or_default();

        let server = ServerConfig {
            host: env::var("APP_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: read_var("APP_PORT", DEFAULT_PORT).ok_or(ConfigError::InvalidPort)?,
        };
        let telemetry = TelemetryConfig {
            log_level: env::var("APP_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        };
        let screening = ScreeningConfig {
            upload_max_bytes: read_positive("APP_UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            responses_page_size: read_positive(
                "APP_RESPONSES_PAGE_SIZE",
                DEFAULT_RESPONSES_PAGE_SIZE,
            )
            .ok_or(ConfigError::InvalidPageSize)?,
        };

        Ok(Self {
            environment,
            server,
            telemetry,
            screening,
        })
    }
}

/// `None` when the variable is set but does not parse.
fn read_var<T: FromStr>(key: &str, default: T) -> Option<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().ok(),
        Err(_) => Some(default),
    }
}

fn read_positive(key: &str, default: usize) -> Option<usize> {
    read_var(key, default).filter(|value| *value > 0)
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.host.parse()?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Limits applied by the questionnaire intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningConfig {
    /// Largest upload accepted into the staging area, in bytes.
    pub upload_max_bytes: usize,
    pub responses_page_size: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            responses_page_size: DEFAULT_RESPONSES_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must be localhost or an IPv4/IPv6 address")]
    InvalidHost(#[from] AddrParseError),
    #[error("APP_UPLOAD_MAX_BYTES must be a positive integer")]
    InvalidUploadLimit,
    #[error("APP_RESPONSES_PAGE_SIZE must be a positive integer")]
    InvalidPageSize,
}
