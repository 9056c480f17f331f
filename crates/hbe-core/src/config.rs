//! Runtime configuration.
//!
//! Settings come from environment variables (optionally seeded from a `.env`
//! file by the binaries) with defaults matching the container contract:
//!
//! | variable         | default      |
//! |------------------|--------------|
//! | `API_HOST`       | `0.0.0.0`    |
//! | `API_PORT`       | `8001`       |
//! | `DATABASE_PATH`  | `booking.db` |
//! | `MIGRATIONS_DIR` | embedded     |
//! | `CORS_ORIGINS`   | any origin   |
//! | `LOG_FORMAT`     | `pretty`     |
//! | `ENVIRONMENT`    | `development`|

use crate::error::{Error, Result};
use crate::migrations::Migrator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8001;
pub const DEFAULT_DATABASE_PATH: &str = "booking.db";

/// Log output format for the binaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!(
                "LOG_FORMAT must be 'pretty' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Settings shared by the server and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_host: String,
    pub api_port: u16,
    pub database_path: PathBuf,
    /// Directory of migration files; the embedded catalogue is used when unset
    pub migrations_dir: Option<PathBuf>,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
    pub environment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            migrations_dir: None,
            cors_origins: Vec::new(),
            log_format: LogFormat::default(),
            environment: "development".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_port = match get("API_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                Error::config(format!("API_PORT must be a port number, got '{raw}'"))
            })?,
            None => defaults.api_port,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            api_host: get("API_HOST")
                .map(|h| h.trim().to_string())
                .unwrap_or(defaults.api_host),
            api_port,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            migrations_dir: get("MIGRATIONS_DIR").map(PathBuf::from),
            cors_origins: get("CORS_ORIGINS")
                .map(|raw| parse_cors_origins(&raw))
                .unwrap_or_default(),
            log_format,
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    /// `host:port` the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Migration source selected by these settings
    pub fn migrator(&self) -> Result<Migrator> {
        match &self.migrations_dir {
            Some(dir) => Migrator::from_dir(dir),
            None => Ok(Migrator::embedded()),
        }
    }
}

/// Split a comma-separated origin list, dropping blanks and duplicates.
///
/// A `*` entry means any origin and yields an empty list.
pub fn parse_cors_origins(raw: &str) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    for origin in raw.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        if origin == "*" {
            return Vec::new();
        }
        if !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}
