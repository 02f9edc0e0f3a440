//! Engine configuration
//!
//! Environment variables (a `.env` file is honored):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DI_PORT` | `3000` |
//! | `DI_REFERENCE_DATA_DIR` | `.dataimport/reference` |
//! | `DI_ROUTES` | none (no handlers) |
//! | `DI_DISPATCH_TIMEOUT_SECS` | `60` |
//!
//! The routes file is a JSON array of [`HandlerRoute`].

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::DEFAULT_REFERENCE_DATA_DIR;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for {name}: {value}")]
    InvalidVariable { name: &'static str, value: String },

    #[error("Cannot read routes file {path}: {source}")]
    RoutesIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid routes file {path}: {source}")]
    RoutesJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Which engine a configured handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Mapping,
    Matching,
}

/// One event handler declared in the routes file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerRoute {
    pub kind: HandlerKind,
    pub handles: String,
    pub produces: String,
    /// Event produced by a matching handler when nothing matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces_on_miss: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub port: u16,
    pub reference_data_dir: PathBuf,
    pub routes: Vec<HandlerRoute>,
    pub dispatch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            reference_data_dir: PathBuf::from(DEFAULT_REFERENCE_DATA_DIR),
            routes: Vec::new(),
            dispatch_timeout: Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, SettingsError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidVariable { name, value }),
        _ => Ok(default),
    }
}

impl EngineConfig {
    /// Load from the environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, SettingsError> {
        let _ = dotenvy::dotenv();

        let mut config = Self {
            port: parse_var("DI_PORT", DEFAULT_PORT)?,
            reference_data_dir: env::var("DI_REFERENCE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_REFERENCE_DATA_DIR)),
            routes: Vec::new(),
            dispatch_timeout: Duration::from_secs(parse_var(
                "DI_DISPATCH_TIMEOUT_SECS",
                DEFAULT_DISPATCH_TIMEOUT_SECS,
            )?),
        };

        if let Ok(path) = env::var("DI_ROUTES") {
            if !path.trim().is_empty() {
                config.routes = load_routes(path.trim())?;
            }
        }
        Ok(config)
    }

    pub fn with_routes(mut self, routes: Vec<HandlerRoute>) -> Self {
        self.routes = routes;
        self
    }
}

/// Read a JSON routes file.
pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<HandlerRoute>, SettingsError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| SettingsError::RoutesIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SettingsError::RoutesJson {
        path: path.to_path_buf(),
        source,
    })
}
