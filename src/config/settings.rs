//! Runtime settings loaded from environment variables.
//!
//! `main` calls [`Settings::from_env`] once after `.env` has been loaded and passes the
//! result into the components that need it. Nothing reads the environment after startup.

use crate::errors::{Error, Result};
use std::{collections::HashMap, path::PathBuf};

/// Default number of sequence columns on the dashboard grid.
pub const DEFAULT_DASHBOARD_COLUMNS: usize = 5;

const ENV_KEYS: [&str; 6] = [
    "DATABASE_URL",
    "BIND_ADDRESS",
    "UPLOAD_DIR",
    "CATALOG_PATH",
    "ADMIN_PASSPHRASE",
    "DASHBOARD_COLUMNS",
];

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database connection string
    pub database_url: String,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Directory photos are written to
    pub upload_dir: PathBuf,
    /// Catalog file imported on first start
    pub catalog_path: PathBuf,
    /// Passphrase guarding the full reset; `None` disables it
    pub admin_passphrase: Option<String>,
    /// Number of sequence columns on the dashboard grid
    pub dashboard_columns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: crate::config::database::DEFAULT_DATABASE_URL.to_string(),
            bind_address: "0.0.0.0:5000".to_string(),
            upload_dir: PathBuf::from("static/uploads"),
            catalog_path: PathBuf::from("catalog.toml"),
            admin_passphrase: None,
            dashboard_columns: DEFAULT_DASHBOARD_COLUMNS,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment, falling back to defaults.
    ///
    /// Reads `DATABASE_URL`, `BIND_ADDRESS`, `UPLOAD_DIR`, `CATALOG_PATH`,
    /// `ADMIN_PASSPHRASE` and `DASHBOARD_COLUMNS`.
    ///
    /// A variable that is set but not valid unicode is an error rather than "unset".
    pub fn from_env() -> Result<Self> {
        let mut vars = HashMap::new();
        for key in ENV_KEYS {
            match std::env::var(key) {
                Ok(value) => {
                    vars.insert(key, value);
                }
                Err(std::env::VarError::NotPresent) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let dashboard_columns = match lookup("DASHBOARD_COLUMNS") {
            Some(raw) => parse_columns(&raw)?,
            None => defaults.dashboard_columns,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: lookup("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            upload_dir: lookup("UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            catalog_path: lookup("CATALOG_PATH").map_or(defaults.catalog_path, PathBuf::from),
            admin_passphrase: lookup("ADMIN_PASSPHRASE").filter(|p| !p.trim().is_empty()),
            dashboard_columns,
        })
    }
}

fn parse_columns(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(Error::Config {
            message: format!("DASHBOARD_COLUMNS must be a positive integer, got {raw:?}"),
        }),
        Ok(n) => Ok(n),
    }
}
