use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::models::ValidationMode;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Which gateway backs the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    MySql,
    Memory,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub storage: StorageKind,
    pub validation_mode: ValidationMode,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    /// Unset keys fall back to development defaults; production must override the DB_* ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            host: string_or("DB_HOST", "localhost"),
            port: parse_or(&lookup, "DB_PORT", 3306)?,
            user: string_or("DB_USER", "root"),
            password: string_or("DB_PASSWORD", ""),
            name: string_or("DB_NAME", "productos_db"),
            pool_size: parse_or(&lookup, "DB_POOL_SIZE", 10)?,
            acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 30)?),
        };

        if database.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DB_POOL_SIZE",
                value: "0".to_string(),
            });
        }

        let storage = match lookup("STORAGE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("mysql") => StorageKind::MySql,
            Some("memory") => StorageKind::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "STORAGE",
                    value: other.to_string(),
                })
            }
        };

        let validation_mode = match lookup("VALIDATION_MODE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("compat") => ValidationMode::Compat,
            Some("strict") => ValidationMode::Strict,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "VALIDATION_MODE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            server_host: string_or("HOST", "0.0.0.0"),
            server_port: parse_or(&lookup, "PORT", 3000)?,
            database,
            storage,
            validation_mode,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
