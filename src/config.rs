use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a writer waits for the SQLite write lock before giving up.
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite:comments.db".to_string()),
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
                busy_timeout_ms: parse_var(&lookup, "DATABASE_BUSY_TIMEOUT_MS", 5000)?,
            },
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "SERVER_PORT", 3000)?,
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigurationError(format!("Invalid value {:?} for {}: {}", raw, key, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(|_| None).unwrap();
        assert_eq!(config.database.url, "sqlite:comments.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.server_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides() {
        let env = vars(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SERVER_PORT", "8080"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]);
        let config = Config::from_vars(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let env = vars(&[("SERVER_PORT", "eighty")]);
        let err = Config::from_vars(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }
}
