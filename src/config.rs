use std::env;

use thiserror::Error;
use tracing::info;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS: &str = "PLACEMENT_DB_MAX_CONNECTIONS";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set to a production Postgres instance")]
    MissingDatabaseUrl,
    #[error("PLACEMENT_DB_MAX_CONNECTIONS must be a positive integer, got '{0}'")]
    InvalidMaxConnections(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(DATABASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = match lookup(MAX_CONNECTIONS) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidMaxConnections(raw))?,
            None => {
                info!("{MAX_CONNECTIONS} not set, using default: {DEFAULT_MAX_CONNECTIONS}");
                DEFAULT_MAX_CONNECTIONS
            }
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| values.get(key).cloned()
    }

    #[test]
    fn requires_database_url() {
        assert_eq!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::MissingDatabaseUrl)
        );
        assert_eq!(
            Config::from_lookup(lookup(&[(DATABASE_URL, " ")])),
            Err(ConfigError::MissingDatabaseUrl)
        );
    }

    #[test]
    fn max_connections_defaults_to_five() {
        let config =
            Config::from_lookup(lookup(&[(DATABASE_URL, "postgres://localhost/pulse")])).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.database_url, "postgres://localhost/pulse");
    }

    #[test]
    fn rejects_zero_or_garbage_max_connections() {
        for raw in ["0", "many"] {
            let result = Config::from_lookup(lookup(&[
                (DATABASE_URL, "postgres://localhost/pulse"),
                (MAX_CONNECTIONS, raw),
            ]));
            assert_eq!(result, Err(ConfigError::InvalidMaxConnections(raw.to_string())));
        }

        let config = Config::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/pulse"),
            (MAX_CONNECTIONS, "12"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 12);
    }
}
