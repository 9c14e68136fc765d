//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum members per room
    pub room_capacity: usize,
    /// Pre-match countdown length in milliseconds
    pub countdown_ms: u64,

    /// Allowed client origin for CORS ("*" allows any)
    pub client_origin: String,
    /// Optional path for the JSON-lines score log
    pub score_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            room_capacity: parse_env("ROOM_CAPACITY", 10)?,
            countdown_ms: parse_env("COUNTDOWN_MS", 15_000)?,

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            score_file: env::var("SCORE_FILE").ok().map(PathBuf::from),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // Only assert on keys this test does not share with the environment
        let capacity: usize = parse_env("ARENA_TEST_UNSET_CAPACITY", 10).unwrap();
        assert_eq!(capacity, 10);
        let countdown: u64 = parse_env("ARENA_TEST_UNSET_COUNTDOWN", 15_000).unwrap();
        assert_eq!(countdown, 15_000);
    }

    #[test]
    fn invalid_number_is_an_error() {
        env::set_var("ARENA_TEST_BAD_NUMBER", "not-a-number");
        let result: Result<u64, _> = parse_env("ARENA_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
        env::remove_var("ARENA_TEST_BAD_NUMBER");
    }
}
