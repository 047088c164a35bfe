// ABOUTME: Environment-driven configuration for the skiff binary
// ABOUTME: Validates the listen port and resolves storage locations

use std::env;
use std::num::ParseIntError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cors_origin: String,
    pub storage_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_str = env::var("SKIFF_PORT").unwrap_or_else(|_| "4400".to_string());
        let port = port_str.parse::<u16>()?;
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let cors_origin =
            env::var("SKIFF_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let storage_dir = env::var("SKIFF_STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string());

        Ok(Self {
            port,
            cors_origin,
            storage_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Env-var free construction path
        let config = Config {
            port: 4400,
            cors_origin: "http://localhost:5173".to_string(),
            storage_dir: "./storage".to_string(),
        };
        assert_eq!(config.port, 4400);
    }

    #[test]
    fn test_port_zero_rejected() {
        std::env::set_var("SKIFF_PORT", "0");
        let result = Config::from_env();
        std::env::remove_var("SKIFF_PORT");
        assert!(matches!(result, Err(ConfigError::PortOutOfRange(0))));
    }
}
