//! Application configuration loaded from environment variables.

use crate::attest::AttestationKey;
use crate::errors::{Result, ServiceError};

/// Where decryption jobs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleMode {
    /// In-process decryptor for the transparent development engine.
    Local,
    /// External threshold-decryption gateway reached over HTTP.
    Gateway { url: String },
}

impl OracleMode {
    pub fn parse(mode: &str, url: Option<String>) -> Result<Self> {
        match mode {
            "local" => Ok(Self::Local),
            "gateway" => url
                .filter(|u| !u.is_empty())
                .map(|url| Self::Gateway { url })
                .ok_or_else(|| {
                    ServiceError::Config("ORACLE_URL is required when ORACLE_MODE=gateway".to_string())
                }),
            other => Err(ServiceError::Config(format!("Unknown ORACLE_MODE: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    pub oracle_mode: OracleMode,
    /// Shared key used to sign and verify decryption proofs
    pub oracle_key: AttestationKey,
    /// Bearer token the gateway must present on `/oracle/callback`
    pub callback_token: Option<String>,
    /// URL the gateway should deliver callbacks to
    pub callback_url: String,
    /// Seconds before a pending reveal request expires (0 = never)
    pub reveal_timeout_secs: u64,
    /// How often (in seconds) to sweep for expired requests
    pub sweep_interval_secs: u64,
    /// Upper bound on contribution page size
    pub max_page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_port: u16 = parse_or("API_PORT", "3001")?;
        let oracle_mode = OracleMode::parse(
            &env_var("ORACLE_MODE").unwrap_or_else(|_| "local".to_string()),
            env_var("ORACLE_URL").ok(),
        )?;

        let oracle_key = match env_var("ORACLE_KEY") {
            Ok(hex_key) => AttestationKey::from_hex(&hex_key)?,
            Err(_) if oracle_mode == OracleMode::Local => AttestationKey::random(),
            Err(_) => {
                return Err(ServiceError::Config(
                    "ORACLE_KEY is required when ORACLE_MODE=gateway".to_string(),
                ))
            }
        };

        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./qf_ledger.db".to_string()),
            api_port,
            oracle_mode,
            oracle_key,
            callback_token: env_var("CALLBACK_TOKEN").ok().filter(|t| !t.is_empty()),
            callback_url: env_var("CALLBACK_URL")
                .unwrap_or_else(|_| format!("http://localhost:{api_port}/oracle/callback")),
            reveal_timeout_secs: parse_or("REVEAL_TIMEOUT_SECS", "0")?,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", "30")?,
            max_page_size: parse_or("MAX_PAGE_SIZE", "100")?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ServiceError::Config(format!("Missing env var: {key}")))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    parse_value(key, &env_var(key).unwrap_or_else(|_| default.to_string()))
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::Config(format!("Invalid {key}")))
}
