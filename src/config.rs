//! Server configuration module
//! Loads the hub's tunables from the environment

use crate::constants::{
    DEFAULT_BLOCK_SECS, DEFAULT_BURST_LIMIT, DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_HOST,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PING_INTERVAL_SECS, DEFAULT_PORT,
    DEFAULT_RATE_PER_SECOND, DEFAULT_SWEEP_INTERVAL_SECS, MAX_DURATION_SECS,
};
use crate::core::ip_extractor::IpExtractionConfig;
use crate::core::message::UserSummary;
use crate::core::rate_limiter::RateLimitConfig;
use crate::error::{ParlorError, Result};
use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Keep-alive policy for established connections
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// How often the server pings an idle peer
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead
    pub idle_timeout: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Token bucket refill rate per client
    pub rate_per_second: f64,
    /// Token bucket capacity per client
    pub burst_limit: f64,
    pub block_duration: Duration,
    pub client_timeout: Duration,
    pub sweep_interval: Duration,
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    /// Largest accepted inbound text frame
    pub max_frame_bytes: usize,
    /// Honour X-Real-IP / X-Forwarded-For
    pub trust_proxy_headers: bool,
    pub trusted_proxies: Vec<IpAddr>,
    /// Secret used to verify session tokens
    pub jwt_secret: String,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Users seeded into the in-memory directory
    pub seed_users: Vec<UserSummary>,
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst_limit: DEFAULT_BURST_LIMIT,
            block_duration: Duration::from_secs(DEFAULT_BLOCK_SECS),
            client_timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            trust_proxy_headers: false,
            trusted_proxies: Vec::new(),
            jwt_secret: "unit-tests-only-7f3a9c2e1b8d4f6a0e5c".to_string(),
            tls_cert_path: None,
            tls_key_path: None,
            seed_users: Vec::new(),
        }
    }

    /// Validate that the token secret meets basic requirements
    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(ParlorError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        let insecure_patterns = ["your-secret-key", "change-this", "changeme", "password", "12345"];
        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(ParlorError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Generate one with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        Ok(())
    }

    /// Parse `"1:alice,2:bob"` into directory entries
    pub fn parse_seed_users(raw: &str) -> Result<Vec<UserSummary>> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (id, name) = entry
                    .split_once(':')
                    .ok_or_else(|| ParlorError::ConfigError(format!("seed user '{}' is not id:name", entry)))?;
                let id: i64 = id
                    .trim()
                    .parse()
                    .map_err(|_| ParlorError::ConfigError(format!("seed user id '{}' is not a number", id)))?;
                if id <= 0 {
                    return Err(ParlorError::ConfigError(format!("seed user id {} must be positive", id)));
                }
                Ok(UserSummary::new(id, name.trim()))
            })
            .collect()
    }

    fn parse_proxies(raw: &str) -> Result<Vec<IpAddr>> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse()
                    .map_err(|_| ParlorError::ConfigError(format!("trusted proxy '{}' is not an IP", entry)))
            })
            .collect()
    }

    fn env_or<T: FromStr>(name: &str, default: T) -> T {
        env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    /// NaN and infinity pass a plain `<=` comparison, so finiteness is checked first
    fn validate_bucket(rate_per_second: f64, burst_limit: f64) -> Result<()> {
        if !rate_per_second.is_finite() || !burst_limit.is_finite() {
            return Err(ParlorError::ConfigError(
                "PARLOR_RATE_PER_SEC and PARLOR_BURST must be finite numbers".to_string(),
            ));
        }
        if rate_per_second <= 0.0 || burst_limit < 1.0 {
            return Err(ParlorError::ConfigError(
                "PARLOR_RATE_PER_SEC must be positive and PARLOR_BURST at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn bounded_secs(name: &str, secs: u64) -> Result<u64> {
        if secs > MAX_DURATION_SECS {
            return Err(ParlorError::ConfigError(format!(
                "{} must not exceed {} seconds",
                name, MAX_DURATION_SECS
            )));
        }
        Ok(secs)
    }

    fn env_secs(name: &str, default: u64) -> Result<u64> {
        Self::bounded_secs(name, Self::env_or(name, default))
    }

    fn env_flag(name: &str) -> bool {
        env::var(name)
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false)
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("PARLOR_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = Self::env_or("PARLOR_PORT", DEFAULT_PORT);

        let rate_per_second = Self::env_or("PARLOR_RATE_PER_SEC", DEFAULT_RATE_PER_SECOND);
        let burst_limit = Self::env_or("PARLOR_BURST", DEFAULT_BURST_LIMIT);
        Self::validate_bucket(rate_per_second, burst_limit)?;

        let block_secs = Self::env_secs("PARLOR_BLOCK_SECS", DEFAULT_BLOCK_SECS)?;
        let client_timeout_secs = Self::env_secs("PARLOR_CLIENT_TIMEOUT_SECS", DEFAULT_CLIENT_TIMEOUT_SECS)?;
        let sweep_secs = Self::env_secs("PARLOR_SWEEP_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let ping_secs = Self::env_secs("PARLOR_PING_SECS", DEFAULT_PING_INTERVAL_SECS)?;
        let idle_secs = Self::env_secs("PARLOR_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS)?;
        if ping_secs == 0 || idle_secs <= ping_secs {
            return Err(ParlorError::ConfigError(
                "PARLOR_IDLE_TIMEOUT_SECS must exceed a non-zero PARLOR_PING_SECS".to_string(),
            ));
        }
        let max_frame_bytes = Self::env_or("PARLOR_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES);

        let trust_proxy_headers = Self::env_flag("PARLOR_TRUST_PROXY");
        let trusted_proxies = match env::var("PARLOR_TRUSTED_PROXIES") {
            Ok(raw) => Self::parse_proxies(&raw)?,
            Err(_) => Vec::new(),
        };

        let jwt_secret = env::var("PARLOR_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                ParlorError::ConfigError(
                    "PARLOR_JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;
        Self::validate_secret(&jwt_secret)?;

        let tls_cert_path = env::var("PARLOR_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("PARLOR_TLS_KEY_PATH").ok();
        if tls_cert_path.is_some() != tls_key_path.is_some() {
            return Err(ParlorError::ConfigError(
                "PARLOR_TLS_CERT_PATH and PARLOR_TLS_KEY_PATH must be set together".to_string(),
            ));
        }
        for path in tls_cert_path.iter().chain(tls_key_path.iter()) {
            if !std::path::Path::new(path).exists() {
                return Err(ParlorError::ConfigError(format!("TLS file does not exist: {}", path)));
            }
        }

        let seed_users = match env::var("PARLOR_USERS") {
            Ok(raw) => Self::parse_seed_users(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            host,
            port,
            rate_per_second,
            burst_limit,
            block_duration: Duration::from_secs(block_secs),
            client_timeout: Duration::from_secs(client_timeout_secs),
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            ping_interval: Duration::from_secs(ping_secs),
            idle_timeout: Duration::from_secs(idle_secs),
            max_frame_bytes,
            trust_proxy_headers,
            trusted_proxies,
            jwt_secret,
            tls_cert_path,
            tls_key_path,
            seed_users,
        })
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate_per_second: self.rate_per_second,
            burst_limit: self.burst_limit,
            block_duration: self.block_duration,
            client_timeout: self.client_timeout,
            sweep_interval: self.sweep_interval,
        }
    }

    pub fn ip_extraction(&self) -> IpExtractionConfig {
        IpExtractionConfig {
            trust_proxy_headers: self.trust_proxy_headers,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }

    pub fn keep_alive(&self) -> KeepAliveConfig {
        KeepAliveConfig {
            ping_interval: self.ping_interval,
            idle_timeout: self.idle_timeout,
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}
