use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub policy: PolicyConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let data_path = env::var("APP_DATA_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { data_path },
            policy: PolicyConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the store snapshot lives between runs. `None` keeps state in memory only.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub data_path: Option<PathBuf>,
}

/// Academic and finance rules that vary between institutions.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Failed units a student may carry and still be promoted.
    pub max_failed_units: u32,
    /// Shortfall tolerated when deciding fee clearance.
    pub fee_clearance_tolerance: Decimal,
    pub login_attempt_retention_days: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_failed_units: 2,
            fee_clearance_tolerance: dec!(100.00),
            login_attempt_retention_days: 30,
        }
    }
}

impl PolicyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_failed_units: policy_var("POLICY_MAX_FAILED_UNITS", defaults.max_failed_units)?,
            fee_clearance_tolerance: policy_var(
                "POLICY_FEE_CLEARANCE_TOLERANCE",
                defaults.fee_clearance_tolerance,
            )?,
            login_attempt_retention_days: policy_var(
                "POLICY_LOGIN_ATTEMPT_RETENTION_DAYS",
                defaults.login_attempt_retention_days,
            )?,
        })
        .and_then(|policy: Self| {
            if policy.fee_clearance_tolerance.is_sign_negative() {
                return Err(ConfigError::InvalidPolicy {
                    key: "POLICY_FEE_CLEARANCE_TOLERANCE",
                });
            }
            Ok(policy)
        })
    }
}

fn policy_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPolicy { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPolicy { key: &'static str },
    MissingDataPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPolicy { key } => {
                write!(f, "{key} must be a non-negative number")
            }
            ConfigError::MissingDataPath => {
                write!(f, "APP_DATA_PATH or --data must name the snapshot file")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidPolicy { .. }
            | ConfigError::MissingDataPath => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_DATA_PATH",
            "POLICY_MAX_FAILED_UNITS",
            "POLICY_FEE_CLEARANCE_TOLERANCE",
            "POLICY_LOGIN_ATTEMPT_RETENTION_DAYS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.storage.data_path.is_none());
        assert_eq!(config.policy, PolicyConfig::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn policy_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POLICY_MAX_FAILED_UNITS", "3");
        env::set_var("POLICY_FEE_CLEARANCE_TOLERANCE", "0");
        env::set_var("APP_DATA_PATH", "/tmp/campus.json");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.policy.max_failed_units, 3);
        assert_eq!(config.policy.fee_clearance_tolerance, Decimal::ZERO);
        assert_eq!(
            config.storage.data_path,
            Some(PathBuf::from("/tmp/campus.json"))
        );
        reset_env();
    }

    #[test]
    fn malformed_policy_names_the_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POLICY_FEE_CLEARANCE_TOLERANCE", "-5");
        let err = AppConfig::load().expect_err("negative tolerance rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidPolicy {
                key: "POLICY_FEE_CLEARANCE_TOLERANCE"
            }
        ));

        env::set_var("POLICY_FEE_CLEARANCE_TOLERANCE", "lots");
        assert!(AppConfig::load().is_err());
        reset_env();
    }
}
