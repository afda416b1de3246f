//! Movies API configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the SMTP password are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default bcrypt cost factor for password hashing.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost factor.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost factor.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Default deadline for a single persistent-store call.
pub const DEFAULT_STORE_DEADLINE_SECONDS: u64 = 3;

/// Upper bound for the store deadline.
pub const MAX_STORE_DEADLINE_SECONDS: u64 = 30;

/// Default time allowed for background tasks to drain on shutdown.
pub const DEFAULT_SHUTDOWN_DEADLINE_SECONDS: u64 = 10;

/// Upper bound for the shutdown deadline.
pub const MAX_SHUTDOWN_DEADLINE_SECONDS: u64 = 300;

/// Default size of the database connection pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;

/// Upper bound for the database connection pool.
pub const MAX_DB_MAX_CONNECTIONS: u32 = 200;

/// Default interval between expired-token purges.
pub const DEFAULT_TOKEN_CLEANUP_INTERVAL_SECONDS: u64 = 3600;

/// Lower bound for the expired-token purge interval.
pub const MIN_TOKEN_CLEANUP_INTERVAL_SECONDS: u64 = 60;

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default sustained request rate per client IP.
pub const DEFAULT_LIMITER_RPS: u32 = 2;

/// Default burst allowance per client IP.
pub const DEFAULT_LIMITER_BURST: u32 = 4;

/// Upper bound for the per-client rate and burst.
pub const MAX_LIMITER_VALUE: u32 = 10_000;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Outbound SMTP relay for activation mail.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `From:` address, e.g. `Movies <no-reply@movies.example>`.
    pub sender: String,
    /// Upgrade the connection with STARTTLS (default: true).
    pub starttls: bool,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("sender", &self.sender)
            .field("starttls", &self.starttls)
            .finish()
    }
}

/// Per-client-IP request rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Sustained requests per second.
    pub rps: u32,
    /// Requests allowed in a burst above the sustained rate.
    pub burst: u32,
}

/// Movies API configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:4000").
    pub bind_address: String,

    /// Deployment environment (default: development).
    pub environment: Environment,

    /// bcrypt cost factor for password hashing.
    pub bcrypt_cost: u32,

    /// Deadline for a single store call, in seconds.
    pub store_deadline_seconds: u64,

    /// Deadline for draining background tasks on shutdown, in seconds.
    pub shutdown_deadline_seconds: u64,

    /// Maximum number of pooled database connections.
    pub db_max_connections: u32,

    /// Interval between expired-token purges, in seconds.
    pub token_cleanup_interval_seconds: u64,

    /// SMTP relay. Without one, activation mail is only logged.
    pub smtp: Option<SmtpConfig>,

    /// Per-client rate limiting.
    pub limiter: LimiterConfig,

    /// Origins allowed to make cross-origin requests. Empty allows any.
    pub cors_trusted_origins: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("environment", &self.environment)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("store_deadline_seconds", &self.store_deadline_seconds)
            .field("shutdown_deadline_seconds", &self.shutdown_deadline_seconds)
            .field("db_max_connections", &self.db_max_connections)
            .field(
                "token_cleanup_interval_seconds",
                &self.token_cleanup_interval_seconds,
            )
            .field("smtp", &self.smtp)
            .field("limiter", &self.limiter)
            .field("cors_trusted_origins", &self.cors_trusted_origins)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment: '{0}' (must be development, staging or production)")]
    InvalidEnvironment(String),

    #[error("Invalid bcrypt cost: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:4000".to_string());

        let environment = match vars.get("MOVIES_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let cost: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {} and {}, got {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST, cost
                )));
            }
            cost
        } else {
            DEFAULT_BCRYPT_COST
        };

        let store_deadline_seconds = parse_bounded(
            vars,
            "STORE_DEADLINE_SECONDS",
            DEFAULT_STORE_DEADLINE_SECONDS,
            1,
            MAX_STORE_DEADLINE_SECONDS,
        )?;

        let shutdown_deadline_seconds = parse_bounded(
            vars,
            "SHUTDOWN_DEADLINE_SECONDS",
            DEFAULT_SHUTDOWN_DEADLINE_SECONDS,
            1,
            MAX_SHUTDOWN_DEADLINE_SECONDS,
        )?;

        let db_max_connections = parse_bounded(
            vars,
            "DB_MAX_CONNECTIONS",
            u64::from(DEFAULT_DB_MAX_CONNECTIONS),
            1,
            u64::from(MAX_DB_MAX_CONNECTIONS),
        )?;

        let token_cleanup_interval_seconds = parse_bounded(
            vars,
            "TOKEN_CLEANUP_INTERVAL_SECONDS",
            DEFAULT_TOKEN_CLEANUP_INTERVAL_SECONDS,
            MIN_TOKEN_CLEANUP_INTERVAL_SECONDS,
            u64::MAX,
        )?;

        let smtp = parse_smtp(vars)?;
        if smtp.is_none() && environment == Environment::Production {
            return Err(ConfigError::MissingEnvVar("SMTP_HOST".to_string()));
        }

        let limiter = LimiterConfig {
            enabled: parse_bool(vars, "LIMITER_ENABLED", true)?,
            rps: bounded_u32(vars, "LIMITER_RPS", DEFAULT_LIMITER_RPS)?,
            burst: bounded_u32(vars, "LIMITER_BURST", DEFAULT_LIMITER_BURST)?,
        };

        let cors_trusted_origins = vars
            .get("CORS_TRUSTED_ORIGINS")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Config {
            database_url,
            bind_address,
            environment,
            bcrypt_cost,
            store_deadline_seconds,
            shutdown_deadline_seconds,
            // Bounded by MAX_DB_MAX_CONNECTIONS above, so the narrowing cannot fail.
            db_max_connections: u32::try_from(db_max_connections)
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            token_cleanup_interval_seconds,
            smtp,
            limiter,
            cors_trusted_origins,
        })
    }
}

/// SMTP settings are all-or-nothing: no `SMTP_HOST` means no relay, and a
/// relay needs a sender.
fn parse_smtp(vars: &HashMap<String, String>) -> Result<Option<SmtpConfig>, ConfigError> {
    let Some(host) = vars.get("SMTP_HOST").filter(|h| !h.is_empty()) else {
        return Ok(None);
    };

    let sender = vars
        .get("SMTP_SENDER")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("SMTP_SENDER".to_string()))?
        .clone();

    let port = parse_bounded(
        vars,
        "SMTP_PORT",
        u64::from(DEFAULT_SMTP_PORT),
        1,
        u64::from(u16::MAX),
    )?;

    Ok(Some(SmtpConfig {
        host: host.clone(),
        port: u16::try_from(port).unwrap_or(DEFAULT_SMTP_PORT),
        username: vars.get("SMTP_USERNAME").filter(|u| !u.is_empty()).cloned(),
        password: vars.get("SMTP_PASSWORD").filter(|p| !p.is_empty()).cloned(),
        sender,
        starttls: parse_bool(vars, "SMTP_STARTTLS", true)?,
    }))
}

fn bounded_u32(
    vars: &HashMap<String, String>,
    name: &str,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = parse_bounded(
        vars,
        name,
        u64::from(default),
        1,
        u64::from(MAX_LIMITER_VALUE),
    )?;
    Ok(u32::try_from(value).unwrap_or(default))
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(String::as_str) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("must be true or false, got '{}'", other),
        }),
    }
}

/// Parse an optional integer variable and check it against inclusive bounds.
fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid integer, got '{}': {}", value_str, e),
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: if max == u64::MAX {
                format!("must be at least {}, got {}", min, value)
            } else {
                format!("must be between {} and {}, got {}", min, max, value)
            },
        });
    }

    Ok(value)
}
