use std::env;

use thiserror::Error;

/// AppConfig
///
/// Holds the service's entire configuration state. Loaded once at startup and
/// immutable afterwards; handlers and extractors pull it out of the shared
/// application state via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and the cookie Secure default.
    pub env: Env,
    // Postgres connection string. Optional in local, where the in-memory user store is used.
    pub db_url: Option<String>,
    // Shared HMAC secret used to sign and verify identity tokens.
    pub jwt_secret: String,
    // Lifetime of a minted identity token, in seconds.
    pub token_ttl_secs: i64,
    // Name of the cookie carrying the opaque session id.
    pub session_cookie_name: String,
    // Idle lifetime of a server-side session, in seconds.
    pub session_ttl_secs: i64,
    // Whether the session cookie is flagged `Secure`.
    pub cookie_secure: bool,
    // Socket address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context. Local gets human-readable logs and plain-HTTP
/// cookies, Production gets JSON logs, hardened cookies and a mandatory database.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Configuration failures. All of these are fatal at boot, before a listener
/// is bound; none of them can occur on a request path.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("{0} must be set in production")]
    MissingVar(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

pub const DEFAULT_SESSION_COOKIE: &str = "session_id";
pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
/// Upper bound for any configured lifetime: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests. Never reads the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            token_ttl_secs: DEFAULT_TTL_SECS,
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            session_ttl_secs: DEFAULT_TTL_SECS,
            cookie_secure: false,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast on
    /// anything missing or unparseable. The signing secret is required in every
    /// environment; there is no development fallback for it.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let db_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if env == Env::Production && db_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL"));
        }

        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(value) => parse_bool("COOKIE_SECURE", &value)?,
            Err(_) => env == Env::Production,
        };

        Ok(Self {
            db_url,
            jwt_secret,
            token_ttl_secs: parse_secs("TOKEN_TTL_SECS")?,
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            session_ttl_secs: parse_secs("SESSION_TTL_SECS")?,
            cookie_secure,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            env,
        })
    }
}

fn parse_secs(var: &'static str) -> Result<i64, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(DEFAULT_TTL_SECS),
        Ok(value) => parse_ttl(var, &value),
    }
}

/// Lifetimes outside `1..=MAX_TTL_SECS` are rejected here, at boot, so that
/// `now + ttl` can never overflow on a request path.
fn parse_ttl(var: &'static str, value: &str) -> Result<i64, ConfigError> {
    match value.trim().parse::<i64>() {
        Ok(secs) if (1..=MAX_TTL_SECS).contains(&secs) => Ok(secs),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}
