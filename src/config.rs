use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Where rows live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    /// A full `postgres://` connection string.
    Url(String),
    /// Connection parameters given one by one.
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
    },
    /// In-process store, selected with `DATABASE_URL=memory:`.
    Memory,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            m_cost: argon2::Params::DEFAULT_M_COST,
            t_cost: argon2::Params::DEFAULT_T_COST,
            p_cost: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database = match get("DATABASE_URL") {
            Some(url) if url.starts_with("memory:") => DatabaseConfig::Memory,
            Some(url) => DatabaseConfig::Url(url),
            None => DatabaseConfig::Parts {
                host: required("DB_HOST")?,
                port: parse_or(&get, "DB_PORT", 5432)?,
                user: required("DB_USER")?,
                password: get("DB_PASSWORD").unwrap_or_default(),
                name: required("DB_NAME")?,
            },
        };

        let session = SessionConfig {
            secret: required("SECRET_KEY")?,
            ttl_minutes: parse_or(&get, "SESSION_TTL_MINUTES", 60 * 24)?,
            cookie_secure: parse_or(&get, "SESSION_COOKIE_SECURE", false)?,
        };
        if session.secret.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SECRET_KEY",
                value: String::new(),
            });
        }
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&session.ttl_minutes) {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_MINUTES",
                value: session.ttl_minutes.to_string(),
            });
        }

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            m_cost: parse_or(&get, "PASSWORD_HASH_M_COST", defaults.m_cost)?,
            t_cost: parse_or(&get, "PASSWORD_HASH_T_COST", defaults.t_cost)?,
            p_cost: parse_or(&get, "PASSWORD_HASH_P_COST", defaults.p_cost)?,
        };

        Ok(Self {
            database,
            session,
            password,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080)?,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            key: "APP_HOST",
            value: raw,
        })
    }
}

/// One year. Longer sessions would overflow token expiry arithmetic.
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
