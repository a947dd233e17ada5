//! API server configuration.

use std::time::Duration;

use assist_core::auth::jwt::{MIN_SECRET_LEN, resolve_dev_secret};
use assist_core::auth::password::BCRYPT_COST;
use assist_core::auth::service::TokenSettings;
use assist_core::rate_limit::{PolicyLimits, RateLimitSettings};
use thiserror::Error;

/// Longest accepted access-token lifetime (30 days).
pub const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted refresh-token lifetime.
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is required when APP_ENV=production")]
    MissingSecret { var: &'static str },

    #[error("{var} must be at least {} bytes when APP_ENV=production", MIN_SECRET_LEN)]
    WeakSecret { var: &'static str },

    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("REQUEST_TIMEOUT_SECS ({timeout}s) must be shorter than ACCESS_TOKEN_TTL_SECS ({ttl}s)")]
    TimeoutExceedsTokenLifetime { timeout: u64, ttl: u64 },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3001").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// `APP_ENV=production`: strict CSRF, HSTS, opaque errors, required secret.
    pub hardened: bool,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl_days: i64,
    pub rate_limits: RateLimitSettings,
    /// Allowed origins, serialized as `scheme://host[:port]`.
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    /// Take the client address from the first `X-Forwarded-For` hop.
    pub trust_proxy: bool,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                            |
    /// |---------------------------|------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3001`                   |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/assist` |
    /// | `APP_ENV`                 | `development`                      |
    /// | `JWT_SECRET` / `AUTH_SECRET` | required in production, else generated & persisted |
    /// | `ACCESS_TOKEN_TTL_SECS`   | `28800`                            |
    /// | `REFRESH_TOKEN_TTL_DAYS`  | `7`                                |
    /// | `RATE_LIMIT_WINDOW_MS`    | `900000`                           |
    /// | `RATE_LIMIT_MAX_REQUESTS` | `100`                              |
    /// | `AUTH_RATE_LIMIT_MAX`     | `5`                                |
    /// | `STRICT_RATE_LIMIT_MAX`   | `20`                               |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`            |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                               |
    /// | `TRUST_PROXY`             | `false`                            |
    /// | `COOKIE_SECURE`           | same as production flag            |
    /// | `BCRYPT_COST`             | `12`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hardened = var("APP_ENV").is_some_and(|v| v.trim() == "production");
        let jwt_secret = resolve_secret(&var, hardened)?;

        let access_ttl_secs = parse_or(&var, "ACCESS_TOKEN_TTL_SECS", 28_800u64)?;
        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", 30u64)?;
        if access_ttl_secs == 0 || access_ttl_secs > MAX_ACCESS_TOKEN_TTL_SECS {
            return Err(invalid(
                "ACCESS_TOKEN_TTL_SECS",
                &access_ttl_secs.to_string(),
                &format!("must be 1..={MAX_ACCESS_TOKEN_TTL_SECS}"),
            ));
        }
        if request_timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "0", "must be positive"));
        }
        if request_timeout_secs >= access_ttl_secs {
            return Err(ConfigError::TimeoutExceedsTokenLifetime {
                timeout: request_timeout_secs,
                ttl: access_ttl_secs,
            });
        }

        let refresh_token_ttl_days = parse_or(&var, "REFRESH_TOKEN_TTL_DAYS", 7i64)?;
        if !(1..=MAX_REFRESH_TOKEN_TTL_DAYS).contains(&refresh_token_ttl_days) {
            return Err(invalid(
                "REFRESH_TOKEN_TTL_DAYS",
                &refresh_token_ttl_days.to_string(),
                &format!("must be 1..={MAX_REFRESH_TOKEN_TTL_DAYS}"),
            ));
        }

        let window_ms = parse_or(&var, "RATE_LIMIT_WINDOW_MS", 900_000u64)?;
        if window_ms == 0 {
            return Err(invalid("RATE_LIMIT_WINDOW_MS", "0", "must be positive"));
        }
        let window = Duration::from_millis(window_ms);
        let defaults = RateLimitSettings::default();
        let rate_limits = RateLimitSettings {
            general: PolicyLimits {
                window,
                limit: parse_or(&var, "RATE_LIMIT_MAX_REQUESTS", defaults.general.limit)?,
            },
            auth: PolicyLimits {
                window: defaults.auth.window,
                limit: parse_or(&var, "AUTH_RATE_LIMIT_MAX", defaults.auth.limit)?,
            },
            strict: PolicyLimits {
                window: defaults.strict.window,
                limit: parse_or(&var, "STRICT_RATE_LIMIT_MAX", defaults.strict.limit)?,
            },
        };

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(normalize_origin)
            .collect::<Result<Vec<_>, _>>()?;

        let bcrypt_cost = parse_or(&var, "BCRYPT_COST", BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", &bcrypt_cost.to_string(), "must be 4..=31"));
        }

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3001".into()),
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/assist".into()),
            hardened,
            jwt_secret,
            access_token_ttl: Duration::from_secs(access_ttl_secs),
            refresh_token_ttl_days,
            rate_limits,
            cors_origins,
            request_timeout: Duration::from_secs(request_timeout_secs),
            trust_proxy: parse_bool(&var, "TRUST_PROXY", false)?,
            cookie_secure: parse_bool(&var, "COOKIE_SECURE", hardened)?,
            bcrypt_cost,
        })
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// Token lifetimes for the token service, held to the accepted ranges
    /// even when the fields were set by hand.
    pub fn token_settings(&self) -> TokenSettings {
        let access_secs = self.access_token_ttl.as_secs().min(MAX_ACCESS_TOKEN_TTL_SECS);
        TokenSettings {
            access_ttl: chrono::Duration::seconds(i64::try_from(access_secs).unwrap_or(0)),
            refresh_ttl: chrono::Duration::days(
                self.refresh_token_ttl_days
                    .clamp(1, MAX_REFRESH_TOKEN_TTL_DAYS),
            ),
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    /// Whether `origin` (already in `scheme://host[:port]` form) is allowed.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|o| o == origin)
    }
}

fn resolve_secret(
    var: &impl Fn(&str) -> Option<String>,
    hardened: bool,
) -> Result<String, ConfigError> {
    let found = ["JWT_SECRET", "AUTH_SECRET"]
        .into_iter()
        .find_map(|name| var(name).map(|value| (name, value)));
    match found {
        Some((name, secret)) => {
            if hardened && secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::WeakSecret { var: name });
            }
            Ok(secret)
        }
        None if hardened => Err(ConfigError::MissingSecret { var: "JWT_SECRET" }),
        None => Ok(resolve_dev_secret()),
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(name, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(invalid(name, &raw, "expected true or false")),
        },
        None => Ok(default),
    }
}

fn normalize_origin(raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| invalid("CORS_ORIGINS", raw, &e.to_string()))?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return Err(invalid("CORS_ORIGINS", raw, "not an http(s) origin"));
    }
    Ok(origin.ascii_serialization())
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
