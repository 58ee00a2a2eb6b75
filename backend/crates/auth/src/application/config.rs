//! Application Configuration
//!
//! Token and hashing settings for the auth application layer, loaded once at
//! startup.

use std::time::Duration;

use platform::password::HashCost;
use platform::retry::Backoff;
use thiserror::Error;

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const GENERATED_SECRET_BYTES: usize = 32;
const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC key for access tokens
    pub access_secret: String,
    /// HMAC key for refresh tokens, independent of the access key
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Argon2id cost for new hashes
    pub hash_cost: HashCost,
    /// Retry policy for primary backend health checks
    pub health_retry: Backoff,
    /// Upper bound on a single health ping
    pub health_timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("hash_cost", &self.hash_cost)
            .field("health_retry", &self.health_retry)
            .field("health_timeout", &self.health_timeout)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: platform::crypto::random_secret(GENERATED_SECRET_BYTES),
            refresh_secret: platform::crypto::random_secret(GENERATED_SECRET_BYTES),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            hash_cost: HashCost::default(),
            health_retry: Backoff::default(),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }
}

impl AuthConfig {
    /// Random per-process secrets and cheap hashing. Tokens do not survive a
    /// restart.
    pub fn development() -> Self {
        Self {
            hash_cost: HashCost::minimal(),
            ..Self::default()
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    ///
    /// Secrets are mandatory in release builds; debug builds generate them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_secret = secret(get("JWT_SECRET"), "JWT_SECRET")?;
        let refresh_secret = secret(get("JWT_REFRESH_SECRET"), "JWT_REFRESH_SECRET")?;

        let access_ttl = lifetime_or_default(get("JWT_EXPIRE"), "JWT_EXPIRE", DEFAULT_ACCESS_TTL);
        let refresh_ttl = lifetime_or_default(
            get("JWT_REFRESH_EXPIRE"),
            "JWT_REFRESH_EXPIRE",
            DEFAULT_REFRESH_TTL,
        );

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: number(get("HASH_MEMORY_KIB"), "HASH_MEMORY_KIB")?
                .unwrap_or(defaults.memory_kib),
            iterations: number(get("HASH_ITERATIONS"), "HASH_ITERATIONS")?
                .unwrap_or(defaults.iterations),
            parallelism: number(get("HASH_PARALLELISM"), "HASH_PARALLELISM")?
                .unwrap_or(defaults.parallelism),
        };

        let mut health_retry = Backoff::default();
        if let Some(attempts) = number(get("PRIMARY_HEALTH_ATTEMPTS"), "PRIMARY_HEALTH_ATTEMPTS")? {
            health_retry.max_attempts = attempts;
        }
        if let Some(ms) = number::<u64>(get("PRIMARY_HEALTH_BACKOFF_MS"), "PRIMARY_HEALTH_BACKOFF_MS")?
        {
            health_retry.base_delay = Duration::from_millis(ms);
            health_retry.max_delay = health_retry.max_delay.max(health_retry.base_delay);
        }
        let timeout_ms = number::<u64>(get("PRIMARY_HEALTH_TIMEOUT_MS"), "PRIMARY_HEALTH_TIMEOUT_MS")?;
        let health_timeout = match timeout_ms {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "PRIMARY_HEALTH_TIMEOUT_MS",
                    reason: "must be positive".into(),
                });
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_HEALTH_TIMEOUT,
        };

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
            hash_cost,
            health_retry,
            health_timeout,
        })
    }
}

fn secret(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(value) => Ok(value),
        None if cfg!(debug_assertions) => {
            tracing::warn!(variable = name, "Not set, using a random per-process secret");
            Ok(platform::crypto::random_secret(GENERATED_SECRET_BYTES))
        }
        None => Err(ConfigError::Missing(name)),
    }
}

fn number<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn lifetime_or_default(value: Option<String>, name: &'static str, default: Duration) -> Duration {
    match value {
        None => default,
        Some(raw) => parse_lifetime(&raw).unwrap_or_else(|| {
            tracing::warn!(variable = name, value = %raw, "Malformed lifetime, using default");
            default
        }),
    }
}

/// Parses `<integer><unit>` with unit `s`, `m`, `h` or `d`.
///
/// A bare integer is taken as seconds. Zero is rejected.
pub fn parse_lifetime(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit_secs) = match raw.char_indices().last()? {
        (i, 's') => (&raw[..i], 1),
        (i, 'm') => (&raw[..i], 60),
        (i, 'h') => (&raw[..i], 3600),
        (i, 'd') => (&raw[..i], 86_400),
        (_, c) if c.is_ascii_digit() => (raw, 1),
        _ => return None,
    };

    let value: u64 = digits.parse().ok()?;
    if value == 0 {
        return None;
    }
    value.checked_mul(unit_secs).map(Duration::from_secs)
}
