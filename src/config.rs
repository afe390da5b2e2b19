//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Domain knobs are grouped into
//! [`DrawSettings`] and [`InvalidationSettings`] so services only receive
//! what they use.

use std::net::SocketAddr;
use std::time::Duration;

/// Parameters of the secret-friend draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSettings {
    /// Minimum number of distinct participants required to draw.
    pub min_participants: usize,
    /// Maximum number of shuffles tried before giving up.
    pub max_shuffle_attempts: u32,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            min_participants: 4,
            max_shuffle_attempts: 100,
        }
    }
}

/// Cache lifetime and invalidation publishing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationSettings {
    /// Time-to-live of cached read aggregates.
    pub cache_ttl: Duration,
    /// Broker topic invalidation events are published on.
    pub topic: String,
    /// Total publish attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
    /// Cache namespaces purged by the invalidation listener.
    pub namespaces: Vec<String>,
}

impl Default for InvalidationSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(2 * 60 * 60),
            topic: "cache.invalidate".to_string(),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            namespaces: vec!["event:supplies".to_string(), "gifts:event".to_string()],
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Minimum idle connections in the pool.
    pub database_min_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Capacity of the in-process invalidation transport.
    pub event_bus_capacity: usize,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,

    /// Secret-friend draw parameters.
    pub draw: DrawSettings,

    /// Cache and invalidation parameters.
    pub invalidation: InvalidationSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            database_max_connections: 10,
            database_min_connections: 2,
            database_connect_timeout_secs: 5,
            event_bus_capacity: 10_000,
            log_json: false,
            draw: DrawSettings::default(),
            invalidation: InvalidationSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let draw_defaults = DrawSettings::default();
        let draw = DrawSettings {
            min_participants: parse_env("DRAW_MIN_PARTICIPANTS", draw_defaults.min_participants),
            max_shuffle_attempts: parse_env(
                "DRAW_MAX_SHUFFLE_ATTEMPTS",
                draw_defaults.max_shuffle_attempts,
            )
            .max(1),
        };

        let defaults = InvalidationSettings::default();
        let invalidation = InvalidationSettings {
            cache_ttl: Duration::from_secs(parse_env("CACHE_TTL_SECS", defaults.cache_ttl.as_secs())),
            topic: std::env::var("INVALIDATION_TOPIC").unwrap_or(defaults.topic),
            max_attempts: parse_env("INVALIDATION_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            base_delay: Duration::from_millis(parse_env(
                "INVALIDATION_BASE_DELAY_MS",
                u64::try_from(defaults.base_delay.as_millis()).unwrap_or(100),
            )),
            namespaces: std::env::var("INVALIDATION_NAMESPACES")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.namespaces),
        };

        let fallback = Self::default();
        Ok(Self {
            listen_addr,
            database_url,
            database_max_connections: parse_env(
                "DATABASE_MAX_CONNECTIONS",
                fallback.database_max_connections,
            ),
            database_min_connections: parse_env(
                "DATABASE_MIN_CONNECTIONS",
                fallback.database_min_connections,
            ),
            database_connect_timeout_secs: parse_env(
                "DATABASE_CONNECT_TIMEOUT_SECS",
                fallback.database_connect_timeout_secs,
            ),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", fallback.event_bus_capacity),
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            draw,
            invalidation,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated list, dropping blank entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_defaults_match_backoff_schedule() {
        let settings = InvalidationSettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.base_delay, Duration::from_millis(100));
        assert_eq!(settings.cache_ttl, Duration::from_secs(7200));
        assert_eq!(settings.topic, "cache.invalidate");
    }

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        let parsed = parse_list(" event:supplies, ,gifts:event ");
        assert_eq!(parsed, vec!["event:supplies", "gifts:event"]);
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u32 = parse_env("GATHER_GATEWAY_SURELY_UNSET_KEY", 7);
        assert_eq!(value, 7);
    }
}
