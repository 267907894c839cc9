//! Server configuration, read from `TYPERACE_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typerace_room::RoomConfig;

/// Settings for one server instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// How long a writer stays quiet before it sends a ping.
    pub keepalive_interval: Duration,
    /// How long a connection may go without any inbound frame (pongs
    /// included) before it is dropped. Keep it above `keepalive_interval`.
    pub idle_timeout: Duration,
    /// Upper bound on a single outbound send.
    pub write_timeout: Duration,
    /// How long a fresh TCP peer has to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// How long a fresh connection has to send its `JoinRoom`.
    pub join_timeout: Duration,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            keepalive_interval: Duration::from_secs(54),
            idle_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(30),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment, falling back to
    /// the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_secs()).map_or(default, Duration::from_secs)
        };

        let mut room = match lookup("TYPERACE_SENTENCES").as_deref() {
            Some("classic") => RoomConfig::classic(),
            Some("default") | None => RoomConfig::default(),
            Some(other) => {
                tracing::warn!(key = "TYPERACE_SENTENCES", value = other, "unknown sentence pool, using default");
                RoomConfig::default()
            }
        };
        room.outbox_capacity =
            parse_or(&lookup, "TYPERACE_OUTBOX_CAPACITY", room.outbox_capacity)
                .unwrap_or(room.outbox_capacity);

        Self {
            bind_addr: lookup("TYPERACE_BIND").unwrap_or(defaults.bind_addr),
            keepalive_interval: secs("TYPERACE_KEEPALIVE_SECS", defaults.keepalive_interval),
            idle_timeout: secs("TYPERACE_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
            write_timeout: secs("TYPERACE_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            handshake_timeout: secs("TYPERACE_HANDSHAKE_TIMEOUT_SECS", defaults.handshake_timeout),
            join_timeout: secs("TYPERACE_JOIN_TIMEOUT_SECS", defaults.join_timeout),
            room,
        }
    }
}

/// Parses `key` if set. Zero and garbage both warn and yield `None`.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Option<T>
where
    T: std::str::FromStr + PartialEq + Default + std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, %default, "invalid value, using default");
            None
        }
    }
}
