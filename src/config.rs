use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Server configuration, read from the environment with defaults suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/websocket server binds to (`SKETCHROOM_ADDR`)
    pub bind_addr: SocketAddr,
    /// Where the room snapshot is persisted (`SKETCHROOM_SNAPSHOT_PATH`)
    pub snapshot_path: PathBuf,
    /// Maximum members per room (`SKETCHROOM_ROOM_CAPACITY`)
    pub room_capacity: usize,
    /// Room lifetime from creation (`SKETCHROOM_ROOM_TTL_SECS`)
    pub room_ttl: Duration,
    /// How often expired rooms are swept (`SKETCHROOM_CLEANUP_INTERVAL_SECS`)
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            snapshot_path: PathBuf::from("data/rooms.json"),
            room_capacity: 8,
            room_ttl: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: parse_env("SKETCHROOM_ADDR").unwrap_or(defaults.bind_addr),
            snapshot_path: env::var("SKETCHROOM_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            room_capacity: parse_env("SKETCHROOM_ROOM_CAPACITY").unwrap_or(defaults.room_capacity),
            room_ttl: parse_env("SKETCHROOM_ROOM_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.room_ttl),
            cleanup_interval: parse_env("SKETCHROOM_CLEANUP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparseable environment variable");
            None
        }
    }
}
