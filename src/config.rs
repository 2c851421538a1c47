// Centralized configuration for the game host
//
// Constants live in per-concern sub-modules so every layer reads the same
// values. `HostConfig` carries the settings a host may override at start.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Board geometry
pub mod board {
    /// 3x3 grid
    pub const SIZE: usize = 3;
    pub const CELLS: usize = SIZE * SIZE;

    /// Bits used per cell in the packed board encoding
    pub const BITS_PER_CELL: u32 = 2;

    #[inline]
    pub fn is_in_bounds(x: usize, y: usize) -> bool {
        x < SIZE && y < SIZE
    }

    /// Row-major cell index
    #[inline]
    pub fn cell_index(x: usize, y: usize) -> usize {
        y * SIZE + x
    }

    #[inline]
    pub fn index_to_cell(index: usize) -> (usize, usize) {
        (index % SIZE, index / SIZE)
    }
}

/// Persisted schema names and scalar keys
pub mod store {
    pub const DATABASE_NAME: &str = "tictactoe.db";

    /// Stored in `PRAGMA user_version`
    pub const SCHEMA_VERSION: i32 = 4;

    pub const AGENTS_TABLE: &str = "agents";
    pub const SESSIONS_TABLE: &str = "sessions";
    pub const SCALARS_TABLE: &str = "scalars";

    pub const SELECTED_AGENTS_KEY: &str = "selected_agents";
    pub const RNG_SEED_KEY: &str = "rng_seed";

    /// Agents present in a freshly created store, in id order.
    /// `None` state marks a human slot.
    pub const DEFAULT_AGENTS: [(&str, Option<&str>); 4] = [
        ("User", None),
        ("Random", Some("random")),
        ("Bean Counter", Some("bean_counter")),
        ("Optimal", Some("optimal")),
    ];
}

/// Suspend-flush rendezvous
pub mod flush {
    use std::time::Duration;

    pub const RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Automated-agent randomness
pub mod rng {
    pub const SEED_LEN: usize = 32;
}

/// Settings a host can override when starting the game core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// File-backed store location. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Upper bound on how long suspend waits for the Game Actor
    pub flush_timeout_ms: u64,
    /// Collect fresh entropy when no seed has been persisted yet
    pub entropy_bootstrap: bool,
    /// Insert the built-in agents into a freshly created store
    pub seed_default_agents: bool,
    /// Fallback tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            flush_timeout_ms: flush::RENDEZVOUS_TIMEOUT.as_millis() as u64,
            entropy_bootstrap: true,
            seed_default_agents: true,
            log_filter: "info".to_string(),
        }
    }
}

impl HostConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json_str(&raw)?)
    }

    /// Database file inside `dir` using the standard name
    pub fn with_database_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.database_path = Some(dir.as_ref().join(store::DATABASE_NAME));
        self
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HostConfig::from_json_str(r#"{ "flush_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.flush_timeout(), Duration::from_millis(250));
        assert!(config.entropy_bootstrap);
        assert!(config.seed_default_agents);
        assert_eq!(config.database_path, None);
    }

    #[test]
    fn test_cell_index_round_trip() {
        for index in 0..board::CELLS {
            let (x, y) = board::index_to_cell(index);
            assert!(board::is_in_bounds(x, y));
            assert_eq!(board::cell_index(x, y), index);
        }
        assert!(!board::is_in_bounds(3, 0));
    }

    #[test]
    fn test_database_dir() {
        let config = HostConfig::default().with_database_dir("/tmp/host");
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/tmp/host").join("tictactoe.db"))
        );
    }
}
