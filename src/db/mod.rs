// Persistent Store Gateway
//
// Synchronous, transactional access to the three durable tables:
// - `agents`: durable agent identity plus the agent's own state blob
// - `sessions`: one row per ordered agent pair (session, tally, last result)
// - `scalars`: process-wide named blobs (selected pair, PRNG seed)
//
// Only the Game Actor writes through this gateway. Reads may come from the
// identity cache on the same thread.

mod schema;
mod sqlite;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use sqlite::{Store, StoreTx};

/// Durable agent identifier (row id in `agents`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub i64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered agent pair; index 0 moves first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentPair(pub [AgentId; 2]);

impl AgentPair {
    pub fn new(first: AgentId, second: AgentId) -> Self {
        Self([first, second])
    }

    #[inline]
    pub fn get(&self, index: usize) -> AgentId {
        self.0[index]
    }

    /// Copy of this pair with one slot replaced
    pub fn with(mut self, index: usize, id: AgentId) -> Self {
        self.0[index] = id;
        self
    }
}

impl fmt::Display for AgentPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0[0], self.0[1])
    }
}

/// Agent row as stored; `state == None` means nothing to persist (human slot)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRow {
    pub id: AgentId,
    pub name: String,
    pub state: Option<Vec<u8>>,
}

/// Entry for agent selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentListing {
    pub id: AgentId,
    pub name: String,
}

/// Session snapshot row for one ordered pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub tally: Option<Vec<u8>>,
    pub session: Option<Vec<u8>>,
    pub result: i64,
}

/// Agent inserted into a freshly created (or migrated) store
#[derive(Debug, Clone)]
pub struct AgentSeed {
    pub name: String,
    pub state: Option<Vec<u8>>,
}

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    InMemory,
    File(PathBuf),
}

impl From<Option<PathBuf>> for StoreLocation {
    fn from(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => StoreLocation::File(path),
            None => StoreLocation::InMemory,
        }
    }
}

/// Store failure. A failed transaction is rolled back; prior durable state is intact.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("SQL failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("unsupported schema version {found} (newest known is {supported})")]
    Schema { found: i32, supported: i32 },
}
