// SQLite store implementation using rusqlite

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::schema;
use super::{
    AgentId, AgentListing, AgentPair, AgentRow, AgentSeed, SessionRow, StoreError, StoreLocation,
};

pub struct Store {
    conn: Mutex<Connection>,
    /// Write statements executed so far (committed or not)
    writes: AtomicU64,
    created: bool,
}

impl Store {
    /// Open or create the store, bringing the schema up to date.
    /// `seeds` are inserted only when the schema is created from scratch.
    pub fn open(location: &StoreLocation, seeds: &[AgentSeed]) -> Result<Self, StoreError> {
        let mut conn = match location {
            StoreLocation::InMemory => Connection::open_in_memory(),
            StoreLocation::File(path) => Connection::open(path),
        }
        .map_err(StoreError::Open)?;

        conn.pragma_update(None, "foreign_keys", true)?;
        let created = schema::migrate(&mut conn, seeds)?;

        tracing::info!(?location, created, "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            writes: AtomicU64::new(0),
            created,
        })
    }

    pub fn in_memory(seeds: &[AgentSeed]) -> Result<Self, StoreError> {
        Self::open(&StoreLocation::InMemory, seeds)
    }

    /// True when this open created the schema
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Run `f` inside one transaction. Commits only if `f` returns `Ok`;
    /// any error rolls everything back.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let value = f(&StoreTx {
            conn: &*tx,
            writes: &self.writes,
        })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    pub fn list_agents(&self) -> Result<Vec<AgentListing>, StoreError> {
        select_agents(&self.conn.lock())
    }

    pub fn load_agent(&self, id: AgentId) -> Result<Option<AgentRow>, StoreError> {
        select_agent(&self.conn.lock(), id)
    }

    pub fn load_session(&self, pair: AgentPair) -> Result<Option<SessionRow>, StoreError> {
        select_session(&self.conn.lock(), pair)
    }

    pub fn get_scalar(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        select_scalar(&self.conn.lock(), name)
    }

    pub fn insert_agent(&self, name: &str, state: Option<&[u8]>) -> Result<AgentId, StoreError> {
        self.transaction(|tx| tx.insert_agent(name, state))
    }

    pub fn put_scalar(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.transaction(|tx| tx.put_scalar(name, value))
    }

    /// Raw SQL for failure-injection tests
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

/// Operations available inside `Store::transaction`
pub struct StoreTx<'a> {
    conn: &'a Connection,
    writes: &'a AtomicU64,
}

impl StoreTx<'_> {
    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn insert_agent(&self, name: &str, state: Option<&[u8]>) -> Result<AgentId, StoreError> {
        self.conn.execute(
            "INSERT INTO agents (id, name, state) VALUES (NULL, ?1, ?2)",
            params![name, state],
        )?;
        self.wrote();
        Ok(AgentId(self.conn.last_insert_rowid()))
    }

    pub fn save_agent_state(&self, id: AgentId, state: &[u8]) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE agents SET state = ?1 WHERE id = ?2",
            params![state, id.0],
        )?;
        self.wrote();
        Ok(())
    }

    /// Replace the snapshot for `pair`
    pub fn put_session(&self, pair: AgentPair, row: &SessionRow) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO sessions (p1id, p2id, result, tally, session) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![pair.get(0).0, pair.get(1).0, row.result, row.tally, row.session],
        )?;
        self.wrote();
        Ok(())
    }

    pub fn put_scalar(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO scalars (name, value) VALUES (?1, ?2)",
            params![name, value],
        )?;
        self.wrote();
        Ok(())
    }
}

fn select_agents(conn: &Connection) -> Result<Vec<AgentListing>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name FROM agents ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(AgentListing {
            id: AgentId(row.get(0)?),
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn select_agent(conn: &Connection, id: AgentId) -> Result<Option<AgentRow>, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, name, state FROM agents WHERE id = ?1",
            params![id.0],
            |row| {
                Ok(AgentRow {
                    id: AgentId(row.get(0)?),
                    name: row.get(1)?,
                    state: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn select_session(conn: &Connection, pair: AgentPair) -> Result<Option<SessionRow>, StoreError> {
    let row = conn
        .query_row(
            "SELECT tally, session, result FROM sessions WHERE p1id = ?1 AND p2id = ?2",
            params![pair.get(0).0, pair.get(1).0],
            |row| {
                Ok(SessionRow {
                    tally: row.get(0)?,
                    session: row.get(1)?,
                    result: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn select_scalar(conn: &Connection, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
    let value = conn
        .query_row(
            "SELECT value FROM scalars WHERE name = ?1",
            params![name],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()?;
    Ok(value.flatten())
}
