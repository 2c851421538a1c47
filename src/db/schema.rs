// Schema creation and version upgrades
//
// Version history:
// - v1: agents + scalars only
// - v2: per-pair sessions table, tally kept in scalars
// - v3: tally moved into sessions rows
// - v4: `Optimal` agent added

use rusqlite::{params, Connection, Transaction};

use crate::config::store::SCHEMA_VERSION;

use super::{AgentSeed, StoreError};

const AGENTS_TABLE_CREATE: &str = "CREATE TABLE IF NOT EXISTS agents (
    id INTEGER PRIMARY KEY ON CONFLICT REPLACE,
    name TEXT NOT NULL UNIQUE,
    state BLOB
)";

const SCALARS_TABLE_CREATE: &str = "CREATE TABLE IF NOT EXISTS scalars (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE ON CONFLICT REPLACE,
    value BLOB
)";

const SESSIONS_TABLE_CREATE: &str = "CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    p1id INTEGER REFERENCES agents(id) ON DELETE CASCADE,
    p2id INTEGER REFERENCES agents(id) ON DELETE CASCADE,
    result INTEGER NOT NULL,
    tally BLOB,
    session BLOB,
    UNIQUE (p1id, p2id) ON CONFLICT REPLACE
)";

/// Agent every upgrade path must end up with
const OPTIMAL_AGENT: &str = "Optimal";

/// Bring `conn` to `SCHEMA_VERSION`. Returns true when the schema was created.
pub(super) fn migrate(conn: &mut Connection, seeds: &[AgentSeed]) -> Result<bool, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > SCHEMA_VERSION {
        return Err(StoreError::Schema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if version == SCHEMA_VERSION {
        return Ok(false);
    }

    let tx = conn.transaction()?;
    if version == 0 {
        create(&tx, seeds)?;
    } else {
        upgrade(&tx, version, seeds)?;
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    if version == 0 {
        tracing::info!(version = SCHEMA_VERSION, agents = seeds.len(), "store schema created");
    } else {
        tracing::info!(from = version, to = SCHEMA_VERSION, "store schema migrated");
    }
    Ok(version == 0)
}

fn create(tx: &Transaction<'_>, seeds: &[AgentSeed]) -> Result<(), StoreError> {
    tx.execute_batch(AGENTS_TABLE_CREATE)?;
    tx.execute_batch(SCALARS_TABLE_CREATE)?;
    tx.execute_batch(SESSIONS_TABLE_CREATE)?;
    for seed in seeds {
        insert_seed(tx, seed)?;
    }
    Ok(())
}

fn upgrade(tx: &Transaction<'_>, from: i32, seeds: &[AgentSeed]) -> Result<(), StoreError> {
    match from {
        1 => {
            tx.execute_batch("DROP TABLE IF EXISTS scalars")?;
        }
        2 => {
            // Old-style tallies cannot be carried over
            tx.execute_batch("DROP TABLE IF EXISTS sessions")?;
            tx.execute("DELETE FROM scalars WHERE name IN ('tally', 'game')", [])?;
        }
        _ => {}
    }
    tx.execute_batch(SCALARS_TABLE_CREATE)?;
    tx.execute_batch(SESSIONS_TABLE_CREATE)?;

    if let Some(optimal) = seeds.iter().find(|seed| seed.name == OPTIMAL_AGENT) {
        insert_seed(tx, optimal)?;
    }
    Ok(())
}

fn insert_seed(tx: &Transaction<'_>, seed: &AgentSeed) -> Result<(), StoreError> {
    tx.execute(
        "INSERT OR IGNORE INTO agents (id, name, state) VALUES (NULL, ?1, ?2)",
        params![seed.name, seed.state],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap()
    }

    fn agent_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("SELECT name FROM agents ORDER BY id").unwrap();
        let names = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        names.map(|name| name.unwrap()).collect()
    }

    fn optimal_seed() -> Vec<AgentSeed> {
        vec![
            AgentSeed { name: "User".to_string(), state: None },
            AgentSeed { name: OPTIMAL_AGENT.to_string(), state: Some(vec![4]) },
        ]
    }

    #[test]
    fn test_create_sets_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(migrate(&mut conn, &optimal_seed()).unwrap());
        assert_eq!(version(&conn), SCHEMA_VERSION);
        assert_eq!(agent_names(&conn), vec!["User", "Optimal"]);

        // Second pass is a no-op
        assert!(!migrate(&mut conn, &optimal_seed()).unwrap());
        assert_eq!(agent_names(&conn).len(), 2);
    }

    #[test]
    fn test_upgrade_from_v2_resets_sessions() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(AGENTS_TABLE_CREATE).unwrap();
        conn.execute_batch(SCALARS_TABLE_CREATE).unwrap();
        conn.execute_batch(SESSIONS_TABLE_CREATE).unwrap();
        conn.execute("INSERT INTO agents (name, state) VALUES ('User', NULL)", []).unwrap();
        conn.execute(
            "INSERT INTO sessions (p1id, p2id, result, tally) VALUES (1, 1, 1, x'01')",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO scalars (name, value) VALUES ('tally', x'00')", []).unwrap();
        conn.pragma_update(None, "user_version", 2).unwrap();

        assert!(!migrate(&mut conn, &optimal_seed()).unwrap());
        assert_eq!(version(&conn), SCHEMA_VERSION);

        let sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0)).unwrap();
        assert_eq!(sessions, 0);
        let scalars: i64 = conn.query_row("SELECT COUNT(*) FROM scalars", [], |row| row.get(0)).unwrap();
        assert_eq!(scalars, 0);
        assert_eq!(agent_names(&conn), vec!["User", "Optimal"]);
    }

    #[test]
    fn test_upgrade_from_v3_adds_optimal_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(AGENTS_TABLE_CREATE).unwrap();
        conn.execute("INSERT INTO agents (name, state) VALUES ('Optimal', x'04')", []).unwrap();
        conn.pragma_update(None, "user_version", 3).unwrap();

        migrate(&mut conn, &optimal_seed()).unwrap();
        assert_eq!(agent_names(&conn), vec!["Optimal"]);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(
            migrate(&mut conn, &[]),
            Err(StoreError::Schema { .. })
        ));
    }
}
