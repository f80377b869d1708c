//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated grant schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per grant; rows are only removed by an explicit hard delete
        CREATE TABLE grants (
            grant_id INTEGER PRIMARY KEY AUTOINCREMENT,
            capability_name TEXT NOT NULL,    -- derived from the target on every write
            short_name TEXT NOT NULL,         -- derived from the target on every write
            target_kind TEXT NOT NULL,        -- entity kind discriminator
            target_id INTEGER NOT NULL,       -- id within the kind
            user_id INTEGER,                  -- NULL for unassigned records
            granted_by INTEGER,               -- admin of the last transition
            state TEXT NOT NULL
                CHECK (state IN ('active', 'pending', 'revoked')),
            requested_at INTEGER NOT NULL,    -- Unix ms, set once
            changed_at INTEGER                -- Unix ms of the last admin transition
        );

        -- Indexes for common queries
        CREATE INDEX idx_grants_user ON grants(user_id);
        CREATE INDEX idx_grants_target ON grants(target_kind, target_id);
        CREATE INDEX idx_grants_state ON grants(state);
        CREATE INDEX idx_grants_user_target ON grants(user_id, target_kind, target_id);
        "#,
    )?;

    Ok(())
}
