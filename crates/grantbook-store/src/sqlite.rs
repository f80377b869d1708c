//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Grantbook. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use grantbook_core::{
    CoreError, GrantId, GrantRecord, NewGrant, TargetId, TargetKind, TargetRef, UserId,
};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{mutate, GrantFilter, GrantMutator, Store, Upsert, UserFilter};

const GRANT_COLUMNS: &str = "grant_id, capability_name, short_name, target_kind, target_id, \
     user_id, granted_by, state, requested_at, changed_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime, and every write runs inside an
/// `IMMEDIATE` transaction so other processes sharing the file are
/// serialized as well.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &StoreConfig::default())
    }

    /// Open a SQLite database with explicit settings.
    pub fn open_with(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, config)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, &StoreConfig::default())
    }

    fn init(mut conn: Connection, config: &StoreConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout())?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    ///
    /// A panic inside `f` unwinds through the open transaction, which rolls
    /// back on drop, so a poisoned lock still guards a consistent database.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// Helper to convert a row to GrantRecord
fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<GrantRecord> {
    let kind: String = row.get("target_kind")?;
    let state: String = row.get("state")?;

    Ok(GrantRecord {
        id: GrantId(row.get("grant_id")?),
        capability_name: row.get("capability_name")?,
        short_name: row.get("short_name")?,
        target: TargetRef::new(
            TargetKind::new(kind).map_err(|e| conversion_error(3, e))?,
            TargetId(row.get("target_id")?),
        ),
        user: row.get::<_, Option<i64>>("user_id")?.map(UserId),
        granted_by: row.get::<_, Option<i64>>("granted_by")?.map(UserId),
        state: state.parse().map_err(|e| conversion_error(7, e))?,
        requested_at: row.get("requested_at")?,
        changed_at: row.get("changed_at")?,
    })
}

fn conversion_error(column: usize, err: CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

// Helper to build the WHERE clause and its bound values for a filter
fn where_clause(filter: &GrantFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(id) = filter.id {
        values.push(Value::Integer(id.0));
        clauses.push(format!("grant_id = ?{}", values.len()));
    }

    match filter.user {
        UserFilter::Any => {}
        UserFilter::Unassigned => clauses.push("user_id IS NULL".to_string()),
        UserFilter::User(user) => {
            values.push(Value::Integer(user.0));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
    }

    if let Some(kind) = &filter.target_kind {
        values.push(Value::Text(kind.as_str().to_string()));
        clauses.push(format!("target_kind = ?{}", values.len()));
    }

    if let Some(id) = filter.target_id {
        values.push(Value::Integer(id.0));
        clauses.push(format!("target_id = ?{}", values.len()));
    }

    if !filter.states.is_empty() {
        let mut slots = Vec::with_capacity(filter.states.len());
        for state in &filter.states {
            values.push(Value::Text(state.as_str().to_string()));
            slots.push(format!("?{}", values.len()));
        }
        clauses.push(format!("state IN ({})", slots.join(", ")));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn limit_clause(filter: &GrantFilter) -> String {
    filter
        .limit
        .map(|limit| format!(" LIMIT {}", limit))
        .unwrap_or_default()
}

fn query_grants(conn: &Connection, filter: &GrantFilter) -> Result<Vec<GrantRecord>> {
    let (where_sql, values) = where_clause(filter);
    let sql = format!(
        "SELECT {} FROM grants{} ORDER BY grant_id{}",
        GRANT_COLUMNS,
        where_sql,
        limit_clause(filter)
    );

    let mut stmt = conn.prepare(&sql)?;
    let grants = stmt
        .query_map(params_from_iter(values.iter()), row_to_grant)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(grants)
}

fn insert_row(conn: &Connection, grant: &NewGrant) -> Result<GrantRecord> {
    conn.execute(
        "INSERT INTO grants (
            capability_name, short_name, target_kind, target_id, user_id,
            granted_by, state, requested_at, changed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            grant.names.capability_name,
            grant.names.short_name,
            grant.target.kind.as_str(),
            grant.target.id.0,
            grant.user.map(|u| u.0),
            grant.granted_by.map(|u| u.0),
            grant.state.as_str(),
            grant.requested_at,
            grant.changed_at,
        ],
    )?;

    let id = GrantId(conn.last_insert_rowid());
    Ok(grant.clone().into_record(id))
}

// Writes only the mutable columns; target and requested_at stay as inserted
fn write_back(conn: &Connection, record: &GrantRecord) -> Result<()> {
    let updated = conn.execute(
        "UPDATE grants SET
            capability_name = ?1, short_name = ?2, user_id = ?3,
            granted_by = ?4, state = ?5, changed_at = ?6
         WHERE grant_id = ?7",
        params![
            record.capability_name,
            record.short_name,
            record.user.map(|u| u.0),
            record.granted_by.map(|u| u.0),
            record.state.as_str(),
            record.changed_at,
            record.id.0,
        ],
    )?;

    if updated != 1 {
        return Err(StoreError::InvalidData(format!(
            "grant {} vanished during update",
            record.id
        )));
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_grant(&self, id: GrantId) -> Result<Option<GrantRecord>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM grants WHERE grant_id = ?1", GRANT_COLUMNS),
                params![id.0],
                row_to_grant,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_grants(&self, filter: &GrantFilter) -> Result<Vec<GrantRecord>> {
        let filter = filter.clone();
        self.run(move |conn| query_grants(conn, &filter)).await
    }

    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantRecord> {
        let grant = grant.clone();
        self.run(move |conn| insert_row(conn, &grant)).await
    }

    async fn update_grants(
        &self,
        filter: &GrantFilter,
        mut apply: GrantMutator,
    ) -> Result<Vec<GrantRecord>> {
        let filter = filter.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut changed = Vec::new();
            for record in query_grants(&tx, &filter)? {
                if let Some(updated) = mutate(&record, &mut apply) {
                    write_back(&tx, &updated)?;
                    changed.push(updated);
                }
            }

            tx.commit()?;
            Ok(changed)
        })
        .await
    }

    async fn upsert_grant(
        &self,
        filter: &GrantFilter,
        grant: NewGrant,
        mut apply: GrantMutator,
    ) -> Result<Upsert> {
        let filter = filter.clone().limit(1);

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let outcome = match query_grants(&tx, &filter)?.into_iter().next() {
                Some(existing) => match mutate(&existing, &mut apply) {
                    Some(updated) => {
                        write_back(&tx, &updated)?;
                        Upsert::Updated(updated)
                    }
                    None => Upsert::Unchanged(existing),
                },
                None => Upsert::Inserted(insert_row(&tx, &grant)?),
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn delete_grants(&self, filter: &GrantFilter) -> Result<usize> {
        let filter = filter.clone();

        self.run(move |conn| {
            let (where_sql, values) = where_clause(&filter);
            let sql = format!(
                "DELETE FROM grants WHERE grant_id IN (
                    SELECT grant_id FROM grants{} ORDER BY grant_id{}
                )",
                where_sql,
                limit_clause(&filter)
            );

            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute(&sql, params_from_iter(values.iter()))?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantbook_core::{DisplayNames, GrantState};

    fn target(id: i64) -> TargetRef {
        TargetRef::new(TargetKind::new("docs.section").unwrap(), TargetId(id))
    }

    fn request(user: i64, target_id: i64) -> NewGrant {
        NewGrant::request(
            UserId(user),
            target(target_id),
            DisplayNames::new(format!("Docs: {}", target_id), "Docs"),
            1_000,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_grant() {
        let store = SqliteStore::open_memory().unwrap();

        let inserted = store.insert_grant(&request(1, 10)).await.unwrap();
        let fetched = store.get_grant(inserted.id).await.unwrap().unwrap();

        assert_eq!(fetched, inserted);
        assert_eq!(fetched.state, GrantState::Pending);
        assert_eq!(fetched.capability_name, "Docs: 10");
        assert!(store.get_grant(GrantId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_filter() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_grant(&request(1, 10)).await.unwrap();
        store.insert_grant(&request(1, 11)).await.unwrap();
        store.insert_grant(&request(2, 10)).await.unwrap();

        let mut unassigned = request(3, 12);
        unassigned.user = None;
        store.insert_grant(&unassigned).await.unwrap();

        let for_user = store.find_grants(&GrantFilter::for_user(UserId(1))).await.unwrap();
        assert_eq!(for_user.len(), 2);
        assert!(for_user[0].id < for_user[1].id);

        let on_target = store
            .find_grants(&GrantFilter::all().target(&target(10)))
            .await
            .unwrap();
        assert_eq!(on_target.len(), 2);

        let orphans = store.find_grants(&GrantFilter::unassigned()).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].target, target(12));

        let active = store
            .find_grants(&GrantFilter::all().state(GrantState::Active))
            .await
            .unwrap();
        assert!(active.is_empty());

        let limited = store.find_grants(&GrantFilter::all().limit(3)).await.unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn test_update_only_touches_changed_rows() {
        let store = SqliteStore::open_memory().unwrap();
        let a = store.insert_grant(&request(1, 10)).await.unwrap();
        let b = store.insert_grant(&request(1, 11)).await.unwrap();
        let approve_id = a.id;

        let changed = store
            .update_grants(
                &GrantFilter::for_user(UserId(1)),
                Box::new(move |g: &mut GrantRecord| {
                    if g.id != approve_id {
                        return false;
                    }
                    g.approve(UserId(99), 2_000);
                    true
                }),
            )
            .await
            .unwrap();

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, a.id);

        let a = store.get_grant(a.id).await.unwrap().unwrap();
        let b = store.get_grant(b.id).await.unwrap().unwrap();
        assert_eq!(a.state, GrantState::Active);
        assert_eq!(a.granted_by, Some(UserId(99)));
        assert_eq!(b.state, GrantState::Pending);
    }

    #[tokio::test]
    async fn test_update_never_rewrites_target() {
        let store = SqliteStore::open_memory().unwrap();
        let inserted = store.insert_grant(&request(1, 10)).await.unwrap();

        let changed = store
            .update_grants(
                &GrantFilter::all(),
                Box::new(|g: &mut GrantRecord| {
                    g.target = target(77);
                    g.requested_at = 5;
                    true
                }),
            )
            .await
            .unwrap();
        assert_eq!(changed[0].target, target(10));

        let stored = store.get_grant(inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.target, target(10));
        assert_eq!(stored.requested_at, 1_000);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let store = SqliteStore::open_memory().unwrap();
        let filter = GrantFilter::for_user(UserId(1)).target(&target(10));

        let first = store
            .upsert_grant(&filter, request(1, 10), Box::new(|g: &mut GrantRecord| g.rerequest()))
            .await
            .unwrap();
        assert!(matches!(first, Upsert::Inserted(_)));

        let second = store
            .upsert_grant(&filter, request(1, 10), Box::new(|g: &mut GrantRecord| g.rerequest()))
            .await
            .unwrap();
        assert!(matches!(second, Upsert::Unchanged(ref r) if r.id == first.record().id));

        let third = store
            .upsert_grant(
                &filter,
                request(1, 10),
                Box::new(|g: &mut GrantRecord| {
                    g.approve(UserId(5), 3_000);
                    true
                }),
            )
            .await
            .unwrap();
        assert!(matches!(third, Upsert::Updated(ref r) if r.is_active()));

        assert_eq!(store.find_grants(&GrantFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_grants() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_grant(&request(1, 10)).await.unwrap();
        store.insert_grant(&request(1, 10)).await.unwrap();
        store.insert_grant(&request(1, 11)).await.unwrap();

        let removed = store
            .delete_grants(&GrantFilter::for_user(UserId(1)).target(&target(10)))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let removed = store
            .delete_grants(&GrantFilter::for_user(UserId(2)))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        assert_eq!(store.find_grants(&GrantFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_grants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_grant(&request(1, 10)).await.unwrap().id
        };

        let store = SqliteStore::open_with(&path, &StoreConfig { busy_timeout_ms: 100 }).unwrap();
        let fetched = store.get_grant(id).await.unwrap().unwrap();
        assert_eq!(fetched.user, Some(UserId(1)));
    }

    #[tokio::test]
    async fn test_panicking_mutator_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_grant(&request(1, 1)).await.unwrap();
        store.insert_grant(&request(1, 2)).await.unwrap();

        let apply: GrantMutator = Box::new(|g: &mut GrantRecord| {
            if g.target.id == TargetId(2) {
                panic!("mutator failed on grant {}", g.id);
            }
            g.revoke(2_000)
        });
        let result = store
            .update_grants(&GrantFilter::for_user(UserId(1)), apply)
            .await;
        assert!(matches!(result, Err(StoreError::Task(_))));

        // the first grant's write was rolled back with the transaction
        let all = store.find_grants(&GrantFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|g| g.state == GrantState::Pending));

        // the connection lock is still usable
        let c = store.insert_grant(&request(2, 1)).await.unwrap();
        assert_eq!(c.id, GrantId(3));
    }
}
