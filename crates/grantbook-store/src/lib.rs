//! # Grantbook Store
//!
//! Storage abstraction for the Grantbook registry. Provides a trait-based
//! interface for grant persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts the grants table behind the [`Store`] trait, so the
//! registry is storage-agnostic. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`GrantFilter`] - Which records an operation applies to
//! - [`GrantMutator`] - A read-modify-write step run inside one transaction
//! - [`Upsert`] - Outcome of a find-or-create write
//!
//! ## Usage
//!
//! ```rust,no_run
//! use grantbook_store::{GrantFilter, SqliteStore, Store};
//! use grantbook_core::{GrantState, UserId};
//!
//! async fn example() {
//!     let store = SqliteStore::open("grants.db").unwrap();
//!
//!     let active = store
//!         .find_grants(&GrantFilter::for_user(UserId(7)).state(GrantState::Active))
//!         .await
//!         .unwrap();
//!     println!("{} active grants", active.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic transitions**: every read-modify-write runs in one transaction
//! - **Immutable target**: updates never rewrite the target, id or request time
//! - **No retries**: storage errors surface unchanged to the caller

pub mod config;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{GrantFilter, GrantMutator, Store, Upsert, UserFilter};

/// Current time in Unix milliseconds, the unit of every stored timestamp.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
