//! # Grantbook Testkit
//!
//! Testing utilities for Grantbook.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a registry wired to sample target kinds and a user directory
//! - **Generators**: proptest strategies producing sequences of lifecycle operations
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use grantbook_testkit::fixtures::{TestFixture, ADMIN, ALICE};
//!
//! let fixture = TestFixture::new();
//! let handbook = fixture.section("Docs", "Handbook");
//! fixture.registry.grant(ALICE, &handbook, ADMIN).await?;
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use grantbook_testkit::generators::{apply_op, ops};
//!
//! proptest! {
//!     #[test]
//!     fn records_stay_legal(ops in ops(32)) {
//!         // replay `ops` against a fixture and inspect the records
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{BrokenTarget, Directory, Section, SectionCatalog, TestFixture};
pub use generators::{apply_op, expected_state, Op};
