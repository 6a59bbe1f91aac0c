//! Database module: persisted entities and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: rows as read back from SQLite.
//! - `repo`: SQL-only functions enforcing the key uniqueness the sync engine
//!   relies on.
//!
//! Callers import from `syncr::db`; the repository API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{LocalRecord, Relation};
