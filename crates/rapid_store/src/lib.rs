//! Document store abstraction for RapidNotify.
//!
//! The notification core reads and writes three collections (`pushTokens`,
//! `notificationPreferences`, `notificationHistory`) through the
//! [`DocumentStore`] trait defined here, never through a concrete SDK. Two
//! backends are provided: an in-memory store for tests and local
//! development, and a SQLite-backed store (behind the default `sqlite`
//! feature) for deployments.

pub mod error;
pub mod factory;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sql;
pub mod store;

pub use error::StoreError;
pub use factory::build_store;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sql::SqliteStore;
pub use store::{merge_value, Document, DocumentStore, StoreEvent};
