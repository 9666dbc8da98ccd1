//! Session store database layer — SurrealDB connection management,
//! schema migrations and the [`SurrealSessionStore`] implementation of
//! [`sessionstore_core::SessionStore`].
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - The store itself ([`SurrealSessionStore`], [`StoreConfig`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager, RootCredentials};
pub use error::DbError;
pub use repository::{StoreConfig, SurrealSessionStore};
pub use schema::{run_migrations, schema_v1};
