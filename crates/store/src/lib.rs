//! `rolevault-store` — SQLite-backed credential and authorization engine.
//!
//! One type, [`SqlAuthStore`], owns the connection pool and implements the
//! full administrative surface (user/role CRUD, membership grants) plus the
//! [`rolevault_core::AuthService`] façade consumed by the token layer.
//! [`SqlAuthStore::open`] connects *and* bootstraps the schema, so a store
//! with missing tables is unrepresentable.

pub mod error;
mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{DEFAULT_ADMIN, SqlAuthStore};
