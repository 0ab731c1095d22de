//! `rolevault-core` — pure credential domain layer.
//!
//! This crate is intentionally decoupled from storage and transport: it holds
//! the password hashing primitives and the `AuthService` contract consumed by
//! the external token/session layer.

pub mod password;
pub mod service;

pub use password::{PasswordHash, hash_password, verify_password};
pub use service::AuthService;
