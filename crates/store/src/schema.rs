//! Schema lifecycle: create-if-absent tables.
//!
//! Bootstrap inspects the database for the three expected tables and creates
//! every missing one in a single transactional DDL batch, so a failure cannot
//! leave a partial schema behind. Existing tables are never altered.

use std::collections::HashSet;

use sqlx::{Row, SqlitePool};

use crate::error::{StoreError, StoreResult, map_sqlx_error};

/// Name uniqueness on `users` is the storage-level guard: concurrent creators
/// racing on the same name resolve to exactly one winner.
const USERS_DDL: &str = "\
CREATE TABLE users (
    user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT    NOT NULL UNIQUE,
    salt            TEXT    NOT NULL,
    hashed_password TEXT    NOT NULL,
    is_enabled      BOOLEAN NOT NULL
)";

const ROLES_DDL: &str = "\
CREATE TABLE roles (
    role_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    description TEXT
)";

/// Memberships cascade on delete of either side, so removing a user or role
/// can never leave orphan rows.
const MEMBERS_DDL: &str = "\
CREATE TABLE members (
    member_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
    role_id   INTEGER NOT NULL REFERENCES roles (role_id) ON DELETE CASCADE,
    UNIQUE (user_id, role_id)
)";

const EXPECTED_TABLES: [(&str, &str); 3] = [
    ("users", USERS_DDL),
    ("roles", ROLES_DDL),
    ("members", MEMBERS_DDL),
];

/// Create any of the expected tables that do not yet exist.
///
/// All missing tables are created together at the end, not one by one.
pub(crate) async fn create_missing_tables(pool: &SqlitePool) -> StoreResult<()> {
    let existing = existing_tables(pool).await?;

    let missing: Vec<&str> = EXPECTED_TABLES
        .iter()
        .filter(|(name, _)| !existing.contains(*name))
        .map(|(_, ddl)| *ddl)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    tracing::info!(tables = missing.len(), "creating missing auth tables");

    let batch = missing.join(";\n");

    let mut tx = pool
        .begin()
        .await
        .map_err(|err| StoreError::Bootstrap(err.to_string()))?;
    sqlx::raw_sql(&batch)
        .execute(&mut *tx)
        .await
        .map_err(|err| StoreError::Bootstrap(err.to_string()))?;
    tx.commit()
        .await
        .map_err(|err| StoreError::Bootstrap(err.to_string()))?;

    Ok(())
}

async fn existing_tables(pool: &SqlitePool) -> StoreResult<HashSet<String>> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await
        .map_err(|err| map_sqlx_error("inspect_schema", err))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|err| map_sqlx_error("inspect_schema", err))
        })
        .collect()
}
