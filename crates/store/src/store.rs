//! The SQLite-backed auth store.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tracing::instrument;

use rolevault_core::{AuthService, hash_password, verify_password};

use crate::error::{StoreResult, is_unique_violation, map_sqlx_error};
use crate::schema;

/// Administrative account seeded on first bootstrap.
pub const DEFAULT_ADMIN: &str = "admin";

/// Default password of the seeded account. Deployments are expected to
/// change it immediately; `open` logs a warning when the seed fires.
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Role-based credential and authorization store over a single SQLite
/// database.
///
/// Cloning is cheap (the pool is reference counted) and all operations are
/// safe to issue concurrently; the database's own transaction and locking
/// discipline is the sole serialization mechanism. Uniqueness of user names,
/// role names and membership pairs is enforced by storage constraints, so
/// racing creators resolve to one winner and losers observe `false`.
#[derive(Debug, Clone)]
pub struct SqlAuthStore {
    pool: SqlitePool,
}

impl SqlAuthStore {
    /// Connect to the database named by `url`, create any missing tables and
    /// seed the default administrative account if absent.
    ///
    /// This is the only constructor, so every live store is fully
    /// bootstrapped. Not safe to call concurrently from multiple processes
    /// against an empty database; deployments must serialize first-run
    /// bootstrap externally.
    #[instrument(err)]
    pub async fn open(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|err| map_sqlx_error("connect", err))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|err| map_sqlx_error("connect", err))?;

        schema::create_missing_tables(&pool).await?;

        let store = Self { pool };
        store.seed_default_admin().await?;
        Ok(store)
    }

    /// Seed `admin` if and only if no such user exists. Never overwrites or
    /// resets an existing account.
    async fn seed_default_admin(&self) -> StoreResult<()> {
        if self.user_exists(DEFAULT_ADMIN).await? {
            return Ok(());
        }

        tracing::warn!(
            account = DEFAULT_ADMIN,
            "seeding default administrative account with a well-known password; change it"
        );
        self.add_user(DEFAULT_ADMIN, DEFAULT_ADMIN_PASSWORD, true)
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credential store
    // ─────────────────────────────────────────────────────────────────────

    /// Whether a user row with this name exists, enabled or not.
    #[instrument(skip(self), err)]
    pub async fn user_exists(&self, name: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT user_id FROM users WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("user_exists", err))?;
        Ok(row.is_some())
    }

    /// Whether the user exists *and* is enabled.
    #[instrument(skip(self), err)]
    pub async fn user_is_enabled(&self, name: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT is_enabled FROM users WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("user_is_enabled", err))?;

        match row {
            Some(row) => row
                .try_get("is_enabled")
                .map_err(|err| map_sqlx_error("user_is_enabled", err)),
            None => Ok(false),
        }
    }

    /// Verify a password against the stored salt/digest pair.
    ///
    /// A missing user and a wrong password both yield `false`; callers must
    /// not be able to probe for account existence through this path.
    #[instrument(skip(self, password), err)]
    pub async fn check_password(&self, name: &str, password: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT salt, hashed_password FROM users WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("check_password", err))?;

        let Some(row) = row else {
            return Ok(false);
        };

        let salt: String = row
            .try_get("salt")
            .map_err(|err| map_sqlx_error("check_password", err))?;
        let digest: String = row
            .try_get("hashed_password")
            .map_err(|err| map_sqlx_error("check_password", err))?;

        Ok(verify_password(password, &salt, &digest))
    }

    /// Insert a new user with a freshly salted password hash.
    ///
    /// Returns `false` when the name is already taken; any other storage
    /// failure is fatal.
    #[instrument(skip(self, password), err)]
    pub async fn add_user(&self, name: &str, password: &str, is_enabled: bool) -> StoreResult<bool> {
        let hash = hash_password(password);

        let result = sqlx::query(
            "INSERT INTO users (name, salt, hashed_password, is_enabled)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(name)
        .bind(&hash.salt)
        .bind(&hash.digest)
        .bind(is_enabled)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(map_sqlx_error("add_user", err)),
        }
    }

    /// Re-hash with a fresh salt. `true` iff exactly one row was updated;
    /// `false` when the user does not exist.
    #[instrument(skip(self, password), err)]
    pub async fn change_password(&self, name: &str, password: &str) -> StoreResult<bool> {
        let hash = hash_password(password);

        let result = sqlx::query("UPDATE users SET salt = ?1, hashed_password = ?2 WHERE name = ?3")
            .bind(&hash.salt)
            .bind(&hash.digest)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("change_password", err))?;

        Ok(result.rows_affected() == 1)
    }

    /// Remove the user row. Memberships cascade. `true` iff one row removed.
    #[instrument(skip(self), err)]
    pub async fn delete_user(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("delete_user", err))?;

        Ok(result.rows_affected() == 1)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Role store
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a role. The description is set only at creation; there is no
    /// update operation. Returns `false` on a duplicate name.
    #[instrument(skip(self), err)]
    pub async fn add_role(&self, name: &str, description: Option<&str>) -> StoreResult<bool> {
        let result = sqlx::query("INSERT INTO roles (name, description) VALUES (?1, ?2)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(map_sqlx_error("add_role", err)),
        }
    }

    /// Remove the role row. Memberships cascade. `true` iff one row removed.
    #[instrument(skip(self), err)]
    pub async fn delete_role(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("delete_role", err))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    pub async fn role_exists(&self, name: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT role_id FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error("role_exists", err))?;
        Ok(row.is_some())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Membership engine
    // ─────────────────────────────────────────────────────────────────────

    /// Whether a membership row links the named user and role.
    #[instrument(skip(self), err)]
    pub async fn has_role(&self, user: &str, role: &str) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT m.member_id
             FROM members m
             JOIN users u ON u.user_id = m.user_id AND u.name = ?1
             JOIN roles r ON r.role_id = m.role_id AND r.name = ?2",
        )
        .bind(user)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("has_role", err))?;

        Ok(row.is_some())
    }

    /// Link the named user and role, resolving both names at insert time.
    ///
    /// `true` iff exactly one row was inserted. An existing pairing and an
    /// unresolvable name both collapse to `false`.
    #[instrument(skip(self), err)]
    pub async fn grant(&self, user: &str, role: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO members (user_id, role_id)
             SELECT u.user_id, r.role_id
             FROM users u, roles r
             WHERE u.name = ?1 AND r.name = ?2",
        )
        .bind(user)
        .bind(role)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(map_sqlx_error("grant", err)),
        }
    }

    /// Delete the membership linking the named user and role.
    ///
    /// The role side resolves through the role's identity column into
    /// `members.role_id`, never the membership's own surrogate id.
    /// `true` iff exactly one row was removed.
    #[instrument(skip(self), err)]
    pub async fn revoke(&self, user: &str, role: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM members
             WHERE user_id = (SELECT user_id FROM users WHERE name = ?1)
               AND role_id = (SELECT role_id FROM roles WHERE name = ?2)",
        )
        .bind(user)
        .bind(role)
        .execute(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("revoke", err))?;

        Ok(result.rows_affected() == 1)
    }

    /// All user names holding the given role.
    #[instrument(skip(self), err)]
    pub async fn role_users(&self, role: &str) -> StoreResult<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT u.name
             FROM users u
             JOIN members m ON m.user_id = u.user_id
             JOIN roles r ON r.role_id = m.role_id
             WHERE r.name = ?1",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("role_users", err))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|err| map_sqlx_error("role_users", err))
            })
            .collect()
    }

    /// All role names held by the given user.
    #[instrument(skip(self), err)]
    pub async fn user_roles(&self, user: &str) -> StoreResult<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT r.name
             FROM roles r
             JOIN members m ON m.role_id = r.role_id
             JOIN users u ON u.user_id = m.user_id
             WHERE u.name = ?1",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("user_roles", err))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|err| map_sqlx_error("user_roles", err))
            })
            .collect()
    }

    /// Atomically replace the user's entire role set with `roles`.
    ///
    /// Runs as one transaction: delete every membership the user holds, then
    /// insert one membership per name in `roles` that resolves to an existing
    /// role. A concurrent reader never observes the intermediate zero-role
    /// state, and a failure retains nothing from the partial replacement.
    ///
    /// Returns `true` iff at least one membership was inserted. That is the
    /// literal contract: replacing with an empty set, or a set of unknown
    /// role names, clears the user's roles but reports `false`.
    #[instrument(skip(self), err)]
    pub async fn update_user_roles(&self, user: &str, roles: &HashSet<String>) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| map_sqlx_error("update_user_roles", err))?;

        sqlx::query("DELETE FROM members WHERE user_id IN (SELECT user_id FROM users WHERE name = ?1)")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_sqlx_error("update_user_roles", err))?;

        let mut inserted = 0;
        for role in roles {
            let result = sqlx::query(
                "INSERT INTO members (user_id, role_id)
                 SELECT u.user_id, r.role_id
                 FROM users u, roles r
                 WHERE u.name = ?1 AND r.name = ?2",
            )
            .bind(user)
            .bind(role)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_sqlx_error("update_user_roles", err))?;

            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|err| map_sqlx_error("update_user_roles", err))?;

        Ok(inserted > 0)
    }

    /// Dump the full membership relation.
    ///
    /// With `roles_by_users = true` the map groups role name → member user
    /// names; with `false` it groups user name → held role names. Built by
    /// streaming the full three-way join, no pagination.
    #[instrument(skip(self), err)]
    pub async fn permissions(
        &self,
        roles_by_users: bool,
    ) -> StoreResult<HashMap<String, HashSet<String>>> {
        let rows = sqlx::query(
            "SELECT u.name AS user_name, r.name AS role_name
             FROM members m
             JOIN users u ON u.user_id = m.user_id
             JOIN roles r ON r.role_id = m.role_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("permissions", err))?;

        let mut grouped: HashMap<String, HashSet<String>> = HashMap::new();
        for row in rows {
            let user: String = row
                .try_get("user_name")
                .map_err(|err| map_sqlx_error("permissions", err))?;
            let role: String = row
                .try_get("role_name")
                .map_err(|err| map_sqlx_error("permissions", err))?;

            let (key, value) = if roles_by_users { (role, user) } else { (user, role) };
            grouped.entry(key).or_default().insert(value);
        }

        Ok(grouped)
    }
}

#[async_trait]
impl AuthService for SqlAuthStore {
    type Error = crate::StoreError;

    /// Success requires the account to be enabled *and* the password to
    /// verify. Fail closed: a storage failure during the check is logged and
    /// denied, indistinguishable to the caller from a wrong password.
    async fn authenticate(&self, username: &str, password: &str) -> Option<String> {
        let checked = async {
            // Both legs always run, so a disabled account costs the same as
            // a wrong password.
            let enabled = self.user_is_enabled(username).await?;
            let password_ok = self.check_password(username, password).await?;
            Ok::<_, crate::StoreError>(enabled && password_ok)
        }
        .await;

        match checked {
            Ok(true) => Some(username.to_string()),
            Ok(false) => None,
            Err(err) => {
                tracing::warn!(username, error = %err, "credential check failed, denying");
                None
            }
        }
    }

    async fn is_valid_user(&self, user: &str) -> Result<bool, Self::Error> {
        self.user_is_enabled(user).await
    }

    async fn authorizations(&self, user: &str) -> Result<HashSet<String>, Self::Error> {
        self.user_roles(user).await
    }
}
