//! The authentication contract consumed by the token/session layer.

use std::collections::HashSet;

use async_trait::async_trait;

/// The three-method façade the external token layer calls during request
/// handling. Administrative mutation lives on the concrete store, not here.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Storage-level failure type surfaced by the read operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check a username/password pair, returning the username on success.
    /// Success requires an enabled account and a matching password.
    ///
    /// Fail-closed: storage or verification failures during the check must
    /// resolve to `None`, indistinguishable from a wrong password.
    async fn authenticate(&self, username: &str, password: &str) -> Option<String>;

    /// Whether the user exists and is enabled.
    async fn is_valid_user(&self, user: &str) -> Result<bool, Self::Error>;

    /// The set of role names held by the user.
    async fn authorizations(&self, user: &str) -> Result<HashSet<String>, Self::Error>;
}
