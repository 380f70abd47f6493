/// Credential store
///
/// Contract for user lookup, refresh token persistence and revocation,
/// and role lookup. Calls may block on external I/O and are not retried.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// A registered user, as loaded for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// A persisted refresh token. Absence from the store means revoked or
/// never issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve an email/password pair to a user ID.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a password mismatch
    async fn resolve_user(&self, email: &str, password: &str) -> Result<Uuid, StoreError>;

    /// # Errors
    /// `NotRegistered` if the token is absent or revoked
    async fn is_registered(&self, refresh_token: &str) -> Result<(), StoreError>;

    /// Persist a new refresh record stamped with the current time.
    async fn save(&self, refresh_token: &str) -> Result<(), StoreError>;

    /// # Errors
    /// `NotRegistered` if the token is not currently registered
    async fn revoke(&self, refresh_token: &str) -> Result<(), StoreError>;

    /// # Errors
    /// `NotFound` if the user does not exist
    async fn get_role(&self, user_id: Uuid) -> Result<String, StoreError>;
}
