/// Postgres credential store
///
/// Refresh tokens are never stored in plaintext: the table holds their
/// SHA-256 hash. Revocation deletes the row.

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::CredentialStore;
use crate::auth::password::verify_password;
use crate::error::StoreError;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn resolve_user(&self, email: &str, password: &str) -> Result<Uuid, StoreError> {
        let (user_id, password_hash) = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::InvalidCredentials)?;

        // Keep bcrypt off the async workers.
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| StoreError::Storage(format!("Password verification task failed: {}", e)))??;

        if !matches {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(user_id)
    }

    async fn is_registered(&self, refresh_token: &str) -> Result<(), StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE token_hash = $1)",
        )
        .bind(hash_token(refresh_token))
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(StoreError::NotRegistered)
        }
    }

    async fn save(&self, refresh_token: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, created_at)
            VALUES ($1, $2)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(hash_token(refresh_token))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(refresh_token))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotRegistered);
        }
        Ok(())
    }

    async fn get_role(&self, user_id: Uuid) -> Result<String, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }
}
