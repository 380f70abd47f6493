//! Process-local credential store for tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{CredentialStore, RefreshRecord, User};
use crate::auth::password::{hash_password, verify_password, DEFAULT_COST};
use crate::error::StoreError;

struct StoredUser {
    user: User,
    role: String,
}

pub struct InMemoryCredentialStore {
    /// Keyed by email
    users: RwLock<HashMap<String, StoredUser>>,
    refresh_tokens: Mutex<HashMap<String, RefreshRecord>>,
    hash_cost: u32,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("credential store lock poisoned".to_string())
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_hash_cost(DEFAULT_COST)
    }

    /// Store hashing new passwords with the given bcrypt cost.
    pub fn with_hash_cost(hash_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            hash_cost,
        }
    }

    /// Register a user and return its generated ID.
    pub fn add_user(&self, email: &str, password: &str, role: &str) -> Result<Uuid, StoreError> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash_password(password, self.hash_cost)?,
        };
        let id = user.id;

        self.users.write().map_err(poisoned)?.insert(
            email.to_string(),
            StoredUser {
                user,
                role: role.to_string(),
            },
        );
        Ok(id)
    }

    pub fn set_role(&self, user_id: Uuid, role: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(poisoned)?;
        let stored = users
            .values_mut()
            .find(|stored| stored.user.id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;
        stored.role = role.to_string();
        Ok(())
    }

    #[cfg(test)]
    fn refresh_record(&self, refresh_token: &str) -> Option<RefreshRecord> {
        self.refresh_tokens
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(refresh_token).cloned())
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn resolve_user(&self, email: &str, password: &str) -> Result<Uuid, StoreError> {
        let user = self
            .users
            .read()
            .map_err(poisoned)?
            .get(email)
            .map(|stored| stored.user.clone())
            .ok_or(StoreError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(StoreError::InvalidCredentials);
        }
        Ok(user.id)
    }

    async fn is_registered(&self, refresh_token: &str) -> Result<(), StoreError> {
        let tokens = self.refresh_tokens.lock().map_err(poisoned)?;
        if tokens.contains_key(refresh_token) {
            Ok(())
        } else {
            Err(StoreError::NotRegistered)
        }
    }

    async fn save(&self, refresh_token: &str) -> Result<(), StoreError> {
        let record = RefreshRecord {
            refresh_token: refresh_token.to_string(),
            created_at: Utc::now(),
        };
        self.refresh_tokens
            .lock()
            .map_err(poisoned)?
            .insert(refresh_token.to_string(), record);
        Ok(())
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), StoreError> {
        self.refresh_tokens
            .lock()
            .map_err(poisoned)?
            .remove(refresh_token)
            .map(|_| ())
            .ok_or(StoreError::NotRegistered)
    }

    async fn get_role(&self, user_id: Uuid) -> Result<String, StoreError> {
        self.users
            .read()
            .map_err(poisoned)?
            .values()
            .find(|stored| stored.user.id == user_id)
            .map(|stored| stored.role.clone())
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }
}
