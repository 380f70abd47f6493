/// Password hashing and verification
///
/// bcrypt hashes; `verify` performs the constant-time comparison.

use bcrypt::{hash, verify};

use crate::error::StoreError;

pub use bcrypt::DEFAULT_COST;

/// Hash a password with the given bcrypt cost.
///
/// # Errors
/// Returns `StoreError::Storage` if bcrypt rejects the input or cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, StoreError> {
    hash(password, cost).map_err(|e| StoreError::Storage(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// A mismatch is `Ok(false)`; an unreadable hash is an error.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, StoreError> {
    verify(password, password_hash)
        .map_err(|e| StoreError::Storage(format!("Password verification failed: {}", e)))
}
