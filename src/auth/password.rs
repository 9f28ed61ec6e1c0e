//! bcrypt password digests.
//!
//! Hashing is CPU bound, so the async helpers run it on the blocking pool.

use bcrypt::{BcryptError, hash, verify};

use crate::error::ApiError;

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(raw_password: &str, cost: u32) -> Result<Self, BcryptError> {
        hash(raw_password, cost).map(Self)
    }

    /// Wrap a digest loaded from the store.
    pub fn from_stored(digest: String) -> Self {
        Self(digest)
    }

    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub async fn hash_blocking(raw_password: String, cost: u32) -> Result<Self, ApiError> {
        tokio::task::spawn_blocking(move || Self::new(&raw_password, cost))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub async fn verify_blocking(self, raw_password: String) -> Result<bool, ApiError> {
        tokio::task::spawn_blocking(move || self.verify(&raw_password))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_original_only() {
        let hashed = PasswordHash::new("pw123456", 4).unwrap();
        assert!(hashed.verify("pw123456").unwrap());
        assert!(!hashed.verify("pw1234567").unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = PasswordHash::new("pw123456", 4).unwrap();
        let b = PasswordHash::new("pw123456", 4).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn blocking_helpers_round_trip() {
        let hashed = PasswordHash::hash_blocking("secret99".to_string(), 4).await.unwrap();
        let stored = PasswordHash::from_stored(hashed.into_string());
        assert!(stored.verify_blocking("secret99".to_string()).await.unwrap());
    }
}
