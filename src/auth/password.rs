//! Password hashing and verification
//!
//! Uses bcrypt for secure password hashing. The work runs on the blocking
//! pool behind a semaphore so a burst of logins cannot starve the runtime.

use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// bcrypt ignores everything past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    permits: Arc<Semaphore>,
}

impl PasswordHasher {
    pub fn new(cost: u32, workers: usize) -> Self {
        Self {
            cost,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Hash a password with a fresh random salt.
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(too_long());
        }
        let cost = self.cost;
        let password = password.to_owned();
        self.run(move || bcrypt::hash(password, cost)).await
    }

    /// Verify a password against a stored hash. Passwords bcrypt would
    /// truncate never match.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        let password = password.to_owned();
        let hash = hash.to_owned();
        self.run(move || bcrypt::verify(password, &hash)).await
    }

    async fn run<T, F>(&self, job: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
        T: Send + 'static,
    {
        // The permit travels with the blocking job, so it stays held even if
        // the awaiting request is dropped.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("Hash worker pool closed: {}", e)))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
            .await
            .map_err(|e| AppError::Internal(format!("Hash worker panicked: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }
}

fn too_long() -> AppError {
    AppError::Validation(format!("Password must be at most {} bytes", MAX_PASSWORD_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4, 2)
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("Secret123").await.unwrap();

        assert_ne!(hash, "Secret123");
        assert!(hasher.verify("Secret123", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_single_bit_flip_fails() {
        let hasher = hasher();
        let password = "Secret123";
        let hash = hasher.hash(password).await.unwrap();

        for i in 0..password.len() {
            let mut bytes = password.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(!hasher.verify(&mutated, &hash).await.unwrap(), "{mutated} matched");
        }
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let hasher = hasher();
        let a = hasher.hash("same-password").await.unwrap();
        let b = hasher.hash("same-password").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_cost_is_encoded_in_hash() {
        let hash = PasswordHasher::new(10, 1).hash("pw").await.unwrap();
        assert!(hash.starts_with("$2b$10$"));
    }

    #[tokio::test]
    async fn test_overlong_password_is_refused() {
        let hasher = hasher();
        let long = "a".repeat(80);

        assert!(matches!(hasher.hash(&long).await, Err(AppError::Validation(_))));

        // A stored 72-byte hash must not accept a longer variant
        let hash = hasher.hash(&long[..MAX_PASSWORD_BYTES]).await.unwrap();
        let mut mutated = long.into_bytes();
        mutated[75] ^= 0x01;
        let mutated = String::from_utf8(mutated).unwrap();
        assert!(!hasher.verify(&mutated, &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_hash_keeps_worker_permit() {
        let hasher = PasswordHasher::new(12, 1);
        let permits = hasher.permits.clone();

        let task = tokio::spawn({
            let hasher = hasher.clone();
            async move { hasher.hash("Secret123").await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while permits.available_permits() != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(permits.available_permits(), 0, "bcrypt is still running");

        tokio::time::timeout(Duration::from_secs(30), async {
            while permits.available_permits() != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_internal_error() {
        let result = hasher().verify("pw", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
