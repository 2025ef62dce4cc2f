use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::PasswordConfig;

/// Argon2id hasher. Produces PHC strings that carry their own salt and cost,
/// so verification never needs the configuration that created a hash.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Returns `false` for a mismatch and for any stored value that is not a
    /// parseable argon2 PHC string.
    pub fn verify(&self, plain: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "stored password hash is malformed");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Runs [`hash`](Self::hash) on the blocking pool.
    pub async fn spawn_hash(&self, plain: String) -> anyhow::Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("password hashing task failed")?
    }

    /// Runs [`verify`](Self::verify) on the blocking pool.
    pub async fn spawn_verify(&self, plain: String, stored: String) -> anyhow::Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &stored))
            .await
            .context("password verification task failed")
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("valid test params")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = test_hasher();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(hasher.verify(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = test_hasher();
        let hash = hasher.hash("correct-horse-battery-staple").expect("hash");
        assert!(!hasher.verify("wrong-password", &hash));
    }

    #[test]
    fn verify_fails_closed_on_malformed_hash() {
        let hasher = test_hasher();
        assert!(!hasher.verify("anything", "not-a-valid-hash"));
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "$argon2id$v=19$m=1024,t=1,p=1$garbage"));
    }

    #[test]
    fn hashing_is_salted_per_call() {
        let hasher = test_hasher();
        let a = hasher.hash("secret1").expect("hash a");
        let b = hasher.hash("secret1").expect("hash b");
        assert_ne!(a, b);
        assert!(hasher.verify("secret1", &a));
        assert!(hasher.verify("secret1", &b));
    }

    #[test]
    fn cost_is_embedded_in_hash() {
        let hasher = test_hasher();
        let hash = hasher.hash("secret1").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024,t=1,p=1"));

        // A hasher with different parameters still verifies it.
        let other = PasswordHasher::new(&PasswordConfig::default()).expect("defaults");
        assert!(other.verify("secret1", &hash));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = PasswordHasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap_err();
        assert!(err.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn background_hash_and_verify() {
        let hasher = test_hasher();
        let hash = hasher.spawn_hash("secret1".into()).await.expect("hash");
        assert!(hasher.spawn_verify("secret1".into(), hash.clone()).await.unwrap());
        assert!(!hasher.spawn_verify("secret2".into(), hash).await.unwrap());
    }
}
