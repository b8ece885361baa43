use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

/// An Argon2 PHC string produced by [`Hasher::hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Argon2id hasher with fixed cost parameters.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist, so a miss costs the same as a hit.
    dummy: Arc<str>,
}

impl Hasher {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.m_cost, cfg.t_cost, cfg.p_cost, None).map_err(|e| {
            error!(error = %e, "invalid argon2 params");
            anyhow::anyhow!(e.to_string())
        })?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut hasher = Self {
            argon2,
            dummy: Arc::from(""),
        };
        hasher.dummy = Arc::from(hasher.hash("moodlog-dummy-password")?.into_string());
        Ok(hasher)
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<PasswordDigest> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(PasswordDigest(hash))
    }

    /// Checks `plain` against a stored PHC string. The parameters embedded in the
    /// hash are used, so hashes made under older settings still verify.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burns one verification for a login against an unknown email.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Hasher {
        Hasher::new(&PasswordConfig {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        })
        .expect("params are valid")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = cheap();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hasher.verify(password, hash.as_str()).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = cheap();
        let hash = hasher.hash("correct-horse-battery-staple").unwrap();
        assert!(!hasher.verify("wrong-password", hash.as_str()).expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = cheap();
        let a = hasher.hash("pw1").unwrap();
        let b = hasher.hash("pw1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = cheap().verify("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn hashes_from_other_params_still_verify() {
        let strong = Hasher::new(&PasswordConfig {
            m_cost: 64,
            t_cost: 2,
            p_cost: 1,
        })
        .unwrap();
        let hash = strong.hash("pw1").unwrap();
        assert!(cheap().verify("pw1", hash.as_str()).unwrap());
    }

    #[test]
    fn rejects_invalid_params() {
        let res = Hasher::new(&PasswordConfig {
            m_cost: 1,
            t_cost: 0,
            p_cost: 1,
        });
        assert!(res.is_err());
    }
}
