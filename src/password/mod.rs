//! One-way password credential handling.
//!
//! Hashing uses Argon2id with the crate's default parameters; the salt is
//! random per hash and the parameters travel inside the PHC string, so
//! verification always follows the stored hash, not the current defaults.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const FAST_DIGEST_PREFIX: &str = "sha256$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Argon2,
    FastDigest,
}

/// Hashes and verifies password credentials.
///
/// `verify` is total: any mismatch, unparsable hash, or empty stored hash
/// (a federated-only account) simply returns `false`.
pub struct CredentialVerifier {
    mode: Mode,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier {
    /// Production mode: Argon2id.
    #[must_use]
    pub const fn new() -> Self {
        Self { mode: Mode::Argon2 }
    }

    /// NOT production grade: a single unsalted SHA-256 pass. Exists only so
    /// tests can avoid Argon2 cost; never wire this into a running server.
    #[must_use]
    pub const fn insecure_fast() -> Self {
        Self {
            mode: Mode::FastDigest,
        }
    }

    /// Hash a plaintext password into a storable string.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying hasher fails, which under normal
    /// operation it does not.
    pub fn hash(&self, password: &str) -> Result<String> {
        match self.mode {
            Mode::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|err| anyhow!("failed to hash password: {err}"))?;
                Ok(hash.to_string())
            }
            Mode::FastDigest => {
                let digest = Sha256::digest(password.as_bytes());
                Ok(format!(
                    "{FAST_DIGEST_PREFIX}{}",
                    Base64UrlUnpadded::encode_string(&digest)
                ))
            }
        }
    }

    /// Check a plaintext password against a stored hash. Never errors; a
    /// federated-only account (empty hash) verifies false for any input.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        if stored_hash.is_empty() {
            return false;
        }

        if let Some(digest_b64) = stored_hash.strip_prefix(FAST_DIGEST_PREFIX) {
            let digest = Sha256::digest(password.as_bytes());
            return Base64UrlUnpadded::encode_string(&digest) == digest_b64;
        }

        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argon2_hash_verifies_only_the_same_password() -> Result<()> {
        let verifier = CredentialVerifier::new();
        let hash = verifier.hash("Secret123")?;

        assert!(hash.starts_with("$argon2"));
        assert!(verifier.verify("Secret123", &hash));
        assert!(!verifier.verify("Secret124", &hash));
        assert!(!verifier.verify("", &hash));
        Ok(())
    }

    #[test]
    fn argon2_hashes_are_salted() -> Result<()> {
        let verifier = CredentialVerifier::new();
        assert_ne!(verifier.hash("Secret123")?, verifier.hash("Secret123")?);
        Ok(())
    }

    #[test]
    fn empty_stored_hash_never_verifies() {
        let verifier = CredentialVerifier::new();
        assert!(!verifier.verify("", ""));
        assert!(!verifier.verify("anything", ""));
    }

    #[test]
    fn garbage_stored_hash_never_verifies() {
        let verifier = CredentialVerifier::new();
        assert!(!verifier.verify("password", "not-a-phc-string"));
    }

    // The fast mode is explicitly non-production-grade: unsalted, and a
    // general-purpose digest instead of an adaptive hash.
    #[test]
    fn insecure_fast_mode_round_trips_but_is_unsalted() -> Result<()> {
        let verifier = CredentialVerifier::insecure_fast();
        let hash = verifier.hash("Secret123")?;

        assert!(hash.starts_with(FAST_DIGEST_PREFIX));
        assert!(verifier.verify("Secret123", &hash));
        assert!(!verifier.verify("Secret124", &hash));
        // Unsalted: identical inputs collide, which is why this mode must
        // never reach production.
        assert_eq!(hash, verifier.hash("Secret123")?);
        Ok(())
    }

    #[test]
    fn argon2_verifier_accepts_fast_hashes_and_vice_versa() -> Result<()> {
        // Mode selects how new hashes are produced; verification follows
        // the stored hash format either way.
        let fast_hash = CredentialVerifier::insecure_fast().hash("pw")?;
        assert!(CredentialVerifier::new().verify("pw", &fast_hash));
        Ok(())
    }
}
