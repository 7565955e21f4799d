//! Compact signed session tokens.
//!
//! Wire format is three dot-separated base64url segments without padding:
//! `base64url(json(header)) . base64url(json(claims)) .
//! base64url(hmac_sha256(secret, segment1 "." segment2))`.
//!
//! Claims are a snapshot of the user at issuance; the authorization path
//! re-fetches the live record, so nothing here needs to stay fresh. The
//! claims schema is versioned and decoded strictly: unknown or missing
//! fields reject the token. Signature comparison is constant-time.
//!
//! Issued tokens stay valid until natural expiry; there is no revocation
//! list.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::store::{unix_now, Role, User};

pub const TOKEN_VERSION: u8 = 1;

/// Fixed session lifetime: 24 hours.
pub const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    pub alg: String,
    pub typ: String,
}

impl SessionHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Token payload: user snapshot plus validity window, all unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionClaims {
    pub v: u8,
    pub sub: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value).map_err(|_| Error::Malformed)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(segment).map_err(|_| Error::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Malformed)
}

/// Stateless issuer/verifier for session tokens. Pure function of input,
/// secret, and clock.
pub struct TokenCodec {
    secret: SecretString,
    ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl_seconds: SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Issue a signed token holding a snapshot of `user`, valid for the
    /// configured TTL starting now.
    ///
    /// # Errors
    ///
    /// Only if claims serialization fails, which cannot happen for
    /// well-formed users.
    pub fn issue(&self, user: &User) -> Result<String, Error> {
        let iat = unix_now();
        let claims = SessionClaims {
            v: TOKEN_VERSION,
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat,
            exp: iat + self.ttl_seconds,
        };
        self.sign(&claims)
    }

    /// Sign pre-built claims. Deterministic for a fixed secret and claims.
    ///
    /// # Errors
    ///
    /// Only on claims serialization failure.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, Error> {
        let header_b64 = b64e_json(&SessionHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = self.mac(signing_input.as_bytes())?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);
        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token against the current clock.
    ///
    /// # Errors
    ///
    /// [`Error::Malformed`], [`Error::InvalidSignature`], or
    /// [`Error::Expired`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, Error> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token against an explicit clock. The signature is checked
    /// before anything inside the token is trusted.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<SessionClaims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::Malformed)?;
        let claims_b64 = parts.next().ok_or(Error::Malformed)?;
        let signature_b64 = parts.next().ok_or(Error::Malformed)?;
        if parts.next().is_some() {
            return Err(Error::Malformed);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Error::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::InvalidSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        // verify_slice is a constant-time comparison.
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let header: SessionHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" || header.typ != "JWT" {
            return Err(Error::Malformed);
        }

        let claims: SessionClaims = b64d_json(claims_b64)?;
        if claims.v != TOKEN_VERSION {
            return Err(Error::Malformed);
        }
        if claims.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, input: &[u8]) -> Result<Vec<u8>, Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::InvalidSignature)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Status, User};

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new(SecretString::from("test-secret-key"))
    }

    fn test_user() -> User {
        User {
            id: 42,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password_hash: "$argon2id$irrelevant".to_string(),
            role: Role::User,
            status: Status::Active,
            avatar_url: None,
            balance: 0,
            total_earnings: 0,
            created_at: NOW,
            updated_at: NOW,
        }
    }

    fn test_claims() -> SessionClaims {
        SessionClaims {
            v: TOKEN_VERSION,
            sub: 42,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            role: Role::User,
            iat: NOW,
            exp: NOW + SESSION_TTL_SECONDS,
        }
    }

    #[test]
    fn issue_then_verify_round_trips_the_snapshot() -> Result<(), Error> {
        let codec = codec();
        let user = test_user();
        let token = codec.issue(&user)?;

        let claims = codec.verify(&token)?;
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, user.role);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn token_has_three_unpadded_segments() -> Result<(), Error> {
        let token = codec().sign(&test_claims())?;
        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            assert!(!segment.is_empty());
            assert!(!segment.contains('='));
        }
        Ok(())
    }

    #[test]
    fn signing_is_deterministic() -> Result<(), Error> {
        let codec = codec();
        let claims = test_claims();
        assert_eq!(codec.sign(&claims)?, codec.sign(&claims)?);
        Ok(())
    }

    #[test]
    fn mutating_any_character_fails_verification() -> Result<(), Error> {
        let codec = codec();
        let token = codec.sign(&test_claims())?;

        for index in 0..token.len() {
            let original = token.as_bytes()[index];
            if original == b'.' {
                continue;
            }
            let replacement = if original == b'A' { b'B' } else { b'A' };
            let mut mutated = token.clone().into_bytes();
            mutated[index] = replacement;
            let mutated = String::from_utf8(mutated).map_err(|_| Error::Malformed)?;

            let result = codec.verify_at(&mutated, NOW);
            assert!(
                matches!(result, Err(Error::InvalidSignature) | Err(Error::Malformed)),
                "mutation at {index} was accepted"
            );
        }
        Ok(())
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify_at("", NOW), Err(Error::Malformed));
        assert_eq!(codec.verify_at("a.b", NOW), Err(Error::Malformed));
        assert_eq!(codec.verify_at("a.b.c.d", NOW), Err(Error::Malformed));
    }

    #[test]
    fn expired_token_fails_even_with_valid_signature() -> Result<(), Error> {
        let codec = codec();
        let mut claims = test_claims();
        claims.iat = NOW - SESSION_TTL_SECONDS;
        claims.exp = NOW - 1;
        let token = codec.sign(&claims)?;

        assert_eq!(codec.verify_at(&token, NOW), Err(Error::Expired));
        // Expiry is inclusive: exp == now is already expired.
        claims.exp = NOW;
        let token = codec.sign(&claims)?;
        assert_eq!(codec.verify_at(&token, NOW), Err(Error::Expired));
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<(), Error> {
        let token = codec().sign(&test_claims())?;
        let other = TokenCodec::new(SecretString::from("another-secret"));
        assert_eq!(other.verify_at(&token, NOW), Err(Error::InvalidSignature));
        Ok(())
    }

    #[test]
    fn unknown_claim_fields_are_rejected() -> Result<(), Error> {
        // Craft a token with an extra claim field, signed with the right
        // secret, and check strict decoding refuses it.
        let codec = codec();
        let header_b64 = b64e_json(&SessionHeader::hs256())?;
        let claims_json = serde_json::json!({
            "v": TOKEN_VERSION,
            "sub": 42,
            "username": "alice",
            "email": "alice@x.com",
            "role": "user",
            "iat": NOW,
            "exp": NOW + 60,
            "is_admin": true,
        });
        let claims_b64 = Base64UrlUnpadded::encode_string(
            &serde_json::to_vec(&claims_json).map_err(|_| Error::Malformed)?,
        );
        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature = codec.mac(signing_input.as_bytes())?;
        let token = format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        );

        assert_eq!(codec.verify_at(&token, NOW), Err(Error::Malformed));
        Ok(())
    }

    #[test]
    fn custom_ttl_is_honored() -> Result<(), Error> {
        let codec = TokenCodec::new(SecretString::from("s")).with_ttl_seconds(60);
        let token = codec.issue(&test_user())?;
        let claims = codec.verify(&token)?;
        assert_eq!(claims.exp - claims.iat, 60);
        Ok(())
    }
}
