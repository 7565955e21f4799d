//! Error taxonomy for the authentication subsystem.
//!
//! Validation and authentication failures are recoverable and carry enough
//! structure for the caller to report them. Store and provider failures are
//! logged where they happen and collapse into an opaque internal error; no
//! backend detail crosses the API boundary.

use thiserror::Error;

use crate::store::StoreError;

/// Why an input field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("already taken")]
    Taken,
    #[error("invalid format")]
    Format,
    #[error("must be at least {0} characters")]
    TooShort(usize),
}

/// Login failures. Callers get a uniform "authentication failed"; the
/// variant is for logs and tests. Token failures never reach this enum:
/// the authorization boundary collapses them into `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("account not found")]
    NotFound,
    #[error("account is not active")]
    Disabled,
    #[error("invalid credentials")]
    BadCredential,
}

/// OAuth federation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FederationError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider rejected the authorization exchange")]
    ProviderRejected,
    #[error("no usable email from provider")]
    NoEmail,
    #[error("account is not active")]
    Disabled,
    #[error("exhausted username candidates")]
    UsernameExhausted,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{field}: {reason}")]
    Validation {
        field: &'static str,
        reason: ValidationReason,
    },
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    #[error(transparent)]
    Federation(#[from] FederationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, reason: ValidationReason) -> Self {
        Self::Validation { field, reason }
    }
}
