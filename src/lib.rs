//! # Identigo (Identity & Session Authentication)
//!
//! `identigo` is the identity authority for the platform: it issues and
//! verifies signed session tokens, guards password credentials, and
//! federates third-party (OAuth) identities into local accounts.
//!
//! ## Session tokens
//!
//! Sessions are compact three-segment tokens (`header.claims.signature`),
//! HMAC-SHA256 signed with a server-held secret and valid for a fixed 24
//! hour window. Claims are a snapshot of the user at issuance time; the
//! authorization path always re-fetches the live record so role and status
//! changes take effect without re-login.
//!
//! There is no server-side revocation: an issued token stays valid until
//! natural expiry. This is a known, accepted gap.
//!
//! ## Credentials
//!
//! Passwords are hashed with Argon2id. Accounts created purely through
//! federation store an empty hash and can never log in with a password.
//!
//! ## Federation
//!
//! The OAuth authorization-code flow (GitHub, Google) maps a federated
//! identity to a local account by email, creating an account with a
//! collision-resolved username on first contact. Account creation is
//! idempotent under concurrent callbacks: the record store's uniqueness
//! constraint is the authoritative guard.

pub mod api;
pub mod cli;
pub mod error;
pub mod federation;
pub mod identity;
pub mod password;
pub mod store;
pub mod token;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
