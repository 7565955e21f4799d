//! Record store abstraction for user persistence.
//!
//! The authentication subsystem never touches storage directly; everything
//! goes through [`RecordStore`]. Uniqueness of `username` and `email` is
//! enforced atomically by the implementation, which is what makes account
//! creation safe under concurrent federation callbacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use utoipa::ToSchema;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Account role. Serialized in lowercase, both in tokens and over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Creator,
    Admin,
    Advertiser,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Creator => "creator",
            Self::Admin => "admin",
            Self::Advertiser => "advertiser",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "creator" => Some(Self::Creator),
            "admin" => Some(Self::Admin),
            "advertiser" => Some(Self::Advertiser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account lifecycle status. Only `active` accounts may authenticate;
/// transitions to `suspended`/`deleted` happen outside this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Suspended,
    Deleted,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record. `password_hash` is empty only for accounts created
/// purely through federation. The monetary counters belong to the catalog
/// side of the system and are never mutated here.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub status: Status,
    pub avatar_url: Option<String>,
    pub balance: i64,
    pub total_earnings: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields the subsystem supplies when creating an account; the store
/// assigns id, timestamps, zero balances, and `active` status.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint fired. `field` is the offending column.
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },
    #[error("record store failure")]
    Backend(#[source] anyhow::Error),
}

/// Narrow persistence interface consumed by the identity and federation
/// services. Implementations must enforce `username`/`email` uniqueness
/// atomically inside `create`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}
