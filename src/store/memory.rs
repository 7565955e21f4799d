//! In-memory record store for tests and local development.
//!
//! A single mutex wraps the whole check-then-insert sequence, which gives
//! the same atomic uniqueness guarantee a database constraint would: two
//! concurrent `create` calls for the same email cannot both succeed.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{unix_now, NewUser, RecordStore, Status, StoreError, User};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store mutex poisoned")))
    }

    /// Number of stored records. Test helper.
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.users.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock()?;

        // Uniqueness check and insert stay under one lock.
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }

        inner.next_id += 1;
        let now = unix_now();
        let record = User {
            id: inner.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            status: Status::Active,
            avatar_url: user.avatar_url,
            balance: 0,
            total_earnings: 0,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(record.clone());
        Ok(record)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let Some(existing) = inner.users.iter_mut().find(|u| u.id == user.id) else {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "no such user: {}",
                user.id
            )));
        };
        *existing = User {
            updated_at: unix_now(),
            ..user.clone()
        };
        Ok(())
    }
}
