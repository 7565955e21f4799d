//! Postgres-backed record store.
//!
//! Expects a `users` table with unique indexes `users_username_key` and
//! `users_email_key`; the unique constraints are the authoritative guard
//! against concurrent account creation. Schema management itself lives
//! with the wider platform, not here.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;

use super::{NewUser, RecordStore, Role, Status, StoreError, User};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, status, \
     avatar_url, balance, total_earnings, created_at, updated_at";

fn row_to_user(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.get("role");
    let status: String = row.get("status");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::Backend(anyhow!("unknown role in store: {role}")))?,
        status: Status::parse(&status)
            .ok_or_else(|| StoreError::Backend(anyhow!("unknown status in store: {status}")))?,
        avatar_url: row.get("avatar_url"),
        balance: row.get("balance"),
        total_earnings: row.get("total_earnings"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Map a unique violation to the offending field via the constraint name.
fn duplicate_field(err: &sqlx::Error) -> &'static str {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(constraint) = db_err.constraint() {
            if constraint.contains("email") {
                return "email";
            }
        }
    }
    "username"
}

fn backend(err: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err).context(what))
}

impl PgStore {
    async fn find_one(&self, query: String, bind: &str) -> Result<Option<User>, StoreError> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend(err, "failed to look up user"))?;
        row.as_ref().map(row_to_user).transpose()
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        self.find_one(query, username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.find_one(query, email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend(err, "failed to look up user by id"))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users \
                 (username, email, password_hash, role, status, avatar_url, \
                  balance, total_earnings, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'active', $5, 0, 0, \
                     EXTRACT(EPOCH FROM NOW())::BIGINT, EXTRACT(EPOCH FROM NOW())::BIGINT) \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.avatar_url)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => row_to_user(&row),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate {
                field: duplicate_field(&err),
            }),
            Err(err) => Err(backend(err, "failed to insert user")),
        }
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let query = "UPDATE users \
             SET username = $2, email = $3, password_hash = $4, role = $5, \
                 status = $6, avatar_url = $7, \
                 updated_at = EXTRACT(EPOCH FROM NOW())::BIGINT \
             WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(&user.avatar_url)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend(err, "failed to update user"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow!("no such user: {}", user.id)));
        }
        Ok(())
    }
}
