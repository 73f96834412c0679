use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::{ProfileUpdate, Role, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// UserStore
///
/// The persistence collaborator the session core calls into. Credential
/// checking lives behind this trait so the core never sees password material.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolves login credentials. `Ok(None)` means no user matches.
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Applies a validated profile update. `Ok(false)` means no such user.
    async fn update_user(&self, update: &ProfileUpdate) -> Result<bool, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

pub type UserStoreState = Arc<dyn UserStore>;

const USER_COLUMNS: &str =
    "id::BIGINT AS id, first_name, last_name, email, role::INT AS role, email_notification";

/// PostgresUserStore
///
/// Backed by the `users` table. Password hashes are bcrypt values produced by
/// pgcrypto's `crypt()`, so the comparison happens inside the database.
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND password = crypt($2, password)"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password)
            .fetch_optional(&self.pool)
            .await?;
        if user.is_none() {
            tracing::info!("no user matched the submitted credentials");
        }
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, update: &ProfileUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $1, last_name = $2, email = $3, role = $4,
                email_notification = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(update.role)
        .bind(update.email_notification)
        .bind(update.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }
}

/// InMemoryUserStore
///
/// Map-backed store for local runs without a database and for tests.
/// Passwords are compared as plain strings.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<i64, (User, String)>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: User, password: &str) -> Self {
        self.insert(user, password);
        self
    }

    pub fn insert(&self, user: User, password: &str) {
        self.users
            .write()
            .insert(user.id, (user, password.to_string()));
    }

    pub fn remove(&self, id: i64) -> Option<User> {
        self.users.write().remove(&id).map(|(user, _)| user)
    }

    /// Seed data for `Env::Local` when no `DATABASE_URL` is configured.
    pub fn seeded() -> Self {
        Self::new()
            .with_user(
                User {
                    id: 1,
                    first_name: "Ada".into(),
                    last_name: "Admin".into(),
                    email: "admin@localhost".into(),
                    role: Role::ADMIN,
                    email_notification: false,
                },
                "admin-password",
            )
            .with_user(
                User {
                    id: 2,
                    first_name: "Rita".into(),
                    last_name: "Reader".into(),
                    email: "reader@localhost".into(),
                    role: Role(0),
                    email_notification: true,
                },
                "reader-password",
            )
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|(user, secret)| user.email == email && secret == password)
            .map(|(user, _)| user.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(&id).map(|(user, _)| user.clone()))
    }

    async fn update_user(&self, update: &ProfileUpdate) -> Result<bool, StoreError> {
        let mut users = self.users.write();
        let Some((user, _)) = users.get_mut(&update.id) else {
            return Ok(false);
        };
        user.first_name = update.first_name.clone();
        user.last_name = update.last_name.clone();
        user.email = update.email.clone();
        user.role = update.role;
        user.email_notification = update.email_notification;
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().values().map(|(user, _)| user.clone()).collect())
    }
}
