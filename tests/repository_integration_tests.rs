//! Runs against a real Postgres. Ignored by default:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use blog_api::{
    Role,
    models::ProfileUpdate,
    repository::{PostgresUserStore, UserStore},
};
use sqlx::{PgPool, postgres::PgPoolOptions};

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    /// One connection only, so the temporary `users` table shadows any real
    /// one for every query the store issues.
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::query("CREATE EXTENSION IF NOT EXISTS pgcrypto")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TEMP TABLE users (
                id BIGSERIAL PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role INT NOT NULL DEFAULT 0,
                email_notification BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        DbTestContext { pool }
    }

    fn store(&self) -> PostgresUserStore {
        PostgresUserStore::new(self.pool.clone())
    }

    async fn insert_user(&self, email: &str, password: &str, role: i32) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO users (first_name, last_name, email, password, role)
            VALUES ('Test', 'User', $1, crypt($2, gen_salt('bf')), $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

// --- Tests ---

#[tokio::test]
#[ignore]
async fn test_credentials_are_checked_in_database() {
    let ctx = DbTestContext::setup().await;
    let id = ctx.insert_user("writer@test.com", "hunter22", 1).await;
    let store = ctx.store();

    let user = store
        .find_by_credentials("writer@test.com", "hunter22")
        .await
        .unwrap()
        .expect("valid credentials should match");
    assert_eq!(user.id, id);
    assert_eq!(user.role, Role::ADMIN);

    assert!(
        store
            .find_by_credentials("writer@test.com", "wrong")
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .find_by_credentials("nobody@test.com", "hunter22")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[ignore]
async fn test_update_and_list_users() {
    let ctx = DbTestContext::setup().await;
    let first = ctx.insert_user("first@test.com", "pw", 0).await;
    let second = ctx.insert_user("second@test.com", "pw", 0).await;
    let store = ctx.store();

    let update = ProfileUpdate {
        id: second,
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: "grace@test.com".into(),
        role: Role(3),
        email_notification: true,
    };
    assert!(store.update_user(&update).await.unwrap());

    let stored = store.find_by_id(second).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Grace");
    assert_eq!(stored.role, Role(3));
    assert!(stored.email_notification);

    let missing = ProfileUpdate {
        id: second + 1000,
        ..update
    };
    assert!(!store.update_user(&missing).await.unwrap());

    let ids: Vec<i64> = store
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}
