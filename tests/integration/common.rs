use entity::sea_orm_active_enums::UserRole;
use entity::users;
use migration::{Migrator, MigratorTrait};
use sea_orm::{entity::*, Database, DatabaseConnection};
use time::OffsetDateTime;
use uuid::Uuid;

/// Connect and migrate, or None when TEST_DATABASE_URL is not set (the test
/// should then return early).
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping integration test");
        return None;
    };

    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    Some(db)
}

pub async fn create_test_user(db: &DatabaseConnection, role: UserRole) -> users::Model {
    let now = OffsetDateTime::now_utc();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("test-{}@example.com", Uuid::new_v4())),
        password_hash: Set("$argon2id$unused".to_string()),
        role: Set(role),
        full_name: Set(Some("Test User".to_string())),
        is_verified: Set(true),
        verification_token: Set(None),
        reset_token: Set(None),
        reset_token_expires_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("Failed to insert test user")
}

pub fn test_payment_config() -> worklink::config::PaymentConfig {
    worklink::config::PaymentConfig {
        merchant_id: "ec4001".to_string(),
        api_key: "merchant-api-key".to_string(),
        base_url: "http://127.0.0.1:1".to_string(),
        return_url: "https://worklink.example/return".to_string(),
        cancel_url: "https://worklink.example/cancel".to_string(),
    }
}
