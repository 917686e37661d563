//! Schema creation and reference-data seeding
//!
//! Runs at startup: creates the tables when absent, seeds the clearance and
//! status lookup tables, the sentinel user, and optionally a bootstrap
//! admin account.

use sqlx::SqlitePool;
use tracing::info;

use crate::config::AdminBootstrap;
use crate::error::AppResult;
use crate::models::{Clearance, NewUser, ReceiptStatus, user::SENTINEL_USER_ID};
use crate::repositories::UserRepository;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS receipt_statuses (
    id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    display_color TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    needs_password_change INTEGER NOT NULL DEFAULT 1,
    user_type_id INTEGER NOT NULL DEFAULT 1 REFERENCES user_types(id),
    last_login TEXT
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    filename TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS receipts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    receipt_date TEXT NOT NULL,
    submit_date TEXT NOT NULL,
    activity TEXT NOT NULL,
    amount INTEGER NOT NULL,
    status_id INTEGER NOT NULL DEFAULT 10 REFERENCES receipt_statuses(id),
    status_comment TEXT,
    file_id INTEGER NOT NULL REFERENCES files(id),
    archived INTEGER NOT NULL DEFAULT 0
);
"#;

/// Create tables and seed reference data
pub async fn init_db(pool: &SqlitePool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    for clearance in Clearance::all_combinations() {
        sqlx::query("INSERT OR IGNORE INTO user_types (id, name) VALUES ($1, $2)")
            .bind(clearance.bits())
            .bind(clearance.to_string())
            .execute(pool)
            .await?;
    }

    for status in ReceiptStatus::ALL {
        sqlx::query(
            "INSERT OR IGNORE INTO receipt_statuses (id, display_name, display_color) \
             VALUES ($1, $2, $3)",
        )
        .bind(status.id())
        .bind(status.display_name())
        .bind(status.display_color())
        .execute(pool)
        .await?;
    }

    // Placeholder owner for receipts whose submitter was deleted. The hash
    // is no valid argon2 string, so nobody can log in as it.
    sqlx::query(
        "INSERT OR IGNORE INTO users (id, email, name, password_hash, needs_password_change) \
         VALUES ($1, 'deleted', 'DELETED', '!', 0)",
    )
    .bind(SENTINEL_USER_ID)
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed the bootstrap admin account when its email is not taken yet
pub async fn seed_admin(pool: &SqlitePool, admin: &AdminBootstrap) -> AppResult<()> {
    let users = UserRepository::new(pool.clone());
    let email = admin.email.to_lowercase();

    if users.find_by_email(&email).await?.is_some() {
        return Ok(());
    }

    let password_hash = UserRepository::hash_password(&admin.password)?;
    let user = users
        .create(
            &NewUser {
                name: admin.name.clone(),
                email,
            },
            &password_hash,
            Clearance::USER.grant(Clearance::ADMIN),
        )
        .await?;

    info!("Seeded bootstrap admin account {}", user.email);
    Ok(())
}
