//! User repository for database operations

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{Clearance, NewUser, User, user::SENTINEL_USER_ID};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

fn map_user(row: SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        needs_password_change: row.get("needs_password_change"),
        clearance: Clearance::from_bits(row.get("user_type_id")),
        last_login: row.get("last_login"),
    }
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, needs_password_change, user_type_id, last_login";

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a plaintext password with argon2
    pub fn hash_password(plaintext: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a user's stored hash
    pub fn verify_password(user: &User, plaintext: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Create a new user with an already-hashed credential
    ///
    /// A duplicate email surfaces as `Persistence`.
    pub async fn create(
        &self,
        new_user: &NewUser,
        password_hash: &str,
        clearance: Clearance,
    ) -> AppResult<User> {
        info!("Creating new user: {}", new_user.email);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, needs_password_change, user_type_id)
            VALUES ($1, $2, $3, 1, $4)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(password_hash)
        .bind(clearance.bits())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Persistence(format!("Email {} is already registered", new_user.email))
            }
            _ => AppError::Database(e),
        })?;

        Ok(map_user(row))
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(map_user))
    }

    /// Find a user by email (case-normalized to lowercase on write)
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(map_user))
    }

    /// List all accounts, excluding the sentinel
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id > $1 ORDER BY id"
        ))
        .bind(SENTINEL_USER_ID)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_user).collect())
    }

    /// Record a successful login; false when the id does not resolve
    pub async fn update_last_login(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a user's credential hash
    ///
    /// `needs_password_change` is set for temporary credentials and cleared
    /// when the user picks their own password.
    pub async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        needs_password_change: bool,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, needs_password_change = $2 WHERE id = $3",
        )
        .bind(password_hash)
        .bind(needs_password_change)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a user's clearance mask
    pub async fn set_clearance(&self, id: i64, clearance: Clearance) -> AppResult<bool> {
        let result = sqlx::query("UPDATE users SET user_type_id = $1 WHERE id = $2")
            .bind(clearance.bits())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a user, reassigning their receipts to the sentinel account
    ///
    /// Both steps run in one transaction; false when the id does not resolve.
    pub async fn delete_and_reassign(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE receipts SET user_id = $1 WHERE user_id = $2")
            .bind(SENTINEL_USER_ID)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        info!("Deleted user {} and reassigned their receipts", id);
        Ok(true)
    }
}
