//! User directory
//!
//! Account management on top of the user repository: creation with
//! temporary credentials, password reset and change, role grants, and
//! deletion with sentinel reassignment. Every operation takes the acting
//! principal explicitly where a self-action guard applies.

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{Clearance, NewUser, User};
use crate::notify::Mailer;
use crate::repositories::UserRepository;
use crate::validation;

const TEMP_PASSWORD_LEN: usize = 12;

/// Result of a user creation, with advisory warnings
#[derive(Debug)]
pub struct CreateUserOutcome {
    pub user: User,
    pub warnings: Vec<String>,
}

/// Result of a CSV bulk import
///
/// Row failures never abort the batch; each is reported individually.
pub struct BulkImportOutcome {
    pub created: usize,
    pub row_errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// User directory service
#[derive(Clone)]
pub struct UserDirectory {
    users: UserRepository,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl UserDirectory {
    pub fn new(users: UserRepository, mailer: Arc<dyn Mailer>, base_url: String) -> Self {
        Self {
            users,
            mailer,
            base_url,
        }
    }

    fn generate_temp_password() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TEMP_PASSWORD_LEN)
            .map(char::from)
            .collect()
    }

    /// Email a temporary credential; failures become warnings, the account
    /// stays
    async fn send_temp_credential(&self, user: &User, temp_password: &str) -> Option<String> {
        let body = format!(
            "Hello {},\n\nAn account has been set up for you at {}.\n\
             Log in with this temporary password and pick your own: {}\n",
            user.name, self.base_url, temp_password
        );

        match self
            .mailer
            .send(&user.email, "Your receipt account", &body)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!("Account {} needs remediation, credential mail failed: {}", user.email, e);
                Some(format!(
                    "Account created, but the credential email to {} failed: {}",
                    user.email, e
                ))
            }
        }
    }

    /// Create an account with a random temporary credential and default
    /// `User` clearance
    pub async fn create_user(&self, new_user: NewUser) -> AppResult<CreateUserOutcome> {
        validation::validate_name(&new_user.name).map_err(AppError::Validation)?;
        validation::validate_email(&new_user.email).map_err(AppError::Validation)?;

        let new_user = NewUser {
            name: new_user.name,
            email: new_user.email.to_lowercase(),
        };

        let temp_password = Self::generate_temp_password();
        let password_hash = UserRepository::hash_password(&temp_password)?;

        let user = self
            .users
            .create(&new_user, &password_hash, Clearance::USER)
            .await?;

        let warnings = self
            .send_temp_credential(&user, &temp_password)
            .await
            .into_iter()
            .collect();

        Ok(CreateUserOutcome { user, warnings })
    }

    /// Import (name, email) rows, creating an account per valid row
    pub async fn bulk_import(&self, rows: Vec<NewUser>) -> AppResult<BulkImportOutcome> {
        let mut outcome = BulkImportOutcome {
            created: 0,
            row_errors: Vec::new(),
            warnings: Vec::new(),
        };

        for (index, row) in rows.into_iter().enumerate() {
            match self.create_user(row).await {
                Ok(created) => {
                    outcome.created += 1;
                    outcome.warnings.extend(created.warnings);
                }
                Err(e) => {
                    outcome.row_errors.push(format!("Row {}: {}", index + 1, e));
                }
            }
        }

        Ok(outcome)
    }

    /// Reset a user's password to a fresh temporary credential
    pub async fn reset_password(&self, user_id: i64) -> AppResult<Vec<String>> {
        if User::is_protected_id(user_id) {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let temp_password = Self::generate_temp_password();
        let password_hash = UserRepository::hash_password(&temp_password)?;

        if !self.users.update_password(user_id, &password_hash, true).await? {
            return Err(AppError::NotFound("User"));
        }

        Ok(self
            .send_temp_credential(&user, &temp_password)
            .await
            .into_iter()
            .collect())
    }

    /// Replace a user's password after verifying the old one
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if !UserRepository::verify_password(&user, old_password)? {
            return Err(AppError::InvalidCredential);
        }

        validation::validate_password(new_password).map_err(AppError::Validation)?;

        let password_hash = UserRepository::hash_password(new_password)?;
        if !self.users.update_password(user_id, &password_hash, false).await? {
            return Err(AppError::NotFound("User"));
        }

        Ok(())
    }

    /// Verify credentials for login and record the login time
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self
            .users
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::InvalidCredential)?;

        if !UserRepository::verify_password(&user, password)? {
            return Err(AppError::InvalidCredential);
        }

        self.users.update_last_login(user.id).await?;
        Ok(user)
    }

    /// Add a capability to a user's clearance mask
    pub async fn grant_role(&self, user_id: i64, capability: Clearance) -> AppResult<User> {
        if User::is_protected_id(user_id) {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        self.users
            .set_clearance(user_id, user.clearance.grant(capability))
            .await?;

        Ok(User {
            clearance: user.clearance.grant(capability),
            ..user
        })
    }

    /// Remove a capability from a user's clearance mask
    ///
    /// Revoking admin from the acting user's own account is blocked so an
    /// admin cannot lock themselves out.
    pub async fn revoke_role(
        &self,
        acting: &User,
        user_id: i64,
        capability: Clearance,
    ) -> AppResult<User> {
        if User::is_protected_id(user_id) {
            return Err(AppError::Unauthorized);
        }

        if user_id == acting.id && capability.contains(Clearance::ADMIN) {
            return Err(AppError::SelfDemotion);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        self.users
            .set_clearance(user_id, user.clearance.revoke(capability))
            .await?;

        Ok(User {
            clearance: user.clearance.revoke(capability),
            ..user
        })
    }

    /// Delete an account, reassigning its receipts to the sentinel user
    pub async fn delete_user(&self, acting: &User, user_id: i64) -> AppResult<()> {
        if User::is_protected_id(user_id) {
            return Err(AppError::Unauthorized);
        }

        if user_id == acting.id {
            return Err(AppError::SelfDeletion);
        }

        if !self.users.delete_and_reassign(user_id).await? {
            return Err(AppError::NotFound("User"));
        }

        Ok(())
    }

    /// Fetch an account by id
    pub async fn get_user(&self, user_id: i64) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    /// List all accounts, excluding the sentinel
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.users.list().await
    }
}
