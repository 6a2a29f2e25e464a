//! User service - CRUD manager over the user repository.
//!
//! Adds uniqueness validation on top of the entity's own format checks and
//! owns the password helpers, which delegate to the injected encoder.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{PasswordEncoder, User};
use crate::errors::{AppError, AppResult, FieldErrors, OptionExt};
use crate::infra::{UnitOfWork, UserRepository};
use crate::types::PaginationParams;

/// User service trait for dependency injection.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get user by ID
    async fn get_user(&self, id: i64) -> AppResult<User>;

    /// Load user by login name
    async fn get_user_by_username(&self, username: &str) -> AppResult<User>;

    /// Get user by email address
    async fn get_user_by_email(&self, email: &str) -> AppResult<User>;

    /// Reload a user from storage
    async fn refresh_user(&self, user: &User) -> AppResult<User>;

    /// One page of users and the total count
    async fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)>;

    /// Count all users
    async fn count_users(&self) -> AppResult<u64>;

    /// Build an unsaved user with an encoded password.
    fn create_user(&self, username: &str, plain_password: &str, email: &str) -> AppResult<User>;

    /// Encode a plain password with the user's salt.
    fn encode_user_password(&self, user: &User, plain_password: &str) -> AppResult<String>;

    /// Encode a plain password and set it on the user.
    fn set_user_password(&self, user: &mut User, plain_password: &str) -> AppResult<()>;

    /// Test a plain password against the user's encoded one.
    fn check_user_password(&self, user: &User, plain_password: &str) -> bool;

    /// Format and uniqueness errors. Empty when the user may be stored.
    async fn validate(&self, user: &User) -> AppResult<FieldErrors>;

    async fn is_valid(&self, user: &User) -> AppResult<bool>;

    /// Validate, then persist.
    async fn insert(&self, user: User) -> AppResult<User>;
}

/// Add duplicate email/username errors for `user`.
///
/// A match on the user's own id is not a duplicate.
pub(crate) async fn check_duplicates(
    repo: &dyn UserRepository,
    user: &User,
    errors: &mut FieldErrors,
) -> AppResult<()> {
    if !user.email().is_empty() {
        if let Some(existing) = repo.find_by_email(user.email()).await? {
            if existing.id() != user.id() {
                errors.insert(
                    "email".into(),
                    "An account with that email address already exists.".into(),
                );
            }
        }
    }

    if let Some(existing) = repo.find_by_username(user.username()).await? {
        if existing.id() != user.id() {
            errors.insert(
                "username".into(),
                "An account with that username already exists.".into(),
            );
        }
    }

    Ok(())
}

/// Concrete implementation of UserService using Unit of Work.
pub struct UserManager<U: UnitOfWork> {
    uow: Arc<U>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl<U: UnitOfWork> UserManager<U> {
    /// Create new user service instance with Unit of Work
    pub fn new(uow: Arc<U>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self { uow, encoder }
    }
}

#[async_trait]
impl<U: UnitOfWork> UserService for UserManager<U> {
    async fn get_user(&self, id: i64) -> AppResult<User> {
        self.uow.users().find_by_id(id).await?.ok_or_not_found()
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        self.uow
            .users()
            .find_by_username(username)
            .await?
            .ok_or_not_found()
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        self.uow.users().find_by_email(email).await?.ok_or_not_found()
    }

    async fn refresh_user(&self, user: &User) -> AppResult<User> {
        self.get_user_by_username(user.username()).await
    }

    async fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<User>, u64)> {
        self.uow.users().list(params.page, params.limit()).await
    }

    async fn count_users(&self) -> AppResult<u64> {
        self.uow.users().count().await
    }

    fn create_user(&self, username: &str, plain_password: &str, email: &str) -> AppResult<User> {
        let mut user = User::new(username);
        user.set_email(email);
        self.set_user_password(&mut user, plain_password)?;
        Ok(user)
    }

    fn encode_user_password(&self, user: &User, plain_password: &str) -> AppResult<String> {
        self.encoder.encode(plain_password, user.salt())
    }

    fn set_user_password(&self, user: &mut User, plain_password: &str) -> AppResult<()> {
        if let Some(message) = User::check_plain_password(plain_password) {
            return Err(AppError::invalid_field("password", message));
        }
        let encoded = self.encode_user_password(user, plain_password)?;
        user.set_password(encoded);
        Ok(())
    }

    fn check_user_password(&self, user: &User, plain_password: &str) -> bool {
        self.encoder
            .is_valid(user.password(), plain_password, user.salt())
    }

    async fn validate(&self, user: &User) -> AppResult<FieldErrors> {
        let mut errors = user.validate();
        let repo = self.uow.users();
        check_duplicates(repo.as_ref(), user, &mut errors).await?;
        Ok(errors)
    }

    async fn is_valid(&self, user: &User) -> AppResult<bool> {
        Ok(self.validate(user).await?.is_empty())
    }

    async fn insert(&self, user: User) -> AppResult<User> {
        let errors = self.validate(&user).await?;
        if !errors.is_empty() {
            tracing::debug!(fields = ?errors.keys().collect::<Vec<_>>(), "user rejected");
            return Err(AppError::InvalidForm(errors));
        }

        let stored = self.uow.users().insert(&user).await?;
        tracing::info!(user_id = ?stored.id(), username = %stored.username(), "user created");
        Ok(stored)
    }
}
