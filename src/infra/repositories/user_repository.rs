//! User repository.
//!
//! Queries are written once against [`ConnectionTrait`] so the pooled store
//! and the transaction-scoped repository share them.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::domain::User;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;

    /// Find user by login name
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Find user by email address (single indexed lookup)
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// One page of users ordered by id, plus the total count
    async fn list(&self, page: u64, per_page: u64) -> AppResult<(Vec<User>, u64)>;

    /// Count all users
    async fn count(&self) -> AppResult<u64>;

    /// Persist an unsaved user, returning the stored copy
    async fn insert(&self, user: &User) -> AppResult<User>;
}

/// Pool-backed implementation of [`UserRepository`].
pub struct UserStore {
    db: DatabaseConnection,
}

impl UserStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        queries::find_by_id(&self.db, id).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        queries::find_by_username(&self.db, username).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(&self.db, email).await
    }

    async fn list(&self, page: u64, per_page: u64) -> AppResult<(Vec<User>, u64)> {
        queries::list(&self.db, page, per_page).await
    }

    async fn count(&self) -> AppResult<u64> {
        queries::count(&self.db).await
    }

    async fn insert(&self, user: &User) -> AppResult<User> {
        queries::insert(&self.db, user).await
    }
}

/// Map a unique-index violation to a conflict, anything else to a database error.
fn map_write_err(err: DbErr) -> AppError {
    let kind = err.sql_err();
    write_error(err, kind)
}

fn write_error(err: DbErr, kind: Option<SqlErr>) -> AppError {
    match kind {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "unique constraint violated");
            AppError::conflict("User")
        }
        _ => AppError::from(err),
    }
}

pub(crate) mod queries {
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
        QueryOrder, Set,
    };

    use super::map_write_err;
    use crate::domain::User;
    use crate::errors::AppResult;
    use crate::infra::repositories::entities::user::{
        self, join_roles, ActiveModel, Entity as UserEntity,
    };

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Option<User>> {
        let result = UserEntity::find_by_id(id).one(db).await?;
        Ok(result.map(User::from))
    }

    pub async fn find_by_username<C: ConnectionTrait>(
        db: &C,
        username: &str,
    ) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?;
        Ok(result.map(User::from))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> AppResult<Option<User>> {
        let result = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(result.map(User::from))
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<User>, u64)> {
        let paginator = UserEntity::find()
            .order_by_asc(user::Column::Id)
            .paginate(db, per_page.max(1));
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((models.into_iter().map(User::from).collect(), total))
    }

    pub async fn count<C: ConnectionTrait>(db: &C) -> AppResult<u64> {
        Ok(UserEntity::find().count(db).await?)
    }

    pub async fn insert<C: ConnectionTrait>(db: &C, user: &User) -> AppResult<User> {
        let active_model = ActiveModel {
            username: Set(user.username().to_string()),
            email: Set(user.email().to_string()),
            password: Set(user.password().to_string()),
            salt: Set(user.salt().to_string()),
            roles: Set(join_roles(user.stored_roles())),
            created_at: Set(user.created_at()),
            ..Default::default()
        };

        let model = active_model.insert(db).await.map_err(map_write_err)?;
        Ok(User::from(model))
    }
}
