//! Unit of Work pattern implementation.
//!
//! Centralizes repository access and owns the transaction boundary:
//! begin, run the caller's work, commit on success, roll back on error.

use async_trait::async_trait;
use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, IsolationLevel, TransactionTrait,
};
use std::sync::Arc;

use super::repositories::{queries, UserRepository, UserStore};
use crate::domain::User;
use crate::errors::{AppError, AppResult};

/// Boxed future returned by transactional closures.
pub type TxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of Work trait for dependency injection.
///
/// Generic methods make this trait unusable as a trait object; services take
/// it as a type parameter instead.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Get user repository
    fn users(&self) -> Arc<dyn UserRepository>;

    /// Execute a closure within a transaction.
    ///
    /// Committed on success, rolled back on error. ReadCommitted isolation.
    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send;
}

/// Transaction context providing repository access within a transaction.
///
/// Every repository call made through the context joins the same transaction.
pub struct TransactionContext<'a> {
    users: &'a dyn UserRepository,
}

impl<'a> TransactionContext<'a> {
    /// Wrap a repository that is already bound to a transaction.
    pub fn new(users: &'a dyn UserRepository) -> Self {
        Self { users }
    }

    /// Get user repository for this transaction
    pub fn users(&self) -> &'a dyn UserRepository {
        self.users
    }
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    db: DatabaseConnection,
    user_repo: Arc<UserStore>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection) -> Self {
        let user_repo = Arc::new(UserStore::new(db.clone()));
        Self { db, user_repo }
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.user_repo.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::ReadCommitted), Some(AccessMode::ReadWrite))
            .await
            .map_err(AppError::from)?;

        let outcome = {
            let repo = TxUserRepository::new(&txn);
            f(TransactionContext::new(&repo)).await
        };

        match outcome {
            Ok(result) => {
                txn.commit().await.map_err(AppError::from)?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                } else {
                    tracing::debug!(error = %e, "transaction rolled back");
                }
                Err(e)
            }
        }
    }
}

/// Transaction-aware user repository.
///
/// Borrows the transaction so it cannot outlive it.
pub struct TxUserRepository<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TxUserRepository<'a> {
    fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }
}

#[async_trait]
impl<'a> UserRepository for TxUserRepository<'a> {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        queries::find_by_id(self.txn, id).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        queries::find_by_username(self.txn, username).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        queries::find_by_email(self.txn, email).await
    }

    async fn list(&self, page: u64, per_page: u64) -> AppResult<(Vec<User>, u64)> {
        queries::list(self.txn, page, per_page).await
    }

    async fn count(&self) -> AppResult<u64> {
        queries::count(self.txn).await
    }

    async fn insert(&self, user: &User) -> AppResult<User> {
        queries::insert(self.txn, user).await
    }
}

/// Run a block inside a transaction without spelling out the boxing.
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    use super::*;
    use crate::infra::repositories::entities::user;

    /// SQL of every finished transaction, oldest first.
    fn transaction_sql(db: DatabaseConnection) -> Vec<Vec<String>> {
        db.into_transaction_log()
            .into_iter()
            .map(|txn| txn.statements().iter().map(|stmt| stmt.sql.clone()).collect())
            .collect()
    }

    fn unsaved() -> User {
        let mut user = User::new("jdoe");
        user.set_email("jdoe@example.com");
        user.set_password("encoded");
        user
    }

    fn stored_row() -> user::Model {
        user::Model {
            id: 1,
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            password: "encoded".into(),
            salt: "salt".into(),
            roles: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_successful_work_is_committed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let uow = Persistence::new(db.clone());

        let value = crate::with_transaction!(uow, |_ctx| Ok(42));

        assert_eq!(value.unwrap(), 42);
        assert_eq!(transaction_sql(db), vec![vec!["BEGIN", "COMMIT"]]);
    }

    #[tokio::test]
    async fn test_failed_work_is_rolled_back() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let uow = Persistence::new(db.clone());

        let result: AppResult<()> =
            crate::with_transaction!(uow, |_ctx| Err(AppError::conflict("User")));

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(transaction_sql(db), vec![vec!["BEGIN", "ROLLBACK"]]);
    }

    #[tokio::test]
    async fn test_insert_joins_the_transaction() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_row()]])
            .into_connection();
        let uow = Persistence::new(db.clone());
        let user = unsaved();

        let stored = crate::with_transaction!(uow, |ctx| ctx.users().insert(&user).await).unwrap();
        assert_eq!(stored.id(), Some(1));

        let log = transaction_sql(db);
        assert_eq!(log.len(), 1);
        let statements = &log[0];
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], "BEGIN");
        assert!(statements[1].starts_with(r#"INSERT INTO "users""#));
        assert_eq!(statements[2], "COMMIT");
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".into())])
            .into_connection();
        let uow = Persistence::new(db.clone());
        let user = unsaved();

        let result = crate::with_transaction!(uow, |ctx| ctx.users().insert(&user).await);

        assert!(matches!(result, Err(AppError::Database(_))));
        let log = transaction_sql(db);
        assert_eq!(log[0].first().map(String::as_str), Some("BEGIN"));
        assert_eq!(log[0].last().map(String::as_str), Some("ROLLBACK"));
    }
}
