//! Shared fixtures: an in-memory user store behind the real services.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use sea_orm::DatabaseConnection;

use user_accounts::api::{create_router, AppState};
use user_accounts::config::Config;
use user_accounts::domain::{EncoderKind, User};
use user_accounts::errors::{AppError, AppResult};
use user_accounts::infra::{Database, TransactionContext, TxFuture, UnitOfWork, UserRepository};
use user_accounts::services::Services;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

/// Vec-backed repository enforcing the same unique keys as the users table.
#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<User>>,
    blind_lookups: bool,
}

impl MemoryUsers {
    /// A store whose username and email lookups always miss, as when another
    /// registration commits between the duplicate check and the insert.
    /// Only the unique keys on insert catch the duplicate.
    pub fn racing() -> Self {
        Self {
            blind_lookups: true,
            ..Self::default()
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.rows.lock().unwrap()
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.rows().iter().find(|u| u.id() == Some(id)).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        if self.blind_lookups {
            return Ok(None);
        }
        Ok(self.rows().iter().find(|u| u.username() == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        if self.blind_lookups {
            return Ok(None);
        }
        Ok(self.rows().iter().find(|u| u.email() == email).cloned())
    }

    async fn list(&self, page: u64, per_page: u64) -> AppResult<(Vec<User>, u64)> {
        let rows = self.rows();
        let skip = (page.saturating_sub(1) * per_page) as usize;
        let page = rows.iter().skip(skip).take(per_page as usize).cloned().collect();
        Ok((page, rows.len() as u64))
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.rows().len() as u64)
    }

    async fn insert(&self, user: &User) -> AppResult<User> {
        let mut rows = self.rows();
        if rows
            .iter()
            .any(|u| u.username() == user.username() || u.email() == user.email())
        {
            return Err(AppError::conflict("User"));
        }
        let stored = user.clone().with_id(rows.len() as i64 + 1);
        rows.push(stored.clone());
        Ok(stored)
    }
}

/// Unit of work over [`MemoryUsers`]. Every write is immediate.
#[derive(Default)]
pub struct MemoryUnitOfWork {
    users: Arc<MemoryUsers>,
}

impl MemoryUnitOfWork {
    pub fn new(users: MemoryUsers) -> Self {
        Self {
            users: Arc::new(users),
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        f(TransactionContext::new(self.users.as_ref())).await
    }
}

pub fn test_config() -> Config {
    let mut config = Config::new("postgres://localhost/unused", JWT_SECRET);
    config.password_encoder = EncoderKind::Plaintext;
    config
}

pub fn test_services(config: Config) -> Services {
    Services::from_unit_of_work(Arc::new(MemoryUnitOfWork::default()), config)
}

fn app_over(users: MemoryUsers) -> Router {
    let uow = Arc::new(MemoryUnitOfWork::new(users));
    let services = Services::from_unit_of_work(uow, test_config());
    let database = Arc::new(Database::from_connection(DatabaseConnection::Disconnected));
    create_router(AppState::from_services(&services, database))
}

/// Full router over in-memory services and a disconnected database.
pub fn test_app() -> Router {
    app_over(MemoryUsers::default())
}

/// Router whose duplicate checks never see existing users.
pub fn racing_app() -> Router {
    app_over(MemoryUsers::racing())
}
