//! Service Container - wires the unit of work, password encoder and session
//! registry into the application services.

use std::sync::Arc;

use super::{AuthService, Authenticator, SessionRegistry, UserManager, UserService};
use crate::config::Config;
use crate::infra::{Persistence, UnitOfWork};

/// Service container trait for dependency injection.
pub trait ServiceContainer: Send + Sync {
    /// Get authentication service
    fn auth(&self) -> Arc<dyn AuthService>;

    /// Get user service
    fn users(&self) -> Arc<dyn UserService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
}

impl Services {
    pub fn new(auth_service: Arc<dyn AuthService>, user_service: Arc<dyn UserService>) -> Self {
        Self {
            auth_service,
            user_service,
        }
    }

    /// Create service container from database connection and config
    pub fn from_connection(db: sea_orm::DatabaseConnection, config: Config) -> Self {
        Self::from_unit_of_work(Arc::new(Persistence::new(db)), config)
    }

    /// Build both services over any unit of work.
    ///
    /// The encoder named in `config` is shared by both services so that
    /// passwords set through one can be checked through the other.
    pub fn from_unit_of_work<U>(uow: Arc<U>, config: Config) -> Self
    where
        U: UnitOfWork + 'static,
    {
        let encoder = config.password_encoder.build();
        let sessions = Arc::new(SessionRegistry::new());

        let user_service = Arc::new(UserManager::new(uow.clone(), encoder.clone()));
        let auth_service = Arc::new(Authenticator::new(uow, config, encoder, sessions));

        Self {
            auth_service,
            user_service,
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn users(&self) -> Arc<dyn UserService> {
        self.user_service.clone()
    }
}
