//! Application services layer - Use cases and business logic.
//!
//! Services depend on the [`UnitOfWork`](crate::infra::UnitOfWork)
//! abstraction for repository access and transactions, and on the
//! [`PasswordEncoder`](crate::domain::PasswordEncoder) picked by configuration.

mod auth_service;
pub mod container;
mod session;
mod user_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{
    AuthService, Authenticator, Claims, RegisterResponse, Registration, TokenResponse,
};
pub use session::SessionRegistry;
pub use user_service::{UserManager, UserService};
