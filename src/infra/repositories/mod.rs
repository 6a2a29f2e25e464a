//! Repository layer - Data access abstraction
//!
//! Repositories hide the ORM behind the [`UserRepository`] trait so services
//! and tests never touch SeaORM directly.

pub(crate) mod entities;
mod user_repository;

pub(crate) use user_repository::queries;
pub use user_repository::{UserRepository, UserStore};

// Export mock for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
