//! Domain layer - Core business entities and logic
//!
//! The user entity with its role and validation rules, and the pluggable
//! password encoders that turn plain passwords into stored hashes.

pub mod password;
pub mod user;

pub use password::{generate_salt, Argon2Encoder, EncoderKind, PasswordEncoder, PlaintextEncoder};
pub use user::{User, UserResponse};
