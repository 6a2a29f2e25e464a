//! Password encoders.
//!
//! An encoder turns a plain password plus the user's salt into the string that
//! gets stored. Encoders are swappable; the rest of the crate only sees the
//! [`PasswordEncoder`] trait.

use std::str::FromStr;
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString},
    Argon2,
};

use crate::errors::{AppError, AppResult};

/// Pluggable password encoder.
pub trait PasswordEncoder: Send + Sync {
    /// Encode `plain` with `salt`.
    fn encode(&self, plain: &str, salt: &str) -> AppResult<String>;

    /// Check `plain` against a previously encoded value.
    fn is_valid(&self, encoded: &str, plain: &str, salt: &str) -> bool;
}

/// Generate a fresh salt suitable for every encoder in this module.
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).as_str().to_string()
}

/// Argon2id encoder keyed on the user's stored salt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Encoder;

impl Argon2Encoder {
    #[inline]
    fn argon2() -> Argon2<'static> {
        Argon2::default()
    }
}

impl PasswordEncoder for Argon2Encoder {
    fn encode(&self, plain: &str, salt: &str) -> AppResult<String> {
        let salt = Salt::from_b64(salt)
            .map_err(|e| AppError::internal(format!("Invalid salt: {}", e)))?;
        let hash = Self::argon2()
            .hash_password(plain.as_bytes(), salt)
            .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn is_valid(&self, encoded: &str, plain: &str, _salt: &str) -> bool {
        // The PHC string embeds its own salt.
        match PasswordHash::new(encoded) {
            Ok(parsed) => Self::argon2()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Stores `password{salt}` verbatim. Development and tests only.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextEncoder;

impl PasswordEncoder for PlaintextEncoder {
    fn encode(&self, plain: &str, salt: &str) -> AppResult<String> {
        if salt.contains('{') || salt.contains('}') {
            return Err(AppError::internal("Cannot use { or } in salt"));
        }
        if salt.is_empty() {
            return Ok(plain.to_string());
        }
        Ok(format!("{}{{{}}}", plain, salt))
    }

    fn is_valid(&self, encoded: &str, plain: &str, salt: &str) -> bool {
        self.encode(plain, salt)
            .map(|candidate| candidate == encoded)
            .unwrap_or(false)
    }
}

/// Encoder selection from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    Argon2,
    Plaintext,
}

impl EncoderKind {
    /// Instantiate the selected encoder.
    pub fn build(self) -> Arc<dyn PasswordEncoder> {
        match self {
            EncoderKind::Argon2 => Arc::new(Argon2Encoder),
            EncoderKind::Plaintext => Arc::new(PlaintextEncoder),
        }
    }
}

impl FromStr for EncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(EncoderKind::Argon2),
            "plaintext" | "plain" => Ok(EncoderKind::Plaintext),
            other => Err(format!("unknown password encoder '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_encode_and_verify() {
        let salt = generate_salt();
        let encoded = Argon2Encoder.encode("SecurePassword123!", &salt).unwrap();

        assert_ne!(encoded, "SecurePassword123!");
        assert!(Argon2Encoder.is_valid(&encoded, "SecurePassword123!", &salt));
        assert!(!Argon2Encoder.is_valid(&encoded, "WrongPassword123", &salt));
    }

    #[test]
    fn test_argon2_same_salt_is_deterministic() {
        let salt = generate_salt();
        let first = Argon2Encoder.encode("SamePassword123", &salt).unwrap();
        let second = Argon2Encoder.encode("SamePassword123", &salt).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_argon2_different_salts_different_hashes() {
        let first = Argon2Encoder.encode("SamePassword123", &generate_salt()).unwrap();
        let second = Argon2Encoder.encode("SamePassword123", &generate_salt()).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_argon2_rejects_malformed_hash() {
        assert!(!Argon2Encoder.is_valid("not-a-valid-hash", "anything", "salt"));
    }

    #[test]
    fn test_argon2_rejects_non_b64_salt() {
        assert!(Argon2Encoder.encode("password", "not base64!").is_err());
    }

    #[test]
    fn test_plaintext_merges_salt() {
        assert_eq!(PlaintextEncoder.encode("secret", "abc").unwrap(), "secret{abc}");
        assert_eq!(PlaintextEncoder.encode("secret", "").unwrap(), "secret");
        assert!(PlaintextEncoder.is_valid("secret{abc}", "secret", "abc"));
        assert!(!PlaintextEncoder.is_valid("secret{abc}", "secret", "abd"));
    }

    #[test]
    fn test_plaintext_rejects_braces_in_salt() {
        assert!(PlaintextEncoder.encode("secret", "a{b").is_err());
    }

    #[test]
    fn test_encoder_kind_parsing() {
        assert_eq!("argon2".parse::<EncoderKind>().unwrap(), EncoderKind::Argon2);
        assert_eq!("Plaintext".parse::<EncoderKind>().unwrap(), EncoderKind::Plaintext);
        assert!("bcrypt".parse::<EncoderKind>().is_err());
    }

    #[test]
    fn test_generated_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
