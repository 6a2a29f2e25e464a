//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::password::generate_salt;
use crate::config::{
    DEFAULT_USERNAME, MAX_EMAIL_LENGTH, MAX_PASSWORD_LENGTH, MAX_USERNAME_LENGTH, ROLE_USER,
};
use crate::errors::FieldErrors;

/// User domain entity.
///
/// `id` is `None` until the user has been persisted. The salt is generated
/// once in [`User::new`] and has no setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Option<i64>,
    username: String,
    email: String,
    password: String,
    salt: String,
    created_at: DateTime<Utc>,
    roles: Vec<String>,
}

impl User {
    /// Create an unsaved user with a fresh salt and creation time.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: String::new(),
            password: String::new(),
            salt: generate_salt(),
            created_at: Utc::now(),
            roles: Vec::new(),
        }
    }

    /// Rebuild a stored user from its persisted columns.
    pub fn from_stored(
        id: i64,
        username: String,
        email: String,
        password: String,
        salt: String,
        created_at: DateTime<Utc>,
        roles: Vec<String>,
    ) -> Self {
        let mut user = Self {
            id: Some(id),
            username,
            email,
            password,
            salt,
            created_at,
            roles: Vec::new(),
        };
        user.set_roles(roles);
        user
    }

    /// Same user, marked as stored under `id`.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    /// The encoded password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Set the encoded password. Callers encode first.
    pub fn set_password(&mut self, encoded: impl Into<String>) {
        self.password = encoded.into();
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Roles as persisted, without the implicit base role.
    pub fn stored_roles(&self) -> &[String] {
        &self.roles
    }

    /// Granted roles. Always contains [`ROLE_USER`].
    pub fn roles(&self) -> Vec<String> {
        let mut roles = self.roles.clone();
        if !roles.iter().any(|r| r == ROLE_USER) {
            roles.push(ROLE_USER.to_string());
        }
        roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        let role = role.to_uppercase();
        role == ROLE_USER || self.roles.contains(&role)
    }

    pub fn add_role(&mut self, role: &str) {
        let role = role.to_uppercase();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    pub fn remove_role(&mut self, role: &str) {
        let role = role.to_uppercase();
        self.roles.retain(|r| *r != role);
    }

    pub fn set_roles<I, S>(&mut self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roles.clear();
        for role in roles {
            self.add_role(role.as_ref());
        }
    }

    /// Format checks on the entity alone. Uniqueness is checked by the
    /// user service, which can see other users.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.email.is_empty() {
            errors.insert("email".into(), "Email address is required.".into());
        } else if !self.email.find('@').is_some_and(|pos| pos > 0) {
            errors.insert("email".into(), "Email address appears to be invalid.".into());
        } else if self.email.len() > MAX_EMAIL_LENGTH {
            errors.insert(
                "email".into(),
                format!("Email address can't be longer than {} characters.", MAX_EMAIL_LENGTH),
            );
        }

        if self.password.is_empty() {
            errors.insert("password".into(), "Password is required.".into());
        } else if self.password.len() > MAX_PASSWORD_LENGTH {
            errors.insert(
                "password".into(),
                format!("Password can't be longer than {} characters.", MAX_PASSWORD_LENGTH),
            );
        }

        if self.username.trim().is_empty() {
            errors.insert("username".into(), "Username is required.".into());
        } else if self.username.contains('@') {
            errors.insert(
                "username".into(),
                "Username can't contain the @ character.".into(),
            );
        }

        if self.username.len() > MAX_USERNAME_LENGTH {
            errors.insert(
                "name".into(),
                format!("Name can't be longer than {} characters.", MAX_USERNAME_LENGTH),
            );
        }

        errors
    }

    /// Check a plain password before it is encoded.
    ///
    /// `validate` only sees the encoded value, which has a fixed length
    /// regardless of the input.
    pub fn check_plain_password(plain: &str) -> Option<String> {
        if plain.is_empty() {
            Some("Password is required.".into())
        } else if plain.chars().count() > MAX_PASSWORD_LENGTH {
            Some(format!(
                "Password can't be longer than {} characters.",
                MAX_PASSWORD_LENGTH
            ))
        } else {
            None
        }
    }

    /// Gravatar image URL for the user's email.
    pub fn gravatar_url(&self, size: u32) -> String {
        let normalized = self.email.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("//www.gravatar.com/avatar/{:x}?s={}&d=identicon", digest, size)
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME)
    }
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    /// Unique user identifier
    #[schema(example = 42)]
    pub id: i64,
    /// Login name
    #[schema(example = "jdoe")]
    pub username: String,
    /// User email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Granted roles
    #[schema(example = json!(["ROLE_USER"]))]
    pub roles: Vec<String>,
    /// Gravatar image URL
    pub avatar_url: String,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            // Only stored users are ever rendered.
            id: user.id.unwrap_or_default(),
            avatar_url: user.gravatar_url(crate::config::DEFAULT_GRAVATAR_SIZE),
            roles: user.roles(),
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_user() -> User {
        let mut user = User::new("jdoe");
        user.set_email("jdoe@example.com");
        user.set_password("encoded");
        user
    }

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("jdoe");

        assert_eq!(user.id(), None);
        assert_eq!(user.username(), "jdoe");
        assert!(!user.salt().is_empty());
        assert!(user.stored_roles().is_empty());
        assert_eq!(User::default().username(), DEFAULT_USERNAME);
    }

    #[test]
    fn test_salts_are_unique_per_user() {
        assert_ne!(User::new("a").salt(), User::new("b").salt());
    }

    #[test]
    fn test_roles_always_include_base_role() {
        let user = User::new("jdoe");
        assert_eq!(user.roles(), vec![ROLE_USER.to_string()]);
        assert!(user.has_role("role_user"));
    }

    #[test]
    fn test_add_role_uppercases_and_dedupes() {
        let mut user = User::new("jdoe");
        user.add_role("role_admin");
        user.add_role("ROLE_ADMIN");
        user.add_role("role_user");

        assert_eq!(user.stored_roles(), &["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()]);
        assert_eq!(user.roles().len(), 2);
        assert!(user.has_role("Role_Admin"));
    }

    #[test]
    fn test_remove_role() {
        let mut user = User::new("jdoe");
        user.set_roles(["role_admin", "role_editor"]);
        user.remove_role("role_admin");

        assert!(!user.has_role("ROLE_ADMIN"));
        assert!(user.has_role("ROLE_EDITOR"));
        // The base role cannot be removed.
        user.remove_role(ROLE_USER);
        assert!(user.has_role(ROLE_USER));
    }

    #[test]
    fn test_valid_user_has_no_errors() {
        assert!(valid_user().validate().is_empty());
    }

    #[test]
    fn test_email_required() {
        let mut user = valid_user();
        user.set_email("");
        assert_eq!(user.validate()["email"], "Email address is required.");
    }

    #[test]
    fn test_email_must_contain_at_after_first_char() {
        let mut user = valid_user();
        user.set_email("@example.com");
        assert_eq!(user.validate()["email"], "Email address appears to be invalid.");

        user.set_email("example.com");
        assert_eq!(user.validate()["email"], "Email address appears to be invalid.");
    }

    #[test]
    fn test_email_too_long() {
        let mut user = valid_user();
        user.set_email(format!("{}@example.com", "a".repeat(100)));
        assert_eq!(
            user.validate()["email"],
            "Email address can't be longer than 100 characters."
        );
    }

    #[test]
    fn test_password_required_and_bounded() {
        let mut user = valid_user();
        user.set_password("");
        assert_eq!(user.validate()["password"], "Password is required.");

        user.set_password("x".repeat(256));
        assert_eq!(
            user.validate()["password"],
            "Password can't be longer than 255 characters."
        );
    }

    #[test]
    fn test_username_too_long() {
        let mut user = valid_user();
        user.set_username("n".repeat(101));
        assert_eq!(user.validate()["name"], "Name can't be longer than 100 characters.");
    }

    #[test]
    fn test_blank_username_required() {
        for blank in ["", "   ", "\t"] {
            let mut user = valid_user();
            user.set_username(blank);
            assert_eq!(user.validate()["username"], "Username is required.");
        }
    }

    #[test]
    fn test_username_cannot_contain_at_sign() {
        let mut user = valid_user();
        user.set_username("jdoe@home");
        assert_eq!(
            user.validate()["username"],
            "Username can't contain the @ character."
        );
    }

    #[test]
    fn test_plain_password_checked_before_encoding() {
        assert_eq!(User::check_plain_password("secret-pass"), None);
        assert_eq!(
            User::check_plain_password(""),
            Some("Password is required.".to_string())
        );
        assert_eq!(User::check_plain_password(&"x".repeat(255)), None);
        assert_eq!(
            User::check_plain_password(&"x".repeat(256)),
            Some("Password can't be longer than 255 characters.".to_string())
        );
    }

    #[test]
    fn test_gravatar_url_normalizes_email() {
        let mut a = valid_user();
        a.set_email("  JDoe@Example.com ");
        let mut b = valid_user();
        b.set_email("jdoe@example.com");

        let url = a.gravatar_url(85);
        assert_eq!(url, b.gravatar_url(85));
        assert!(url.starts_with("//www.gravatar.com/avatar/"));
        assert!(url.ends_with("?s=85&d=identicon"));
    }

    #[test]
    fn test_from_stored_keeps_salt() {
        let stored = User::from_stored(
            7,
            "jdoe".into(),
            "jdoe@example.com".into(),
            "encoded".into(),
            "fixed-salt".into(),
            Utc::now(),
            vec!["role_admin".into()],
        );

        assert_eq!(stored.id(), Some(7));
        assert_eq!(stored.salt(), "fixed-salt");
        assert!(stored.has_role("ROLE_ADMIN"));
    }

    #[test]
    fn test_response_hides_secrets() {
        let response = UserResponse::from(valid_user().with_id(3));
        let json = serde_json::to_string(&response).unwrap();

        assert_eq!(response.id, 3);
        assert!(!json.contains("encoded"));
        assert!(json.contains("ROLE_USER"));
    }
}
