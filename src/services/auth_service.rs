//! Authentication service - registration, login and token sessions.
//!
//! Registration validates and inserts inside one transaction so the duplicate
//! check and the write see the same snapshot. Tokens are JWTs carrying a
//! session id (`jti`) that logout can revoke.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::session::SessionRegistry;
use super::user_service::check_duplicates;
use crate::config::{Config, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::{generate_salt, PasswordEncoder, User, UserResponse};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub roles: Vec<String>,
    /// Session id, revocable through logout
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Body returned by a successful registration: the new account, already logged in.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub token: TokenResponse,
}

/// Submitted registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account and log it in.
    async fn register(&self, form: Registration) -> AppResult<(User, TokenResponse)>;

    /// Login by username, or by email when the identifier contains `@`.
    async fn login(&self, identifier: String, password: String) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims. Revoked sessions are rejected.
    async fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Revoke a session until its token expires.
    async fn logout(&self, session_id: Uuid, expires_at: i64) -> AppResult<()>;
}

/// Sign a token for a stored user.
fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let id = user
        .id()
        .ok_or_else(|| AppError::internal("Cannot issue a token for an unsaved user"))?;
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: id,
        username: user.username().to_string(),
        roles: user.roles(),
        jti: Uuid::new_v4(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn decode_token(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
    encoder: Arc<dyn PasswordEncoder>,
    sessions: Arc<SessionRegistry>,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        config: Config,
        encoder: Arc<dyn PasswordEncoder>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            uow,
            config,
            encoder,
            sessions,
        }
    }

    fn build_user(&self, form: &Registration) -> AppResult<User> {
        let mut user = User::new(form.username.trim());
        user.set_email(form.email.trim());
        let encoded = self.encoder.encode(&form.password, user.salt())?;
        user.set_password(encoded);
        user.add_role(&self.config.default_role);
        Ok(user)
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn register(&self, form: Registration) -> AppResult<(User, TokenResponse)> {
        if form.password != form.password_confirmation {
            return Err(AppError::invalid_field(
                "password",
                "The password fields must match.",
            ));
        }

        if let Some(message) = User::check_plain_password(&form.password) {
            return Err(AppError::invalid_field("password", message));
        }

        let user = self.build_user(&form)?;

        let stored = crate::with_transaction!(self.uow, |ctx| {
            let mut errors = user.validate();
            check_duplicates(ctx.users(), &user, &mut errors).await?;
            if !errors.is_empty() {
                return Err(AppError::InvalidForm(errors));
            }
            ctx.users().insert(&user).await
        })?;

        tracing::info!(user_id = ?stored.id(), username = %stored.username(), "user registered");
        let token = generate_token(&stored, &self.config)?;
        Ok((stored, token))
    }

    async fn login(&self, identifier: String, password: String) -> AppResult<TokenResponse> {
        let identifier = identifier.trim();
        let users = self.uow.users();
        let found = if identifier.is_empty() {
            None
        } else if identifier.contains('@') {
            users.find_by_email(identifier).await?
        } else {
            users.find_by_username(identifier).await?
        };

        let user = match found {
            Some(user) => user,
            None => {
                // Hash anyway so unknown accounts cost the same as wrong passwords.
                let _ = self.encoder.encode(&password, &generate_salt());
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self
            .encoder
            .is_valid(user.password(), &password, user.salt())
        {
            tracing::debug!(username = %user.username(), "password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        generate_token(&user, &self.config)
    }

    async fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let claims = decode_token(token, &self.config)?;
        if self.sessions.is_revoked(claims.jti).await {
            return Err(AppError::Unauthorized);
        }
        Ok(claims)
    }

    async fn logout(&self, session_id: Uuid, expires_at: i64) -> AppResult<()> {
        self.sessions.revoke(session_id, expires_at).await;
        tracing::debug!(%session_id, "session revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlaintextEncoder;
    use crate::infra::{MockUserRepository, TransactionContext, TxFuture, UserRepository};

    const SECRET: &str = "test-secret-key-that-is-long-enough";

    struct TestUnitOfWork {
        user_repo: Arc<MockUserRepository>,
    }

    #[async_trait]
    impl UnitOfWork for TestUnitOfWork {
        fn users(&self) -> Arc<dyn UserRepository> {
            self.user_repo.clone()
        }

        async fn transaction<F, T>(&self, f: F) -> AppResult<T>
        where
            F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
            T: Send,
        {
            f(TransactionContext::new(self.user_repo.as_ref())).await
        }
    }

    fn authenticator(repo: MockUserRepository) -> Authenticator<TestUnitOfWork> {
        let uow = TestUnitOfWork {
            user_repo: Arc::new(repo),
        };
        Authenticator::new(
            Arc::new(uow),
            Config::new("postgres://unused", SECRET),
            Arc::new(PlaintextEncoder),
            Arc::new(SessionRegistry::new()),
        )
    }

    fn form(password: &str, confirmation: &str) -> Registration {
        Registration {
            username: "jdoe".into(),
            email: "jdoe@example.com".into(),
            password: password.into(),
            password_confirmation: confirmation.into(),
        }
    }

    fn stored_user(password: &str) -> User {
        let mut user = User::new("jdoe");
        user.set_email("jdoe@example.com");
        let encoded = PlaintextEncoder.encode(password, user.salt()).unwrap();
        user.set_password(encoded);
        user.with_id(3)
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_confirmation() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert().never();

        let result = authenticator(repo)
            .register(form("secret-pass", "other-pass"))
            .await;

        match result {
            Err(AppError::InvalidForm(fields)) => {
                assert_eq!(fields["password"], "The password fields must match.");
            }
            other => panic!("expected form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_oversized_password_before_encoding() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert().never();

        let long = "x".repeat(256);
        let result = authenticator(repo).register(form(&long, &long)).await;

        match result {
            Err(AppError::InvalidForm(fields)) => assert_eq!(
                fields["password"],
                "Password can't be longer than 255 characters."
            ),
            other => panic!("expected form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_whitespace_username() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email().returning(|_| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_insert().never();

        let mut registration = form("secret-pass", "secret-pass");
        registration.username = "   ".into();
        let result = authenticator(repo).register(registration).await;

        match result {
            Err(AppError::InvalidForm(fields)) => {
                assert_eq!(fields["username"], "Username is required.");
            }
            other => panic!("expected form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_at_sign_in_username() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email().returning(|_| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_insert().never();

        let mut registration = form("secret-pass", "secret-pass");
        registration.username = "jdoe@home".into();
        let result = authenticator(repo).register(registration).await;

        match result {
            Err(AppError::InvalidForm(fields)) => assert_eq!(
                fields["username"],
                "Username can't contain the @ character."
            ),
            other => panic!("expected form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_with_blank_identifier_skips_lookup() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username().never();
        repo.expect_find_by_email().never();

        let result = authenticator(repo)
            .login("   ".into(), "secret-pass".into())
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_adds_default_role_and_issues_token() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email().returning(|_| Ok(None));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_insert()
            .times(1)
            .returning(|user| Ok(user.clone().with_id(7)));

        let auth = authenticator(repo);
        let (user, token) = auth
            .register(form("secret-pass", "secret-pass"))
            .await
            .unwrap();

        assert_eq!(user.id(), Some(7));
        assert_eq!(user.stored_roles(), ["ROLE_USER".to_string()]);

        let claims = auth.verify_token(&token.access_token).await.unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "jdoe");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_form_error() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .returning(|_| Ok(Some(stored_user("whatever"))));
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_insert().never();

        let result = authenticator(repo)
            .register(form("secret-pass", "secret-pass"))
            .await;

        match result {
            Err(AppError::InvalidForm(fields)) => {
                assert_eq!(
                    fields["email"],
                    "An account with that email address already exists."
                );
            }
            other => panic!("expected form error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_by_email_and_username() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .withf(|email| email == "jdoe@example.com")
            .returning(|_| Ok(Some(stored_user("secret-pass"))));
        repo.expect_find_by_username()
            .withf(|name| name == "jdoe")
            .returning(|_| Ok(Some(stored_user("secret-pass"))));

        let auth = authenticator(repo);
        assert!(auth
            .login("jdoe@example.com".into(), "secret-pass".into())
            .await
            .is_ok());
        assert!(auth.login("jdoe".into(), "secret-pass".into()).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|name| match name {
                "jdoe" => Ok(Some(stored_user("secret-pass"))),
                _ => Ok(None),
            });

        let auth = authenticator(repo);
        let wrong_password = auth.login("jdoe".into(), "nope".into()).await;
        let unknown_user = auth.login("ghost".into(), "nope".into()).await;

        assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));
        assert!(matches!(unknown_user, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|_| Ok(Some(stored_user("secret-pass"))));

        let auth = authenticator(repo);
        let token = auth.login("jdoe".into(), "secret-pass".into()).await.unwrap();
        let claims = auth.verify_token(&token.access_token).await.unwrap();

        auth.logout(claims.jti, claims.exp).await.unwrap();

        let result = auth.verify_token(&token.access_token).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage() {
        let auth = authenticator(MockUserRepository::new());
        assert!(matches!(
            auth.verify_token("not-a-token").await,
            Err(AppError::Jwt(_))
        ));
    }
}
