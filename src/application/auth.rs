//! Account sign-up and login issuing session tokens.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tokio::task;

use crate::application::repos::{RepoError, UsersRepo};
use crate::cache::{Credential, TokenRegistry};
use crate::domain::credentials::Credentials;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email `{0}` is already registered")]
    EmailTaken(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<TokenRegistry>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: Arc<TokenRegistry>) -> Self {
        Self { users, tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    /// Register a new account and issue its first session token.
    pub async fn sign_up(&self, credentials: Credentials) -> Result<Credential, AuthError> {
        credentials.validate()?;

        let password_hash = hash_password(credentials.password).await?;
        let user = match self
            .users
            .create_user(&credentials.email, &password_hash)
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AuthError::EmailTaken(credentials.email));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(self.tokens.issue(user.id))
    }

    /// Verify credentials and issue a fresh session token, replacing any
    /// token the account held before.
    pub async fn login(&self, credentials: Credentials) -> Result<Credential, AuthError> {
        credentials.validate()?;

        let user = self
            .users
            .find_user_by_email(&credentials.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(credentials.password, user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.tokens.issue(user.id))
    }
}

async fn hash_password(password: String) -> Result<String, AuthError> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Hashing(err.to_string()))
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}

async fn verify_password(password: String, stored: String) -> Result<bool, AuthError> {
    task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&stored).map_err(|err| AuthError::Hashing(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| AuthError::Hashing(err.to_string()))?
}
