//! Merchant registration and login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use live_commerce_core::{Email, EmailError};

use crate::db::{CatalogStore, RepositoryError};
use crate::models::{Merchant, NewMerchant, Storefront};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Wrong password, unknown email or inactive merchant.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Email or slug already registered.
    #[error("{0}")]
    AlreadyExists(String),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

/// Registration and login against a catalog store.
pub struct AuthService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> AuthService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a merchant and its store.
    ///
    /// `new.password_hash` is ignored and replaced by the hash of `password`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::AlreadyExists` if the email or slug is taken.
    #[tracing::instrument(skip(self, new, password), fields(email = %new.email, slug = %new.slug))]
    pub async fn register(
        &self,
        mut new: NewMerchant,
        password: &str,
    ) -> Result<(Merchant, Storefront), AuthError> {
        validate_password(password)?;
        new.password_hash = hash_password(password)?;

        let created = self
            .store
            .create_merchant(&new)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => AuthError::AlreadyExists(msg),
                other => AuthError::Repository(other),
            })?;

        tracing::info!(merchant_id = %created.0.id, "Merchant registered");
        Ok(created)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<Merchant, AuthError> {
        let email = Email::normalized(email)?;

        let credentials = self
            .store
            .merchant_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        Ok(credentials.merchant)
    }
}

/// Check password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` when the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
