//! CLI command implementations.

pub mod merchant;
pub mod migrate;

use secrecy::SecretString;

/// Read the database URL shared by every command.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

/// `DATABASE_URL` is not set.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: DATABASE_URL")]
pub struct MissingDatabaseUrl;
