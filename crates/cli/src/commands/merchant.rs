//! Merchant management commands.
//!
//! # Usage
//!
//! ```bash
//! lc-cli merchant create -e owner@example.com -n "Ana" -s acme --store-name "Acme"
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use live_commerce_core::{Email, Slug};
use live_commerce_server::db::create_pool;
use live_commerce_server::db::postgres::PgStore;
use live_commerce_server::models::NewMerchant;
use live_commerce_server::services::{AuthError, AuthService};

use super::{MissingDatabaseUrl, database_url};

/// Length of generated passwords.
const GENERATED_PASSWORD_LENGTH: usize = 20;

/// Errors that can occur during merchant operations.
#[derive(Debug, Error)]
pub enum MerchantError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid slug {0:?}: {1}")]
    InvalidSlug(String, String),

    #[error("Cannot derive a slug from {0:?}; pass --slug")]
    NoSlug(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Arguments for `merchant create`.
#[derive(Debug)]
pub struct CreateArgs {
    pub email: String,
    pub name: String,
    pub slug: Option<String>,
    pub store_name: Option<String>,
    pub password: Option<String>,
}

impl CreateArgs {
    fn into_new_merchant(self) -> Result<(NewMerchant, Option<String>), MerchantError> {
        let email = Email::normalized(&self.email)
            .map_err(|e| MerchantError::InvalidEmail(format!("{}: {e}", self.email)))?;
        let store_name = self
            .store_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.name.clone());
        let slug = match self.slug {
            Some(raw) => {
                Slug::parse(&raw).map_err(|e| MerchantError::InvalidSlug(raw, e.to_string()))?
            }
            None => Slug::suggest(&store_name).ok_or_else(|| MerchantError::NoSlug(store_name.clone()))?,
        };

        let new = NewMerchant {
            email,
            name: self.name,
            phone: None,
            country: None,
            slug,
            password_hash: String::new(),
            store_name,
            store_description: None,
            whatsapp: None,
        };
        Ok((new, self.password))
    }
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Create a merchant and its storefront.
///
/// Prints the generated password when none was supplied.
pub async fn create(args: CreateArgs) -> Result<(), MerchantError> {
    let (new, password) = args.into_new_merchant()?;
    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);

    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    tracing::info!("Creating merchant: {} ({})", new.email, new.slug);
    let (merchant, storefront) = AuthService::new(&store).register(new, &password).await?;

    tracing::info!(
        merchant_id = %merchant.id,
        store_id = %storefront.store_id,
        "Merchant created: /stores/{}",
        storefront.slug
    );

    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Generated password for {}: {password}", merchant.email);
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args() -> CreateArgs {
        CreateArgs {
            email: " Owner@Example.com ".to_owned(),
            name: "Ana".to_owned(),
            slug: None,
            store_name: Some("Acme Goods".to_owned()),
            password: None,
        }
    }

    #[test]
    fn test_slug_derived_from_store_name() {
        let (new, password) = args().into_new_merchant().unwrap();
        assert_eq!(new.slug.as_str(), "acme-goods");
        assert_eq!(new.store_name, "Acme Goods");
        assert!(password.is_none());
    }

    #[test]
    fn test_store_name_defaults_to_merchant_name() {
        let mut args = args();
        args.store_name = None;
        args.slug = Some("ana-shop".to_owned());
        let (new, _) = args.into_new_merchant().unwrap();
        assert_eq!(new.store_name, "Ana");
        assert_eq!(new.slug.as_str(), "ana-shop");
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut bad_slug = args();
        bad_slug.slug = Some("Acme".to_owned());
        assert!(matches!(
            bad_slug.into_new_merchant(),
            Err(MerchantError::InvalidSlug(_, _))
        ));

        let mut bad_email = args();
        bad_email.email = "nope".to_owned();
        assert!(matches!(
            bad_email.into_new_merchant(),
            Err(MerchantError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_generate_password() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
