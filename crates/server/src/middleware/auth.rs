//! Merchant authentication extractor.
//!
//! Admin routes take the tenant from the session and nothing else; a client
//! cannot name the merchant it acts for.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentMerchant, session_keys};
use crate::tenant::Tenant;

/// Extractor that requires a logged-in merchant.
///
/// Rejects with `401 Unauthorized` when there is no session.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireMerchant(merchant): RequireMerchant) -> impl IntoResponse {
///     let tenant = Tenant::from(&merchant);
///     // ...
/// }
/// ```
pub struct RequireMerchant(pub CurrentMerchant);

impl RequireMerchant {
    /// The tenant this merchant acts for.
    #[must_use]
    pub fn tenant(&self) -> Tenant {
        Tenant::from(&self.0)
    }
}

impl<S> FromRequestParts<S> for RequireMerchant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = || AppError::Unauthorized("login required".to_owned());

        let session = parts.extensions.get::<Session>().ok_or_else(unauthorized)?;

        let merchant: CurrentMerchant = session
            .get(session_keys::CURRENT_MERCHANT)
            .await
            .ok()
            .flatten()
            .ok_or_else(unauthorized)?;

        tracing::Span::current().record("merchant_id", merchant.id.as_i32());

        Ok(Self(merchant))
    }
}

/// Helper to set the current merchant in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_merchant(
    session: &Session,
    merchant: &CurrentMerchant,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_MERCHANT, merchant)
        .await
}

/// Helper to clear the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_merchant(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
