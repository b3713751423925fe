//! Merchant registration and slug availability.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use live_commerce_core::{Email, Phone, Slug};

use super::auth::start_session;
use super::{JsonBody, non_blank};
use crate::error::{AppError, FieldError, Result};
use crate::models::{Merchant, NewMerchant, Storefront};
use crate::services::AuthService;
use crate::services::auth::MIN_PASSWORD_LENGTH;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;

/// Registration form data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    /// Defaults to a slug derived from the store name.
    pub slug: Option<String>,
    /// Defaults to the merchant name.
    pub store_name: Option<String>,
    pub store_description: Option<String>,
    pub whatsapp: Option<String>,
}

impl RegisterRequest {
    /// Validate every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the list of invalid fields.
    pub fn validate(self) -> std::result::Result<(NewMerchant, String), Vec<FieldError>> {
        let mut errors = Vec::new();

        let email = Email::normalized(&self.email)
            .map_err(|e| errors.push(FieldError::new("email", e.to_string())))
            .ok();

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }

        let name = self.name.trim().to_owned();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                format!("must be 1-{MAX_NAME_LENGTH} characters"),
            ));
        }

        let store_name = non_blank(self.store_name).unwrap_or_else(|| name.clone());
        if store_name.chars().count() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(
                "storeName",
                format!("must be at most {MAX_NAME_LENGTH} characters"),
            ));
        }

        let slug = match non_blank(self.slug) {
            Some(raw) => Slug::parse(&raw)
                .map_err(|e| errors.push(FieldError::new("slug", e.to_string())))
                .ok(),
            None => Slug::suggest(&store_name).or_else(|| {
                errors.push(FieldError::new("slug", "could not derive a slug from the name"));
                None
            }),
        };

        let whatsapp = non_blank(self.whatsapp).and_then(|raw| {
            Phone::parse_whatsapp(&raw)
                .map_err(|e| errors.push(FieldError::new("whatsapp", e.to_string())))
                .ok()
        });

        match (email, slug) {
            (Some(email), Some(slug)) if errors.is_empty() => Ok((
                NewMerchant {
                    email,
                    name,
                    phone: non_blank(self.phone),
                    country: non_blank(self.country),
                    slug,
                    password_hash: String::new(),
                    store_name,
                    store_description: non_blank(self.store_description),
                    whatsapp,
                },
                self.password,
            )),
            _ => Err(errors),
        }
    }
}

/// A newly registered merchant.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub merchant: Merchant,
    pub store: Storefront,
}

/// Register a merchant and its store, and log them in.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    JsonBody(form): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let (new, password) = form.validate().map_err(AppError::Validation)?;

    let (merchant, store) = AuthService::new(state.store())
        .register(new, &password)
        .await?;

    start_session(&session, &merchant).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { merchant, store })))
}

/// Slug availability answer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlugAvailability {
    pub slug: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Check whether a slug can be registered.
pub async fn check_slug(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<SlugAvailability>> {
    let answer = match Slug::parse(&raw) {
        Err(e) => SlugAvailability {
            slug: raw,
            available: false,
            reason: Some(e.to_string()),
        },
        Ok(slug) => {
            let taken = state.store().slug_taken(&slug).await?;
            SlugAvailability {
                slug: slug.to_string(),
                available: !taken,
                reason: taken.then(|| "slug already taken".to_owned()),
            }
        }
    };
    Ok(Json(answer))
}
