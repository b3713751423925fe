//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"error": "...", "details": ...}`; server errors are captured to Sentry
//! and their details are never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use live_commerce_core::StatusError;

use crate::db::RepositoryError;
use crate::services::{AuthError, CodeError, FulfillmentError, OrderError};

/// A single invalid request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resend or callback failed.
    #[error("Fulfillment error: {0}")]
    Fulfillment(#[from] FulfillmentError),

    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A dependency is not available.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(err) => match err {
                OrderError::EmptyCart
                | OrderError::InvalidQuantity(_)
                | OrderError::StockShortage(_)
                | OrderError::Status(StatusError::Unknown(_)) => StatusCode::BAD_REQUEST,
                OrderError::Status(StatusError::IllegalTransition { .. }) => StatusCode::CONFLICT,
                OrderError::StoreNotFound | OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Code(_) => StatusCode::INTERNAL_SERVER_ERROR,
                OrderError::Repository(err) => repository_status(err),
            },
            Self::Fulfillment(err) => match err {
                FulfillmentError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
                FulfillmentError::OrderNotFound => StatusCode::NOT_FOUND,
                FulfillmentError::Delivery(_) => StatusCode::BAD_GATEWAY,
                FulfillmentError::Repository(err) => repository_status(err),
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Don't expose internal error details to clients
            return ErrorBody {
                error: "Internal server error".to_owned(),
                details: None,
            };
        }

        let (error, details) = match self {
            Self::Validation(fields) => (
                "Validation failed".to_owned(),
                serde_json::to_value(fields).ok(),
            ),
            Self::Order(OrderError::StockShortage(shortages)) => (
                "Insufficient stock".to_owned(),
                serde_json::to_value(shortages).ok(),
            ),
            Self::Order(OrderError::EmptyCart) => (
                "Validation failed".to_owned(),
                serde_json::to_value([FieldError::new("items", "cart must not be empty")]).ok(),
            ),
            Self::Order(err) => (capitalize(&err.to_string()), None),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => ("Invalid credentials".to_owned(), None),
                AuthError::AlreadyExists(msg) => (capitalize(msg), None),
                AuthError::WeakPassword(msg) => (capitalize(msg), None),
                AuthError::InvalidEmail(_) => ("Invalid email address".to_owned(), None),
                _ => ("Authentication error".to_owned(), None),
            },
            Self::Fulfillment(FulfillmentError::Delivery(err)) => (
                "Fulfillment notification failed".to_owned(),
                Some(serde_json::json!({ "reason": err.to_string() })),
            ),
            Self::Fulfillment(err) => (capitalize(&err.to_string()), None),
            Self::Database(RepositoryError::NotFound) => ("Not found".to_owned(), None),
            Self::Database(RepositoryError::Conflict(msg)) => (capitalize(msg), None),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::ServiceUnavailable(msg) => (capitalize(msg), None),
            _ => (self.to_string(), None),
        };
        ErrorBody { error, details }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn capitalize(msg: &str) -> String {
    let mut chars = msg.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status.is_server_error() {
            tracing::warn!(error = %self, "Request error");
        }

        (status, Json(self.body())).into_response()
    }
}

impl From<CodeError> for AppError {
    fn from(err: CodeError) -> Self {
        Self::Order(OrderError::Code(err))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a merchant ID.
///
/// Call this after successful authentication to associate errors with merchants.
pub fn set_sentry_user(merchant_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(merchant_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for merchant and bot actions.
///
/// ```rust,ignore
/// add_breadcrumb("orders", "Order placed", Some(&[("code", "LC-20260314-0042")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
