//! Live Commerce server library.
//!
//! Multi-tenant storefront API: public storefront and order placement,
//! merchant administration, fulfillment bot integration and the merchant
//! dashboard. Exposed as a library so the binary, the CLI and the
//! integration tests share one router and one set of services.
//!
//! # Tenancy
//!
//! Public routes resolve the tenant from the store slug in the path; admin
//! routes take it from the session. Every store call receives it
//! explicitly as a [`tenant::Tenant`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod tenant;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionStore;
use tracing::Span;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Build the full application: routes, sessions, request ids, tracing and
/// Sentry.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `session_store` - Backing store for sessions
/// * `secure_cookies` - Mark the session cookie `Secure`
pub fn app<S>(state: AppState, session_store: S, secure_cookies: bool) -> Router
where
    S: SessionStore + Clone,
{
    routes::routes()
        .layer(create_session_layer(session_store, secure_cookies))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                        request_id = tracing::field::Empty,
                        merchant_id = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
