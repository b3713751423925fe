//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;

use live_commerce_core::OrderCodeError;

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::{FulfillmentNotifier, NotifyError, OrderCodeGenerator, OrderService};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid ORDER_CODE_PREFIX: {0}")]
    OrderCodePrefix(#[from] OrderCodeError),
    #[error("fulfillment client: {0}")]
    Notifier(#[from] NotifyError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store and the services built on it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    orders: OrderService,
    notifier: FulfillmentNotifier,
    callback_token: Option<SecretString>,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        codes: OrderCodeGenerator,
        notifier: FulfillmentNotifier,
        callback_token: Option<SecretString>,
    ) -> Self {
        let orders = OrderService::new(Arc::clone(&store), codes, notifier.clone());
        Self {
            inner: Arc::new(AppStateInner {
                store,
                orders,
                notifier,
                callback_token,
            }),
        }
    }

    /// Build state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the order code prefix is invalid or the HTTP
    /// client cannot be built.
    pub fn from_config(store: Arc<dyn Store>, config: &AppConfig) -> Result<Self, StateError> {
        let codes = OrderCodeGenerator::new(&config.order_code_prefix)?;
        let notifier = FulfillmentNotifier::new(&config.fulfillment)?;
        Ok(Self::new(
            store,
            codes,
            notifier,
            config.fulfillment.callback_token.clone(),
        ))
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Order lifecycle operations.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Fulfillment webhook client.
    #[must_use]
    pub fn notifier(&self) -> &FulfillmentNotifier {
        &self.inner.notifier
    }

    /// Bearer token required on bot callbacks, if configured.
    #[must_use]
    pub fn callback_token(&self) -> Option<&SecretString> {
        self.inner.callback_token.as_ref()
    }
}
