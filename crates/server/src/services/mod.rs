//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Merchant registration and password login
//! - `stock` - Availability rules and tenant-scoped stock checks
//! - `order_code` - `PREFIX-YYYYMMDD-NNNN` code allocation
//! - `orders` - Order assembly, lifecycle changes and cancellation
//! - `fulfillment` - Webhook notifications and bot callbacks
//! - `dashboard` - Tenant aggregates for the admin dashboard

pub mod auth;
pub mod dashboard;
pub mod fulfillment;
pub mod order_code;
pub mod orders;
pub mod stock;

pub use auth::{AuthError, AuthService};
pub use fulfillment::{FulfillmentError, FulfillmentNotifier, NotifyError};
pub use order_code::{CodeError, OrderCodeGenerator};
pub use orders::{OrderDraft, OrderError, OrderService, OrderUpdate, Placed};
pub use stock::{LineRequest, Shortage, ShortageReason, StockLedger};
