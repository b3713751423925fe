//! Domain models for the storefront server.

pub mod dashboard;
pub mod merchant;
pub mod order;
pub mod product;
pub mod session;

pub use dashboard::{DailySales, Dashboard, DashboardTotals, TopProduct};
pub use merchant::{Merchant, MerchantCredentials, NewMerchant, StoreSettings, Storefront};
pub use order::{
    CallbackApplied, CallbackUpdate, Customer, InsertOrderError, NewOrder, NotificationOutcome,
    NotificationStats, Order, OrderFilter, OrderLine, OrderReference, TransitionOutcome,
};
pub use product::{Product, ProductFilter, ProductInput};
pub use session::{CurrentMerchant, keys as session_keys};
