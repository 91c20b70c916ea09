//! Wick & Lather storefront engine
//!
//! This library contains the order, payment and refund logic of the storefront. It knows nothing about HTTP; the
//! server crate wraps it.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). The traits describe what the APIs need from a backend;
//!    [`SqliteDatabase`] implements all of them. The data types stored are defined in [`mod@db_types`].
//! 2. Pricing ([`mod@pricing`]). There is exactly one place where carts are priced, and it always uses the catalog.
//! 3. The public API ([`mod@wl_api`]). Catalog, order, checkout and refund flows, each generic over the backend and,
//!    where needed, the payment gateways.
pub mod db_types;
pub mod helpers;
pub mod pricing;
pub mod traits;
mod wl_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use wl_api::{
    catalog_api::CatalogApi,
    catalog_objects,
    hosted_checkout_api::{HostedCheckoutApi, WebhookOutcome},
    order_flow_api::OrderFlowApi,
    order_objects,
    refund_api::RefundApi,
    wallet_checkout_api::WalletCheckoutApi,
};
