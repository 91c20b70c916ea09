//! # Storefront engine public API
//!
//! The `wl_api` module exposes the programmatic API of the storefront engine. The API is split by concern, so that
//! clients pick only the pieces (and hence the backend and gateway traits) they need.
//!
//! * [`catalog_api`] serves and maintains the product catalog.
//! * [`order_flow_api`] prices carts, places orders directly, and looks after orders once they exist.
//! * [`hosted_checkout_api`] runs the card-gateway checkout, where orders are created from signed notifications.
//! * [`wallet_checkout_api`] runs the wallet-gateway checkout, where stored orders are captured after approval.
//! * [`refund_api`] handles refund requests and their review.
//!
//! # API usage
//!
//! Every API is created by handing it a backend that implements the storage traits it needs, plus the payment
//! gateways where relevant.
//!
//! ```rust,ignore
//! use wl_engine::{OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/store.db", 5).await?;
//! // SqliteDatabase implements CatalogManagement and OrderManagement
//! let api = OrderFlowApi::new(db);
//! let orders = api.orders_for_user(&user_id).await?;
//! ```
pub mod catalog_api;
pub mod catalog_objects;
pub mod hosted_checkout_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod refund_api;
pub mod wallet_checkout_api;
