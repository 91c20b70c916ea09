//! # Wick & Lather server
//! This crate hosts the HTTP server for the Wick & Lather storefront. It is responsible for:
//! * Serving the product catalog.
//! * Taking orders, either directly or through one of the two payment providers.
//! * Receiving signed payment notifications from the card provider and turning them into paid orders.
//! * Refund requests and their review by the back office.
//!
//! The business rules live in `wl_engine`; the handlers here only translate between HTTP and the engine APIs.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Public:
//! * `GET /health`
//! * `GET /api/products`, `GET /api/products/{id or slug}`
//! * `POST /api/payments/stripe/webhook` (signed by the card provider)
//!
//! Signed in users (a bearer token from the identity provider):
//! * `POST /api/orders`, `GET /api/orders`, `GET /api/orders/{id}`
//! * `POST /api/payments/stripe/create-checkout`
//! * `POST /api/payments/paypal/create-order`, `POST /api/payments/paypal/capture-order`
//! * `POST /api/refunds`, `GET /api/refunds`
//!
//! Admins:
//! * `GET /api/admin/orders`, `PUT /api/admin/orders/{id}`
//! * `PUT /api/admin/refunds/{id}`
//! * `GET /api/admin/products`, `POST /api/admin/products`, `PUT /api/admin/products/{id}`,
//!   `DELETE /api/admin/products/{id}`

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
