//! Thin HTTP clients for the two payment providers the store uses.
//!
//! * [`StripeApi`] opens hosted card-checkout sessions, issues refunds and verifies signed webhook deliveries.
//! * [`PaypalApi`] opens wallet payment orders, captures them once the buyer has approved, and refunds captures.
//!
//! Neither client knows anything about the store's own order records.
mod config;
mod error;
mod paypal_api;
mod stripe_api;
pub mod stripe_webhook;

pub use config::{PaypalConfig, StripeConfig, DEFAULT_PAYPAL_API_URL, DEFAULT_STRIPE_API_URL, DEFAULT_WEBHOOK_TOLERANCE};
pub use error::GatewayApiError;
pub use paypal_api::{Capture, CapturedOrder, Money, PaypalApi, PaypalOrder, PaypalRefund};
pub use stripe_api::{CheckoutSession, NewCheckoutSession, SessionLineItem, StripeApi, StripeRefund};
pub use stripe_webhook::{CheckoutSessionObject, StripeWebhookEvent};
