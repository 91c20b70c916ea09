use log::*;
use wl_common::{helpers::parse_or_default, Secret, DEFAULT_CURRENCY_CODE};

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";
pub const DEFAULT_PAYPAL_API_URL: &str = "https://api-m.sandbox.paypal.com";
/// Maximum age, in seconds, of a webhook signature timestamp.
pub const DEFAULT_WEBHOOK_TOLERANCE: i64 = 300;

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub webhook_tolerance: i64,
    pub currency: String,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("WL_STRIPE_API_URL").unwrap_or_else(|_| {
            info!("🪛️ WL_STRIPE_API_URL not set, using {DEFAULT_STRIPE_API_URL}");
            DEFAULT_STRIPE_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("WL_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ WL_STRIPE_SECRET_KEY not set. Card checkouts will be refused by the provider.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("WL_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ WL_STRIPE_WEBHOOK_SECRET not set. Every card payment notification will be rejected.");
            String::default()
        }));
        let (webhook_tolerance, valid) =
            parse_or_default(std::env::var("WL_STRIPE_WEBHOOK_TOLERANCE").ok(), DEFAULT_WEBHOOK_TOLERANCE);
        if !valid {
            warn!("🪛️ Invalid WL_STRIPE_WEBHOOK_TOLERANCE. Using the default of {DEFAULT_WEBHOOK_TOLERANCE}s.");
        }
        Self { api_url, secret_key, webhook_secret, webhook_tolerance, currency: currency_from_env() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaypalConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub currency: String,
}

impl PaypalConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("WL_PAYPAL_API_URL").unwrap_or_else(|_| {
            info!("🪛️ WL_PAYPAL_API_URL not set, using {DEFAULT_PAYPAL_API_URL}");
            DEFAULT_PAYPAL_API_URL.to_string()
        });
        let client_id = std::env::var("WL_PAYPAL_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🪛️ WL_PAYPAL_CLIENT_ID not set. Wallet checkouts will not work.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("WL_PAYPAL_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ WL_PAYPAL_CLIENT_SECRET not set. Wallet checkouts will not work.");
            String::default()
        }));
        Self { api_url, client_id, client_secret, currency: currency_from_env() }
    }
}

fn currency_from_env() -> String {
    std::env::var("WL_CURRENCY").map(|c| c.trim().to_lowercase()).unwrap_or_else(|_| {
        debug!("🪛️ WL_CURRENCY not set, using {DEFAULT_CURRENCY_CODE}");
        DEFAULT_CURRENCY_CODE.to_string()
    })
}
