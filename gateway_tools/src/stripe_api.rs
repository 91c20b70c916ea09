use std::{collections::BTreeMap, sync::Arc};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize};
use wl_common::Cents;

use crate::{
    config::StripeConfig,
    stripe_webhook::{construct_event, StripeWebhookEvent},
    GatewayApiError,
};

/// The provider refuses metadata values longer than this.
pub const MAX_METADATA_VALUE_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionLineItem {
    pub name: String,
    pub image: Option<String>,
    pub unit_amount: Cents,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckoutSession {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Sends a form-encoded request, which is what the provider's API takes.
    pub async fn form_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message: error_message(&body) })
        }
    }

    pub async fn create_checkout_session(
        &self,
        session: NewCheckoutSession,
    ) -> Result<CheckoutSession, GatewayApiError> {
        let form = session_form(&session, &self.config.currency)?;
        debug!("💳️ Creating checkout session with {} line items", session.line_items.len());
        let result = self.form_query::<CheckoutSession>(Method::POST, "/v1/checkout/sessions", &form, None).await?;
        info!("💳️ Created checkout session {}", result.id);
        Ok(result)
    }

    /// Refunds `amount` of the payment `payment_intent`. The provider collapses repeated calls with the same
    /// `idempotency_key` into one refund.
    pub async fn create_refund(
        &self,
        payment_intent: &str,
        amount: Cents,
        idempotency_key: &str,
    ) -> Result<StripeRefund, GatewayApiError> {
        if amount.value() <= 0 {
            return Err(GatewayApiError::InvalidCurrencyAmount(amount.to_string()));
        }
        let form = vec![
            ("payment_intent".to_string(), payment_intent.to_string()),
            ("amount".to_string(), amount.value().to_string()),
        ];
        debug!("💳️ Refunding {amount} of payment {payment_intent}");
        let refund = self.form_query::<StripeRefund>(Method::POST, "/v1/refunds", &form, Some(idempotency_key)).await?;
        info!("💳️ Refund {} created for payment {payment_intent}", refund.id);
        Ok(refund)
    }

    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<StripeWebhookEvent, GatewayApiError> {
        construct_event(payload, header, self.config.webhook_secret.reveal(), self.config.webhook_tolerance)
    }
}

/// Flattens a session request into the provider's bracketed form keys.
fn session_form(session: &NewCheckoutSession, currency: &str) -> Result<Vec<(String, String)>, GatewayApiError> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), session.success_url.clone()),
        ("cancel_url".to_string(), session.cancel_url.clone()),
    ];
    if let Some(email) = &session.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }
    for (i, item) in session.line_items.iter().enumerate() {
        if item.unit_amount.value() < 0 {
            return Err(GatewayApiError::InvalidCurrencyAmount(item.unit_amount.to_string()));
        }
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[price_data][currency]"), currency.to_string()));
        form.push((format!("{prefix}[price_data][product_data][name]"), item.name.clone()));
        if let Some(image) = &item.image {
            form.push((format!("{prefix}[price_data][product_data][images][0]"), image.clone()));
        }
        form.push((format!("{prefix}[price_data][unit_amount]"), item.unit_amount.value().to_string()));
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }
    for (key, value) in &session.metadata {
        if value.len() > MAX_METADATA_VALUE_LEN {
            return Err(GatewayApiError::RestRequestError(format!(
                "Checkout metadata '{key}' is {} characters long. The limit is {MAX_METADATA_VALUE_LEN}.",
                value.len()
            )));
        }
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    Ok(form)
}

/// Pulls the human-readable message out of an error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}
