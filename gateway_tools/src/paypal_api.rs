use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use log::*;
use reqwest::{header::HeaderValue, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use wl_common::Cents;

use crate::{config::PaypalConfig, GatewayApiError};

/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

impl Money {
    pub fn new(amount: Cents, currency: &str) -> Self {
        Self { currency_code: currency.to_uppercase(), value: amount.to_decimal_string() }
    }

    pub fn cents(&self) -> Result<Cents, GatewayApiError> {
        self.value.parse::<Cents>().map_err(|e| GatewayApiError::InvalidCurrencyAmount(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payer {
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturedUnit {
    pub reference_id: Option<String>,
    #[serde(default)]
    pub payments: Payments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturedOrder {
    pub id: String,
    pub status: String,
    pub payer: Option<Payer>,
    #[serde(default)]
    pub purchase_units: Vec<CapturedUnit>,
}

impl CapturedOrder {
    /// The first capture of the first purchase unit. The store only ever opens single-unit orders.
    pub fn capture(&self) -> Option<&Capture> {
        self.purchase_units.first().and_then(|u| u.payments.captures.first())
    }

    pub fn payer_email(&self) -> Option<String> {
        self.payer.as_ref().and_then(|p| p.email_address.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaypalRefund {
    pub id: String,
    pub status: String,
}

#[derive(Clone)]
pub struct PaypalApi {
    config: PaypalConfig,
    client: Arc<Client>,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl PaypalApi {
    pub fn new(config: PaypalConfig) -> Result<Self, GatewayApiError> {
        let client = Client::builder().build().map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(Mutex::new(None)) })
    }

    pub fn config(&self) -> &PaypalConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard.as_ref().filter(|t| t.expires_at > Instant::now()).map(|t| t.token.clone())
    }

    /// Fetches an OAuth access token with the client-credentials grant, reusing the last one until it expires.
    pub async fn access_token(&self) -> Result<String, GatewayApiError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        trace!("🅿️ Requesting a new access token");
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayApiError::AuthenticationError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayApiError::AuthenticationError(format!("Error {status}. {message}")));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(AccessToken { token: token.access_token.clone(), expires_at: Instant::now() + lifetime });
        }
        Ok(token.access_token)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
        request_id: Option<&str>,
    ) -> Result<T, GatewayApiError> {
        let token = self.access_token().await?;
        let url = self.url(path);
        trace!("🅿️ Sending REST query: {url}");
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        if let Some(id) = request_id {
            let val = HeaderValue::from_str(id).map_err(|e| GatewayApiError::RestRequestError(e.to_string()))?;
            req = req.header("PayPal-Request-Id", val);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🅿️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message: error_message(&body) })
        }
    }

    /// Opens an order for `amount`, tagged with the store's own order id.
    pub async fn create_order(&self, reference: &str, amount: Cents) -> Result<PaypalOrder, GatewayApiError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": reference,
                "amount": Money::new(amount, &self.config.currency),
            }],
        });
        debug!("🅿️ Opening a payment order for {reference} ({amount})");
        let order = self.rest_query::<PaypalOrder, _>(Method::POST, "/v2/checkout/orders", Some(body), None).await?;
        info!("🅿️ Payment order {} opened for {reference}", order.id);
        Ok(order)
    }

    pub async fn capture_order(&self, paypal_order_id: &str) -> Result<CapturedOrder, GatewayApiError> {
        let path = format!("/v2/checkout/orders/{paypal_order_id}/capture");
        debug!("🅿️ Capturing payment order {paypal_order_id}");
        let captured = self
            .rest_query::<CapturedOrder, _>(Method::POST, &path, Some(json!({})), Some(paypal_order_id))
            .await?;
        info!("🅿️ Payment order {paypal_order_id} captured with status {}", captured.status);
        Ok(captured)
    }

    /// Refunds `amount` of the capture `capture_id`. Requests sharing a `request_id` are a single refund.
    pub async fn refund_capture(
        &self,
        capture_id: &str,
        amount: Cents,
        request_id: &str,
    ) -> Result<PaypalRefund, GatewayApiError> {
        if amount.value() <= 0 {
            return Err(GatewayApiError::InvalidCurrencyAmount(amount.to_string()));
        }
        let path = format!("/v2/payments/captures/{capture_id}/refund");
        let body = json!({ "amount": Money::new(amount, &self.config.currency) });
        debug!("🅿️ Refunding {amount} of capture {capture_id}");
        let refund = self.rest_query::<PaypalRefund, _>(Method::POST, &path, Some(body), Some(request_id)).await?;
        info!("🅿️ Refund {} ({}) issued against capture {capture_id}", refund.id, refund.status);
        Ok(refund)
    }
}

fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| v["message"].as_str().or_else(|| v["error_description"].as_str()));
    message.map(String::from).unwrap_or_else(|| body.to_string())
}
