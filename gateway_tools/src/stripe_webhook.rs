//! Verification and parsing of card-gateway webhook deliveries.
//!
//! Every delivery carries a `Stripe-Signature` header of the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The
//! signature is an HMAC-SHA256 over `"<t>.<raw body>"`, keyed with the endpoint's signing secret. Several `v1`
//! entries may be present while a secret is being rolled; any one of them matching is enough.
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use sha2::Sha256;

use crate::GatewayApiError;

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
/// Sent when a delayed payment method (bank debits and the like) clears after the session completed unpaid.
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

#[derive(Debug, Clone, PartialEq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, GatewayApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| GatewayApiError::InvalidSignature("Malformed signature header".into()))?;
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|_| GatewayApiError::InvalidSignature("Invalid signature timestamp".into()))?;
                timestamp = Some(t);
            },
            // Undecodable entries cannot match, so they are skipped rather than failing the whole header
            "v1" => match hex::decode(value) {
                Ok(sig) => signatures.push(sig),
                Err(_) => trace!("🔐️ Skipping non-hex v1 signature"),
            },
            _ => {},
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| GatewayApiError::InvalidSignature("Signature header has no timestamp".into()))?;
    if signatures.is_empty() {
        return Err(GatewayApiError::InvalidSignature("Signature header has no v1 signature".into()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

/// Checks `header` against `payload`, signed with `secret`, at time `now`.
///
/// `tolerance` is the largest allowed difference, in seconds, between `now` and the signed timestamp.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: DateTime<Utc>,
) -> Result<(), GatewayApiError> {
    if secret.is_empty() {
        return Err(GatewayApiError::InvalidSignature("No webhook signing secret is configured".into()));
    }
    let header = parse_signature_header(header)?;
    if (now.timestamp() - header.timestamp).abs() > tolerance {
        return Err(GatewayApiError::InvalidSignature("Signature timestamp is outside the tolerance".into()));
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayApiError::InvalidSignature(e.to_string()))?;
    mac.update(header.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(GatewayApiError::InvalidSignature("No signatures found matching the expected signature".into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// The parts of a checkout session object the store cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub payment_intent: Option<String>,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSessionObject {
    pub fn email(&self) -> Option<String> {
        self.customer_details.as_ref().and_then(|d| d.email.clone()).or_else(|| self.customer_email.clone())
    }
}

#[derive(Debug, Clone)]
pub enum StripeWebhookEvent {
    /// A completed session, or one whose delayed payment has since succeeded. Check `payment_status`.
    CheckoutSessionCompleted { session: CheckoutSessionObject, created_at: DateTime<Utc> },
    Other(String),
}

impl StripeEvent {
    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.created, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Verifies the delivery and, if genuine, picks out the events the store acts on.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
) -> Result<StripeWebhookEvent, GatewayApiError> {
    verify_signature(payload, header, secret, tolerance, Utc::now())?;
    let event: StripeEvent = serde_json::from_slice(payload).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    debug!("🔐️ Verified card gateway event {} ({})", event.id, event.event_type);
    if !matches!(event.event_type.as_str(), CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED) {
        return Ok(StripeWebhookEvent::Other(event.event_type));
    }
    let created_at = event.created_at();
    let session = serde_json::from_value::<CheckoutSessionObject>(event.data.object)
        .map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    Ok(StripeWebhookEvent::CheckoutSessionCompleted { session, created_at })
}

/// Produces a signature header for `payload`. Used to sign test deliveries.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return format!("t={timestamp}"),
    };
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
