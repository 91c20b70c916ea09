use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, OrderId, PaymentMethod};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Invalid webhook signature. {0}")]
    InvalidSignature(String),
    #[error("{0}")]
    ProviderError(String),
    #[error("Unexpected response from the payment provider. {0}")]
    InvalidResponse(String),
    #[error("Captured amount {captured} does not match the order total {expected}")]
    AmountMismatch { expected: Cents, captured: Cents },
    #[error("Payment was not completed. Provider status: {0}")]
    NotCompleted(String),
}

//--------------------------------------   Hosted checkout   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedLineItem {
    pub name: String,
    pub image: Option<String>,
    pub unit_amount: Cents,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedSessionRequest {
    pub line_items: Vec<HostedLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedSession {
    pub session_id: String,
    pub redirect_url: String,
}

/// A verified notification from the card gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    #[serde(rename = "checkout.session.completed")]
    SessionCompleted(CompletedSession),
    /// Any event type the store does not act on
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub session_id: String,
    /// The charge reference reversals are requested against
    pub payment_reference: Option<String>,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl CompletedSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

//--------------------------------------  Redirect checkout  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Our order id, echoed back by the provider
    pub reference: OrderId,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub capture_id: String,
    pub status: String,
    pub payer_email: Option<String>,
    pub amount: Cents,
}

impl CaptureResult {
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("COMPLETED")
    }
}

//--------------------------------------       Traits        ---------------------------------------------------------
/// Returning captured funds to the customer.
#[allow(async_fn_in_trait)]
pub trait PaymentReversal {
    /// Asks the provider to reverse `amount` of the charge identified by `charge_ref`. Returns the provider's
    /// reference for the reversal.
    ///
    /// Providers must treat repeated calls with the same `idempotency_key` as a single reversal.
    async fn reverse_charge(&self, charge_ref: &str, amount: Cents, idempotency_key: &str)
        -> Result<String, GatewayError>;
}

/// The card-network provider: hosted checkout pages, confirmed by signed webhooks.
#[allow(async_fn_in_trait)]
pub trait CardGateway: PaymentReversal {
    async fn create_hosted_session(&self, request: HostedSessionRequest) -> Result<HostedSession, GatewayError>;

    /// Verifies the webhook signature over the raw request body and parses the event.
    fn verify_and_parse_event(&self, raw_body: &[u8], signature: &str) -> Result<CheckoutEvent, GatewayError>;
}

/// The wallet provider: an intent is opened for a stored order, approved by the buyer, and then captured.
#[allow(async_fn_in_trait)]
pub trait WalletGateway: PaymentReversal {
    /// Returns the provider's intent id.
    async fn create_intent(&self, request: IntentRequest) -> Result<String, GatewayError>;

    async fn capture(&self, intent_id: &str) -> Result<CaptureResult, GatewayError>;
}

/// Both providers, selected by an order's [`PaymentMethod`].
#[derive(Clone)]
pub struct PaymentGateways<C, W> {
    card: C,
    wallet: W,
}

impl<C, W> PaymentGateways<C, W> {
    pub fn new(card: C, wallet: W) -> Self {
        Self { card, wallet }
    }

    pub fn card(&self) -> &C {
        &self.card
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }
}

impl<C, W> PaymentGateways<C, W>
where
    C: CardGateway,
    W: WalletGateway,
{
    pub async fn reverse_charge(
        &self,
        method: PaymentMethod,
        charge_ref: &str,
        amount: Cents,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        debug!("💸️ Reversing {amount} of {method} charge {charge_ref}");
        match method {
            PaymentMethod::Stripe => self.card.reverse_charge(charge_ref, amount, idempotency_key).await,
            PaymentMethod::Paypal => self.wallet.reverse_charge(charge_ref, amount, idempotency_key).await,
        }
    }
}
