use gateway_tools::{PaypalApi, PaypalConfig};
use log::*;
use wl_engine::{
    db_types::Cents,
    traits::{CaptureResult, GatewayError, IntentRequest, PaymentReversal, WalletGateway},
};

use super::gateway_error;
use crate::errors::ServerError;

/// The wallet gateway: a payment order is opened for a stored order, approved by the buyer on the provider's side,
/// then captured.
#[derive(Clone)]
pub struct PaypalGateway {
    api: PaypalApi,
}

impl PaypalGateway {
    pub fn new(config: PaypalConfig) -> Result<Self, ServerError> {
        let api = PaypalApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentReversal for PaypalGateway {
    /// `charge_ref` is the capture id recorded when the order was paid.
    async fn reverse_charge(
        &self,
        charge_ref: &str,
        amount: Cents,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let refund = self.api.refund_capture(charge_ref, amount, idempotency_key).await.map_err(gateway_error)?;
        Ok(refund.id)
    }
}

impl WalletGateway for PaypalGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<String, GatewayError> {
        let order = self.api.create_order(request.reference.as_str(), request.amount).await.map_err(gateway_error)?;
        Ok(order.id)
    }

    async fn capture(&self, intent_id: &str) -> Result<CaptureResult, GatewayError> {
        let captured = self.api.capture_order(intent_id).await.map_err(gateway_error)?;
        let capture = captured.capture().ok_or_else(|| {
            warn!("🅿️ Payment order {intent_id} was captured with status {}, but has no capture", captured.status);
            GatewayError::InvalidResponse(format!("Payment order {intent_id} has no capture"))
        })?;
        let amount = capture.amount.cents().map_err(gateway_error)?;
        Ok(CaptureResult {
            capture_id: capture.id.clone(),
            status: capture.status.clone(),
            payer_email: captured.payer_email(),
            amount,
        })
    }
}
