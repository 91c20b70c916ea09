use gateway_tools::{NewCheckoutSession, SessionLineItem, StripeApi, StripeConfig, StripeWebhookEvent};
use log::*;
use wl_engine::{
    db_types::Cents,
    traits::{
        CardGateway,
        CheckoutEvent,
        CompletedSession,
        GatewayError,
        HostedSession,
        HostedSessionRequest,
        PaymentReversal,
    },
};

use super::gateway_error;
use crate::errors::ServerError;

/// The card gateway: hosted checkout sessions on the provider's pages, confirmed by signed webhooks.
#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, ServerError> {
        let api = StripeApi::new(config).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentReversal for StripeGateway {
    async fn reverse_charge(
        &self,
        charge_ref: &str,
        amount: Cents,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let refund = self.api.create_refund(charge_ref, amount, idempotency_key).await.map_err(gateway_error)?;
        Ok(refund.id)
    }
}

impl CardGateway for StripeGateway {
    async fn create_hosted_session(&self, request: HostedSessionRequest) -> Result<HostedSession, GatewayError> {
        let line_items = request
            .line_items
            .into_iter()
            .map(|item| SessionLineItem {
                name: item.name,
                image: item.image,
                unit_amount: item.unit_amount,
                quantity: item.quantity,
            })
            .collect();
        let session = NewCheckoutSession {
            line_items,
            success_url: request.success_url,
            cancel_url: request.cancel_url,
            customer_email: request.customer_email,
            metadata: request.metadata,
        };
        let session = self.api.create_checkout_session(session).await.map_err(gateway_error)?;
        let redirect_url = session
            .url
            .ok_or_else(|| GatewayError::InvalidResponse(format!("Checkout session {} has no URL", session.id)))?;
        Ok(HostedSession { session_id: session.id, redirect_url })
    }

    fn verify_and_parse_event(&self, raw_body: &[u8], signature: &str) -> Result<CheckoutEvent, GatewayError> {
        match self.api.construct_event(raw_body, signature).map_err(gateway_error)? {
            StripeWebhookEvent::CheckoutSessionCompleted { session, created_at } => {
                let customer_email = session.email();
                Ok(CheckoutEvent::SessionCompleted(CompletedSession {
                    session_id: session.id,
                    payment_reference: session.payment_intent,
                    payment_status: session.payment_status,
                    customer_email,
                    metadata: session.metadata,
                    occurred_at: created_at,
                }))
            },
            StripeWebhookEvent::Other(event_type) => {
                trace!("💳️ Card gateway event {event_type} needs no action");
                Ok(CheckoutEvent::Ignored)
            },
        }
    }
}
