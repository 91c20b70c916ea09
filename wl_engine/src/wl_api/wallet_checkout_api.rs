use std::fmt::Debug;

use chrono::Utc;
use log::*;

use super::order_flow_api::{price_cart, validate_shipping_address};
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatus, PaymentMethod, PaymentResult, Requester, ShippingAddress},
    order_objects::{CartLine, WalletOrderCreated},
    traits::{CatalogManagement, GatewayError, IntentRequest, OrderManagement, StoreError, WalletGateway},
};

/// `WalletCheckoutApi` runs the wallet-gateway checkout. The order is stored (unpaid) as soon as the provider has
/// opened a payment intent for it; once the buyer approves the payment on the provider's side, the order is captured.
///
/// Stock is only taken when the capture succeeds. Orders that are never captured are cleaned up by
/// [`OrderFlowApi::expire_unpaid_orders`](crate::OrderFlowApi::expire_unpaid_orders).
pub struct WalletCheckoutApi<B, W> {
    db: B,
    gateway: W,
}

impl<B, W> Debug for WalletCheckoutApi<B, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletCheckoutApi")
    }
}

impl<B, W> WalletCheckoutApi<B, W> {
    pub fn new(db: B, gateway: W) -> Self {
        Self { db, gateway }
    }
}

impl<B, W> WalletCheckoutApi<B, W>
where
    B: CatalogManagement + OrderManagement,
    W: WalletGateway,
{
    /// Prices the cart, opens a payment intent for it and stores the unpaid order. If the provider refuses the intent,
    /// nothing is stored.
    pub async fn create_order(
        &self,
        customer: &Requester,
        lines: Vec<CartLine>,
        shipping_address: ShippingAddress,
    ) -> Result<WalletOrderCreated, StoreError> {
        validate_shipping_address(&shipping_address)?;
        let cart = price_cart(&self.db, &lines).await?;
        let order = NewOrder::new(customer.user_id.clone(), cart.items, shipping_address, PaymentMethod::Paypal);
        let request = IntentRequest { reference: order.id.clone(), amount: order.prices.total_price };
        let intent_id = self.gateway.create_intent(request).await.map_err(|e| {
            error!("🅿️ Could not open a payment intent for {}. {e}", customer.user_id);
            StoreError::from(e)
        })?;
        let order = self.db.insert_order(order.with_payment_intent(intent_id)).await?;
        info!("🅿️ Order {} for {} is awaiting wallet approval", order.id, order.total_price);
        Ok(WalletOrderCreated::from(&order))
    }

    /// Captures the approved payment for an order and marks the order paid.
    ///
    /// The caller must own the order or be an admin. The capture must have completed and be for exactly the order
    /// total. Capturing an order that has already been paid returns it unchanged.
    pub async fn capture_order(&self, caller: &Requester, order_id: &OrderId) -> Result<Order, StoreError> {
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if !caller.is_admin() && !order.is_owned_by(&caller.user_id) {
            warn!("🅿️ {} tried to capture order {order_id}, which belongs to someone else", caller.user_id);
            return Err(StoreError::NotOrderOwner(order_id.clone()));
        }
        if order.order_status == OrderStatus::Cancelled {
            return Err(StoreError::OrderCancelled(order_id.clone()));
        }
        if order.is_paid {
            debug!("🅿️ Order {order_id} has already been paid. Nothing to capture.");
            return Ok(order);
        }
        if order.payment_method != PaymentMethod::Paypal {
            return Err(StoreError::ValidationError(format!("Order {order_id} is not a wallet order")));
        }
        let intent_id = order
            .payment_intent_id
            .as_deref()
            .ok_or_else(|| StoreError::ValidationError(format!("Order {order_id} has no payment intent")))?;
        let capture = self.gateway.capture(intent_id).await.map_err(|e| {
            error!("🅿️ Capture of intent {intent_id} for order {order_id} failed. {e}");
            StoreError::from(e)
        })?;
        if !capture.is_completed() {
            warn!("🅿️ Capture {} for order {order_id} has status {}", capture.capture_id, capture.status);
            return Err(GatewayError::NotCompleted(capture.status).into());
        }
        if capture.amount != order.total_price {
            error!(
                "🅿️ Capture {} for order {order_id} was for {}, but the order total is {}. The order stays unpaid.",
                capture.capture_id, capture.amount, order.total_price
            );
            return Err(GatewayError::AmountMismatch { expected: order.total_price, captured: capture.amount }.into());
        }
        let payment =
            PaymentResult { id: capture.capture_id.clone(), status: capture.status, email_address: capture.payer_email };
        match self.db.mark_order_paid(order_id, payment, Utc::now()).await {
            Ok((order, updated)) => {
                if updated {
                    info!("🅿️ Order {order_id} paid with capture {}", capture.capture_id);
                }
                Ok(order)
            },
            Err(e) => {
                error!(
                    "🅿️ Capture {} for order {order_id} succeeded, but the order could not be marked paid. This needs \
                     to be reconciled by hand. {e}",
                    capture.capture_id
                );
                Err(e)
            },
        }
    }
}
