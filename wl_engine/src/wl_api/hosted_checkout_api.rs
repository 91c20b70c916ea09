use std::fmt::Debug;

use log::*;

use super::order_flow_api::{price_cart, validate_shipping_address};
use crate::{
    db_types::{NewOrder, Order, OrderItem, PaymentMethod, PaymentResult, Requester, ShippingAddress},
    order_objects::{CartLine, CheckoutMetadata, CheckoutUrls, PricedCart},
    traits::{
        CardGateway,
        CatalogManagement,
        CheckoutEvent,
        CompletedSession,
        HostedLineItem,
        HostedSession,
        HostedSessionRequest,
        OrderManagement,
        StoreError,
    },
};

/// What became of a verified card-gateway notification.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// A paid order was created for the session
    OrderCreated(Order),
    /// The session had already been turned into this order
    AlreadyProcessed(Order),
    /// An event type, or a session state, the store does not act on
    Ignored,
    /// The event was genuine but no order could be created for it. Nothing was recorded.
    Failed(StoreError),
}

/// `HostedCheckoutApi` runs the card-gateway checkout: the buyer pays on a page hosted by the provider, and the
/// order only comes into existence when the provider's signed notification arrives.
///
/// Notifications are delivered at least once. Each session id is recorded alongside the order it produced, so that
/// repeats are recognised and produce no further orders or stock changes.
pub struct HostedCheckoutApi<B, C> {
    db: B,
    gateway: C,
}

impl<B, C> Debug for HostedCheckoutApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostedCheckoutApi")
    }
}

impl<B, C> HostedCheckoutApi<B, C> {
    pub fn new(db: B, gateway: C) -> Self {
        Self { db, gateway }
    }
}

impl<B, C> HostedCheckoutApi<B, C>
where
    B: CatalogManagement + OrderManagement,
    C: CardGateway,
{
    /// Prices the cart and opens a hosted payment session for it. Nothing is stored yet.
    pub async fn start_checkout(
        &self,
        customer: &Requester,
        lines: Vec<CartLine>,
        shipping_address: ShippingAddress,
        urls: CheckoutUrls,
    ) -> Result<HostedSession, StoreError> {
        validate_shipping_address(&shipping_address)?;
        let cart = price_cart(&self.db, &lines).await?;
        let metadata = CheckoutMetadata::new(customer.user_id.clone(), &cart, shipping_address).to_metadata()?;
        let line_items = session_line_items(&cart);
        let request = HostedSessionRequest {
            line_items,
            success_url: urls.success_url,
            cancel_url: urls.cancel_url,
            customer_email: Some(customer.email.clone()).filter(|e| !e.is_empty()),
            metadata,
        };
        let session = self.gateway.create_hosted_session(request).await.map_err(|e| {
            error!("💳️ Could not open a checkout session for {}. {e}", customer.user_id);
            StoreError::from(e)
        })?;
        info!(
            "💳️ Checkout session {} opened for {} ({})",
            session.session_id, customer.user_id, cart.prices.total_price
        );
        Ok(session)
    }

    /// Handles a notification from the card gateway.
    ///
    /// A bad signature is the only error returned. Once the notification is known to be genuine, every other problem
    /// is reported as [`WebhookOutcome::Failed`], since the provider resending the same event would not help.
    pub async fn process_notification(&self, raw_body: &[u8], signature: &str) -> Result<WebhookOutcome, StoreError> {
        let event = self.gateway.verify_and_parse_event(raw_body, signature).map_err(|e| {
            warn!("🔐️ Rejected a card gateway notification. {e}");
            StoreError::from(e)
        })?;
        let session = match event {
            CheckoutEvent::SessionCompleted(session) => session,
            CheckoutEvent::Ignored => {
                debug!("💳️ Ignoring card gateway event");
                return Ok(WebhookOutcome::Ignored);
            },
        };
        // Delayed payment methods complete the session unpaid. The provider follows up with a paid session for the
        // same id once the money arrives, and that is when the order is created.
        if !session.is_paid() {
            info!(
                "💳️ Checkout session {} completed with payment status '{}'. No order created.",
                session.session_id, session.payment_status
            );
            return Ok(WebhookOutcome::Ignored);
        }
        match self.create_paid_order(&session).await {
            Ok((order, true)) => {
                info!("💳️ Order {} created and paid from checkout session {}", order.id, session.session_id);
                Ok(WebhookOutcome::OrderCreated(order))
            },
            Ok((order, false)) => {
                info!("💳️ Checkout session {} was already processed as order {}", session.session_id, order.id);
                Ok(WebhookOutcome::AlreadyProcessed(order))
            },
            Err(e) => {
                error!(
                    "💳️ Payment for checkout session {} (charge {}) was taken, but no order could be created. This \
                     needs to be reconciled by hand. {e}",
                    session.session_id,
                    session.payment_reference.as_deref().unwrap_or("unknown")
                );
                Ok(WebhookOutcome::Failed(e))
            },
        }
    }

    async fn create_paid_order(&self, session: &CompletedSession) -> Result<(Order, bool), StoreError> {
        let checkout = CheckoutMetadata::from_metadata(&session.metadata)?;
        let mut items = Vec::with_capacity(checkout.lines.len());
        for line in checkout.lines {
            items.push(self.order_item_for(line).await?);
        }
        let payment = PaymentResult {
            id: session.payment_reference.clone().unwrap_or_default(),
            status: session.payment_status.clone(),
            email_address: session.customer_email.clone(),
        };
        let order = NewOrder::new(checkout.user_id, items, checkout.shipping_address, PaymentMethod::Stripe)
            .paid(payment, session.occurred_at)
            .reserving_stock();
        if order.prices != checkout.prices {
            warn!(
                "💳️ Checkout session {} was charged {} but its items add up to {}",
                session.session_id, checkout.prices.total_price, order.prices.total_price
            );
        }
        self.db.insert_order_for_checkout_session(&session.session_id, order).await
    }

    /// Rebuilds an order line at the price that was charged, taking the display fields from the catalog.
    async fn order_item_for(&self, line: CartLine) -> Result<OrderItem, StoreError> {
        let price = line
            .price
            .ok_or_else(|| StoreError::ValidationError(format!("Checkout line for {} has no price", line.product)))?;
        let product = self.db.fetch_product(&line.product).await?;
        let (name, image) = match product {
            Some(p) => (p.name.clone(), p.main_image().cloned()),
            None => (line.product.to_string(), None),
        };
        Ok(OrderItem { product: line.product, name, image, quantity: line.quantity, price, variation: line.variation })
    }
}

/// The lines the buyer is charged for on the hosted page. Shipping and tax are charged as lines of their own, so the
/// session total is the order's `totalPrice` and a full refund never exceeds what was taken.
fn session_line_items(cart: &PricedCart) -> Vec<HostedLineItem> {
    let mut line_items: Vec<HostedLineItem> = cart
        .items
        .iter()
        .map(|item| HostedLineItem {
            name: item.name.clone(),
            image: item.image.clone(),
            unit_amount: item.price,
            quantity: item.quantity,
        })
        .collect();
    let extras = [("Shipping", cart.prices.shipping_price), ("Sales tax", cart.prices.tax_price)];
    for (name, amount) in extras {
        if amount.value() > 0 {
            line_items.push(HostedLineItem { name: name.to_string(), image: None, unit_amount: amount, quantity: 1 });
        }
    }
    line_items
}
