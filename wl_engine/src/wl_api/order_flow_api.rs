use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentMethod, Requester, ShippingAddress, UserId},
    order_objects::{CartLine, FulfilmentUpdate, OrderQueryFilter, PricedCart},
    pricing::{price_line, PriceBreakdown},
    traits::{CatalogManagement, OrderManagement, Page, StoreError},
};

/// `OrderFlowApi` is the primary API for placing orders directly and for looking after them afterwards.
///
/// The two gateway-driven checkout flows live in [`HostedCheckoutApi`](crate::HostedCheckoutApi) and
/// [`WalletCheckoutApi`](crate::WalletCheckoutApi), but price carts the same way, using [`Self::price_cart`].
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: CatalogManagement + OrderManagement
{
    /// Prices a cart from the catalog. Any client-supplied prices are ignored.
    ///
    /// Every line must refer to an active product with enough stock for the line's quantity.
    pub async fn price_cart(&self, lines: &[CartLine]) -> Result<PricedCart, StoreError> {
        price_cart(&self.db, lines).await
    }

    /// Places an order on the direct path: the order is stored unpaid, and the stock for every line is taken in the
    /// same transaction. If any line is short of stock, no order is created and no stock is touched.
    pub async fn place_order(
        &self,
        customer: &Requester,
        lines: Vec<CartLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order, StoreError> {
        validate_shipping_address(&shipping_address)?;
        let cart = self.price_cart(&lines).await?;
        let order = NewOrder::new(customer.user_id.clone(), cart.items, shipping_address, payment_method).reserving_stock();
        let order = self.db.insert_order(order).await?;
        info!("🛒️ Order {} placed by {} for {}", order.id, customer.user_id, order.total_price);
        Ok(order)
    }

    pub async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    /// Fetches an order on behalf of `caller`, who must either own the order or be an admin.
    pub async fn order_for(&self, caller: &Requester, id: &OrderId) -> Result<Order, StoreError> {
        let order = self.db.fetch_order(id).await?.ok_or_else(|| StoreError::OrderNotFound(id.clone()))?;
        if !caller.is_admin() && !order.is_owned_by(&caller.user_id) {
            warn!("🛒️ {} tried to view order {id}, which belongs to someone else", caller.user_id);
            return Err(StoreError::NotOrderOwner(id.clone()));
        }
        Ok(order)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Page<Order>, StoreError> {
        self.db.search_orders(query).await
    }

    pub async fn update_fulfilment(&self, id: &OrderId, update: FulfilmentUpdate) -> Result<Order, StoreError> {
        let order =
            self.db.update_fulfilment(id, update).await?.ok_or_else(|| StoreError::OrderNotFound(id.clone()))?;
        debug!("🛒️ Order {id} is now {} (delivered: {})", order.order_status, order.is_delivered);
        Ok(order)
    }

    /// Cancels unpaid orders older than `timeout`, returning any stock they were holding.
    pub async fn expire_unpaid_orders(&self, timeout: Duration) -> Result<Vec<Order>, StoreError> {
        let cutoff = Utc::now() - timeout;
        let expired = self.db.expire_unpaid_orders(cutoff).await?;
        for order in &expired {
            info!("🛒️ Unpaid order {} from {} has expired and was cancelled", order.id, order.created_at);
        }
        Ok(expired)
    }
}

pub(crate) async fn price_cart<B: CatalogManagement>(db: &B, lines: &[CartLine]) -> Result<PricedCart, StoreError> {
    if lines.is_empty() {
        return Err(StoreError::EmptyCart);
    }
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = db
            .fetch_product(&line.product)
            .await?
            .ok_or_else(|| StoreError::ProductUnavailable(format!("Product {}", line.product)))?;
        items.push(price_line(&product, line)?);
    }
    let prices = PriceBreakdown::for_items(&items);
    trace!("🛒️ Cart of {} lines priced at {}", items.len(), prices.total_price);
    Ok(PricedCart { items, prices })
}

pub(crate) fn validate_shipping_address(address: &ShippingAddress) -> Result<(), StoreError> {
    match address.missing_field() {
        Some(field) => Err(StoreError::ValidationError(format!("Shipping address {field} is required"))),
        None => Ok(()),
    }
}
