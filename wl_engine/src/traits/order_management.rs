use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentResult, UserId},
    order_objects::{FulfilmentUpdate, OrderQueryFilter},
    traits::{Page, StoreError},
};

/// The order ledger.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order. If `order.reserve_stock` is set, then in the same atomic transaction, the stock of every
    /// line's product is decremented by the line quantity. If any product has insufficient stock,
    /// [`StoreError::InsufficientStock`] is returned and nothing is written.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Stores the order for a completed hosted checkout session, reserving stock, exactly once per `session_id`.
    ///
    /// The session id is recorded in an idempotency ledger in the same transaction as the order. If the session has
    /// already been processed, the existing order is returned, nothing is written, and the flag is `false`.
    async fn insert_order_for_checkout_session(
        &self,
        session_id: &str,
        order: NewOrder,
    ) -> Result<(Order, bool), StoreError>;

    /// Marks the order as paid, and if its stock has not been reserved yet, decrements stock for every line.
    ///
    /// This is idempotent: an order that is already paid is returned unchanged with the flag set to `false`.
    async fn mark_order_paid(
        &self,
        id: &OrderId,
        payment: PaymentResult,
        paid_at: DateTime<Utc>,
    ) -> Result<(Order, bool), StoreError>;

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// All orders for the user, newest first.
    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Page<Order>, StoreError>;

    /// Returns `None` if the order does not exist.
    async fn update_fulfilment(&self, id: &OrderId, update: FulfilmentUpdate) -> Result<Option<Order>, StoreError>;

    /// Cancels every unpaid, still processing order created before `created_before`, returning any reserved stock to
    /// the catalog. Returns the cancelled orders.
    async fn expire_unpaid_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}
