//! `SqliteDatabase` is a concrete implementation of a storefront engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{checkout_sessions, db_url, new_pool, orders, products, refunds};
use crate::{
    catalog_objects::ProductQueryFilter,
    db_types::{
        NewOrder,
        NewProduct,
        NewRefund,
        Order,
        OrderId,
        OrderStatus,
        PaymentResult,
        Product,
        ProductId,
        ProductUpdate,
        Refund,
        RefundId,
        RefundStatus,
        RefundTransition,
        UserId,
    },
    order_objects::{FulfilmentUpdate, OrderQueryFilter},
    traits::{CatalogManagement, OrderManagement, Page, RefundManagement, StoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `WL_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Ages an order. Only useful for exercising the unpaid-order expiry.
    pub async fn backdate_order(&self, id: &OrderId, created_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::backdate_order(id, created_at, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_by_slug(slug, &mut conn).await
    }

    async fn search_products(&self, query: ProductQueryFilter) -> Result<Page<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::search_products(query, &mut conn).await
    }

    async fn insert_product(&self, slug: &str, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let id = ProductId::random();
        products::insert_product(&id, slug, product, &mut conn).await
    }

    async fn update_product(&self, id: &ProductId, update: ProductUpdate) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::update_product(id, update, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    /// In a single atomic transaction,
    /// * stores the order,
    /// * and if requested, takes every line's quantity out of stock.
    ///
    /// If any line cannot be covered by the remaining stock, the transaction is dropped and nothing is written.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let saved = orders::insert_order(&order, order.reserve_stock, &mut tx).await?;
        if order.reserve_stock {
            orders::reserve_stock(&order.order_items, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn insert_order_for_checkout_session(
        &self,
        session_id: &str,
        order: NewOrder,
    ) -> Result<(Order, bool), StoreError> {
        let mut tx = self.pool.begin().await?;
        if !checkout_sessions::claim_session(session_id, &mut tx).await? {
            let existing = checkout_sessions::order_for_session(session_id, &mut tx).await?.ok_or_else(|| {
                StoreError::DatabaseError(format!("Checkout session {session_id} was claimed without an order"))
            })?;
            debug!("🗃️ Checkout session {session_id} was already processed as order {}", existing.id);
            return Ok((existing, false));
        }
        let saved = orders::insert_order(&order, order.reserve_stock, &mut tx).await?;
        if order.reserve_stock {
            orders::reserve_stock(&order.order_items, &mut tx).await?;
        }
        let saved = checkout_sessions::link_order(session_id, &saved.id, &mut tx).await?;
        tx.commit().await?;
        Ok((saved, true))
    }

    /// In a single atomic transaction,
    /// * marks the order as paid, if it is not paid or cancelled already,
    /// * takes the order's lines out of stock, unless that happened when the order was placed.
    async fn mark_order_paid(
        &self,
        id: &OrderId,
        payment: PaymentResult,
        paid_at: DateTime<Utc>,
    ) -> Result<(Order, bool), StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut order) = orders::mark_paid(id, &payment, paid_at, &mut tx).await? else {
            let order = orders::fetch_order(id, &mut tx).await?.ok_or_else(|| StoreError::OrderNotFound(id.clone()))?;
            if order.order_status == OrderStatus::Cancelled {
                return Err(StoreError::OrderCancelled(id.clone()));
            }
            debug!("🗃️ Order {id} was already paid");
            return Ok((order, false));
        };
        if !order.stock_reserved {
            orders::reserve_stock(order.items(), &mut tx).await?;
            orders::set_stock_reserved(id, true, &mut tx).await?;
            order.stock_reserved = true;
        }
        tx.commit().await?;
        debug!("🗃️ Order {id} marked as paid");
        Ok((order, true))
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Page<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn update_fulfilment(&self, id: &OrderId, update: FulfilmentUpdate) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_fulfilment(id, update, &mut conn).await
    }

    async fn expire_unpaid_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let expired = orders::cancel_unpaid_before(created_before, &mut tx).await?;
        for order in expired.iter().filter(|o| o.stock_reserved) {
            orders::release_stock(order.items(), &mut tx).await?;
        }
        tx.commit().await?;
        Ok(expired)
    }
}

impl RefundManagement for SqliteDatabase {
    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, StoreError> {
        let mut conn = self.pool.acquire().await?;
        refunds::insert_refund(refund, &mut conn).await
    }

    async fn fetch_refund(&self, id: &RefundId) -> Result<Option<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        refunds::fetch_refund(id, &mut conn).await
    }

    async fn fetch_refunds(&self, user_id: Option<UserId>) -> Result<Vec<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        refunds::fetch_refunds(user_id, &mut conn).await
    }

    async fn transition_refund(&self, id: &RefundId, transition: RefundTransition) -> Result<Refund, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(refund) = refunds::transition_refund(id, transition, &mut tx).await? else {
            return match refunds::fetch_refund(id, &mut tx).await? {
                Some(_) => Err(StoreError::RefundModificationConflict(id.clone())),
                None => Err(StoreError::RefundNotFound(id.clone())),
            };
        };
        if refund.status == RefundStatus::Processed && orders::cancel_if_processing(&refund.order_id, &mut tx).await? {
            info!("🗃️ Order {} cancelled after refund {id} was processed", refund.order_id);
        }
        tx.commit().await?;
        Ok(refund)
    }

    async fn update_refund_notes(&self, id: &RefundId, notes: &str) -> Result<Option<Refund>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        refunds::update_notes(id, notes, &mut conn).await
    }
}
