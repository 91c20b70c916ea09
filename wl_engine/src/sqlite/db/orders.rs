use chrono::{DateTime, Utc};
use log::*;
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use super::products;
use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, PaymentResult, UserId},
    order_objects::{FulfilmentUpdate, OrderQueryFilter},
    traits::{Page, StoreError},
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// The `stock_reserved` flag is stored as given; reserving the stock itself is up to the caller.
pub async fn insert_order(
    order: &NewOrder,
    stock_reserved: bool,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let prices = &order.prices;
    let order = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (
                id, user_id, order_items, shipping_address, payment_method, payment_result, payment_intent_id,
                items_price, shipping_price, tax_price, total_price, is_paid, paid_at, order_status,
                is_delivered, stock_reserved, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'processing', 0, $14, $15, $15)
            RETURNING *;
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(Json(&order.order_items))
    .bind(Json(&order.shipping_address))
    .bind(order.payment_method)
    .bind(order.payment_result.as_ref().map(Json))
    .bind(order.payment_intent_id.as_deref())
    .bind(prices.items_price)
    .bind(prices.shipping_price)
    .bind(prices.tax_price)
    .bind(prices.total_price)
    .bind(order.paid_at.is_some())
    .bind(order.paid_at)
    .bind(stock_reserved)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} for {} has been saved", order.id, order.total_price);
    Ok(order)
}

/// Decrements stock for every line item. If any line cannot be satisfied, an error naming the item is returned and
/// the caller must roll back.
pub async fn reserve_stock(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), StoreError> {
    for item in items {
        if !products::decrement_stock(&item.product, item.quantity, conn).await? {
            let exists = products::fetch_product(&item.product, conn).await?.is_some();
            debug!("🗃️ Could not take {} x {} out of stock", item.quantity, item.name);
            return Err(if exists {
                StoreError::InsufficientStock(item.name.clone())
            } else {
                StoreError::ProductUnavailable(item.name.clone())
            });
        }
        trace!("🗃️ {} x {} taken out of stock", item.quantity, item.name);
    }
    Ok(())
}

pub async fn release_stock(items: &[OrderItem], conn: &mut SqliteConnection) -> Result<(), StoreError> {
    for item in items {
        products::restore_stock(&item.product, item.quantity, conn).await?;
        trace!("🗃️ {} x {} returned to stock", item.quantity, item.name);
    }
    Ok(())
}

pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let orders =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a OrderQueryFilter) {
    if query.is_empty() {
        return;
    }
    builder.push(" WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(status) = query.order_status {
        where_clause.push("order_status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(is_paid) = query.is_paid {
        where_clause.push("is_paid = ");
        where_clause.push_bind_unseparated(is_paid);
    }
    if let Some(user_id) = &query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`, newest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Page<Order>, StoreError> {
    let pagination = query.pagination.normalised();
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders");
    push_filters(&mut count, &query);
    let total = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    push_filters(&mut builder, &query);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(i64::from(pagination.limit));
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {} of {total}", orders.len());
    Ok(Page::new(orders, total, pagination))
}

/// Sets the paid fields of an unpaid, uncancelled order. Returns the updated order, or `None` if no such order
/// exists. `stock_reserved` is left untouched, so the caller can tell whether stock still needs to be taken.
pub async fn mark_paid(
    id: &OrderId,
    payment: &PaymentResult,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET is_paid = 1, paid_at = $1, payment_result = $2, updated_at = $3
            WHERE id = $4 AND is_paid = 0 AND order_status != 'cancelled'
            RETURNING *;
        "#,
    )
    .bind(paid_at)
    .bind(Json(payment))
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_stock_reserved(id: &OrderId, reserved: bool, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE orders SET stock_reserved = $1 WHERE id = $2").bind(reserved).bind(id).execute(conn).await?;
    Ok(())
}

pub async fn update_fulfilment(
    id: &OrderId,
    update: FulfilmentUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StoreError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for order {id}. Update request skipped.");
        return fetch_order(id, conn).await;
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(status) = update.order_status {
        builder.push(", order_status = ");
        builder.push_bind(status);
    }
    match update.is_delivered {
        Some(true) => {
            builder.push(", is_delivered = 1, delivered_at = ");
            builder.push_bind(update.delivered_at.unwrap_or_else(Utc::now));
        },
        Some(false) => {
            builder.push(", is_delivered = 0, delivered_at = NULL");
        },
        None => {
            if let Some(at) = update.delivered_at {
                builder.push(", delivered_at = ");
                builder.push_bind(at);
            }
        },
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Cancels a paid-for order that has not shipped yet. Shipped and delivered orders are left alone.
pub async fn cancel_if_processing(id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE orders SET order_status = 'cancelled', updated_at = $1 WHERE id = $2 AND order_status = 'processing'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Marks unpaid orders created before the cutoff as cancelled. The returned orders carry their `stock_reserved` value
/// from before the cancellation, so the caller knows which ones to release stock for. The flag itself is cleared in
/// the database.
pub async fn cancel_unpaid_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StoreError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET order_status = 'cancelled', updated_at = $1
            WHERE is_paid = 0 AND order_status = 'processing' AND created_at < $2
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(cutoff)
    .fetch_all(&mut *conn)
    .await?;
    for order in orders.iter().filter(|o| o.stock_reserved) {
        sqlx::query("UPDATE orders SET stock_reserved = 0 WHERE id = $1").bind(&order.id).execute(&mut *conn).await?;
    }
    Ok(orders)
}

/// Moves an order's creation time. Used to age orders for the unpaid-order expiry.
pub async fn backdate_order(
    id: &OrderId,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE orders SET created_at = $1 WHERE id = $2").bind(created_at).bind(id).execute(conn).await?;
    Ok(())
}
