//! The hosted checkout idempotency ledger.
//!
//! Card providers deliver webhooks at least once. Each completed checkout session id is claimed here before an order
//! is created for it, so a redelivered notification finds the claim and does not create a second order.
use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Order, OrderId},
    traits::StoreError,
};

/// Records the session id. Returns `true` if this call made the claim, and `false` if the session was already
/// claimed. This must be the first statement of the transaction that creates the order.
pub async fn claim_session(session_id: &str, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "INSERT INTO checkout_sessions (session_id, created_at) VALUES ($1, $2) ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(session_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    let claimed = result.rows_affected() == 1;
    trace!("🗃️ Checkout session {session_id} claimed: {claimed}");
    Ok(claimed)
}

/// The order created for an already claimed session.
pub async fn order_for_session(session_id: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            SELECT orders.* FROM orders
            JOIN checkout_sessions ON checkout_sessions.order_id = orders.id
            WHERE checkout_sessions.session_id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn link_order(session_id: &str, order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    sqlx::query("UPDATE checkout_sessions SET order_id = $1 WHERE session_id = $2")
        .bind(order_id)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET checkout_session_id = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(session_id)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
    debug!("🗃️ Order {order_id} linked to checkout session {session_id}");
    Ok(order)
}
