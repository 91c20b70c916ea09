use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use super::on_unique_violation;
use crate::{
    db_types::{NewRefund, Refund, RefundId, RefundTransition, UserId},
    traits::StoreError,
};

/// Inserts a pending refund. The `order_id` column is unique, so a second request for the same order fails with
/// [`StoreError::RefundAlreadyExists`].
pub async fn insert_refund(refund: NewRefund, conn: &mut SqliteConnection) -> Result<Refund, StoreError> {
    let order_id = refund.order_id.clone();
    let refund = sqlx::query_as::<_, Refund>(
        r#"
            INSERT INTO refunds (id, order_id, user_id, reason, status, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(refund.id)
    .bind(refund.order_id)
    .bind(refund.user_id)
    .bind(refund.reason)
    .bind(refund.amount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| on_unique_violation(e, || StoreError::RefundAlreadyExists(order_id.clone())))?;
    debug!("🗃️ Refund {} of {} requested for order {}", refund.id, refund.amount, refund.order_id);
    Ok(refund)
}

pub async fn fetch_refund(id: &RefundId, conn: &mut SqliteConnection) -> Result<Option<Refund>, StoreError> {
    let refund =
        sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(refund)
}

pub async fn fetch_refunds(user_id: Option<UserId>, conn: &mut SqliteConnection) -> Result<Vec<Refund>, StoreError> {
    let refunds = match user_id {
        Some(user_id) => {
            sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
                .bind(user_id)
                .fetch_all(conn)
                .await?
        },
        None => {
            sqlx::query_as::<_, Refund>("SELECT * FROM refunds ORDER BY created_at DESC, id DESC")
                .fetch_all(conn)
                .await?
        },
    };
    Ok(refunds)
}

/// Applies the transition if the refund still has status `transition.from`. Returns `None` if it does not (or the
/// refund does not exist). Existing transaction ids and notes are kept when the transition does not carry new ones.
pub async fn transition_refund(
    id: &RefundId,
    transition: RefundTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Refund>, StoreError> {
    let refund = sqlx::query_as::<_, Refund>(
        r#"
            UPDATE refunds SET
                status = $1,
                refund_transaction_id = COALESCE($2, refund_transaction_id),
                admin_notes = COALESCE($3, admin_notes),
                updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(transition.to)
    .bind(transition.refund_transaction_id)
    .bind(transition.admin_notes)
    .bind(Utc::now())
    .bind(id)
    .bind(transition.from)
    .fetch_optional(conn)
    .await?;
    if let Some(r) = &refund {
        debug!("🗃️ Refund {id} moved from {} to {}", transition.from, r.status);
    }
    Ok(refund)
}

pub async fn update_notes(id: &RefundId, notes: &str, conn: &mut SqliteConnection) -> Result<Option<Refund>, StoreError> {
    let refund = sqlx::query_as::<_, Refund>(
        "UPDATE refunds SET admin_notes = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(notes)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(refund)
}
