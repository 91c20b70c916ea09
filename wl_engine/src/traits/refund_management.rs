use crate::{
    db_types::{NewRefund, Refund, RefundId, RefundTransition, UserId},
    traits::StoreError,
};

/// The refund ledger. There is at most one refund per order, which backends must enforce as a storage constraint.
#[allow(async_fn_in_trait)]
pub trait RefundManagement {
    /// Fails with [`StoreError::RefundAlreadyExists`] if the order already has a refund.
    async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, StoreError>;

    async fn fetch_refund(&self, id: &RefundId) -> Result<Option<Refund>, StoreError>;

    /// Refunds for the given user, or all refunds if `user_id` is `None`. Newest first.
    async fn fetch_refunds(&self, user_id: Option<UserId>) -> Result<Vec<Refund>, StoreError>;

    /// Moves the refund from `transition.from` to `transition.to`, recording the transaction id and notes if given.
    ///
    /// The change only applies if the refund still has status `from`; otherwise
    /// [`StoreError::RefundModificationConflict`] is returned. When a refund becomes `processed`, an order that is
    /// still `processing` is cancelled in the same transaction.
    async fn transition_refund(&self, id: &RefundId, transition: RefundTransition) -> Result<Refund, StoreError>;

    async fn update_refund_notes(&self, id: &RefundId, notes: &str) -> Result<Option<Refund>, StoreError>;
}
