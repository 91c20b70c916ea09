use thiserror::Error;

use crate::{
    db_types::{OrderId, ProductId, RefundId, RefundStatus},
    traits::GatewayError,
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),
    #[error("{0} is no longer available")]
    ProductUnavailable(String),
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),
    #[error("Product with this name already exists")]
    DuplicateSlug(String),
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),
    #[error("Not authorized to access order {0}")]
    NotOrderOwner(OrderId),
    #[error("Order {0} has not been paid")]
    OrderNotPaid(OrderId),
    #[error("Order {0} has been cancelled")]
    OrderCancelled(OrderId),
    #[error("Refund {0} not found")]
    RefundNotFound(RefundId),
    #[error("Refund request already exists for this order")]
    RefundAlreadyExists(OrderId),
    #[error("A refund cannot move from {from} to {to}")]
    RefundTransitionForbidden { from: RefundStatus, to: RefundStatus },
    #[error("Refund {0} was modified by another request")]
    RefundModificationConflict(RefundId),
    #[error("The requested change would result in a no-op.")]
    ModificationNoOp,
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
}

impl StoreError {
    /// True for errors caused by the caller's input (as opposed to infrastructure or provider failures).
    pub fn is_validation_error(&self) -> bool {
        use StoreError::*;
        matches!(
            self,
            ValidationError(_) |
                EmptyCart |
                InsufficientStock(_) |
                ProductUnavailable(_) |
                DuplicateSlug(_) |
                OrderNotPaid(_) |
                OrderCancelled(_) |
                RefundAlreadyExists(_) |
                RefundTransitionForbidden { .. } |
                RefundModificationConflict(_) |
                ModificationNoOp
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
