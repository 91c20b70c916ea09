use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewRefund, Order, OrderId, Refund, RefundId, RefundStatus, RefundTransition, Requester},
    order_objects::RefundDecision,
    traits::{CardGateway, OrderManagement, PaymentGateways, RefundManagement, StoreError, WalletGateway},
};

/// `RefundApi` handles refund requests from customers and the back office's decisions on them.
///
/// A refund always covers the full order total, and an order can have at most one refund request.
///
/// Refund status changes follow this lifecycle:
///
/// ```text
///  pending ──approve──▶ processed      (a transaction id supplied by the admin, or a gateway reversal
///                                       made while the refund is held in `approved`)
///     │ └────approve──▶ approved ──▶ processed   (no gateway reference; needs a transaction id)
///     │                    │
///     └──reject──▶ rejected ◀──reject──┘
/// ```
///
/// A processed refund cancels its order if the order has not shipped yet. Returned goods are not put back into stock.
pub struct RefundApi<B, C, W> {
    db: B,
    gateways: PaymentGateways<C, W>,
}

impl<B, C, W> Debug for RefundApi<B, C, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B, C, W> RefundApi<B, C, W> {
    pub fn new(db: B, gateways: PaymentGateways<C, W>) -> Self {
        Self { db, gateways }
    }
}

impl<B, C, W> RefundApi<B, C, W>
where
    B: OrderManagement + RefundManagement,
    C: CardGateway,
    W: WalletGateway,
{
    /// Files a refund request for a paid order belonging to `customer`.
    pub async fn request_refund(
        &self,
        customer: &Requester,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<Refund, StoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StoreError::ValidationError("Please give a reason for the refund".to_string()));
        }
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if !order.is_owned_by(&customer.user_id) {
            warn!("💸️ {} asked for a refund on order {order_id}, which belongs to someone else", customer.user_id);
            return Err(StoreError::NotOrderOwner(order_id.clone()));
        }
        if !order.is_paid {
            return Err(StoreError::OrderNotPaid(order_id.clone()));
        }
        let refund = self.db.insert_refund(NewRefund::for_order(&order, reason.to_string())).await?;
        info!("💸️ Refund {} of {} requested for order {order_id}", refund.id, refund.amount);
        Ok(refund)
    }

    /// Admins see every refund; customers see their own.
    pub async fn refunds_for(&self, caller: &Requester) -> Result<Vec<Refund>, StoreError> {
        let user_id = if caller.is_admin() { None } else { Some(caller.user_id.clone()) };
        self.db.fetch_refunds(user_id).await
    }

    pub async fn refund(&self, id: &RefundId) -> Result<Refund, StoreError> {
        self.db.fetch_refund(id).await?.ok_or_else(|| StoreError::RefundNotFound(id.clone()))
    }

    /// Applies an admin's decision to a refund.
    ///
    /// Approving a pending refund reverses the charge with the order's payment provider when the order has a gateway
    /// reference, and the refund goes on to `processed`. The refund is moved to `approved` before the provider is
    /// called, so a concurrent decision cannot slip in while money is moving. If the provider refuses, the refund
    /// goes back to `pending` and the provider's error is returned. An admin who has already returned the money by
    /// other means can supply the transaction id when approving, and no provider call is made.
    ///
    /// Status changes only apply if nobody else changed the refund in the meantime; the loser of such a race gets
    /// [`StoreError::RefundModificationConflict`].
    pub async fn review_refund(&self, id: &RefundId, decision: RefundDecision) -> Result<Refund, StoreError> {
        let refund = self.refund(id).await?;
        let RefundDecision { status, refund_transaction_id, admin_notes } = decision;
        let txid = refund_transaction_id.filter(|t| !t.trim().is_empty());
        let target = match status {
            Some(to) if to != refund.status => to,
            _ => {
                return match admin_notes {
                    Some(notes) => {
                        let refund = self
                            .db
                            .update_refund_notes(id, &notes)
                            .await?
                            .ok_or_else(|| StoreError::RefundNotFound(id.clone()))?;
                        debug!("💸️ Notes on refund {id} updated");
                        Ok(refund)
                    },
                    None => Err(StoreError::ModificationNoOp),
                };
            },
        };
        use RefundStatus::*;
        let transition = match (refund.status, target) {
            (Pending, Approved) => match txid {
                Some(txid) => {
                    info!("💸️ Refund {id} was settled outside the payment provider as {txid}");
                    RefundTransition::new(Pending, Processed).with_transaction_id(Some(txid))
                },
                None => return self.approve(&refund, admin_notes).await,
            },
            (Approved, Processed) => {
                let txid = txid.ok_or_else(|| {
                    StoreError::ValidationError("A refund transaction id is needed to mark a refund processed".into())
                })?;
                RefundTransition::new(Approved, Processed).with_transaction_id(Some(txid))
            },
            (Approved, Rejected) => {
                // An approved refund on a provider-paid order has a reversal in flight
                if self.reversible_charge(&refund).await?.is_some() {
                    warn!("💸️ Refund {id} is being reversed with the payment provider and cannot be rejected now");
                    return Err(StoreError::RefundModificationConflict(id.clone()));
                }
                RefundTransition::new(Approved, Rejected)
            },
            (Pending, Rejected) => RefundTransition::new(Pending, Rejected),
            (from, to) => return Err(StoreError::RefundTransitionForbidden { from, to }),
        };
        let refund = self.db.transition_refund(id, transition.with_notes(admin_notes)).await?;
        info!("💸️ Refund {id} is now {}", refund.status);
        Ok(refund)
    }

    /// Approves a pending refund. Orders paid through a provider have their charge reversed and the refund is
    /// processed; anything else is left `approved`, awaiting a manual refund.
    async fn approve(&self, refund: &Refund, admin_notes: Option<String>) -> Result<Refund, StoreError> {
        let id = &refund.id;
        let claim = RefundTransition::new(RefundStatus::Pending, RefundStatus::Approved);
        let Some((order, charge_ref)) = self.reversible_charge(refund).await? else {
            info!("💸️ Order {} has no gateway payment to reverse. Refund {id} awaits a manual refund.", refund.order_id);
            return self.db.transition_refund(id, claim.with_notes(admin_notes)).await;
        };
        self.db.transition_refund(id, claim).await?;
        let reversal = self.gateways.reverse_charge(order.payment_method, &charge_ref, refund.amount, id.as_str()).await;
        let reversal = match reversal {
            Ok(reversal) => reversal,
            Err(e) => {
                error!("💸️ The payment provider refused to reverse charge {charge_ref} for refund {id}. {e}");
                let release = RefundTransition::new(RefundStatus::Approved, RefundStatus::Pending);
                if let Err(release_err) = self.db.transition_refund(id, release).await {
                    error!("💸️ Refund {id} could not be returned to pending. {release_err}");
                }
                return Err(StoreError::from(e));
            },
        };
        info!("💸️ {} returned to the customer for order {} ({reversal})", refund.amount, order.id);
        let processed = RefundTransition::new(RefundStatus::Approved, RefundStatus::Processed)
            .with_transaction_id(Some(reversal))
            .with_notes(admin_notes);
        let refund = self.db.transition_refund(id, processed).await?;
        info!("💸️ Refund {id} is now {}", refund.status);
        Ok(refund)
    }

    /// The refund's order and its provider charge reference, if the order was paid through a provider.
    async fn reversible_charge(&self, refund: &Refund) -> Result<Option<(Order, String)>, StoreError> {
        let order = self
            .db
            .fetch_order(&refund.order_id)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(refund.order_id.clone()))?;
        let charge_ref = match order.payment_reference() {
            Some(r) if order.is_paid => r.to_string(),
            _ => return Ok(None),
        };
        Ok(Some((order, charge_ref)))
    }
}
