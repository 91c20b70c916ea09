//! #  Storage and payment provider contracts.
//!
//! This module defines the behaviour that backends need to expose in order to be used by the storefront APIs.
//!
//! * [`CatalogManagement`] reads and maintains product records.
//! * [`OrderManagement`] is the order ledger. Every method that touches more than one record (stock and an order, for
//!   example) is atomic.
//! * [`RefundManagement`] is the refund ledger.
//! * [`CardGateway`] and [`WalletGateway`] are the two payment providers. Both can reverse a charge
//!   ([`PaymentReversal`]), and [`PaymentGateways`] dispatches reversals by an order's payment method.
mod catalog_management;
mod data_objects;
mod errors;
mod order_management;
mod payment_gateways;
mod refund_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{Page, Pagination, ADMIN_PAGE_SIZE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use errors::StoreError;
pub use order_management::OrderManagement;
pub use payment_gateways::{
    CaptureResult,
    CardGateway,
    CheckoutEvent,
    CompletedSession,
    GatewayError,
    HostedLineItem,
    HostedSession,
    HostedSessionRequest,
    IntentRequest,
    PaymentGateways,
    PaymentReversal,
    WalletGateway,
};
pub use refund_management::RefundManagement;
