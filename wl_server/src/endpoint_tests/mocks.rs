use chrono::{DateTime, Utc};
use mockall::mock;
use wl_engine::{
    catalog_objects::ProductQueryFilter,
    db_types::{
        Cents,
        NewOrder,
        NewProduct,
        NewRefund,
        Order,
        OrderId,
        PaymentResult,
        Product,
        ProductId,
        ProductUpdate,
        Refund,
        RefundId,
        RefundTransition,
        UserId,
    },
    order_objects::{FulfilmentUpdate, OrderQueryFilter},
    traits::{
        CaptureResult,
        CardGateway,
        CatalogManagement,
        CheckoutEvent,
        GatewayError,
        HostedSession,
        HostedSessionRequest,
        IntentRequest,
        OrderManagement,
        Page,
        PaymentReversal,
        RefundManagement,
        StoreError,
        WalletGateway,
    },
};

mock! {
    pub Store {}
    impl CatalogManagement for Store {
        async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;
        async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError>;
        async fn search_products(&self, query: ProductQueryFilter) -> Result<Page<Product>, StoreError>;
        async fn insert_product(&self, slug: &str, product: NewProduct) -> Result<Product, StoreError>;
        async fn update_product(&self, id: &ProductId, update: ProductUpdate) -> Result<Option<Product>, StoreError>;
    }
    impl OrderManagement for Store {
        async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
        async fn insert_order_for_checkout_session(&self, session_id: &str, order: NewOrder) -> Result<(Order, bool), StoreError>;
        async fn mark_order_paid(&self, id: &OrderId, payment: PaymentResult, paid_at: DateTime<Utc>) -> Result<(Order, bool), StoreError>;
        async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Page<Order>, StoreError>;
        async fn update_fulfilment(&self, id: &OrderId, update: FulfilmentUpdate) -> Result<Option<Order>, StoreError>;
        async fn expire_unpaid_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
    }
    impl RefundManagement for Store {
        async fn insert_refund(&self, refund: NewRefund) -> Result<Refund, StoreError>;
        async fn fetch_refund(&self, id: &RefundId) -> Result<Option<Refund>, StoreError>;
        async fn fetch_refunds(&self, user_id: Option<UserId>) -> Result<Vec<Refund>, StoreError>;
        async fn transition_refund(&self, id: &RefundId, transition: RefundTransition) -> Result<Refund, StoreError>;
        async fn update_refund_notes(&self, id: &RefundId, notes: &str) -> Result<Option<Refund>, StoreError>;
    }
}

mock! {
    pub Card {}
    impl PaymentReversal for Card {
        async fn reverse_charge(&self, charge_ref: &str, amount: Cents, idempotency_key: &str) -> Result<String, GatewayError>;
    }
    impl CardGateway for Card {
        async fn create_hosted_session(&self, request: HostedSessionRequest) -> Result<HostedSession, GatewayError>;
        fn verify_and_parse_event(&self, raw_body: &[u8], signature: &str) -> Result<CheckoutEvent, GatewayError>;
    }
}

mock! {
    pub Wallet {}
    impl PaymentReversal for Wallet {
        async fn reverse_charge(&self, charge_ref: &str, amount: Cents, idempotency_key: &str) -> Result<String, GatewayError>;
    }
    impl WalletGateway for Wallet {
        async fn create_intent(&self, request: IntentRequest) -> Result<String, GatewayError>;
        async fn capture(&self, intent_id: &str) -> Result<CaptureResult, GatewayError>;
    }
}
