use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Cents,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentMethod,
        ProductId,
        RefundStatus,
        ShippingAddress,
        UserId,
    },
    pricing::PriceBreakdown,
    traits::{Pagination, StoreError},
};

/// A cart line as submitted by the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product: ProductId,
    pub quantity: i64,
    /// The price the storefront displayed. Accepted for compatibility, but never used for pricing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Cents>,
    /// Selected variation options, keyed by axis name (e.g. `{"Size": "Large"}`)
    #[serde(default, alias = "variations", skip_serializing_if = "Option::is_none")]
    pub variation: Option<BTreeMap<String, String>>,
}

impl CartLine {
    pub fn new(product: ProductId, quantity: i64) -> Self {
        Self { product, quantity, price: None, variation: None }
    }

    pub fn with_option<S: Into<String>>(mut self, axis: S, value: S) -> Self {
        self.variation.get_or_insert_with(BTreeMap::new).insert(axis.into(), value.into());
        self
    }
}

/// A cart priced from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedCart {
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    pub prices: PriceBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub order_items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Stripe
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryFilter {
    #[serde(alias = "status")]
    pub order_status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl OrderQueryFilter {
    pub fn is_empty(&self) -> bool {
        self.order_status.is_none() && self.is_paid.is_none() && self.user_id.is_none()
    }
}

/// An admin fulfilment update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfilmentUpdate {
    pub order_status: Option<OrderStatus>,
    pub is_delivered: Option<bool>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl FulfilmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.order_status.is_none() && self.is_delivered.is_none() && self.delivered_at.is_none()
    }
}

/// The result of opening a wallet-gateway payment for a freshly stored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOrderCreated {
    pub order_id: OrderId,
    pub intent_id: String,
    #[serde(flatten)]
    pub prices: PriceBreakdown,
}

impl From<&Order> for WalletOrderCreated {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            intent_id: order.payment_intent_id.clone().unwrap_or_default(),
            prices: PriceBreakdown {
                items_price: order.items_price,
                shipping_price: order.shipping_price,
                tax_price: order.tax_price,
                total_price: order.total_price,
            },
        }
    }
}

/// Where the hosted payment page sends the buyer afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    /// The storefront's usual success and cancel pages under `base_url`. The card provider substitutes
    /// `{CHECKOUT_SESSION_ID}` itself.
    pub fn for_storefront(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            success_url: format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/cart"),
        }
    }
}

/// Everything needed to create an order once a hosted checkout session completes. It travels with the session as
/// string metadata, since no order exists until the provider confirms payment.
///
/// Lines carry the unit price that was charged, so the order records what the buyer actually paid even if the
/// catalog changes in the meantime.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutMetadata {
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
    pub prices: PriceBreakdown,
}

impl CheckoutMetadata {
    pub fn new(user_id: UserId, cart: &PricedCart, shipping_address: ShippingAddress) -> Self {
        let lines = cart
            .items
            .iter()
            .map(|item| CartLine {
                product: item.product.clone(),
                quantity: item.quantity,
                price: Some(item.price),
                variation: item.variation.clone(),
            })
            .collect();
        Self { user_id, lines, shipping_address, prices: cart.prices }
    }

    pub fn to_metadata(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let to_json = |e: serde_json::Error| StoreError::ValidationError(format!("Could not serialize checkout. {e}"));
        let mut metadata = BTreeMap::new();
        metadata.insert("userId".to_string(), self.user_id.to_string());
        metadata.insert("orderItems".to_string(), serde_json::to_string(&self.lines).map_err(to_json)?);
        metadata.insert("shippingAddress".to_string(), serde_json::to_string(&self.shipping_address).map_err(to_json)?);
        metadata.insert("itemsPrice".to_string(), self.prices.items_price.to_decimal_string());
        metadata.insert("shippingPrice".to_string(), self.prices.shipping_price.to_decimal_string());
        metadata.insert("taxPrice".to_string(), self.prices.tax_price.to_decimal_string());
        metadata.insert("totalPrice".to_string(), self.prices.total_price.to_decimal_string());
        Ok(metadata)
    }

    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Self, StoreError> {
        let field = |key: &str| {
            metadata
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| StoreError::ValidationError(format!("Checkout metadata is missing '{key}'")))
        };
        let invalid = |key: &str, e: String| StoreError::ValidationError(format!("Invalid checkout '{key}'. {e}"));
        let price = |key: &str| -> Result<Cents, StoreError> {
            field(key)?.parse::<Cents>().map_err(|e| invalid(key, e.to_string()))
        };
        let user_id = UserId::from(field("userId")?);
        let lines: Vec<CartLine> =
            serde_json::from_str(field("orderItems")?).map_err(|e| invalid("orderItems", e.to_string()))?;
        let shipping_address = serde_json::from_str(field("shippingAddress")?)
            .map_err(|e| invalid("shippingAddress", e.to_string()))?;
        let prices = PriceBreakdown {
            items_price: price("itemsPrice")?,
            shipping_price: price("shippingPrice")?,
            tax_price: price("taxPrice")?,
            total_price: price("totalPrice")?,
        };
        Ok(Self { user_id, lines, shipping_address, prices })
    }
}

/// An admin's decision on a refund request. Any combination of fields may be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDecision {
    pub status: Option<RefundStatus>,
    pub refund_transaction_id: Option<String>,
    pub admin_notes: Option<String>,
}

impl RefundDecision {
    pub fn new(status: RefundStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, txid: S) -> Self {
        self.refund_transaction_id = Some(txid.into());
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.admin_notes = Some(notes.into());
        self
    }
}
