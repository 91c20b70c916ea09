use std::{collections::BTreeMap, convert::Infallible, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;
pub use wl_common::Cents;

use crate::{helpers::new_object_id, pricing::PriceBreakdown};

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// String identifiers for stored records. They are opaque to the engine, but freshly minted ids are 24 lowercase hex
/// characters.
macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Mints a new random identifier.
            pub fn random() -> Self {
                Self(new_object_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(ProductId);
string_id!(OrderId);
string_id!(RefundId);
string_id!(UserId);

/// Implements `Display`, `FromStr` and an infallible `From<String>` for enums that are stored as lowercase strings.
macro_rules! lowercase_enum {
    ($name:ident, $label:literal, $fallback:ident, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $s),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok(Self::$variant),)+
                    other => Err(ConversionError(format!("Invalid {}: {other}", $label))),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                value.parse().unwrap_or_else(|_| {
                    error!("Invalid {}: {value}. But this conversion cannot fail. Defaulting to {}", $label, Self::$fallback);
                    Self::$fallback
                })
            }
        }
    };
}

//--------------------------------------        Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

lowercase_enum!(Role, "role", User, { User => "user", Admin => "admin" });

impl Role {
    /// Admins can do everything a user can do.
    pub fn permits(&self, required: Role) -> bool {
        matches!((self, required), (Role::Admin, _) | (Role::User, Role::User))
    }
}

/// The verified identity behind a request, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl Requester {
    pub fn new<U: Into<UserId>, S: Into<String>>(user_id: U, email: S, role: Role) -> Self {
        Self { user_id: user_id.into(), email: email.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//--------------------------------------      Category       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Soap,
    Candle,
}

lowercase_enum!(Category, "category", Soap, { Soap => "soap", Candle => "candle" });

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
/// How an order is paid for. `Stripe` is the card-network gateway with hosted checkout and webhooks. `Paypal` is the
/// wallet gateway with the redirect, approve, capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
}

lowercase_enum!(PaymentMethod, "payment method", Stripe, { Stripe => "stripe", Paypal => "paypal" });

//--------------------------------------     OrderStatus     ---------------------------------------------------------
/// Fulfilment status. This is independent of payment status: a paid order is still `Processing` until it ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

lowercase_enum!(OrderStatus, "order status", Processing, {
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

//--------------------------------------    RefundStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Requested by the customer and awaiting review
    Pending,
    /// Accepted by an admin, but the funds have not been returned yet
    Approved,
    /// Declined by an admin. Terminal.
    Rejected,
    /// Funds have been returned to the customer. Terminal.
    Processed,
}

lowercase_enum!(RefundStatus, "refund status", Pending, {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Processed => "processed",
});

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationOption {
    pub value: String,
    #[serde(default)]
    pub price_modifier: Cents,
    /// Informational only. Stock is enforced against the parent product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariation {
    pub name: String,
    pub options: Vec<VariationOption>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub long_description: Option<String>,
    pub category: Category,
    pub price: Cents,
    pub images: Json<Vec<String>>,
    pub stock: i64,
    pub ingredients: Json<Vec<String>>,
    pub scent_notes: Option<String>,
    pub variations: Json<Vec<ProductVariation>>,
    pub is_active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn main_image(&self) -> Option<&String> {
        self.images.0.first()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    pub category: Category,
    pub price: Cents,
    #[serde(default)]
    pub images: Vec<String>,
    pub stock: i64,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub scent_notes: Option<String>,
    #[serde(default)]
    pub variations: Vec<ProductVariation>,
    #[serde(default)]
    pub featured: bool,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, category: Category, price: Cents, stock: i64) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            long_description: None,
            category,
            price,
            images: Vec::new(),
            stock,
            ingredients: Vec::new(),
            scent_notes: None,
            variations: Vec::new(),
            featured: false,
        }
    }

    pub fn with_variation(mut self, variation: ProductVariation) -> Self {
        self.variations.push(variation);
        self
    }
}

/// A partial update to a product. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    /// Set by the catalog API whenever the name changes
    #[serde(skip)]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub category: Option<Category>,
    pub price: Option<Cents>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i64>,
    pub ingredients: Option<Vec<String>>,
    pub scent_notes: Option<String>,
    pub variations: Option<Vec<ProductVariation>>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductUpdate {
    pub fn deactivate() -> Self {
        Self { is_active: Some(false), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.slug.is_none() &&
            self.description.is_none() &&
            self.long_description.is_none() &&
            self.category.is_none() &&
            self.price.is_none() &&
            self.images.is_none() &&
            self.stock.is_none() &&
            self.ingredients.is_none() &&
            self.scent_notes.is_none() &&
            self.variations.is_none() &&
            self.is_active.is_none() &&
            self.featured.is_none()
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A line item with the price frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub quantity: i64,
    /// Unit price, including any variation price modifiers
    pub price: Cents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<BTreeMap<String, String>>,
}

impl OrderItem {
    pub fn line_total(&self) -> Cents {
        self.price * self.quantity
    }
}

//--------------------------------------   ShippingAddress   ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub zip_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns the name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [("address", &self.address), ("city", &self.city), ("zipCode", &self.zip_code), ("country", &self.country)]
            .into_iter()
            .find(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
    }
}

//--------------------------------------    PaymentResult    ---------------------------------------------------------
/// The gateway's reference for a captured payment. For card payments `id` is the payment intent; for wallet payments
/// it is the capture id. Either one is what a reversal is requested against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "user")]
    pub user_id: UserId,
    pub order_items: Json<Vec<OrderItem>>,
    pub shipping_address: Json<ShippingAddress>,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<Json<PaymentResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_session_id: Option<String>,
    pub items_price: Cents,
    pub shipping_price: Cents,
    pub tax_price: Cents,
    pub total_price: Cents,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub order_status: OrderStatus,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    /// True once the order's line quantities have been taken out of product stock
    #[serde(skip)]
    pub stock_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn items(&self) -> &[OrderItem] {
        &self.order_items.0
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_result.as_ref().map(|r| r.0.id.as_str()).filter(|id| !id.is_empty())
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub prices: PriceBreakdown,
    pub payment_result: Option<PaymentResult>,
    pub payment_intent_id: Option<String>,
    /// If set, the order is stored as paid at this time
    pub paid_at: Option<DateTime<Utc>>,
    /// If true, product stock is decremented in the same transaction that stores the order
    pub reserve_stock: bool,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// A new unpaid order. The price breakdown is derived from the line items.
    pub fn new(
        user_id: UserId,
        order_items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let prices = PriceBreakdown::for_items(&order_items);
        Self {
            id: OrderId::random(),
            user_id,
            order_items,
            shipping_address,
            payment_method,
            prices,
            payment_result: None,
            payment_intent_id: None,
            paid_at: None,
            reserve_stock: false,
            created_at: Utc::now(),
        }
    }

    pub fn reserving_stock(mut self) -> Self {
        self.reserve_stock = true;
        self
    }

    pub fn with_payment_intent(mut self, intent_id: String) -> Self {
        self.payment_intent_id = Some(intent_id);
        self
    }

    pub fn paid(mut self, result: PaymentResult, paid_at: DateTime<Utc>) -> Self {
        self.payment_result = Some(result);
        self.paid_at = Some(paid_at);
        self
    }
}

//--------------------------------------       Refund        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: RefundId,
    #[serde(rename = "order")]
    pub order_id: OrderId,
    #[serde(rename = "user")]
    pub user_id: UserId,
    pub reason: String,
    pub status: RefundStatus,
    pub amount: Cents,
    pub refund_transaction_id: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub id: RefundId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub amount: Cents,
}

impl NewRefund {
    /// A full refund of the given order.
    pub fn for_order(order: &Order, reason: String) -> Self {
        Self {
            id: RefundId::random(),
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            reason,
            amount: order.total_price,
        }
    }
}

/// A status change for a refund that only applies if the refund still has status `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundTransition {
    pub from: RefundStatus,
    pub to: RefundStatus,
    pub refund_transaction_id: Option<String>,
    pub admin_notes: Option<String>,
}

impl RefundTransition {
    pub fn new(from: RefundStatus, to: RefundStatus) -> Self {
        Self { from, to, refund_transaction_id: None, admin_notes: None }
    }

    pub fn with_transaction_id(mut self, txid: Option<String>) -> Self {
        self.refund_transaction_id = txid;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.admin_notes = notes;
        self
    }
}
