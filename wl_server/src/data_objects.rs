use std::fmt::Display;

use serde::{Deserialize, Serialize};
use wl_engine::{
    catalog_objects::ProductQueryFilter,
    db_types::{Category, OrderId, OrderStatus, ShippingAddress, UserId},
    order_objects::{CartLine, OrderQueryFilter},
    traits::{HostedSession, Pagination, ADMIN_PAGE_SIZE, DEFAULT_PAGE_SIZE},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query parameters for product listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductListParams {
    pub category: Option<Category>,
    pub featured: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductListParams {
    pub fn into_public_filter(self) -> ProductQueryFilter {
        let pagination = pagination(self.page, self.limit, DEFAULT_PAGE_SIZE);
        ProductQueryFilter { category: self.category, featured: self.featured, include_inactive: false, pagination }
    }

    pub fn into_admin_filter(self) -> ProductQueryFilter {
        let pagination = pagination(self.page, self.limit, ADMIN_PAGE_SIZE);
        ProductQueryFilter { category: self.category, featured: self.featured, include_inactive: true, pagination }
    }
}

/// Query parameters for the back office order search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchParams {
    #[serde(alias = "orderStatus")]
    pub status: Option<OrderStatus>,
    pub is_paid: Option<bool>,
    pub user: Option<UserId>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<OrderSearchParams> for OrderQueryFilter {
    fn from(params: OrderSearchParams) -> Self {
        OrderQueryFilter {
            order_status: params.status,
            is_paid: params.is_paid,
            user_id: params.user,
            pagination: pagination(params.page, params.limit, ADMIN_PAGE_SIZE),
        }
    }
}

fn pagination(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Pagination {
    Pagination::new(page.unwrap_or(1), limit.unwrap_or(default_limit))
}

/// The cart and address submitted to both gateway checkouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub order_items: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub url: String,
}

impl From<HostedSession> for CheckoutSessionResponse {
    fn from(session: HostedSession) -> Self {
        Self { success: true, session_id: session.session_id, url: session.redirect_url }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOrderRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub reason: String,
}
