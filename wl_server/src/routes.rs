//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: they unpack the request, call one engine API method
//! and serialise the result. Anything longer belongs in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database and payment provider call is therefore `async`, and
//! must stay that way.
//!
//! Paths are relative to the `/api` scope set up in [`crate::server`].
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde_json::json;
use wl_engine::{
    db_types::{NewProduct, OrderId, ProductId, ProductUpdate, RefundId, Role},
    order_objects::{CheckoutUrls, FulfilmentUpdate, PlaceOrderRequest, RefundDecision},
    traits::{CardGateway, CatalogManagement, OrderManagement, RefundManagement, WalletGateway},
    CatalogApi,
    HostedCheckoutApi,
    OrderFlowApi,
    RefundApi,
    WalletCheckoutApi,
    WebhookOutcome,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        CaptureOrderRequest,
        CheckoutRequest,
        CheckoutSessionResponse,
        OrderSearchParams,
        ProductListParams,
        RefundRequest,
    },
    errors::ServerError,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl <$($param:ident : $bound:ident $(+ $more:ident)*),+>) => {
        paste::paste! {
            pub struct [<$name:camel Route>]<$($param),+>(core::marker::PhantomData<fn() -> ($($param,)+)>);

            impl<$($param),+> [<$name:camel Route>]<$($param),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }

            impl<$($param),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param),+>
            where
                $($param: $bound $(+ $more)* + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$($param),+>);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl <$($param:ident : $bound:ident $(+ $more:ident)*),+>
        where requires [$($roles:expr),+]) => {
        paste::paste! {
            pub struct [<$name:camel Route>]<$($param),+>(core::marker::PhantomData<fn() -> ($($param,)+)>);

            impl<$($param),+> [<$name:camel Route>]<$($param),+> {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self {
                    Self(core::marker::PhantomData)
                }
            }

            impl<$($param),+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param),+>
            where
                $($param: $bound $(+ $more)* + 'static,)+
            {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name::<$($param),+>)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(list_products => Get "/products" impl <B: CatalogManagement>);
/// Lists active products, newest first. Supports `category`, `featured`, `page` and `limit` query parameters.
pub async fn list_products<B: CatalogManagement>(
    query: web::Query<ProductListParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET products");
    let page = api.list_products(query.into_inner().into_public_filter()).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(product => Get "/products/{key}" impl <B: CatalogManagement>);
/// Fetches an active product by id or slug.
pub async fn product<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let key = path.into_inner();
    trace!("💻️ GET product {key}");
    let product = api.product_by_id_or_slug(&key).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(admin_products => Get "/admin/products" impl <B: CatalogManagement> where requires [Role::Admin]);
/// Lists the whole catalog, including deactivated products.
pub async fn admin_products<B: CatalogManagement>(
    query: web::Query<ProductListParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET admin products");
    let page = api.list_products(query.into_inner().into_admin_filter()).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(create_product => Post "/admin/products" impl <B: CatalogManagement> where requires [Role::Admin]);
pub async fn create_product<B: CatalogManagement>(
    body: web::Json<NewProduct>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    debug!("💻️ POST new product '{}'", product.name);
    let product = api.create_product(product).await?;
    Ok(HttpResponse::Created().json(product))
}

route!(update_product => Put "/admin/products/{id}" impl <B: CatalogManagement> where requires [Role::Admin]);
pub async fn update_product<B: CatalogManagement>(
    path: web::Path<ProductId>,
    body: web::Json<ProductUpdate>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PUT product {id}");
    let product = api.update_product(&id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(deactivate_product => Delete "/admin/products/{id}" impl <B: CatalogManagement> where requires [Role::Admin]);
/// Products are never removed, since orders refer to them. They are hidden from the storefront instead.
pub async fn deactivate_product<B: CatalogManagement>(
    path: web::Path<ProductId>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ DELETE product {id}");
    let product = api.deactivate_product(&id).await?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl <B: CatalogManagement + OrderManagement> where requires [Role::User]);
/// Places an order on the direct path. Prices come from the catalog; any prices in the request are ignored.
pub async fn place_order<B: CatalogManagement + OrderManagement>(
    claims: JwtClaims,
    body: web::Json<PlaceOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST order for {}", claims.sub);
    let PlaceOrderRequest { order_items, shipping_address, payment_method } = body.into_inner();
    let order = api.place_order(&claims.requester(), order_items, shipping_address, payment_method).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders" impl <B: CatalogManagement + OrderManagement> where requires [Role::User]);
/// The caller's own orders, newest first.
pub async fn my_orders<B: CatalogManagement + OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let orders = api.orders_for_user(&claims.requester().user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl <B: CatalogManagement + OrderManagement> where requires [Role::User]);
/// Customers can fetch their own orders. Admins can fetch any order.
pub async fn order_by_id<B: CatalogManagement + OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET order {id} for {}", claims.sub);
    let order = api.order_for(&claims.requester(), &id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(search_orders => Get "/admin/orders" impl <B: CatalogManagement + OrderManagement> where requires [Role::Admin]);
/// Filters by `status`, `isPaid` and `user`, with `page` and `limit`.
pub async fn search_orders<B: CatalogManagement + OrderManagement>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders search");
    let page = api.search_orders(query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(page))
}

route!(update_order => Put "/admin/orders/{id}" impl <B: CatalogManagement + OrderManagement> where requires [Role::Admin]);
pub async fn update_order<B: CatalogManagement + OrderManagement>(
    path: web::Path<OrderId>,
    body: web::Json<FulfilmentUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let update = body.into_inner();
    if update.is_empty() {
        return Err(ServerError::ValidationError("Nothing to update".into()));
    }
    debug!("💻️ PUT order {id}");
    let order = api.update_fulfilment(&id, update).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Card checkout  ----------------------------------------------
route!(create_checkout => Post "/payments/stripe/create-checkout" impl <B: CatalogManagement + OrderManagement, C: CardGateway> where requires [Role::User]);
/// Opens a hosted payment session. No order exists until the provider confirms the payment via the webhook.
pub async fn create_checkout<B, C>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    urls: web::Data<CheckoutUrls>,
    api: web::Data<HostedCheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: CatalogManagement + OrderManagement,
    C: CardGateway,
{
    debug!("💻️ POST create-checkout for {}", claims.sub);
    let CheckoutRequest { order_items, shipping_address } = body.into_inner();
    let session =
        api.start_checkout(&claims.requester(), order_items, shipping_address, urls.get_ref().clone()).await?;
    Ok(HttpResponse::Ok().json(CheckoutSessionResponse::from(session)))
}

route!(stripe_webhook => Post "/payments/stripe/webhook" impl <B: CatalogManagement + OrderManagement, C: CardGateway>);
/// Payment notifications from the card gateway. The body must reach the signature check exactly as it was sent, so
/// it is taken as raw bytes.
///
/// Once the signature checks out, the response is always a 200, even if no order could be created. A redelivery
/// would fail the same way, so the problem is logged for manual reconciliation instead.
pub async fn stripe_webhook<B, C>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<HostedCheckoutApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: CatalogManagement + OrderManagement,
    C: CardGateway,
{
    trace!("💻️ Received card gateway webhook");
    let signature = req
        .headers()
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidSignature(format!("Missing {STRIPE_SIGNATURE_HEADER} header")))?;
    match api.process_notification(&body, signature).await? {
        WebhookOutcome::OrderCreated(order) => debug!("💻️ Webhook created order {}", order.id),
        WebhookOutcome::AlreadyProcessed(order) => debug!("💻️ Webhook repeated for order {}", order.id),
        WebhookOutcome::Ignored => trace!("💻️ Webhook ignored"),
        WebhookOutcome::Failed(e) => warn!("💻️ Webhook acknowledged, but the order could not be created. {e}"),
    }
    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

//----------------------------------------------   Wallet checkout  --------------------------------------------
route!(create_wallet_order => Post "/payments/paypal/create-order" impl <B: CatalogManagement + OrderManagement, W: WalletGateway> where requires [Role::User]);
/// Stores an unpaid order and opens the matching payment on the wallet gateway.
pub async fn create_wallet_order<B, W>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<WalletCheckoutApi<B, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: CatalogManagement + OrderManagement,
    W: WalletGateway,
{
    debug!("💻️ POST paypal create-order for {}", claims.sub);
    let CheckoutRequest { order_items, shipping_address } = body.into_inner();
    let created = api.create_order(&claims.requester(), order_items, shipping_address).await?;
    Ok(HttpResponse::Created().json(created))
}

route!(capture_wallet_order => Post "/payments/paypal/capture-order" impl <B: CatalogManagement + OrderManagement, W: WalletGateway> where requires [Role::User]);
/// Captures an approved wallet payment and marks the order paid.
pub async fn capture_wallet_order<B, W>(
    claims: JwtClaims,
    body: web::Json<CaptureOrderRequest>,
    api: web::Data<WalletCheckoutApi<B, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: CatalogManagement + OrderManagement,
    W: WalletGateway,
{
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST paypal capture-order {order_id} for {}", claims.sub);
    let order = api.capture_order(&claims.requester(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Refunds  ----------------------------------------------------
route!(request_refund => Post "/refunds" impl <B: OrderManagement + RefundManagement, C: CardGateway, W: WalletGateway> where requires [Role::User]);
pub async fn request_refund<B, C, W>(
    claims: JwtClaims,
    body: web::Json<RefundRequest>,
    api: web::Data<RefundApi<B, C, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: CardGateway,
    W: WalletGateway,
{
    let RefundRequest { order_id, reason } = body.into_inner();
    debug!("💻️ POST refund request for order {order_id} by {}", claims.sub);
    let refund = api.request_refund(&claims.requester(), &order_id, &reason).await?;
    Ok(HttpResponse::Created().json(refund))
}

route!(my_refunds => Get "/refunds" impl <B: OrderManagement + RefundManagement, C: CardGateway, W: WalletGateway> where requires [Role::User]);
/// Customers see their own refund requests; admins see all of them.
pub async fn my_refunds<B, C, W>(
    claims: JwtClaims,
    api: web::Data<RefundApi<B, C, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: CardGateway,
    W: WalletGateway,
{
    debug!("💻️ GET refunds for {}", claims.sub);
    let refunds = api.refunds_for(&claims.requester()).await?;
    Ok(HttpResponse::Ok().json(refunds))
}

route!(review_refund => Put "/admin/refunds/{id}" impl <B: OrderManagement + RefundManagement, C: CardGateway, W: WalletGateway> where requires [Role::Admin]);
/// Approve, reject or annotate a refund request. Approving a refund on a gateway-paid order returns the money through
/// the same gateway.
pub async fn review_refund<B, C, W>(
    claims: JwtClaims,
    path: web::Path<RefundId>,
    body: web::Json<RefundDecision>,
    api: web::Data<RefundApi<B, C, W>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + RefundManagement,
    C: CardGateway,
    W: WalletGateway,
{
    let id = path.into_inner();
    info!("💻️ PUT refund {id} by {}", claims.sub);
    let refund = api.review_refund(&id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(refund))
}
