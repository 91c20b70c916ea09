use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use wl_engine::{
    order_objects::CheckoutUrls,
    traits::PaymentGateways,
    CatalogApi,
    HostedCheckoutApi,
    OrderFlowApi,
    RefundApi,
    SqliteDatabase,
    WalletCheckoutApi,
};

use crate::{
    config::ServerConfig,
    errors::{configure_extractors, ServerError},
    expiry_worker::start_expiry_worker,
    integrations::{PaypalGateway, StripeGateway},
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        AdminProductsRoute,
        CaptureWalletOrderRoute,
        CreateCheckoutRoute,
        CreateProductRoute,
        CreateWalletOrderRoute,
        DeactivateProductRoute,
        ListProductsRoute,
        MyOrdersRoute,
        MyRefundsRoute,
        OrderByIdRoute,
        PlaceOrderRoute,
        ProductRoute,
        RequestRefundRoute,
        ReviewRefundRoute,
        SearchOrdersRoute,
        StripeWebhookRoute,
        UpdateOrderRoute,
        UpdateProductRoute,
    },
};

type Db = SqliteDatabase;
type Card = StripeGateway;
type Wallet = PaypalGateway;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let card = StripeGateway::new(config.stripe.clone())?;
    let wallet = PaypalGateway::new(config.paypal.clone())?;
    let _expiry_worker =
        start_expiry_worker(db.clone(), config.unpaid_order_timeout, config.expiry_check_interval);
    let srv = create_server_instance(config, db, card, wallet)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    card: StripeGateway,
    wallet: PaypalGateway,
) -> Result<Server, ServerError> {
    let urls = CheckoutUrls::for_storefront(&config.public_url);
    info!("🚀️ Hosted checkouts will return buyers to {}", urls.success_url);
    let srv = HttpServer::new(move || {
        let catalog_api = CatalogApi::new(db.clone());
        let orders_api = OrderFlowApi::new(db.clone());
        let hosted_api = HostedCheckoutApi::new(db.clone(), card.clone());
        let wallet_api = WalletCheckoutApi::new(db.clone(), wallet.clone());
        let refund_api = RefundApi::new(db.clone(), PaymentGateways::new(card.clone(), wallet.clone()));
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(config.auth.clone()))
            .service(ListProductsRoute::<Db>::new())
            .service(ProductRoute::<Db>::new())
            .service(AdminProductsRoute::<Db>::new())
            .service(CreateProductRoute::<Db>::new())
            .service(UpdateProductRoute::<Db>::new())
            .service(DeactivateProductRoute::<Db>::new())
            .service(PlaceOrderRoute::<Db>::new())
            .service(MyOrdersRoute::<Db>::new())
            .service(OrderByIdRoute::<Db>::new())
            .service(SearchOrdersRoute::<Db>::new())
            .service(UpdateOrderRoute::<Db>::new())
            .service(CreateCheckoutRoute::<Db, Card>::new())
            .service(StripeWebhookRoute::<Db, Card>::new())
            .service(CreateWalletOrderRoute::<Db, Wallet>::new())
            .service(CaptureWalletOrderRoute::<Db, Wallet>::new())
            .service(RequestRefundRoute::<Db, Card, Wallet>::new())
            .service(MyRefundsRoute::<Db, Card, Wallet>::new())
            .service(ReviewRefundRoute::<Db, Card, Wallet>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wl::access_log"))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(hosted_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(urls.clone()))
            .configure(configure_extractors)
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
