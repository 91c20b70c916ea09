use std::collections::BTreeMap;

use actix_web::{
    http::{Method, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use wl_engine::{
    db_types::{Cents, Order, OrderId, PaymentMethod},
    order_objects::CheckoutUrls,
    traits::{CaptureResult, CheckoutEvent, CompletedSession, GatewayError, HostedSession},
    HostedCheckoutApi,
    WalletCheckoutApi,
};

use super::{
    helpers::{order, post_request, product, send_request, user_token, ALICE, BOB},
    mocks::{MockCard, MockStore, MockWallet},
};
use crate::routes::{
    CaptureWalletOrderRoute,
    CreateCheckoutRoute,
    CreateWalletOrderRoute,
    StripeWebhookRoute,
    STRIPE_SIGNATURE_HEADER,
};

const CART: &str = r#"{
    "orderItems": [{ "product": "p1", "quantity": 2, "price": 0.5 }],
    "shippingAddress": { "name": "Alice", "address": "1 High St", "city": "Bath", "zipCode": "BA1 1AA", "country": "UK" }
}"#;

fn cart() -> Value {
    serde_json::from_str(CART).unwrap()
}

//----------------------------------------------   Hosted checkout   -------------------------------------------
#[actix_web::test]
async fn hosted_checkout_uses_catalog_prices() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_product().returning(|_| Ok(Some(product("p1", "Lavender Soap", 8.5, 10))));
        let mut card = MockCard::new();
        card.expect_create_hosted_session()
            .withf(|r| {
                r.line_items.len() == 3 &&
                    r.line_items[0].unit_amount == Cents::from(850) &&
                    r.line_items.iter().map(|l| l.unit_amount * l.quantity).sum::<Cents>() == Cents::from(2435) &&
                    r.success_url.starts_with("https://shop.example.com/checkout/success") &&
                    r.metadata.get("totalPrice").map(String::as_str) == Some("24.35") &&
                    r.metadata.get("userId").map(String::as_str) == Some(ALICE)
            })
            .returning(|_| {
                Ok(HostedSession {
                    session_id: "cs_test_1".into(),
                    redirect_url: "https://checkout.stripe.com/c/pay/cs_test_1".into(),
                })
            });
        configure_hosted(cfg, store, card);
    };
    let (status, body) = post_request(&user_token(ALICE), "/payments/stripe/create-checkout", cart(), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"{"success":true,"sessionId":"cs_test_1","url":"https://checkout.stripe.com/c/pay/cs_test_1"}"#
    );
}

#[actix_web::test]
async fn hosted_checkout_needs_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("", "/payments/stripe/create-checkout", cart(), |cfg| {
        configure_hosted(cfg, MockStore::new(), MockCard::new())
    })
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(Method::POST, "", "/payments/stripe/webhook", Some(json!({})), |cfg| {
        configure_hosted(cfg, MockStore::new(), MockCard::new())
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Invalid webhook signature. Missing Stripe-Signature header"}"#);
}

#[actix_web::test]
async fn webhook_with_bad_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut card = MockCard::new();
    card.expect_verify_and_parse_event()
        .returning(|_, _| Err(GatewayError::InvalidSignature("No signatures found matching the expected signature".into())));
    let (status, _) = webhook(card, MockStore::new()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn other_webhook_events_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut card = MockCard::new();
    card.expect_verify_and_parse_event().returning(|_, _| Ok(CheckoutEvent::Ignored));
    let (status, body) = webhook(card, MockStore::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn completed_sessions_become_paid_orders() {
    let _ = env_logger::try_init().ok();
    let mut card = MockCard::new();
    card.expect_verify_and_parse_event().withf(|body, sig| body == b"{}" && sig == "t=1,v1=abc").returning(|_, _| {
        Ok(CheckoutEvent::SessionCompleted(completed_session()))
    });
    let mut store = MockStore::new();
    store.expect_fetch_product().returning(|_| Ok(Some(product("p1", "Lavender Soap", 8.5, 10))));
    store
        .expect_insert_order_for_checkout_session()
        .withf(|session, o| {
            session == "cs_test_1" &&
                o.reserve_stock &&
                o.paid_at.is_some() &&
                o.payment_result.as_ref().map(|p| p.id.as_str()) == Some("pi_123") &&
                o.order_items[0].price == Cents::from(850)
        })
        .times(1)
        .returning(|_, o| Ok((order(o.id.as_str(), ALICE, true), true)));
    let (status, body) = webhook(card, store).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"received":true}"#);
}

#[actix_web::test]
async fn failed_order_creation_is_still_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut card = MockCard::new();
    card.expect_verify_and_parse_event().returning(|_, _| {
        let mut session = completed_session();
        session.metadata.remove("orderItems");
        Ok(CheckoutEvent::SessionCompleted(session))
    });
    let (status, _) = webhook(card, MockStore::new()).await;
    assert_eq!(status, StatusCode::OK);
}

async fn webhook(card: MockCard, store: MockStore) -> (StatusCode, String) {
    let app = App::new().configure(|cfg| configure_hosted(cfg, store, card));
    let service = test::init_service(app).await;
    let req = TestRequest::post()
        .uri("/payments/stripe/webhook")
        .insert_header((STRIPE_SIGNATURE_HEADER, "t=1,v1=abc"))
        .set_payload("{}")
        .to_request();
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

fn completed_session() -> CompletedSession {
    let mut metadata = BTreeMap::new();
    metadata.insert("userId".to_string(), ALICE.to_string());
    metadata.insert("orderItems".to_string(), r#"[{"product":"p1","quantity":2,"price":8.5}]"#.to_string());
    metadata.insert(
        "shippingAddress".to_string(),
        r#"{"name":"Alice","address":"1 High St","city":"Bath","zipCode":"BA1 1AA","country":"UK"}"#.to_string(),
    );
    metadata.insert("itemsPrice".to_string(), "17.00".to_string());
    metadata.insert("shippingPrice".to_string(), "5.99".to_string());
    metadata.insert("taxPrice".to_string(), "1.36".to_string());
    metadata.insert("totalPrice".to_string(), "24.35".to_string());
    CompletedSession {
        session_id: "cs_test_1".into(),
        payment_reference: Some("pi_123".into()),
        payment_status: "paid".into(),
        customer_email: Some("alice@example.com".into()),
        metadata,
        occurred_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
    }
}

fn configure_hosted(cfg: &mut ServiceConfig, store: MockStore, card: MockCard) {
    cfg.service(CreateCheckoutRoute::<MockStore, MockCard>::new())
        .service(StripeWebhookRoute::<MockStore, MockCard>::new())
        .app_data(web::Data::new(CheckoutUrls::for_storefront("https://shop.example.com/")))
        .app_data(web::Data::new(HostedCheckoutApi::new(store, card)));
}

//----------------------------------------------   Wallet checkout   -------------------------------------------
#[actix_web::test]
async fn wallet_orders_are_stored_with_their_intent() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_product().returning(|_| Ok(Some(product("p1", "Lavender Soap", 8.5, 10))));
        store
            .expect_insert_order()
            .withf(|o| {
                !o.reserve_stock &&
                    o.payment_method == PaymentMethod::Paypal &&
                    o.payment_intent_id.as_deref() == Some("PAYPAL-ORDER-1")
            })
            .returning(|o| Ok(wallet_order(o.id.as_str(), ALICE)));
        let mut wallet = MockWallet::new();
        wallet.expect_create_intent().withf(|r| r.amount == Cents::from(2435)).returning(|_| Ok("PAYPAL-ORDER-1".into()));
        configure_wallet(cfg, store, wallet);
    };
    let (status, body) = post_request(&user_token(ALICE), "/payments/paypal/create-order", cart(), configure).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(created["intentId"], "PAYPAL-ORDER-1");
    assert_eq!(created["totalPrice"], 24.35);
}

#[actix_web::test]
async fn refused_intents_store_nothing() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_product().returning(|_| Ok(Some(product("p1", "Lavender Soap", 8.5, 10))));
        store.expect_insert_order().never();
        let mut wallet = MockWallet::new();
        wallet.expect_create_intent().returning(|_| Err(GatewayError::ProviderError("UNPROCESSABLE_ENTITY".into())));
        configure_wallet(cfg, store, wallet);
    };
    let (status, body) = post_request(&user_token(ALICE), "/payments/paypal/create-order", cart(), configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"success":false,"message":"Payment provider error. UNPROCESSABLE_ENTITY"}"#);
}

#[actix_web::test]
async fn captured_orders_are_paid() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(wallet_order(id.as_str(), ALICE))));
        store.expect_mark_order_paid().withf(|_, p, _| p.id == "CAP-1").returning(|id, p, at| {
            let mut o = serde_json::to_value(wallet_order(id.as_str(), ALICE)).unwrap();
            o["isPaid"] = json!(true);
            o["paidAt"] = json!(at);
            o["paymentResult"] = json!(p);
            Ok((serde_json::from_value(o).unwrap(), true))
        });
        let mut wallet = MockWallet::new();
        wallet.expect_capture().withf(|intent| intent == "PAYPAL-ORDER-1").returning(|_| {
            Ok(CaptureResult {
                capture_id: "CAP-1".into(),
                status: "COMPLETED".into(),
                payer_email: Some("alice@example.com".into()),
                amount: Cents::from(2435),
            })
        });
        configure_wallet(cfg, store, wallet);
    };
    let body = json!({ "orderId": "o7" });
    let (status, body) = post_request(&user_token(ALICE), "/payments/paypal/capture-order", body, configure).await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["isPaid"], true);
    assert_eq!(order["paymentResult"]["id"], "CAP-1");
}

#[actix_web::test]
async fn short_captures_leave_the_order_unpaid() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(wallet_order(id.as_str(), ALICE))));
        store.expect_mark_order_paid().never();
        let mut wallet = MockWallet::new();
        wallet.expect_capture().returning(|_| {
            Ok(CaptureResult {
                capture_id: "CAP-1".into(),
                status: "COMPLETED".into(),
                payer_email: None,
                amount: Cents::from(100),
            })
        });
        configure_wallet(cfg, store, wallet);
    };
    let body = json!({ "orderId": "o7" });
    let (status, _) = post_request(&user_token(ALICE), "/payments/paypal/capture-order", body, configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn only_the_owner_can_capture() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(wallet_order(id.as_str(), ALICE))));
        let mut wallet = MockWallet::new();
        wallet.expect_capture().never();
        configure_wallet(cfg, store, wallet);
    };
    let body = json!({ "orderId": OrderId::from("o7") });
    let (status, _) = post_request(&user_token(BOB), "/payments/paypal/capture-order", body, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn wallet_order(id: &str, user: &str) -> Order {
    let mut o = order(id, user, false);
    o.payment_method = PaymentMethod::Paypal;
    o.payment_intent_id = Some("PAYPAL-ORDER-1".into());
    o
}

fn configure_wallet(cfg: &mut ServiceConfig, store: MockStore, wallet: MockWallet) {
    cfg.service(CreateWalletOrderRoute::<MockStore, MockWallet>::new())
        .service(CaptureWalletOrderRoute::<MockStore, MockWallet>::new())
        .app_data(web::Data::new(WalletCheckoutApi::new(store, wallet)));
}
