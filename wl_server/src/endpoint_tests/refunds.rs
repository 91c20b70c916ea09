use actix_web::{http::StatusCode, web, web::ServiceConfig};
use mockall::Sequence;
use serde_json::{json, Value};
use wl_engine::{
    db_types::{Cents, RefundStatus},
    traits::{GatewayError, PaymentGateways, StoreError},
    RefundApi,
};

use super::{
    helpers::{admin_token, get_request, order, post_request, put_request, refund, user_token, ALICE, BOB},
    mocks::{MockCard, MockStore, MockWallet},
};
use crate::routes::{MyRefundsRoute, RequestRefundRoute, ReviewRefundRoute};

#[actix_web::test]
async fn customers_can_request_refunds_for_paid_orders() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store
            .expect_insert_refund()
            .withf(|r| r.amount == Cents::from(2435) && r.reason == "The candle arrived broken")
            .returning(|r| Ok(refund(r.id.as_str(), r.order_id.as_str(), r.user_id.as_str(), "pending")));
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let body = json!({ "orderId": "o1", "reason": "  The candle arrived broken " });
    let (status, body) = post_request(&user_token(ALICE), "/refunds", body, configure).await;
    assert_eq!(status, StatusCode::CREATED);
    let refund: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(refund["status"], "pending");
    assert_eq!(refund["order"], "o1");
    assert_eq!(refund["amount"], 24.35);
}

#[actix_web::test]
async fn refunds_need_a_reason() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "orderId": "o1" });
    let (status, body) = post_request(&user_token(ALICE), "/refunds", body, |cfg| {
        configure(cfg, MockStore::new(), MockCard::new(), MockWallet::new())
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Please give a reason for the refund"}"#);
}

#[actix_web::test]
async fn malformed_refund_requests_get_a_json_error() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_insert_refund().never();
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let body = json!({ "orderId": 42, "reason": "Changed my mind" });
    let (status, body) = post_request(&user_token(ALICE), "/refunds", body, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"success":false,"message":"Could not read request body: "#), "{body}");
}

#[actix_web::test]
async fn refunds_for_someone_elses_order_are_forbidden() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store.expect_insert_refund().never();
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let body = json!({ "orderId": "o1", "reason": "Changed my mind" });
    let (status, _) = post_request(&user_token(BOB), "/refunds", body, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_refunded() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, false))));
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let body = json!({ "orderId": "o1", "reason": "Changed my mind" });
    let (status, body) = post_request(&user_token(ALICE), "/refunds", body, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Order o1 has not been paid"}"#);
}

#[actix_web::test]
async fn customers_only_see_their_own_refunds() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store
            .expect_fetch_refunds()
            .withf(|user| user.as_ref().map(|u| u.as_str()) == Some(ALICE))
            .returning(|_| Ok(vec![refund("r1", "o1", ALICE, "pending")]));
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let (status, body) = get_request(&user_token(ALICE), "/refunds", configure).await;
    assert_eq!(status, StatusCode::OK);
    let refunds: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(refunds[0]["id"], "r1");
}

#[actix_web::test]
async fn admins_see_all_refunds() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_refunds().withf(|user| user.is_none()).returning(|_| {
            Ok(vec![refund("r2", "o2", BOB, "approved"), refund("r1", "o1", ALICE, "pending")])
        });
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let (status, body) = get_request(&admin_token(), "/refunds", configure).await;
    assert_eq!(status, StatusCode::OK);
    let refunds: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(refunds.as_array().map(|a| a.len()), Some(2));
}

#[actix_web::test]
async fn reviewing_refunds_is_for_admins() {
    let _ = env_logger::try_init().ok();
    let (status, _) = put_request(&user_token(ALICE), "/admin/refunds/r1", json!({ "status": "approved" }), |cfg| {
        configure(cfg, MockStore::new(), MockCard::new(), MockWallet::new())
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn approving_a_card_refund_reverses_the_charge() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut seq = Sequence::new();
        let mut store = MockStore::new();
        store.expect_fetch_refund().returning(|id| Ok(Some(refund(id.as_str(), "o1", ALICE, "pending"))));
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store
            .expect_transition_refund()
            .withf(|_, t| t.from == RefundStatus::Pending && t.to == RefundStatus::Approved)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, _| Ok(refund(id.as_str(), "o1", ALICE, "approved")));
        let mut card = MockCard::new();
        card.expect_reverse_charge()
            .withf(|charge, amount, key| charge == "pi_123" && *amount == Cents::from(2435) && key == "r1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("re_1".into()));
        store
            .expect_transition_refund()
            .withf(|_, t| {
                t.from == RefundStatus::Approved &&
                    t.to == RefundStatus::Processed &&
                    t.refund_transaction_id.as_deref() == Some("re_1")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, t| {
                let mut r = refund(id.as_str(), "o1", ALICE, "processed");
                r.refund_transaction_id = t.refund_transaction_id;
                Ok(r)
            });
        let mut wallet = MockWallet::new();
        wallet.expect_reverse_charge().never();
        configure(cfg, store, card, wallet);
    };
    let (status, body) = put_request(&admin_token(), "/admin/refunds/r1", json!({ "status": "approved" }), configure).await;
    assert_eq!(status, StatusCode::OK);
    let refund: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(refund["status"], "processed");
    assert_eq!(refund["refundTransactionId"], "re_1");
}

#[actix_web::test]
async fn refused_reversals_leave_the_refund_pending() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_refund().returning(|id| Ok(Some(refund(id.as_str(), "o1", ALICE, "pending"))));
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store
            .expect_transition_refund()
            .withf(|_, t| t.from == RefundStatus::Pending && t.to == RefundStatus::Approved)
            .times(1)
            .returning(|id, _| Ok(refund(id.as_str(), "o1", ALICE, "approved")));
        store
            .expect_transition_refund()
            .withf(|_, t| t.from == RefundStatus::Approved && t.to == RefundStatus::Pending)
            .times(1)
            .returning(|id, _| Ok(refund(id.as_str(), "o1", ALICE, "pending")));
        let mut card = MockCard::new();
        card.expect_reverse_charge().returning(|_, _, _| Err(GatewayError::ProviderError("charge_already_refunded".into())));
        configure(cfg, store, card, MockWallet::new());
    };
    let (status, body) = put_request(&admin_token(), "/admin/refunds/r1", json!({ "status": "approved" }), configure).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"success":false,"message":"Payment provider error. charge_already_refunded"}"#);
}

#[actix_web::test]
async fn a_refund_claimed_by_another_review_is_not_reversed() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_refund().returning(|id| Ok(Some(refund(id.as_str(), "o1", ALICE, "pending"))));
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store
            .expect_transition_refund()
            .times(1)
            .returning(|id, _| Err(StoreError::RefundModificationConflict(id.clone())));
        let mut card = MockCard::new();
        card.expect_reverse_charge().never();
        configure(cfg, store, card, MockWallet::new());
    };
    let (status, body) = put_request(&admin_token(), "/admin/refunds/r1", json!({ "status": "approved" }), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Refund r1 was modified by another request"}"#);
}

#[actix_web::test]
async fn refunds_being_reversed_cannot_be_rejected() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_refund().returning(|id| Ok(Some(refund(id.as_str(), "o1", ALICE, "approved"))));
        store.expect_fetch_order().returning(|id| Ok(Some(order(id.as_str(), ALICE, true))));
        store.expect_transition_refund().never();
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let (status, body) = put_request(&admin_token(), "/admin/refunds/r1", json!({ "status": "rejected" }), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Refund r1 was modified by another request"}"#);
}

#[actix_web::test]
async fn processed_refunds_are_final() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_refund().returning(|id| Ok(Some(refund(id.as_str(), "o1", ALICE, "processed"))));
        store.expect_transition_refund().never();
        configure(cfg, store, MockCard::new(), MockWallet::new());
    };
    let (status, body) = put_request(&admin_token(), "/admin/refunds/r1", json!({ "status": "pending" }), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"A refund cannot move from processed to pending"}"#);
}

fn configure(cfg: &mut ServiceConfig, store: MockStore, card: MockCard, wallet: MockWallet) {
    cfg.service(RequestRefundRoute::<MockStore, MockCard, MockWallet>::new())
        .service(MyRefundsRoute::<MockStore, MockCard, MockWallet>::new())
        .service(ReviewRefundRoute::<MockStore, MockCard, MockWallet>::new())
        .app_data(web::Data::new(RefundApi::new(store, PaymentGateways::new(card, wallet))));
}
