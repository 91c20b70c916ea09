use chrono::{Duration, Utc};
use cucumber::{then, when};
use regex::Regex;
use wl_engine::{
    db_types::{Cents, OrderStatus, PaymentMethod, RefundStatus, ShippingAddress},
    order_objects::{CartLine, CheckoutUrls, RefundDecision},
    traits::{CatalogManagement, OrderManagement, StoreError},
    WebhookOutcome,
};

use crate::cucumber::{
    fake_gateways::VALID_SIGNATURE,
    store_world::{admin, customer},
    StoreWorld,
};

fn cart(world: &StoreWorld, items: &str) -> Vec<CartLine> {
    let re = Regex::new(r#"(\d+) x "([^"]+)""#).unwrap();
    re.captures_iter(items)
        .map(|c| {
            let quantity = c[1].parse::<i64>().unwrap();
            CartLine::new(world.product_id(&c[2]), quantity)
        })
        .collect()
}

fn address(name: &str) -> ShippingAddress {
    ShippingAddress {
        name: name.to_string(),
        email: None,
        phone: None,
        address: "12 Chandler Row".into(),
        city: "Bath".into(),
        state: None,
        zip_code: "BA1 1AA".into(),
        country: "UK".into(),
    }
}

fn cents(s: &str) -> Cents {
    s.parse::<Cents>().expect("Not an amount")
}

async fn refresh_order(world: &mut StoreWorld) {
    let id = world.order().id.clone();
    let order = world.system().db.fetch_order(&id).await.unwrap().expect("Order disappeared");
    world.order = Some(order);
}

async fn refresh_refund(world: &mut StoreWorld) {
    let id = world.refund().id.clone();
    let refund = world.system().refunds.refund(&id).await.unwrap();
    world.refund = Some(refund);
}

//--------------------------------------   Direct checkout   ---------------------------------------------------------
#[when(regex = r#"^customer (\w+) places an order for ((?:\d+ x "[^"]+"(?: and )?)+)$"#)]
async fn place_order(world: &mut StoreWorld, name: String, items: String) {
    let lines = cart(world, &items);
    let result =
        world.system().orders.place_order(&customer(&name), lines, address(&name), PaymentMethod::Stripe).await;
    if let Some(order) = world.record(result) {
        world.order = Some(order);
    }
}

#[when(regex = r#"^customer (\w+) places an order for (\d+) x "([^"]+)" claiming a price of (\S+)$"#)]
async fn place_order_with_price_hint(world: &mut StoreWorld, name: String, qty: i64, product: String, price: String) {
    let mut line = CartLine::new(world.product_id(&product), qty);
    line.price = Some(cents(&price));
    let result =
        world.system().orders.place_order(&customer(&name), vec![line], address(&name), PaymentMethod::Stripe).await;
    if let Some(order) = world.record(result) {
        world.order = Some(order);
    }
}

#[then(expr = "the order total is {word}")]
async fn check_total(world: &mut StoreWorld, total: String) {
    assert_eq!(world.order().total_price, cents(&total));
}

#[then(expr = "the order has shipping {word} and tax {word}")]
async fn check_shipping_and_tax(world: &mut StoreWorld, shipping: String, tax: String) {
    let order = world.order();
    assert_eq!(order.shipping_price, cents(&shipping));
    assert_eq!(order.tax_price, cents(&tax));
    assert_eq!(order.total_price, order.items_price + order.shipping_price + order.tax_price);
}

#[then(expr = "{string} has {int} in stock")]
async fn check_stock(world: &mut StoreWorld, name: String, stock: i64) {
    let id = world.product_id(&name);
    let product = world.system().db.fetch_product(&id).await.unwrap().unwrap();
    assert_eq!(product.stock, stock, "Stock of {name}");
}

#[then(expr = "the order is {word}")]
async fn check_paid(world: &mut StoreWorld, state: String) {
    refresh_order(world).await;
    let order = world.order();
    match state.as_str() {
        "paid" => {
            assert!(order.is_paid, "Order should be paid");
            assert!(order.paid_at.is_some());
        },
        "unpaid" => assert!(!order.is_paid, "Order should not be paid"),
        _ => panic!("Unknown order state {state}"),
    }
}

#[then(expr = "the order status is {word}")]
async fn check_status(world: &mut StoreWorld, status: String) {
    refresh_order(world).await;
    assert_eq!(world.order().order_status, status.parse::<OrderStatus>().unwrap());
}

#[then(expr = "the request fails with {string}")]
async fn check_error(world: &mut StoreWorld, message: String) {
    let err = world.last_error.as_ref().expect("The last request did not fail");
    assert!(err.to_string().contains(&message), "Expected '{message}' in '{err}'");
}

#[then(expr = "customer {word} has {int} orders")]
async fn check_order_count(world: &mut StoreWorld, name: String, count: usize) {
    let orders = world.system().orders.orders_for_user(&customer(&name).user_id).await.unwrap();
    assert_eq!(orders.len(), count);
}

#[when(expr = "the order is {int} hours old")]
async fn age_order(world: &mut StoreWorld, hours: i64) {
    let id = world.order().id.clone();
    world.system().db.backdate_order(&id, Utc::now() - Duration::hours(hours)).await.unwrap();
}

#[when(expr = "unpaid orders older than {int} hours expire")]
async fn expire_orders(world: &mut StoreWorld, hours: i64) {
    world.system().orders.expire_unpaid_orders(Duration::hours(hours)).await.unwrap();
}

//--------------------------------------   Hosted checkout   ---------------------------------------------------------
#[when(regex = r#"^customer (\w+) starts a card checkout for ((?:\d+ x "[^"]+"(?: and )?)+)$"#)]
async fn start_card_checkout(world: &mut StoreWorld, name: String, items: String) {
    let lines = cart(world, &items);
    let urls = CheckoutUrls::for_storefront("http://localhost:3000");
    let result = world.system().hosted.start_checkout(&customer(&name), lines, address(&name), urls).await;
    if let Some(session) = world.record(result) {
        world.session = Some(session);
    }
}

async fn deliver_notification(world: &mut StoreWorld, signature: &str, payment_status: &str) {
    let session_id = world.session.as_ref().expect("No checkout session").session_id.clone();
    let body = world.system().card.session_event(&session_id, payment_status);
    let result = world.system().hosted.process_notification(&body, signature).await;
    if let Ok(WebhookOutcome::OrderCreated(order) | WebhookOutcome::AlreadyProcessed(order)) = &result {
        world.order = Some(order.clone());
    }
    world.webhook = Some(result);
}

#[then(expr = "the card gateway charges {word} for the checkout session")]
async fn check_session_charge(world: &mut StoreWorld, amount: String) {
    let session_id = world.session.as_ref().expect("No checkout session").session_id.clone();
    assert_eq!(world.system().card.charged(&session_id), cents(&amount));
}

#[when("the card gateway confirms the checkout session")]
async fn confirm_session(world: &mut StoreWorld) {
    deliver_notification(world, VALID_SIGNATURE, "paid").await;
}

#[when("the card gateway reports the checkout session as awaiting payment")]
async fn unpaid_session(world: &mut StoreWorld) {
    deliver_notification(world, VALID_SIGNATURE, "unpaid").await;
}

#[when("a forged notification for the checkout session arrives")]
async fn forged_notification(world: &mut StoreWorld) {
    deliver_notification(world, "t=1,v1=deadbeef", "paid").await;
}

fn webhook(world: &StoreWorld) -> &Result<WebhookOutcome, StoreError> {
    world.webhook.as_ref().expect("No notification was delivered")
}

#[then("the webhook created an order")]
async fn webhook_created_order(world: &mut StoreWorld) {
    let outcome = webhook(world);
    assert!(matches!(outcome, Ok(WebhookOutcome::OrderCreated(_))), "{outcome:?}");
}

#[then("the webhook recognised a repeated notification")]
async fn webhook_was_repeat(world: &mut StoreWorld) {
    let outcome = webhook(world);
    assert!(matches!(outcome, Ok(WebhookOutcome::AlreadyProcessed(_))), "{outcome:?}");
}

#[then("the webhook could not fulfil the order")]
async fn webhook_failed(world: &mut StoreWorld) {
    let outcome = webhook(world);
    assert!(matches!(outcome, Ok(WebhookOutcome::Failed(_))), "{outcome:?}");
}

#[then("the webhook ignored the notification")]
async fn webhook_ignored(world: &mut StoreWorld) {
    let outcome = webhook(world);
    assert!(matches!(outcome, Ok(WebhookOutcome::Ignored)), "{outcome:?}");
}

#[then("the webhook was rejected")]
async fn webhook_rejected(world: &mut StoreWorld) {
    let outcome = webhook(world);
    assert!(matches!(outcome, Err(StoreError::GatewayError(_))), "{outcome:?}");
}

//--------------------------------------   Wallet checkout   ---------------------------------------------------------
#[when(regex = r#"^customer (\w+) creates a wallet order for ((?:\d+ x "[^"]+"(?: and )?)+)$"#)]
async fn create_wallet_order(world: &mut StoreWorld, name: String, items: String) {
    let lines = cart(world, &items);
    let result = world.system().wallet_checkout.create_order(&customer(&name), lines, address(&name)).await;
    if let Some(created) = world.record(result) {
        assert!(!created.intent_id.is_empty());
        let order = world.system().db.fetch_order(&created.order_id).await.unwrap().expect("Order was not stored");
        assert_eq!(order.total_price, created.prices.total_price);
        world.order = Some(order);
    }
}

#[when(expr = "the wallet captures only {word}")]
async fn short_capture(world: &mut StoreWorld, amount: String) {
    world.system().wallet.capture_only(cents(&amount));
}

#[when(expr = "customer {word} captures the order")]
async fn capture(world: &mut StoreWorld, name: String) {
    let id = world.order().id.clone();
    let result = world.system().wallet_checkout.capture_order(&customer(&name), &id).await;
    if let Some(order) = world.record(result) {
        world.order = Some(order);
    }
}

//--------------------------------------       Refunds       ---------------------------------------------------------
#[when(expr = "customer {word} requests a refund for the order because {string}")]
async fn request_refund(world: &mut StoreWorld, name: String, reason: String) {
    let id = world.order().id.clone();
    let result = world.system().refunds.request_refund(&customer(&name), &id, &reason).await;
    if let Some(refund) = world.record(result) {
        world.refund = Some(refund);
    }
}

async fn review(world: &mut StoreWorld, decision: RefundDecision) {
    let id = world.refund().id.clone();
    let result = world.system().refunds.review_refund(&id, decision).await;
    if let Some(refund) = world.record(result) {
        world.refund = Some(refund);
    }
}

#[when("an admin approves the refund")]
async fn approve_refund(world: &mut StoreWorld) {
    review(world, RefundDecision::new(RefundStatus::Approved)).await;
}

#[when(expr = "an admin approves the refund with transaction id {string}")]
async fn approve_refund_manually(world: &mut StoreWorld, txid: String) {
    review(world, RefundDecision::new(RefundStatus::Approved).with_transaction_id(txid)).await;
}

#[when("an admin rejects the refund")]
async fn reject_refund(world: &mut StoreWorld) {
    review(world, RefundDecision::new(RefundStatus::Rejected).with_notes("Outside the returns window")).await;
}

#[then(expr = "the refund is pending for {word}")]
async fn check_pending_refund(world: &mut StoreWorld, amount: String) {
    let refund = world.refund();
    assert_eq!(refund.status, RefundStatus::Pending);
    assert_eq!(refund.amount, cents(&amount));
}

#[then(expr = "the refund is {word}")]
async fn check_refund_status(world: &mut StoreWorld, status: String) {
    refresh_refund(world).await;
    assert_eq!(world.refund().status, status.parse::<RefundStatus>().unwrap());
}

#[then(expr = "the refund transaction id is {string}")]
async fn check_refund_txid(world: &mut StoreWorld, txid: String) {
    assert_eq!(world.refund().refund_transaction_id.as_deref(), Some(txid.as_str()));
}

#[then(expr = "the {word} gateway reversed {word}")]
async fn check_reversal(world: &mut StoreWorld, gateway: String, amount: String) {
    let reversals = match gateway.as_str() {
        "card" => world.system().card.reversals(),
        "wallet" => world.system().wallet.reversals(),
        _ => panic!("Unknown gateway {gateway}"),
    };
    assert_eq!(reversals.len(), 1, "Expected exactly one reversal");
    assert_eq!(reversals[0].amount, cents(&amount));
    assert_eq!(reversals[0].idempotency_key, world.refund().id.as_str());
    assert_eq!(Some(reversals[0].charge_ref.as_str()), world.order().payment_reference());
}

#[then("no gateway reversal was made")]
async fn check_no_reversal(world: &mut StoreWorld) {
    assert!(world.system().card.reversals().is_empty());
    assert!(world.system().wallet.reversals().is_empty());
}

#[then(expr = "customer {word} sees {int} refunds")]
async fn check_refund_count(world: &mut StoreWorld, name: String, count: usize) {
    let refunds = world.system().refunds.refunds_for(&customer(&name)).await.unwrap();
    assert_eq!(refunds.len(), count);
}

#[then(expr = "an admin sees {int} refunds")]
async fn check_admin_refund_count(world: &mut StoreWorld, count: usize) {
    let refunds = world.system().refunds.refunds_for(&admin()).await.unwrap();
    assert_eq!(refunds.len(), count);
}
