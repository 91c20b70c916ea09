use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use serde_json::{json, Value};
use wl_engine::{
    db_types::{Category, ProductId},
    traits::{Page, Pagination},
    CatalogApi,
};

use super::{
    helpers::{admin_token, get_request, post_request, product, user_token, ALICE},
    mocks::MockStore,
};
use crate::routes::{
    health,
    AdminProductsRoute,
    CreateProductRoute,
    ListProductsRoute,
    ProductRoute,
};

#[actix_web::test]
async fn health_check() {
    let app = test::init_service(App::new().service(health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn public_product_listing_needs_no_token() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store
            .expect_search_products()
            .withf(|q| !q.include_inactive && q.category == Some(Category::Soap) && q.pagination == Pagination::new(2, 12))
            .returning(|q| Ok(Page::new(vec![product("p1", "Lavender Soap", 8.5, 10)], 13, q.pagination)));
        configure_catalog(cfg, store);
    };
    let (status, body) = get_request("", "/products?category=soap&page=2", configure).await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(page["page"], 2);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["items"][0]["slug"], "lavender-soap");
    assert_eq!(page["items"][0]["price"], 8.5);
}

#[actix_web::test]
async fn product_falls_back_to_slug() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_product().returning(|_| Ok(None));
        store
            .expect_fetch_product_by_slug()
            .withf(|slug| slug == "lavender-soap")
            .returning(|_| Ok(Some(product("p1", "Lavender Soap", 8.5, 10))));
        configure_catalog(cfg, store);
    };
    let (status, body) = get_request("", "/products/lavender-soap", configure).await;
    assert_eq!(status, StatusCode::OK);
    let product: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(product["id"], "p1");
}

#[actix_web::test]
async fn inactive_products_are_not_found() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_fetch_product().returning(|_| {
            let mut p = product("p1", "Lavender Soap", 8.5, 10);
            p.is_active = false;
            Ok(Some(p))
        });
        configure_catalog(cfg, store);
    };
    let (status, body) = get_request("", "/products/p1", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"success":false,"message":"Product p1 not found"}"#);
}

#[actix_web::test]
async fn admin_listing_requires_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/admin/products", |cfg| configure_catalog(cfg, MockStore::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"success":false,"message":"Not authorized"}"#);
}

#[actix_web::test]
async fn admin_listing_is_forbidden_to_customers() {
    let _ = env_logger::try_init().ok();
    let token = user_token(ALICE);
    let (status, body) =
        get_request(&token, "/admin/products", |cfg| configure_catalog(cfg, MockStore::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"success":false,"message":"Insufficient permissions"}"#);
}

#[actix_web::test]
async fn admin_listing_includes_inactive_products() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store
            .expect_search_products()
            .withf(|q| q.include_inactive && q.pagination.limit == 20)
            .returning(|q| Ok(Page::new(vec![], 0, q.pagination)));
        configure_catalog(cfg, store);
    };
    let (status, body) = get_request(&admin_token(), "/admin/products", configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"items":[],"page":1,"pages":0,"total":0}"#);
}

#[actix_web::test]
async fn new_products_get_a_slug() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store
            .expect_insert_product()
            .withf(|slug, p| slug == "honey-oat-bar" && p.stock == 5)
            .returning(|slug, p| {
                let mut product = product("p9", &p.name, 7.25, p.stock);
                product.slug = slug.to_string();
                Ok(product)
            });
        configure_catalog(cfg, store);
    };
    let body = json!({
        "name": "Honey & Oat Bar",
        "description": "Gentle exfoliating soap",
        "category": "soap",
        "price": 7.25,
        "stock": 5
    });
    let (status, body) = post_request(&admin_token(), "/admin/products", body, configure).await;
    assert_eq!(status, StatusCode::CREATED);
    let product: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(product["slug"], "honey-oat-bar");
    assert_eq!(product["id"], ProductId::from("p9").as_str());
}

#[actix_web::test]
async fn products_need_a_name() {
    let _ = env_logger::try_init().ok();
    let body = json!({ "name": "  ", "description": "Soap", "category": "soap", "price": 7.25, "stock": 5 });
    let (status, body) =
        post_request(&admin_token(), "/admin/products", body, |cfg| configure_catalog(cfg, MockStore::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Product name is required"}"#);
}

#[actix_web::test]
async fn product_prices_are_bounded() {
    let _ = env_logger::try_init().ok();
    let configure = |cfg: &mut ServiceConfig| {
        let mut store = MockStore::new();
        store.expect_insert_product().never();
        configure_catalog(cfg, store);
    };
    let body = json!({ "name": "Gold Soap", "description": "Soap", "category": "soap", "price": 1e15, "stock": 5 });
    let (status, body) = post_request(&admin_token(), "/admin/products", body, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"success":false,"message":"Price cannot be more than $100000.00"}"#);
}

fn configure_catalog(cfg: &mut ServiceConfig, store: MockStore) {
    cfg.service(ListProductsRoute::<MockStore>::new())
        .service(ProductRoute::<MockStore>::new())
        .service(AdminProductsRoute::<MockStore>::new())
        .service(CreateProductRoute::<MockStore>::new())
        .app_data(web::Data::new(CatalogApi::new(store)));
}
