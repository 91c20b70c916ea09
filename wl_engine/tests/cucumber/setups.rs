use cucumber::given;
use wl_engine::db_types::{Cents, Category, NewProduct};

use crate::cucumber::{store_world::StoreSystem, StoreWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StoreWorld) {
    let system = StoreSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a {word} {string} priced at {word} with {int} in stock")]
async fn add_product(world: &mut StoreWorld, category: String, name: String, price: String, stock: i64) {
    let category = category.parse::<Category>().expect("Not a category");
    let price = price.parse::<Cents>().expect("Not a price");
    let product = NewProduct::new(name.clone(), category, price, stock);
    let product = world.system().catalog.create_product(product).await.expect("Error creating product");
    world.products.insert(name, product.id);
}

#[given("the card gateway refuses reversals")]
async fn card_refuses_reversals(world: &mut StoreWorld) {
    world.system().card.refuse_reversals();
}

#[given("the wallet gateway is down")]
async fn wallet_is_down(world: &mut StoreWorld) {
    world.system().wallet.go_down();
}
