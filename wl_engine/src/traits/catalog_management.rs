use crate::{
    catalog_objects::ProductQueryFilter,
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    traits::{Page, StoreError},
};

/// The `CatalogManagement` trait defines the behaviour for reading and maintaining the product catalog.
///
/// Stock is only ever *decremented* as part of the atomic order operations in
/// [`OrderManagement`](crate::traits::OrderManagement). Admins set absolute stock levels through
/// [`update_product`](Self::update_product).
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    async fn fetch_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError>;

    /// Fetches products matching the filter, newest first.
    async fn search_products(&self, query: ProductQueryFilter) -> Result<Page<Product>, StoreError>;

    /// Stores a new product under the given slug. The slug must be unique, otherwise
    /// [`StoreError::DuplicateSlug`] is returned.
    async fn insert_product(&self, slug: &str, product: NewProduct) -> Result<Product, StoreError>;

    /// Applies a partial update. Returns `None` if the product does not exist.
    async fn update_product(&self, id: &ProductId, update: ProductUpdate) -> Result<Option<Product>, StoreError>;
}
