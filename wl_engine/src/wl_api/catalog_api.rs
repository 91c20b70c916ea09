use std::fmt::Debug;

use log::*;

use crate::{
    catalog_objects::ProductQueryFilter,
    db_types::{Cents, NewProduct, Product, ProductId, ProductUpdate, ProductVariation},
    helpers::slugify,
    traits::{CatalogManagement, Page, StoreError},
};

/// The most a single product, or a variation's price modifier, may cost: 100,000.00.
pub const MAX_PRICE: i64 = 100_000_00;
/// Keeps line totals and order totals far away from the limits of `Cents`.
pub const MAX_STOCK: i64 = 1_000_000;

/// `CatalogApi` serves the product catalog to the storefront and lets admins maintain it.
///
/// Products are never deleted. Deactivating a product hides it from the storefront, but keeps it around for the orders
/// that refer to it.
pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    /// Lists products, newest first. Inactive products are only included if the filter asks for them.
    pub async fn list_products(&self, filter: ProductQueryFilter) -> Result<Page<Product>, StoreError> {
        self.db.search_products(filter).await
    }

    /// Looks a product up by id, falling back to its slug. Inactive products are reported as not found.
    pub async fn product_by_id_or_slug(&self, key: &str) -> Result<Product, StoreError> {
        let id = ProductId::from(key);
        let product = match self.db.fetch_product(&id).await? {
            Some(p) => Some(p),
            None => self.db.fetch_product_by_slug(key).await?,
        };
        product.filter(|p| p.is_active).ok_or(StoreError::ProductNotFound(id))
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        validate_text("name", &product.name)?;
        validate_text("description", &product.description)?;
        validate_price(product.price)?;
        validate_stock(product.stock)?;
        validate_variations(&product.variations)?;
        let slug = slug_for(&product.name)?;
        let product = self.db.insert_product(&slug, product).await?;
        info!("🛍️ New product {} ({}) added to the catalog", product.name, product.slug);
        Ok(product)
    }

    /// Applies a partial update. Renaming a product gives it a new slug.
    pub async fn update_product(&self, id: &ProductId, mut update: ProductUpdate) -> Result<Product, StoreError> {
        if let Some(name) = &update.name {
            validate_text("name", name)?;
            update.slug = Some(slug_for(name)?);
        }
        if let Some(description) = &update.description {
            validate_text("description", description)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        if let Some(stock) = update.stock {
            validate_stock(stock)?;
        }
        if let Some(variations) = &update.variations {
            validate_variations(variations)?;
        }
        let product = self.db.update_product(id, update).await?.ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;
        debug!("🛍️ Product {id} updated");
        Ok(product)
    }

    pub async fn deactivate_product(&self, id: &ProductId) -> Result<Product, StoreError> {
        let product = self
            .db
            .update_product(id, ProductUpdate::deactivate())
            .await?
            .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;
        info!("🛍️ Product {} ({id}) has been deactivated", product.name);
        Ok(product)
    }
}

fn validate_text(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::ValidationError(format!("Product {field} is required")));
    }
    Ok(())
}

fn validate_price(price: Cents) -> Result<(), StoreError> {
    if price.value() < 0 {
        return Err(StoreError::ValidationError("Price cannot be negative".to_string()));
    }
    if price.value() > MAX_PRICE {
        return Err(StoreError::ValidationError(format!("Price cannot be more than {}", Cents::from(MAX_PRICE))));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> Result<(), StoreError> {
    if stock < 0 {
        return Err(StoreError::ValidationError("Stock cannot be negative".to_string()));
    }
    if stock > MAX_STOCK {
        return Err(StoreError::ValidationError(format!("Stock cannot be more than {MAX_STOCK}")));
    }
    Ok(())
}

fn validate_variations(variations: &[ProductVariation]) -> Result<(), StoreError> {
    let out_of_range = variations
        .iter()
        .flat_map(|v| v.options.iter().map(move |o| (v, o)))
        .find(|(_, o)| o.price_modifier.value().unsigned_abs() > MAX_PRICE as u64);
    if let Some((v, o)) = out_of_range {
        return Err(StoreError::ValidationError(format!(
            "The price modifier for {} '{}' cannot be more than {}",
            v.name,
            o.value,
            Cents::from(MAX_PRICE)
        )));
    }
    Ok(())
}

fn slug_for(name: &str) -> Result<String, StoreError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(StoreError::ValidationError(format!("'{name}' cannot be turned into a product URL")));
    }
    Ok(slug)
}
