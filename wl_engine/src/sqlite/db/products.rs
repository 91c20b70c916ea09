use chrono::Utc;
use log::*;
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use super::on_unique_violation;
use crate::{
    catalog_objects::ProductQueryFilter,
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    traits::{Page, StoreError},
};

pub async fn fetch_product(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, StoreError> {
    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_product_by_slug(slug: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, StoreError> {
    let product =
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = $1").bind(slug).fetch_optional(conn).await?;
    Ok(product)
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ProductQueryFilter) {
    let mut has_where = false;
    let mut clause = |builder: &mut QueryBuilder<'_, Sqlite>| {
        builder.push(if has_where { " AND " } else { " WHERE " });
        has_where = true;
    };
    if !query.include_inactive {
        clause(builder);
        builder.push("is_active = 1");
    }
    if let Some(category) = query.category {
        clause(builder);
        builder.push("category = ");
        builder.push_bind(category);
    }
    if let Some(featured) = query.featured {
        clause(builder);
        builder.push("featured = ");
        builder.push_bind(featured);
    }
}

/// Fetches products according to the filter, newest first.
pub async fn search_products(
    query: ProductQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Page<Product>, StoreError> {
    let pagination = query.pagination.normalised();
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_filters(&mut count, &query);
    let total = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new("SELECT * FROM products");
    push_filters(&mut builder, &query);
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(i64::from(pagination.limit));
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(Page::new(products, total, pagination))
}

pub async fn insert_product(
    id: &ProductId,
    slug: &str,
    product: NewProduct,
    conn: &mut SqliteConnection,
) -> Result<Product, StoreError> {
    let now = Utc::now();
    let product = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (
                id, slug, name, description, long_description, category, price, images, stock, ingredients,
                scent_notes, variations, is_active, featured, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(slug)
    .bind(product.name)
    .bind(product.description)
    .bind(product.long_description)
    .bind(product.category)
    .bind(product.price)
    .bind(Json(product.images))
    .bind(product.stock)
    .bind(Json(product.ingredients))
    .bind(product.scent_notes)
    .bind(Json(product.variations))
    .bind(product.featured)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| on_unique_violation(e, || StoreError::DuplicateSlug(slug.to_string())))?;
    debug!("🗃️ Product {} saved as {}", product.name, product.id);
    Ok(product)
}

pub async fn update_product(
    id: &ProductId,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, StoreError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for product {id}. Update request skipped.");
        return fetch_product(id, conn).await;
    }
    let slug = update.slug.clone();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
    builder.push_bind(Utc::now());
    macro_rules! set {
        ($field:ident) => {
            if let Some(v) = update.$field {
                builder.push(concat!(", ", stringify!($field), " = "));
                builder.push_bind(v);
            }
        };
        (json $field:ident) => {
            if let Some(v) = update.$field {
                builder.push(concat!(", ", stringify!($field), " = "));
                builder.push_bind(Json(v));
            }
        };
    }
    set!(name);
    set!(slug);
    set!(description);
    set!(long_description);
    set!(category);
    set!(price);
    set!(json images);
    set!(stock);
    set!(json ingredients);
    set!(scent_notes);
    set!(json variations);
    set!(is_active);
    set!(featured);
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let product = builder
        .build_query_as::<Product>()
        .fetch_optional(conn)
        .await
        .map_err(|e| on_unique_violation(e, || StoreError::DuplicateSlug(slug.unwrap_or_default())))?;
    Ok(product)
}

/// Takes `quantity` items out of stock, but only if there is enough stock. Returns false if there wasn't (or the
/// product does not exist).
pub async fn decrement_stock(
    id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $1, updated_at = $2 WHERE id = $3 AND stock >= $1",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn restore_stock(id: &ProductId, quantity: i64, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE products SET stock = stock + $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        warn!("🗃️ Could not return {quantity} items to stock. Product {id} no longer exists.");
    }
    Ok(())
}
