//! Product catalog. Descriptive fields are edited here; stock only moves
//! through the ledger (see [`crate::stock`]).

use chrono::NaiveDate;
use rxd_config::AppConfig;
use rxd_schemas::{Product, StockAdjustment, StockReason};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{clean_opt, now, require_text, Actor, ProductFilter, ServiceError, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    pub category: String,
    pub unit: String,
    pub price_minor: i64,
    /// Opening stock, posted as an `initial` ledger entry.
    #[serde(default)]
    pub initial_stock: i64,
    /// Defaults to `stock.default_reorder_level`.
    #[serde(default)]
    pub reorder_level: Option<i64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price_minor: Option<i64>,
    pub reorder_level: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    /// Honoured for admins only.
    pub include_inactive: bool,
}

fn check_price(price_minor: i64) -> Result<(), ServiceError> {
    if price_minor <= 0 {
        return Err(ServiceError::Validation("price_minor must be > 0".into()));
    }
    Ok(())
}

fn check_reorder_level(level: i64) -> Result<(), ServiceError> {
    if level < 0 {
        return Err(ServiceError::Validation("reorder_level must be >= 0".into()));
    }
    Ok(())
}

pub async fn create_product(
    store: &dyn Store,
    cfg: &AppConfig,
    actor: &Actor,
    new: NewProduct,
) -> Result<Product, ServiceError> {
    actor.require_admin()?;
    check_price(new.price_minor)?;
    if new.initial_stock < 0 {
        return Err(ServiceError::Validation("initial_stock must be >= 0".into()));
    }
    let reorder_level = new.reorder_level.unwrap_or(cfg.stock.default_reorder_level);
    check_reorder_level(reorder_level)?;

    let at = now();
    let mut product = Product {
        id: Uuid::new_v4(),
        sku: require_text("sku", &new.sku)?.to_uppercase(),
        name: require_text("name", &new.name)?,
        generic_name: clean_opt(new.generic_name),
        manufacturer: clean_opt(new.manufacturer),
        category: require_text("category", &new.category)?,
        unit: require_text("unit", &new.unit)?,
        price_minor: new.price_minor,
        stock: 0,
        reorder_level,
        expiry_date: new.expiry_date,
        active: true,
        created_at: at,
        updated_at: at,
    };
    store.insert_product(&product).await?;

    if new.initial_stock > 0 {
        let adj = StockAdjustment {
            product_id: product.id,
            quantity_change: new.initial_stock,
            reason: StockReason::Initial,
            order_id: None,
            actor_id: actor.user_id,
            note: None,
        };
        let tx = store.adjust_stock(&adj, Uuid::new_v4(), at).await?;
        product.stock = tx.new_stock;
    }

    info!(product_id = %product.id, sku = %product.sku, stock = product.stock, "product created");
    Ok(product)
}

/// Non-admins only ever see active products.
pub async fn list_products(
    store: &dyn Store,
    actor: &Actor,
    query: ProductQuery,
) -> Result<Vec<Product>, ServiceError> {
    let filter = ProductFilter {
        search: clean_opt(query.search),
        category: clean_opt(query.category),
        include_inactive: actor.is_admin() && query.include_inactive,
        low_stock_only: false,
    };
    Ok(store.list_products(&filter).await?)
}

pub async fn get_product(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
) -> Result<Product, ServiceError> {
    match store.fetch_product(id).await? {
        Some(p) if p.active || actor.is_admin() => Ok(p),
        _ => Err(ServiceError::not_found("product", id)),
    }
}

pub async fn update_product(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    patch: ProductPatch,
) -> Result<Product, ServiceError> {
    actor.require_admin()?;
    let mut p = store
        .fetch_product(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product", id))?;

    if let Some(name) = patch.name {
        p.name = require_text("name", &name)?;
    }
    if patch.generic_name.is_some() {
        p.generic_name = clean_opt(patch.generic_name);
    }
    if patch.manufacturer.is_some() {
        p.manufacturer = clean_opt(patch.manufacturer);
    }
    if let Some(category) = patch.category {
        p.category = require_text("category", &category)?;
    }
    if let Some(unit) = patch.unit {
        p.unit = require_text("unit", &unit)?;
    }
    if let Some(price) = patch.price_minor {
        check_price(price)?;
        p.price_minor = price;
    }
    if let Some(level) = patch.reorder_level {
        check_reorder_level(level)?;
        p.reorder_level = level;
    }
    if patch.expiry_date.is_some() {
        p.expiry_date = patch.expiry_date;
    }
    if let Some(active) = patch.active {
        p.active = active;
    }
    p.updated_at = now();

    store.update_product(&p).await?;
    info!(product_id = %p.id, "product updated");
    Ok(p)
}

/// Soft delete: the product disappears for non-admins, its ledger stays.
pub async fn deactivate_product(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
) -> Result<Product, ServiceError> {
    update_product(
        store,
        actor,
        id,
        ProductPatch {
            active: Some(false),
            ..Default::default()
        },
    )
    .await
}

/// Active products at or below their reorder level.
pub async fn low_stock(store: &dyn Store, actor: &Actor) -> Result<Vec<Product>, ServiceError> {
    actor.require_admin()?;
    let filter = ProductFilter {
        low_stock_only: true,
        ..Default::default()
    };
    Ok(store.list_products(&filter).await?)
}
