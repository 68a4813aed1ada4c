//! Manual stock movements and ledger inspection.

use rxd_ledger::{validate_adjustment, verify, LedgerVerification};
use rxd_schemas::{StockAdjustment, StockReason, StockTransaction};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{clean_opt, now, Actor, ProductFilter, ServiceError, StockTxFilter, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct StockRequest {
    pub quantity_change: i64,
    pub reason: StockReason,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductLedgerReport {
    pub product_id: Uuid,
    pub sku: String,
    #[serde(flatten)]
    pub verification: LedgerVerification,
}

/// Post a `restock` or `adjustment` entry. Order-driven reasons are reserved
/// for the order workflow.
pub async fn adjust_stock(
    store: &dyn Store,
    actor: &Actor,
    product_id: Uuid,
    req: StockRequest,
) -> Result<StockTransaction, ServiceError> {
    actor.require_admin()?;
    if !matches!(req.reason, StockReason::Restock | StockReason::Adjustment) {
        return Err(ServiceError::Validation(format!(
            "reason '{}' cannot be posted manually",
            req.reason.as_str()
        )));
    }
    if store.fetch_product(product_id).await?.is_none() {
        return Err(ServiceError::not_found("product", product_id));
    }

    let adj = StockAdjustment {
        product_id,
        quantity_change: req.quantity_change,
        reason: req.reason,
        order_id: None,
        actor_id: actor.user_id,
        note: clean_opt(req.note),
    };
    validate_adjustment(&adj)?;

    let tx = store.adjust_stock(&adj, Uuid::new_v4(), now()).await?;
    if tx.applied_change() != tx.quantity_change {
        warn!(
            product_id = %product_id,
            requested = tx.quantity_change,
            applied = tx.applied_change(),
            "stock adjustment clipped at zero"
        );
    }
    info!(
        product_id = %product_id,
        seq = tx.seq,
        new_stock = tx.new_stock,
        reason = tx.reason.as_str(),
        "stock adjusted"
    );
    Ok(tx)
}

pub async fn list_transactions(
    store: &dyn Store,
    actor: &Actor,
    filter: StockTxFilter,
) -> Result<Vec<StockTransaction>, ServiceError> {
    actor.require_admin()?;
    Ok(store.list_stock_transactions(&filter).await?)
}

/// One product's ledger in `seq` order.
pub async fn product_ledger(
    store: &dyn Store,
    actor: &Actor,
    product_id: Uuid,
) -> Result<Vec<StockTransaction>, ServiceError> {
    actor.require_admin()?;
    if store.fetch_product(product_id).await?.is_none() {
        return Err(ServiceError::not_found("product", product_id));
    }
    let filter = StockTxFilter {
        product_id: Some(product_id),
        order_id: None,
    };
    Ok(store.list_stock_transactions(&filter).await?)
}

pub async fn verify_product_ledger(
    store: &dyn Store,
    actor: &Actor,
    product_id: Uuid,
) -> Result<ProductLedgerReport, ServiceError> {
    actor.require_admin()?;
    verify_product(store, product_id).await
}

/// Verify one product's ledger. Operator tooling; no actor.
pub async fn verify_product(
    store: &dyn Store,
    product_id: Uuid,
) -> Result<ProductLedgerReport, ServiceError> {
    let product = store
        .fetch_product(product_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product", product_id))?;
    let filter = StockTxFilter {
        product_id: Some(product_id),
        order_id: None,
    };
    let entries = store.list_stock_transactions(&filter).await?;
    let verification = verify(&entries, product.stock);
    if !verification.consistent {
        warn!(
            product_id = %product_id,
            replayed = verification.replayed_stock,
            current = verification.current_stock,
            chain = ?verification.chain,
            "stock ledger inconsistent"
        );
    }
    Ok(ProductLedgerReport {
        product_id,
        sku: product.sku,
        verification,
    })
}

/// Verify every product, active or not. Operator tooling; no actor.
pub async fn verify_all(store: &dyn Store) -> Result<Vec<ProductLedgerReport>, ServiceError> {
    let filter = ProductFilter {
        include_inactive: true,
        ..Default::default()
    };
    let products = store.list_products(&filter).await?;
    let mut out = Vec::with_capacity(products.len());
    for p in products {
        out.push(verify_product(store, p.id).await?);
    }
    Ok(out)
}
