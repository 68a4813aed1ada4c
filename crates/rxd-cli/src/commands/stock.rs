//! `rxd stock verify`.

use anyhow::Result;
use rxd_ledger::ChainStatus;
use rxd_service::stock::{self, ProductLedgerReport};
use uuid::Uuid;

use super::store_from_env;

/// Print one line per product; returns false when any ledger is inconsistent.
pub async fn verify(product_id: Option<Uuid>) -> Result<bool> {
    let store = store_from_env().await?;
    let reports = match product_id {
        Some(id) => vec![stock::verify_product(store.as_ref(), id).await?],
        None => stock::verify_all(store.as_ref()).await?,
    };

    let mut all_ok = true;
    for r in &reports {
        println!("{}", describe(r));
        all_ok &= r.verification.consistent;
    }
    println!("products={} consistent={}", reports.len(), all_ok);
    Ok(all_ok)
}

fn describe(r: &ProductLedgerReport) -> String {
    let v = &r.verification;
    let chain = match &v.chain {
        ChainStatus::Valid => "valid".to_string(),
        ChainStatus::Broken { seq, reason } => format!("broken@{seq}({reason})"),
    };
    format!(
        "product_id={} sku={} entries={} replayed={} current={} chain={} consistent={}",
        r.product_id, r.sku, v.entry_count, v.replayed_stock, v.current_stock, chain, v.consistent
    )
}
