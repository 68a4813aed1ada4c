//! Scenario: the stock ledger replays to current stock and detects tampering.
//!
//! # Invariant under test
//!
//! Sum of signed quantity changes for a product, applied in order and
//! clipped at a zero floor, equals the product's current stock.
//!
//! GREEN when:
//! - A mixed history (initial, restock, clipped write-off, order traffic)
//!   verifies as consistent for every product.
//! - Editing an entry, or moving stock without an entry, is reported.
//! - Manual adjustments reject order-driven reasons and zero changes.

use rxd_ledger::ChainStatus;
use rxd_schemas::{OrderStatus, StockReason};
use rxd_service::orders::{self, NewOrder, NewOrderLine, StatusRequest};
use rxd_service::stock::{self, StockRequest};
use rxd_service::ServiceError;
use rxd_testkit::Fixture;

fn req(quantity_change: i64, reason: StockReason) -> StockRequest {
    StockRequest {
        quantity_change,
        reason,
        note: None,
    }
}

#[tokio::test]
async fn mixed_history_replays_to_current_stock() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let admin = &fx.admin.actor;
    let p = fx.product("MOX-625", 100, 1_800).await.unwrap();
    let q = fx.product("IBU-400", 5, 250).await.unwrap();

    stock::adjust_stock(store, admin, p.id, req(-30, StockReason::Adjustment))
        .await
        .unwrap();
    stock::adjust_stock(store, admin, p.id, req(50, StockReason::Restock))
        .await
        .unwrap();
    let clipped = stock::adjust_stock(store, admin, p.id, req(-200, StockReason::Adjustment))
        .await
        .unwrap();
    assert_eq!(clipped.previous_stock, 120);
    assert_eq!(clipped.new_stock, 0);
    assert_eq!(clipped.applied_change(), -120);
    stock::adjust_stock(store, admin, p.id, req(20, StockReason::Restock))
        .await
        .unwrap();

    let order = orders::place_order(
        store,
        &fx.cfg,
        &fx.distributor.actor,
        NewOrder {
            distributor_id: None,
            items: vec![
                NewOrderLine {
                    product_id: p.id,
                    quantity: 15,
                },
                NewOrderLine {
                    product_id: q.id,
                    quantity: 5,
                },
            ],
            notes: None,
        },
    )
    .await
    .unwrap();
    orders::change_order_status(
        store,
        &fx.cfg,
        admin,
        order.id,
        StatusRequest {
            status: OrderStatus::Approved,
            note: None,
        },
    )
    .await
    .unwrap();

    let reports = stock::verify_all(store).await.unwrap();
    assert_eq!(reports.len(), 2);
    for r in &reports {
        assert!(r.verification.consistent, "{r:?}");
    }

    let rp = stock::verify_product_ledger(store, admin, p.id).await.unwrap();
    assert_eq!(rp.verification.entry_count, 6);
    assert_eq!(rp.verification.replayed_stock, 5);
    assert_eq!(rp.sku, "MOX-625");

    let entries = stock::product_ledger(store, admin, p.id).await.unwrap();
    assert_eq!(
        entries.iter().map(|e| e.seq).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6]
    );
    for pair in entries.windows(2) {
        assert_eq!(pair[1].hash_prev.as_deref(), Some(pair[0].hash_self.as_str()));
        assert_eq!(pair[1].previous_stock, pair[0].new_stock);
    }
}

#[tokio::test]
async fn edited_entry_is_detected() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let admin = &fx.admin.actor;
    let p = fx.product("CLX-250", 40, 600).await.unwrap();
    stock::adjust_stock(store, admin, p.id, req(-10, StockReason::Adjustment))
        .await
        .unwrap();
    stock::adjust_stock(store, admin, p.id, req(25, StockReason::Restock))
        .await
        .unwrap();

    assert!(
        fx.store
            .tamper_ledger_entry(p.id, 2, |tx| tx.quantity_change = -1)
            .await
    );

    let report = stock::verify_product_ledger(store, admin, p.id).await.unwrap();
    assert!(!report.verification.consistent);
    assert!(
        matches!(report.verification.chain, ChainStatus::Broken { seq: 2, .. }),
        "{:?}",
        report.verification.chain
    );
}

#[tokio::test]
async fn stock_moved_outside_the_ledger_is_detected() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let p = fx.product("DOXY-100", 12, 400).await.unwrap();

    fx.store.force_stock(p.id, 99).await;

    let reports = stock::verify_all(store).await.unwrap();
    let r = &reports[0];
    assert_eq!(r.verification.chain, ChainStatus::Valid);
    assert_eq!(r.verification.replayed_stock, 12);
    assert_eq!(r.verification.current_stock, 99);
    assert!(!r.verification.consistent);
}

#[tokio::test]
async fn manual_adjustments_are_restricted() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let admin = &fx.admin.actor;
    let p = fx.product("PRED-5", 10, 75).await.unwrap();

    for reason in [
        StockReason::Initial,
        StockReason::OrderApproved,
        StockReason::OrderCancelled,
    ] {
        let err = stock::adjust_stock(store, admin, p.id, req(5, reason))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "{reason:?}: {err:?}");
    }

    let err = stock::adjust_stock(store, admin, p.id, req(0, StockReason::Adjustment))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = stock::adjust_stock(store, admin, p.id, req(-5, StockReason::Restock))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = stock::adjust_stock(store, &fx.employee.actor, p.id, req(5, StockReason::Restock))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let entries = stock::product_ledger(store, admin, p.id).await.unwrap();
    assert_eq!(entries.len(), 1, "no rejected request reached the ledger");
}
