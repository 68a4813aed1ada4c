//! Scenario: two writers race on the same order status.
//!
//! # Invariants under test
//!
//! - `transition_order` is a compare-and-set: a change whose `from` no
//!   longer matches the stored status fails with `StaleStatus` and leaves
//!   the order, its history and stock untouched.
//! - The service maps that failure to `Conflict` (code `conflict`).

use chrono::Utc;
use rxd_schemas::{OrderStatus, StatusChange};
use rxd_service::orders::{self, NewOrder, NewOrderLine, StatusRequest};
use rxd_service::{ServiceError, Store, StoreError};
use rxd_testkit::Fixture;

#[tokio::test]
async fn stale_from_status_is_rejected_and_maps_to_conflict() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let p = fx.product("RAN-150", 40, 250).await.unwrap();

    let order = orders::place_order(
        store,
        &fx.cfg,
        &fx.distributor.actor,
        NewOrder {
            distributor_id: None,
            items: vec![NewOrderLine {
                product_id: p.id,
                quantity: 10,
            }],
            notes: None,
        },
    )
    .await
    .unwrap();

    // Both writers read the order while it is pending.
    let seen = store.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(seen.status, OrderStatus::Pending);

    // The first one wins and approves.
    orders::change_order_status(
        store,
        &fx.cfg,
        &fx.admin.actor,
        order.id,
        StatusRequest {
            status: OrderStatus::Approved,
            note: None,
        },
    )
    .await
    .unwrap();

    // The second still believes it is pending and tries to cancel.
    let late = StatusChange {
        from: seen.status,
        to: OrderStatus::Cancelled,
        actor_id: fx.distributor.actor.user_id,
        note: None,
        at: Utc::now(),
    };
    let err = store.transition_order(order.id, &late).await.unwrap_err();
    match &err {
        StoreError::StaleStatus { expected, found } => {
            assert_eq!(*expected, "pending");
            assert_eq!(*found, "approved");
        }
        other => panic!("expected StaleStatus, got {other:?}"),
    }

    let mapped = ServiceError::from(err);
    assert!(matches!(mapped, ServiceError::Conflict(_)), "{mapped:?}");
    assert_eq!(mapped.code(), "conflict");

    let after = store.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(after.status, OrderStatus::Approved);
    assert_eq!(after.history.len(), 1);
    assert_eq!(store.fetch_product(p.id).await.unwrap().unwrap().stock, 30);
}
