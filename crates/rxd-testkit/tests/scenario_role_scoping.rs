//! Scenario: what each role can see and do.
//!
//! GREEN when:
//! - Distributors see only their own orders; employees only orders they
//!   placed; admins everything. Out-of-scope orders read as NotFound.
//! - Distributors cannot order on behalf of someone else; employees must
//!   name an active distributor.
//! - Owners may cancel only pending orders; only admins approve.
//! - Inactive products are hidden from non-admins.
//! - Admin-only operations are Forbidden for other roles.

use rxd_schemas::{OrderStatus, Role};
use rxd_service::catalog::{self, ProductPatch, ProductQuery};
use rxd_service::orders::{self, NewOrder, NewOrderLine, OrderQuery, StatusRequest};
use rxd_service::{stock, users, ServiceError};
use rxd_testkit::Fixture;
use uuid::Uuid;

fn one_line(distributor_id: Option<Uuid>, product_id: Uuid, quantity: i64) -> NewOrder {
    NewOrder {
        distributor_id,
        items: vec![NewOrderLine {
            product_id,
            quantity,
        }],
        notes: Some("urgent".into()),
    }
}

#[tokio::test]
async fn orders_are_scoped_per_role() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let other = fx.another_distributor("carewell").await.unwrap();
    let p = fx.product("CIP-500", 100, 600).await.unwrap();

    let own = orders::place_order(store, &fx.cfg, &fx.distributor.actor, one_line(None, p.id, 1))
        .await
        .unwrap();
    let by_employee = orders::place_order(
        store,
        &fx.cfg,
        &fx.employee.actor,
        one_line(Some(other.actor.user_id), p.id, 2),
    )
    .await
    .unwrap();
    assert_eq!(by_employee.placed_by, fx.employee.actor.user_id);
    assert_eq!(by_employee.distributor_id, other.actor.user_id);
    assert_eq!(by_employee.order_number, "ORD-000002");

    let mine = orders::list_orders(store, &fx.distributor.actor, OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.iter().map(|o| o.id).collect::<Vec<_>>(), vec![own.id]);

    let theirs = orders::list_orders(store, &other.actor, OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(theirs.iter().map(|o| o.id).collect::<Vec<_>>(), vec![by_employee.id]);

    let placed = orders::list_orders(store, &fx.employee.actor, OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(placed.len(), 1);

    let all = orders::list_orders(store, &fx.admin.actor, OrderQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, by_employee.id, "newest first");

    let filtered = orders::list_orders(
        store,
        &fx.admin.actor,
        OrderQuery {
            status: None,
            distributor_id: Some(other.actor.user_id),
        },
    )
    .await
    .unwrap();
    assert_eq!(filtered.len(), 1);

    let err = orders::get_order(store, &fx.distributor.actor, by_employee.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn placement_rules_per_role() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let other = fx.another_distributor("lifeline").await.unwrap();
    let p = fx.product("ATV-10", 100, 700).await.unwrap();

    let err = orders::place_order(
        store,
        &fx.cfg,
        &fx.distributor.actor,
        one_line(Some(other.actor.user_id), p.id, 1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err:?}");

    let err = orders::place_order(store, &fx.cfg, &fx.employee.actor, one_line(None, p.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");

    // Naming a non-distributor is refused.
    let err = orders::place_order(
        store,
        &fx.cfg,
        &fx.admin.actor,
        one_line(Some(fx.employee.actor.user_id), p.id, 1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");

    // Deactivated distributors cannot receive orders.
    users::set_user_active(store, &fx.admin.actor, other.actor.user_id, false)
        .await
        .unwrap();
    let err = orders::place_order(
        store,
        &fx.cfg,
        &fx.admin.actor,
        one_line(Some(other.actor.user_id), p.id, 1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");
}

#[tokio::test]
async fn only_admins_drive_the_workflow() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let p = fx.product("LEV-500", 100, 900).await.unwrap();
    let order = orders::place_order(store, &fx.cfg, &fx.distributor.actor, one_line(None, p.id, 3))
        .await
        .unwrap();

    let approve = || StatusRequest {
        status: OrderStatus::Approved,
        note: None,
    };
    let err = orders::change_order_status(
        store,
        &fx.cfg,
        &fx.distributor.actor,
        order.id,
        approve(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err:?}");

    orders::change_order_status(store, &fx.cfg, &fx.admin.actor, order.id, approve())
        .await
        .unwrap();

    // Once approved, the owner can no longer cancel.
    let err = orders::change_order_status(
        store,
        &fx.cfg,
        &fx.distributor.actor,
        order.id,
        StatusRequest {
            status: OrderStatus::Cancelled,
            note: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)), "{err:?}");
}

#[tokio::test]
async fn catalog_visibility_and_admin_only_operations() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    let live = fx.product("VITC-500", 40, 150).await.unwrap();
    let retired = fx.product("RANI-150", 0, 200).await.unwrap();
    catalog::deactivate_product(store, &fx.admin.actor, retired.id)
        .await
        .unwrap();

    let seen = catalog::list_products(
        store,
        &fx.distributor.actor,
        ProductQuery {
            include_inactive: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(seen.iter().map(|p| p.id).collect::<Vec<_>>(), vec![live.id]);

    let admin_view = catalog::list_products(
        store,
        &fx.admin.actor,
        ProductQuery {
            include_inactive: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(admin_view.len(), 2);

    let err = catalog::get_product(store, &fx.employee.actor, retired.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(catalog::get_product(store, &fx.admin.actor, retired.id).await.is_ok());

    let search = catalog::list_products(
        store,
        &fx.employee.actor,
        ProductQuery {
            search: Some("vitc".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(search.len(), 1);

    let err = catalog::update_product(
        store,
        &fx.distributor.actor,
        live.id,
        ProductPatch {
            price_minor: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = stock::list_transactions(store, &fx.employee.actor, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = users::list_users(store, &fx.distributor.actor, Some(Role::Admin))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    let err = users::list_distributors(store, &fx.distributor.actor)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    let dists = users::list_distributors(store, &fx.employee.actor).await.unwrap();
    assert_eq!(dists.len(), 1);
}

#[tokio::test]
async fn low_stock_lists_products_at_or_below_reorder_level() {
    let fx = Fixture::new().await.unwrap();
    let store = fx.store.as_ref();
    // Default reorder level is 10.
    let low = fx.product("ZNC-20", 10, 90).await.unwrap();
    fx.product("FOL-5", 11, 40).await.unwrap();

    let listed = catalog::low_stock(store, &fx.admin.actor).await.unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![low.id]);

    let updated = catalog::update_product(
        store,
        &fx.admin.actor,
        low.id,
        ProductPatch {
            reorder_level: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.stock, 10, "patching never touches stock");
    assert!(catalog::low_stock(store, &fx.admin.actor).await.unwrap().is_empty());
}
