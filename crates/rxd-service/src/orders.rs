//! Order placement and the status workflow.
//!
//! Approval deducts each line through the stock ledger and cancelling an
//! approved order puts back exactly what was deducted. The status change is
//! committed first (compare-and-set); the per-line stock writes that follow
//! are best effort: a failed line is logged and skipped, never rolled back.
//! The amount restored on cancel is read back from the ledger entries tagged
//! with the order, so it holds even if the per-line record was never saved.

use std::collections::{HashMap, HashSet};

use rxd_config::AppConfig;
use rxd_ledger::{check_order_transition, deducts_stock, line_total, order_total, restores_stock};
use rxd_schemas::{
    Order, OrderItem, OrderStatus, Role, StatusChange, StockAdjustment, StockReason,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{clean_opt, now, Actor, OrderFilter, ServiceError, StockTxFilter, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// Required for admins and employees; distributors order for themselves.
    #[serde(default)]
    pub distributor_id: Option<Uuid>,
    pub items: Vec<NewOrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// Admin only; ignored for other roles.
    pub distributor_id: Option<Uuid>,
}

pub fn format_order_number(prefix: &str, seq: i64) -> String {
    format!("{prefix}-{seq:06}")
}

fn visible_to(actor: &Actor, order: &Order) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Distributor => order.distributor_id == actor.user_id,
        Role::Employee => order.placed_by == actor.user_id,
    }
}

async fn resolve_distributor(
    store: &dyn Store,
    actor: &Actor,
    requested: Option<Uuid>,
) -> Result<Uuid, ServiceError> {
    if actor.role == Role::Distributor {
        return match requested {
            Some(d) if d != actor.user_id => Err(ServiceError::forbidden(
                "distributors may only order for themselves",
            )),
            _ => Ok(actor.user_id),
        };
    }
    let id = requested
        .ok_or_else(|| ServiceError::Validation("distributor_id is required".into()))?;
    match store.fetch_user(id).await? {
        Some(u) if u.role == Role::Distributor && u.active => Ok(id),
        _ => Err(ServiceError::Validation(format!(
            "{id} is not an active distributor"
        ))),
    }
}

pub async fn place_order(
    store: &dyn Store,
    cfg: &AppConfig,
    actor: &Actor,
    new: NewOrder,
) -> Result<Order, ServiceError> {
    let distributor_id = resolve_distributor(store, actor, new.distributor_id).await?;

    if new.items.is_empty() {
        return Err(ServiceError::Validation("an order needs at least one item".into()));
    }
    if new.items.len() > cfg.orders.max_items {
        return Err(ServiceError::Validation(format!(
            "an order may have at most {} items",
            cfg.orders.max_items
        )));
    }

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(new.items.len());
    for line in &new.items {
        if line.quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "quantity for {} must be > 0",
                line.product_id
            )));
        }
        if !seen.insert(line.product_id) {
            return Err(ServiceError::Validation(format!(
                "product {} appears more than once",
                line.product_id
            )));
        }
        let product = match store.fetch_product(line.product_id).await? {
            Some(p) if p.active => p,
            _ => {
                return Err(ServiceError::Validation(format!(
                    "product {} is not available",
                    line.product_id
                )))
            }
        };
        if line.quantity > product.stock {
            return Err(ServiceError::InsufficientStock {
                product_id: product.id,
                sku: product.sku,
                requested: line.quantity,
                available: product.stock,
            });
        }
        items.push(OrderItem {
            product_id: product.id,
            sku: product.sku,
            product_name: product.name,
            quantity: line.quantity,
            unit_price_minor: product.price_minor,
            line_total_minor: line_total(line.quantity, product.price_minor)?,
            deducted: 0,
        });
    }
    let total_minor = order_total(&items)?;

    let seq = store.next_order_number().await?;
    let at = now();
    let order = Order {
        id: Uuid::new_v4(),
        order_number: format_order_number(&cfg.orders.number_prefix, seq),
        distributor_id,
        placed_by: actor.user_id,
        items,
        total_minor,
        status: OrderStatus::Pending,
        notes: clean_opt(new.notes),
        history: Vec::new(),
        created_at: at,
        updated_at: at,
    };
    store.insert_order(&order).await?;

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        distributor_id = %distributor_id,
        total_minor,
        "order placed"
    );
    Ok(order)
}

/// Admin: every order. Distributor: orders for them. Employee: orders they
/// placed.
pub async fn list_orders(
    store: &dyn Store,
    actor: &Actor,
    query: OrderQuery,
) -> Result<Vec<Order>, ServiceError> {
    let mut filter = OrderFilter {
        status: query.status,
        ..Default::default()
    };
    match actor.role {
        Role::Admin => filter.distributor_id = query.distributor_id,
        Role::Distributor => filter.distributor_id = Some(actor.user_id),
        Role::Employee => filter.placed_by = Some(actor.user_id),
    }
    Ok(store.list_orders(&filter).await?)
}

/// Orders outside the caller's scope are reported as missing.
pub async fn get_order(store: &dyn Store, actor: &Actor, id: Uuid) -> Result<Order, ServiceError> {
    match store.fetch_order(id).await? {
        Some(o) if visible_to(actor, &o) => Ok(o),
        _ => Err(ServiceError::not_found("order", id)),
    }
}

pub async fn change_order_status(
    store: &dyn Store,
    cfg: &AppConfig,
    actor: &Actor,
    id: Uuid,
    req: StatusRequest,
) -> Result<Order, ServiceError> {
    let order = get_order(store, actor, id).await?;
    let from = order.status;
    let to = req.status;

    if !actor.is_admin() && !(from == OrderStatus::Pending && to == OrderStatus::Cancelled) {
        return Err(ServiceError::forbidden(
            "only pending orders may be cancelled by their owner",
        ));
    }
    check_order_transition(from, to)?;

    if deducts_stock(to) && !cfg.stock.allow_approval_shortfall {
        ensure_available(store, &order.items).await?;
    }

    let change = StatusChange {
        from,
        to,
        actor_id: actor.user_id,
        note: clean_opt(req.note),
        at: now(),
    };
    let mut updated = store.transition_order(id, &change).await?;
    info!(
        order_id = %id,
        from = from.as_str(),
        to = to.as_str(),
        actor_id = %actor.user_id,
        "order status changed"
    );

    if deducts_stock(to) {
        deduct_lines(store, actor, &mut updated).await?;
    } else if restores_stock(from, to) {
        restore_lines(store, actor, &mut updated).await?;
    }
    Ok(updated)
}

async fn ensure_available(store: &dyn Store, items: &[OrderItem]) -> Result<(), ServiceError> {
    for item in items {
        let available = store
            .fetch_product(item.product_id)
            .await?
            .map_or(0, |p| p.stock);
        if item.quantity > available {
            return Err(ServiceError::InsufficientStock {
                product_id: item.product_id,
                sku: item.sku.clone(),
                requested: item.quantity,
                available,
            });
        }
    }
    Ok(())
}

async fn deduct_lines(
    store: &dyn Store,
    actor: &Actor,
    order: &mut Order,
) -> Result<(), ServiceError> {
    for item in order.items.iter_mut() {
        let adj = StockAdjustment {
            product_id: item.product_id,
            quantity_change: -item.quantity,
            reason: StockReason::OrderApproved,
            order_id: Some(order.id),
            actor_id: actor.user_id,
            note: Some(order.order_number.clone()),
        };
        match store.adjust_stock(&adj, Uuid::new_v4(), now()).await {
            Ok(tx) => {
                item.deducted = -tx.applied_change();
                if item.deducted < item.quantity {
                    warn!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        requested = item.quantity,
                        deducted = item.deducted,
                        "deduction clipped at zero stock"
                    );
                }
            }
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %e,
                    "stock deduction failed; line left undeducted"
                );
                item.deducted = 0;
            }
        }
    }
    persist_deductions(store, order).await
}

async fn restore_lines(
    store: &dyn Store,
    actor: &Actor,
    order: &mut Order,
) -> Result<(), ServiceError> {
    let held = match held_by_order(store, order.id).await {
        Ok(held) => Some(held),
        Err(e) => {
            warn!(
                order_id = %order.id,
                error = %e,
                "ledger read failed; restoring recorded deductions"
            );
            None
        }
    };
    for item in order.items.iter_mut() {
        let amount = held
            .as_ref()
            .map_or(item.deducted, |h| h.get(&item.product_id).copied().unwrap_or(0));
        if amount <= 0 {
            item.deducted = 0;
            continue;
        }
        let adj = StockAdjustment {
            product_id: item.product_id,
            quantity_change: amount,
            reason: StockReason::OrderCancelled,
            order_id: Some(order.id),
            actor_id: actor.user_id,
            note: Some(order.order_number.clone()),
        };
        match store.adjust_stock(&adj, Uuid::new_v4(), now()).await {
            Ok(_) => item.deducted = 0,
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    outstanding = amount,
                    error = %e,
                    "stock restore failed"
                );
                item.deducted = amount;
            }
        }
    }
    persist_deductions(store, order).await
}

/// Net quantity each product still has out on `order_id`: approval entries
/// minus cancellation entries, by the change that actually landed.
async fn held_by_order(
    store: &dyn Store,
    order_id: Uuid,
) -> Result<HashMap<Uuid, i64>, ServiceError> {
    let filter = StockTxFilter {
        product_id: None,
        order_id: Some(order_id),
    };
    let mut held = HashMap::new();
    for tx in store.list_stock_transactions(&filter).await? {
        if matches!(tx.reason, StockReason::OrderApproved | StockReason::OrderCancelled) {
            *held.entry(tx.product_id).or_insert(0) -= tx.applied_change();
        }
    }
    Ok(held)
}

async fn persist_deductions(store: &dyn Store, order: &Order) -> Result<(), ServiceError> {
    if let Err(e) = store.record_deductions(order.id, &order.items).await {
        error!(order_id = %order.id, error = %e, "failed to record per-line deductions");
        return Err(e.into());
    }
    Ok(())
}
