//! Role-specific landing summaries.

use std::collections::BTreeMap;

use rxd_schemas::{Order, OrderStatus, Role, Task, TaskStatus};
use serde::Serialize;

use crate::{Actor, OrderFilter, ProductFilter, ServiceError, Store, TaskFilter};

const RECENT: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Admin(AdminDashboard),
    Distributor(DistributorDashboard),
    Employee(EmployeeDashboard),
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub orders_by_status: BTreeMap<&'static str, usize>,
    pub delivered_revenue_minor: i64,
    pub product_count: usize,
    pub low_stock_count: usize,
    pub open_task_count: usize,
    pub users_by_role: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributorDashboard {
    pub orders_by_status: BTreeMap<&'static str, usize>,
    /// Sum over orders that were not cancelled or rejected.
    pub total_spend_minor: i64,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeDashboard {
    pub tasks_by_status: BTreeMap<&'static str, usize>,
    pub orders_placed: usize,
    pub open_tasks: Vec<Task>,
}

fn count_orders(orders: &[Order]) -> BTreeMap<&'static str, usize> {
    let mut out: BTreeMap<&'static str, usize> =
        OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for o in orders {
        *out.entry(o.status.as_str()).or_default() += 1;
    }
    out
}

fn count_tasks(tasks: &[Task]) -> BTreeMap<&'static str, usize> {
    let mut out: BTreeMap<&'static str, usize> =
        TaskStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    for t in tasks {
        *out.entry(t.status.as_str()).or_default() += 1;
    }
    out
}

fn sum_totals<'a>(orders: impl Iterator<Item = &'a Order>) -> i64 {
    orders.fold(0i64, |acc, o| acc.saturating_add(o.total_minor))
}

pub async fn dashboard(store: &dyn Store, actor: &Actor) -> Result<Dashboard, ServiceError> {
    match actor.role {
        Role::Admin => {
            let orders = store.list_orders(&OrderFilter::default()).await?;
            let products = store.list_products(&ProductFilter::default()).await?;
            let tasks = store.list_tasks(&TaskFilter::default()).await?;
            let users = store.list_users(None).await?;

            let mut users_by_role: BTreeMap<&'static str, usize> =
                Role::ALL.iter().map(|r| (r.as_str(), 0)).collect();
            for u in &users {
                *users_by_role.entry(u.role.as_str()).or_default() += 1;
            }

            Ok(Dashboard::Admin(AdminDashboard {
                orders_by_status: count_orders(&orders),
                delivered_revenue_minor: sum_totals(
                    orders.iter().filter(|o| o.status == OrderStatus::Delivered),
                ),
                product_count: products.len(),
                low_stock_count: products.iter().filter(|p| p.is_low_stock()).count(),
                open_task_count: tasks.iter().filter(|t| t.status.is_open()).count(),
                users_by_role,
            }))
        }
        Role::Distributor => {
            let filter = OrderFilter {
                distributor_id: Some(actor.user_id),
                ..Default::default()
            };
            let orders = store.list_orders(&filter).await?;
            Ok(Dashboard::Distributor(DistributorDashboard {
                orders_by_status: count_orders(&orders),
                total_spend_minor: sum_totals(orders.iter().filter(|o| {
                    !matches!(o.status, OrderStatus::Cancelled | OrderStatus::Rejected)
                })),
                recent_orders: orders.iter().take(RECENT).cloned().collect(),
            }))
        }
        Role::Employee => {
            let tasks = store
                .list_tasks(&TaskFilter {
                    assigned_to: Some(actor.user_id),
                    ..Default::default()
                })
                .await?;
            let orders = store
                .list_orders(&OrderFilter {
                    placed_by: Some(actor.user_id),
                    ..Default::default()
                })
                .await?;
            Ok(Dashboard::Employee(EmployeeDashboard {
                tasks_by_status: count_tasks(&tasks),
                orders_placed: orders.len(),
                open_tasks: tasks.into_iter().filter(|t| t.status.is_open()).collect(),
            }))
        }
    }
}
