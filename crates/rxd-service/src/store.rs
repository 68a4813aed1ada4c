//! Persistence seam.
//!
//! `rxd-db` implements [`Store`] over Postgres; `rxd-testkit` implements it in
//! memory. Both must agree on the contract documented per method; the
//! filter `matches` helpers below are the reference semantics for listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rxd_ledger::LedgerError;
use rxd_schemas::{
    Order, OrderItem, OrderStatus, Product, Role, StatusChange, StockAdjustment,
    StockTransaction, Task, TaskStatus, User,
};
use uuid::Uuid;

#[derive(Debug)]
pub enum StoreError {
    NotFound { entity: &'static str, id: Uuid },
    /// A unique key (email, sku) is already taken.
    Duplicate { what: String },
    /// Compare-and-set on an order status lost the race.
    StaleStatus {
        expected: &'static str,
        found: &'static str,
    },
    /// The ledger refused the adjustment.
    Ledger(LedgerError),
    Backend(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} {id} not found"),
            Self::Duplicate { what } => write!(f, "duplicate {what}"),
            Self::StaleStatus { expected, found } => {
                write!(f, "stale status: expected {expected}, found {found}")
            }
            Self::Ledger(e) => write!(f, "{e}"),
            Self::Backend(e) => write!(f, "store backend: {e:#}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<LedgerError> for StoreError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of name, sku or generic name.
    pub search: Option<String>,
    /// Exact category, case-insensitive.
    pub category: Option<String>,
    pub include_inactive: bool,
    /// Only products with `stock <= reorder_level`.
    pub low_stock_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, p: &Product) -> bool {
        if !self.include_inactive && !p.active {
            return false;
        }
        if self.low_stock_only && !p.is_low_stock() {
            return false;
        }
        if let Some(cat) = &self.category {
            if !p.category.eq_ignore_ascii_case(cat) {
                return false;
            }
        }
        if let Some(q) = &self.search {
            let q = q.to_lowercase();
            let hit = p.name.to_lowercase().contains(&q)
                || p.sku.to_lowercase().contains(&q)
                || p
                    .generic_name
                    .as_deref()
                    .is_some_and(|g| g.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub distributor_id: Option<Uuid>,
    pub placed_by: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, o: &Order) -> bool {
        self.distributor_id.map_or(true, |d| o.distributor_id == d)
            && self.placed_by.map_or(true, |u| o.placed_by == u)
            && self.status.map_or(true, |s| o.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_to: Option<Uuid>,
    pub distributor_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn matches(&self, t: &Task) -> bool {
        self.assigned_to.map_or(true, |u| t.assigned_to == u)
            && self
                .distributor_id
                .map_or(true, |d| t.distributor_id == Some(d))
            && self.status.map_or(true, |s| t.status == s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StockTxFilter {
    pub product_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

impl StockTxFilter {
    pub fn matches(&self, tx: &StockTransaction) -> bool {
        self.product_id.map_or(true, |p| tx.product_id == p)
            && self.order_id.map_or(true, |o| tx.order_id == Some(o))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---

    /// Insert a user with the hash of their bearer token.
    /// `Duplicate` if the email is taken.
    async fn insert_user(&self, user: &User, token_hash: &str) -> Result<(), StoreError>;

    async fn fetch_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn fetch_user_by_token_hash(&self, token_hash: &str)
        -> Result<Option<User>, StoreError>;

    /// Users ordered by creation time, optionally of one role.
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError>;

    /// Overwrite every mutable column. `NotFound` / `Duplicate` (email).
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn set_token_hash(&self, user_id: Uuid, token_hash: &str) -> Result<(), StoreError>;

    // --- catalog ---

    /// `Duplicate` if the sku is taken. Callers insert with `stock = 0` and
    /// post opening stock through [`Store::adjust_stock`].
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn fetch_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Products matching `filter`, ordered by name.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    /// Overwrite descriptive columns. Never touches `stock`.
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;

    // --- stock ledger ---

    /// Atomically, per product: read current stock and ledger head, build
    /// the entry with `rxd_ledger::post_adjustment`, append it and write the
    /// new stock. Returns the appended entry.
    async fn adjust_stock(
        &self,
        adj: &StockAdjustment,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<StockTransaction, StoreError>;

    /// Entries matching `filter`, ascending `seq` within each product.
    async fn list_stock_transactions(
        &self,
        filter: &StockTxFilter,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    // --- orders ---

    /// Next value of the order number sequence (1, 2, 3, …).
    async fn next_order_number(&self) -> Result<i64, StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Orders matching `filter`, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Move the order from `change.from` to `change.to` only if its status is
    /// still `change.from`; append `change` to its history. `StaleStatus` if
    /// another writer got there first.
    async fn transition_order(&self, id: Uuid, change: &StatusChange)
        -> Result<Order, StoreError>;

    /// Replace the order's lines (used to record per-line `deducted`).
    async fn record_deductions(&self, id: Uuid, items: &[OrderItem]) -> Result<(), StoreError>;

    // --- tasks ---

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn fetch_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Tasks matching `filter`, newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    /// `false` if there was no such task.
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str, sku: &str, stock: i64, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: sku.into(),
            name: name.into(),
            generic_name: Some("Paracetamol".into()),
            manufacturer: None,
            category: "Analgesics".into(),
            unit: "strip".into(),
            price_minor: 1200,
            stock,
            reorder_level: 10,
            expiry_date: None,
            active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn product_filter_hides_inactive_by_default() {
        let p = product("Calpol 500", "CAL-500", 50, false);
        assert!(!ProductFilter::default().matches(&p));
        let f = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        assert!(f.matches(&p));
    }

    #[test]
    fn product_search_covers_name_sku_and_generic() {
        let p = product("Calpol 500", "CAL-500", 50, true);
        for q in ["calpol", "cal-5", "PARACET"] {
            let f = ProductFilter {
                search: Some(q.into()),
                ..Default::default()
            };
            assert!(f.matches(&p), "query {q} should match");
        }
        let f = ProductFilter {
            search: Some("ibuprofen".into()),
            ..Default::default()
        };
        assert!(!f.matches(&p));
    }

    #[test]
    fn low_stock_filter_uses_reorder_level() {
        let f = ProductFilter {
            low_stock_only: true,
            ..Default::default()
        };
        assert!(f.matches(&product("A", "A", 10, true)));
        assert!(!f.matches(&product("B", "B", 11, true)));
    }
}
