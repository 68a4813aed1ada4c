//! Deterministic in-memory [`Store`].
//!
//! One `tokio::sync::Mutex` guards all state, so every method is atomic the
//! same way a Postgres transaction is. No network, no clock reads: ledger
//! entries are built with the ids and timestamps the caller passes in.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rxd_ledger::{post_adjustment, LedgerHead};
use rxd_schemas::{
    Order, OrderItem, Product, Role, StatusChange, StockAdjustment, StockTransaction, Task, User,
};
use rxd_service::{OrderFilter, ProductFilter, StockTxFilter, Store, StoreError, TaskFilter};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<User>,
    token_hashes: HashMap<Uuid, String>,
    products: Vec<Product>,
    ledger: Vec<StockTransaction>,
    orders: Vec<Order>,
    tasks: Vec<Task>,
    order_seq: i64,
    /// Products whose stock writes fail (fault injection).
    failing_products: HashSet<Uuid>,
    fail_deduction_records: bool,
}

#[derive(Default)]
pub struct MemStore {
    state: Mutex<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `adjust_stock` for `product_id` fail with a
    /// backend error.
    pub async fn fail_stock_writes_for(&self, product_id: Uuid) {
        self.state.lock().await.failing_products.insert(product_id);
    }

    /// Make every `record_deductions` call fail until `clear_failures`.
    pub async fn fail_deduction_records(&self) {
        self.state.lock().await.fail_deduction_records = true;
    }

    pub async fn clear_failures(&self) {
        let mut st = self.state.lock().await;
        st.failing_products.clear();
        st.fail_deduction_records = false;
    }

    /// Rewrite a stored ledger entry in place, bypassing every check.
    /// Returns false if no such entry exists.
    pub async fn tamper_ledger_entry<F>(&self, product_id: Uuid, seq: i64, f: F) -> bool
    where
        F: FnOnce(&mut StockTransaction),
    {
        let mut st = self.state.lock().await;
        match st
            .ledger
            .iter_mut()
            .find(|tx| tx.product_id == product_id && tx.seq == seq)
        {
            Some(tx) => {
                f(tx);
                true
            }
            None => false,
        }
    }

    /// Overwrite a product's stock without a ledger entry.
    pub async fn force_stock(&self, product_id: Uuid, stock: i64) {
        let mut st = self.state.lock().await;
        if let Some(p) = st.products.iter_mut().find(|p| p.id == product_id) {
            p.stock = stock;
        }
    }
}

fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound { entity, id }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_user(&self, user: &User, token_hash: &str) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if st.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate {
                what: format!("user {}", user.email),
            });
        }
        st.users.push(user.clone());
        st.token_hashes.insert(user.id, token_hash.to_string());
        Ok(())
    }

    async fn fetch_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.users.iter().find(|u| u.id == id).cloned())
    }

    async fn fetch_user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let st = self.state.lock().await;
        let id = st
            .token_hashes
            .iter()
            .find(|(_, h)| h.as_str() == token_hash)
            .map(|(id, _)| *id);
        Ok(id.and_then(|id| st.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let st = self.state.lock().await;
        Ok(st
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if st
            .users
            .iter()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Duplicate {
                what: format!("user {}", user.email),
            });
        }
        let slot = st
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| not_found("user", user.id))?;
        let created_at = slot.created_at;
        let role = slot.role;
        *slot = user.clone();
        slot.created_at = created_at;
        slot.role = role;
        Ok(())
    }

    async fn set_token_hash(&self, user_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if !st.users.iter().any(|u| u.id == user_id) {
            return Err(not_found("user", user_id));
        }
        st.token_hashes.insert(user_id, token_hash.to_string());
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if st.products.iter().any(|p| p.sku == product.sku) {
            return Err(StoreError::Duplicate {
                what: format!("sku {}", product.sku),
            });
        }
        st.products.push(product.clone());
        Ok(())
    }

    async fn fetch_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let st = self.state.lock().await;
        let mut out: Vec<Product> = st
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        Ok(out)
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        let slot = st
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| not_found("product", product.id))?;
        let stock = slot.stock;
        let sku = slot.sku.clone();
        let created_at = slot.created_at;
        *slot = product.clone();
        slot.stock = stock;
        slot.sku = sku;
        slot.created_at = created_at;
        Ok(())
    }

    async fn adjust_stock(
        &self,
        adj: &StockAdjustment,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<StockTransaction, StoreError> {
        let mut st = self.state.lock().await;
        if st.failing_products.contains(&adj.product_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected stock write failure for {}",
                adj.product_id
            )));
        }
        let current = st
            .products
            .iter()
            .find(|p| p.id == adj.product_id)
            .map(|p| p.stock)
            .ok_or_else(|| not_found("product", adj.product_id))?;
        let head = LedgerHead::of(
            st.ledger
                .iter()
                .filter(|tx| tx.product_id == adj.product_id)
                .max_by_key(|tx| tx.seq),
        );

        let entry = post_adjustment(current, &head, adj, id, at)?;

        st.ledger.push(entry.clone());
        if let Some(p) = st.products.iter_mut().find(|p| p.id == adj.product_id) {
            p.stock = entry.new_stock;
            p.updated_at = entry.created_at;
        }
        Ok(entry)
    }

    async fn list_stock_transactions(
        &self,
        filter: &StockTxFilter,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let st = self.state.lock().await;
        let mut out: Vec<StockTransaction> = st
            .ledger
            .iter()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        if filter.product_id.is_some() {
            out.sort_by_key(|tx| tx.seq);
        }
        Ok(out)
    }

    async fn next_order_number(&self) -> Result<i64, StoreError> {
        let mut st = self.state.lock().await;
        st.order_seq += 1;
        Ok(st.order_seq)
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if st.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Duplicate {
                what: format!("order {}", order.order_number),
            });
        }
        st.orders.push(order.clone());
        Ok(())
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let st = self.state.lock().await;
        // Insertion order is placement order; newest first.
        Ok(st
            .orders
            .iter()
            .rev()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn transition_order(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Order, StoreError> {
        let mut st = self.state.lock().await;
        let order = st
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found("order", id))?;
        if order.status != change.from {
            return Err(StoreError::StaleStatus {
                expected: change.from.as_str(),
                found: order.status.as_str(),
            });
        }
        order.status = change.to;
        order.history.push(change.clone());
        order.updated_at = change.at;
        Ok(order.clone())
    }

    async fn record_deductions(&self, id: Uuid, items: &[OrderItem]) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        if st.fail_deduction_records {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "injected deduction record failure for {id}"
            )));
        }
        let order = st
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found("order", id))?;
        order.items = items.to_vec();
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.state.lock().await.tasks.push(task.clone());
        Ok(())
    }

    async fn fetch_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let st = self.state.lock().await;
        Ok(st.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let st = self.state.lock().await;
        Ok(st
            .tasks
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut st = self.state.lock().await;
        let slot = st
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| not_found("task", task.id))?;
        *slot = task.clone();
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut st = self.state.lock().await;
        let before = st.tasks.len();
        st.tasks.retain(|t| t.id != id);
        Ok(st.tasks.len() != before)
    }
}
