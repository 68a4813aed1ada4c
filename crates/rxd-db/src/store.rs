use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rxd_ledger::{post_adjustment, LedgerHead};
use rxd_schemas::{
    Order, OrderItem, OrderStatus, Product, Role, StatusChange, StockAdjustment,
    StockTransaction, Task, User,
};
use rxd_service::{OrderFilter, ProductFilter, StockTxFilter, Store, StoreError, TaskFilter};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::rows::{
    backend, order_from_row, product_from_row, stock_tx_from_row, task_from_row, user_from_row,
    write_error, ORDER_COLUMNS, PRODUCT_COLUMNS, STOCK_TX_COLUMNS, TASK_COLUMNS, USER_COLUMNS,
};

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    // -----------------------------------------------------------------------
    // users
    // -----------------------------------------------------------------------

    async fn insert_user(&self, user: &User, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into users (
              id, name, email, phone, role, company_name, license_number, address,
              active, token_hash, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(&user.company_name)
        .bind(&user.license_number)
        .bind(&user.address)
        .bind(user.active)
        .bind(token_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &format!("user {}", user.email), "insert_user failed"))?;
        Ok(())
    }

    async fn fetch_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("select {USER_COLUMNS} from users where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "fetch_user failed"))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_user_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("select {USER_COLUMNS} from users where token_hash = $1");
        let row = sqlx::query(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "fetch_user_by_token_hash failed"))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "select {USER_COLUMNS} from users \
             where ($1::text is null or role = $1) \
             order by created_at, email"
        );
        let rows = sqlx::query(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list_users failed"))?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update users
            set name = $2, email = $3, phone = $4, company_name = $5,
                license_number = $6, address = $7, active = $8, updated_at = $9
            where id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.company_name)
        .bind(&user.license_number)
        .bind(&user.address)
        .bind(user.active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &format!("user {}", user.email), "update_user failed"))?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    async fn set_token_hash(&self, user_id: Uuid, token_hash: &str) -> Result<(), StoreError> {
        let res = sqlx::query("update users set token_hash = $2, updated_at = now() where id = $1")
            .bind(user_id)
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "set_token_hash failed"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // catalog
    // -----------------------------------------------------------------------

    async fn insert_product(&self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into products (
              id, sku, name, generic_name, manufacturer, category, unit, price_minor,
              stock, reorder_level, expiry_date, active, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(p.id)
        .bind(&p.sku)
        .bind(&p.name)
        .bind(&p.generic_name)
        .bind(&p.manufacturer)
        .bind(&p.category)
        .bind(&p.unit)
        .bind(p.price_minor)
        .bind(p.stock)
        .bind(p.reorder_level)
        .bind(p.expiry_date)
        .bind(p.active)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &format!("sku {}", p.sku), "insert_product failed"))?;
        Ok(())
    }

    async fn fetch_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("select {PRODUCT_COLUMNS} from products where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "fetch_product failed"))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "select {PRODUCT_COLUMNS} from products \
             where ($1 or active) \
               and (not $2 or stock <= reorder_level) \
               and ($3::text is null or lower(category) = lower($3)) \
               and ($4::text is null \
                    or strpos(lower(name), $4) > 0 \
                    or strpos(lower(sku), $4) > 0 \
                    or strpos(lower(coalesce(generic_name, '')), $4) > 0) \
             order by name, sku"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.include_inactive)
            .bind(filter.low_stock_only)
            .bind(filter.category.as_deref())
            .bind(filter.search.as_ref().map(|s| s.to_lowercase()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list_products failed"))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn update_product(&self, p: &Product) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update products
            set name = $2, generic_name = $3, manufacturer = $4, category = $5, unit = $6,
                price_minor = $7, reorder_level = $8, expiry_date = $9, active = $10,
                updated_at = $11
            where id = $1
            "#,
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(&p.generic_name)
        .bind(&p.manufacturer)
        .bind(&p.category)
        .bind(&p.unit)
        .bind(p.price_minor)
        .bind(p.reorder_level)
        .bind(p.expiry_date)
        .bind(p.active)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "update_product failed"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: p.id,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // stock ledger
    // -----------------------------------------------------------------------

    async fn adjust_stock(
        &self,
        adj: &StockAdjustment,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<StockTransaction, StoreError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend(e, "adjust_stock begin failed"))?;

        // Row lock serialises writers per product; seq and hash chain follow.
        let row = sqlx::query("select stock from products where id = $1 for update")
            .bind(adj.product_id)
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(|e| backend(e, "adjust_stock lock failed"))?;
        let current: i64 = match row {
            Some(r) => r
                .try_get("stock")
                .map_err(|e| backend(e, "adjust_stock decode failed"))?,
            None => {
                return Err(StoreError::NotFound {
                    entity: "product",
                    id: adj.product_id,
                })
            }
        };

        let sql = format!(
            "select {STOCK_TX_COLUMNS} from stock_transactions \
             where product_id = $1 order by seq desc limit 1"
        );
        let last = sqlx::query(&sql)
            .bind(adj.product_id)
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(|e| backend(e, "adjust_stock head failed"))?;
        let last = last.as_ref().map(stock_tx_from_row).transpose()?;

        let entry = post_adjustment(current, &LedgerHead::of(last.as_ref()), adj, id, at)?;

        sqlx::query(
            r#"
            insert into stock_transactions (
              id, product_id, seq, quantity_change, previous_stock, new_stock, reason,
              order_id, actor_id, note, created_at, hash_prev, hash_self
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entry.id)
        .bind(entry.product_id)
        .bind(entry.seq)
        .bind(entry.quantity_change)
        .bind(entry.previous_stock)
        .bind(entry.new_stock)
        .bind(entry.reason.as_str())
        .bind(entry.order_id)
        .bind(entry.actor_id)
        .bind(&entry.note)
        .bind(entry.created_at)
        .bind(&entry.hash_prev)
        .bind(&entry.hash_self)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| backend(e, "adjust_stock insert failed"))?;

        sqlx::query("update products set stock = $2, updated_at = $3 where id = $1")
            .bind(entry.product_id)
            .bind(entry.new_stock)
            .bind(entry.created_at)
            .execute(&mut *db_tx)
            .await
            .map_err(|e| backend(e, "adjust_stock update failed"))?;

        db_tx
            .commit()
            .await
            .map_err(|e| backend(e, "adjust_stock commit failed"))?;

        debug!(product_id = %entry.product_id, seq = entry.seq, "ledger entry appended");
        Ok(entry)
    }

    async fn list_stock_transactions(
        &self,
        filter: &StockTxFilter,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        // One product: pure seq order. Across products: chronological.
        let sql = format!(
            "select {STOCK_TX_COLUMNS} from stock_transactions \
             where ($1::uuid is null or product_id = $1) \
               and ($2::uuid is null or order_id = $2) \
             order by case when $1::uuid is null then created_at end, product_id, seq"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.product_id)
            .bind(filter.order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list_stock_transactions failed"))?;
        rows.iter().map(stock_tx_from_row).collect()
    }

    // -----------------------------------------------------------------------
    // orders
    // -----------------------------------------------------------------------

    async fn next_order_number(&self) -> Result<i64, StoreError> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select nextval('order_number_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| backend(e, "next_order_number failed"))?;
        Ok(n)
    }

    async fn insert_order(&self, o: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into orders (
              id, order_number, distributor_id, placed_by, items, total_minor, status,
              notes, history, created_at, updated_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(o.id)
        .bind(&o.order_number)
        .bind(o.distributor_id)
        .bind(o.placed_by)
        .bind(Json(&o.items))
        .bind(o.total_minor)
        .bind(o.status.as_str())
        .bind(&o.notes)
        .bind(Json(&o.history))
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(e, &format!("order {}", o.order_number), "insert_order failed")
        })?;
        Ok(())
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("select {ORDER_COLUMNS} from orders where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "fetch_order failed"))?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "select {ORDER_COLUMNS} from orders \
             where ($1::uuid is null or distributor_id = $1) \
               and ($2::uuid is null or placed_by = $2) \
               and ($3::text is null or status = $3) \
             order by created_at desc, order_number desc"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.distributor_id)
            .bind(filter.placed_by)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list_orders failed"))?;
        rows.iter().map(order_from_row).collect()
    }

    async fn transition_order(
        &self,
        id: Uuid,
        change: &StatusChange,
    ) -> Result<Order, StoreError> {
        let sql = format!(
            "update orders \
             set status = $3, history = history || $4, updated_at = $5 \
             where id = $1 and status = $2 \
             returning {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(change.from.as_str())
            .bind(change.to.as_str())
            .bind(Json(vec![change]))
            .bind(change.at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "transition_order failed"))?;

        if let Some(r) = row {
            return order_from_row(&r);
        }

        // Lost the compare-and-set: report what is there now.
        let current = sqlx::query("select status from orders where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "transition_order reread failed"))?;
        match current {
            None => Err(StoreError::NotFound { entity: "order", id }),
            Some(r) => {
                let s: String = r
                    .try_get("status")
                    .map_err(|e| backend(e, "transition_order decode failed"))?;
                let found = OrderStatus::parse(&s)
                    .map_err(|e| StoreError::Backend(anyhow::anyhow!("{e}")))?;
                Err(StoreError::StaleStatus {
                    expected: change.from.as_str(),
                    found: found.as_str(),
                })
            }
        }
    }

    async fn record_deductions(&self, id: Uuid, items: &[OrderItem]) -> Result<(), StoreError> {
        let res = sqlx::query("update orders set items = $2 where id = $1")
            .bind(id)
            .bind(Json(items))
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "record_deductions failed"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "order", id });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // tasks
    // -----------------------------------------------------------------------

    async fn insert_task(&self, t: &Task) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into tasks (
              id, title, description, assigned_to, assigned_by, distributor_id, priority,
              due_date, status, created_at, updated_at, completed_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(t.id)
        .bind(&t.title)
        .bind(&t.description)
        .bind(t.assigned_to)
        .bind(t.assigned_by)
        .bind(t.distributor_id)
        .bind(t.priority.as_str())
        .bind(t.due_date)
        .bind(t.status.as_str())
        .bind(t.created_at)
        .bind(t.updated_at)
        .bind(t.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "insert_task failed"))?;
        Ok(())
    }

    async fn fetch_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let sql = format!("select {TASK_COLUMNS} from tasks where id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "fetch_task failed"))?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "select {TASK_COLUMNS} from tasks \
             where ($1::uuid is null or assigned_to = $1) \
               and ($2::uuid is null or distributor_id = $2) \
               and ($3::text is null or status = $3) \
             order by created_at desc, id"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.assigned_to)
            .bind(filter.distributor_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list_tasks failed"))?;
        rows.iter().map(task_from_row).collect()
    }

    async fn update_task(&self, t: &Task) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            update tasks
            set title = $2, description = $3, assigned_to = $4, assigned_by = $5,
                distributor_id = $6, priority = $7, due_date = $8, status = $9,
                updated_at = $10, completed_at = $11
            where id = $1
            "#,
        )
        .bind(t.id)
        .bind(&t.title)
        .bind(&t.description)
        .bind(t.assigned_to)
        .bind(t.assigned_by)
        .bind(t.distributor_id)
        .bind(t.priority.as_str())
        .bind(t.due_date)
        .bind(t.status.as_str())
        .bind(t.updated_at)
        .bind(t.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "update_task failed"))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "task",
                id: t.id,
            });
        }
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("delete from tasks where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "delete_task failed"))?;
        Ok(res.rows_affected() > 0)
    }
}
