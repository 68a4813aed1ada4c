//! Row decoding. Enum columns are text; a value outside the enum means the
//! CHECK constraints and the code disagree, which is reported as a backend
//! error.

use rxd_schemas::{
    Order, OrderItem, OrderStatus, Product, Role, StatusChange, StockReason, StockTransaction,
    Task, TaskPriority, TaskStatus, User,
};
use rxd_service::StoreError;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;

pub(crate) const USER_COLUMNS: &str = "id, name, email, phone, role, company_name, \
    license_number, address, active, created_at, updated_at";

pub(crate) const PRODUCT_COLUMNS: &str = "id, sku, name, generic_name, manufacturer, category, \
    unit, price_minor, stock, reorder_level, expiry_date, active, created_at, updated_at";

pub(crate) const STOCK_TX_COLUMNS: &str = "id, product_id, seq, quantity_change, previous_stock, \
    new_stock, reason, order_id, actor_id, note, created_at, hash_prev, hash_self";

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, distributor_id, placed_by, items, \
    total_minor, status, notes, history, created_at, updated_at";

pub(crate) const TASK_COLUMNS: &str = "id, title, description, assigned_to, assigned_by, \
    distributor_id, priority, due_date, status, created_at, updated_at, completed_at";

pub(crate) fn backend(e: sqlx::Error, ctx: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e).context(ctx))
}

fn decode(e: sqlx::Error) -> StoreError {
    backend(e, "row decode failed")
}

fn bad_enum(e: rxd_schemas::ParseEnumError) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("row decode failed: {e}"))
}

/// Name of the violated unique constraint, if `err` is one (SQLSTATE 23505).
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            Some(db_err.constraint().unwrap_or("unique key").to_string())
        }
        _ => None,
    }
}

/// Map an insert/update error, turning unique violations into `Duplicate`.
pub(crate) fn write_error(e: sqlx::Error, what: &str, ctx: &'static str) -> StoreError {
    match unique_violation(&e) {
        Some(constraint) => StoreError::Duplicate {
            what: format!("{what} ({constraint})"),
        },
        None => backend(e, ctx),
    }
}

pub(crate) fn user_from_row(r: &PgRow) -> Result<User, StoreError> {
    let role: String = r.try_get("role").map_err(decode)?;
    Ok(User {
        id: r.try_get("id").map_err(decode)?,
        name: r.try_get("name").map_err(decode)?,
        email: r.try_get("email").map_err(decode)?,
        phone: r.try_get("phone").map_err(decode)?,
        role: Role::parse(&role).map_err(bad_enum)?,
        company_name: r.try_get("company_name").map_err(decode)?,
        license_number: r.try_get("license_number").map_err(decode)?,
        address: r.try_get("address").map_err(decode)?,
        active: r.try_get("active").map_err(decode)?,
        created_at: r.try_get("created_at").map_err(decode)?,
        updated_at: r.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn product_from_row(r: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: r.try_get("id").map_err(decode)?,
        sku: r.try_get("sku").map_err(decode)?,
        name: r.try_get("name").map_err(decode)?,
        generic_name: r.try_get("generic_name").map_err(decode)?,
        manufacturer: r.try_get("manufacturer").map_err(decode)?,
        category: r.try_get("category").map_err(decode)?,
        unit: r.try_get("unit").map_err(decode)?,
        price_minor: r.try_get("price_minor").map_err(decode)?,
        stock: r.try_get("stock").map_err(decode)?,
        reorder_level: r.try_get("reorder_level").map_err(decode)?,
        expiry_date: r.try_get("expiry_date").map_err(decode)?,
        active: r.try_get("active").map_err(decode)?,
        created_at: r.try_get("created_at").map_err(decode)?,
        updated_at: r.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn stock_tx_from_row(r: &PgRow) -> Result<StockTransaction, StoreError> {
    let reason: String = r.try_get("reason").map_err(decode)?;
    Ok(StockTransaction {
        id: r.try_get("id").map_err(decode)?,
        product_id: r.try_get("product_id").map_err(decode)?,
        seq: r.try_get("seq").map_err(decode)?,
        quantity_change: r.try_get("quantity_change").map_err(decode)?,
        previous_stock: r.try_get("previous_stock").map_err(decode)?,
        new_stock: r.try_get("new_stock").map_err(decode)?,
        reason: StockReason::parse(&reason).map_err(bad_enum)?,
        order_id: r.try_get("order_id").map_err(decode)?,
        actor_id: r.try_get("actor_id").map_err(decode)?,
        note: r.try_get("note").map_err(decode)?,
        created_at: r.try_get("created_at").map_err(decode)?,
        hash_prev: r.try_get("hash_prev").map_err(decode)?,
        hash_self: r.try_get("hash_self").map_err(decode)?,
    })
}

pub(crate) fn order_from_row(r: &PgRow) -> Result<Order, StoreError> {
    let status: String = r.try_get("status").map_err(decode)?;
    let items: Json<Vec<OrderItem>> = r.try_get("items").map_err(decode)?;
    let history: Json<Vec<StatusChange>> = r.try_get("history").map_err(decode)?;
    Ok(Order {
        id: r.try_get("id").map_err(decode)?,
        order_number: r.try_get("order_number").map_err(decode)?,
        distributor_id: r.try_get("distributor_id").map_err(decode)?,
        placed_by: r.try_get("placed_by").map_err(decode)?,
        items: items.0,
        total_minor: r.try_get("total_minor").map_err(decode)?,
        status: OrderStatus::parse(&status).map_err(bad_enum)?,
        notes: r.try_get("notes").map_err(decode)?,
        history: history.0,
        created_at: r.try_get("created_at").map_err(decode)?,
        updated_at: r.try_get("updated_at").map_err(decode)?,
    })
}

pub(crate) fn task_from_row(r: &PgRow) -> Result<Task, StoreError> {
    let priority: String = r.try_get("priority").map_err(decode)?;
    let status: String = r.try_get("status").map_err(decode)?;
    Ok(Task {
        id: r.try_get("id").map_err(decode)?,
        title: r.try_get("title").map_err(decode)?,
        description: r.try_get("description").map_err(decode)?,
        assigned_to: r.try_get("assigned_to").map_err(decode)?,
        assigned_by: r.try_get("assigned_by").map_err(decode)?,
        distributor_id: r.try_get("distributor_id").map_err(decode)?,
        priority: TaskPriority::parse(&priority).map_err(bad_enum)?,
        due_date: r.try_get("due_date").map_err(decode)?,
        status: TaskStatus::parse(&status).map_err(bad_enum)?,
        created_at: r.try_get("created_at").map_err(decode)?,
        updated_at: r.try_get("updated_at").map_err(decode)?,
        completed_at: r.try_get("completed_at").map_err(decode)?,
    })
}
