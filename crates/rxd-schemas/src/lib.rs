//! Domain records shared by every rxd crate.
//!
//! Everything here is plain data: `Serialize + Deserialize`, snake_case on
//! the wire, no IO and no business rules. Closed enums carry `as_str` /
//! `parse` so they can be stored in text columns and read from query strings.
//!
//! Money is always integer minor units (`*_minor`); quantities are `i64`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enum parse error
// ---------------------------------------------------------------------------

/// Returned by the `parse` constructors of the closed enums below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

fn parse_err(kind: &'static str, value: &str) -> ParseEnumError {
    ParseEnumError {
        kind,
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Distributor,
    Employee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Distributor, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Distributor => "distributor",
            Role::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "distributor" => Ok(Role::Distributor),
            "employee" => Ok(Role::Employee),
            _ => Err(parse_err("role", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Stored lowercase; unique across all users.
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    /// Trading name. Required for distributors.
    pub company_name: Option<String>,
    /// Drug licence number. Required for distributors.
    pub license_number: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Stored uppercase; unique across the catalog.
    pub sku: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub category: String,
    /// Selling unit, e.g. "strip", "bottle", "vial".
    pub unit: String,
    pub price_minor: i64,
    /// Current on-hand quantity. Only ever moved through the stock ledger.
    pub stock: i64,
    pub reorder_level: i64,
    pub expiry_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.reorder_level
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Dispatched,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Approved,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "dispatched" => Ok(OrderStatus::Dispatched),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            _ => Err(parse_err("order status", s)),
        }
    }
}

/// One order line. Name, sku and price are snapshotted at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
    /// Stock actually removed for this line by approval. Zero until the
    /// order is approved and reset to zero when the stock is restored.
    #[serde(default)]
    pub deducted: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    /// The distributor the goods are sold to.
    pub distributor_id: Uuid,
    /// The user who placed the order (the distributor, an employee or an admin).
    pub placed_by: Uuid,
    pub items: Vec<OrderItem>,
    pub total_minor: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Stock ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    /// Opening balance posted when a product is created with stock.
    Initial,
    Restock,
    /// Manual correction (count mismatch, damage, expiry write-off).
    Adjustment,
    OrderApproved,
    OrderCancelled,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::Initial => "initial",
            StockReason::Restock => "restock",
            StockReason::Adjustment => "adjustment",
            StockReason::OrderApproved => "order_approved",
            StockReason::OrderCancelled => "order_cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(StockReason::Initial),
            "restock" => Ok(StockReason::Restock),
            "adjustment" => Ok(StockReason::Adjustment),
            "order_approved" => Ok(StockReason::OrderApproved),
            "order_cancelled" => Ok(StockReason::OrderCancelled),
            _ => Err(parse_err("stock reason", s)),
        }
    }

    /// Reasons that are posted by the order workflow rather than by an operator.
    pub fn is_order_driven(&self) -> bool {
        matches!(self, StockReason::OrderApproved | StockReason::OrderCancelled)
    }
}

/// A request to move a product's stock. Becomes a [`StockTransaction`] once
/// posted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: Uuid,
    /// Signed requested change. The applied change may be smaller in
    /// magnitude when a deduction hits the zero floor.
    pub quantity_change: i64,
    pub reason: StockReason,
    pub order_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub note: Option<String>,
}

/// One append-only, hash-chained stock ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub product_id: Uuid,
    /// 1-based, gap-free per product.
    pub seq: i64,
    pub quantity_change: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: StockReason,
    pub order_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hash_prev: Option<String>,
    pub hash_self: String,
}

impl StockTransaction {
    /// The change that actually landed (`new_stock - previous_stock`).
    pub fn applied_change(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(parse_err("task status", s)),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(parse_err("task priority", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Employee responsible for the task.
    pub assigned_to: Uuid,
    /// Admin who created or last reassigned the task.
    pub assigned_by: Uuid,
    /// Distributor the task concerns (e.g. a visit or a collection), if any.
    pub distributor_id: Option<Uuid>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
