//! Order and task status state machines.
//!
//! ```text
//!            approve            dispatch             deliver
//!  Pending ──────────► Approved ──────────► Dispatched ──────────► Delivered (term.)
//!     │ │                  │
//!     │ │ reject           │ cancel (stock restored)
//!     │ └────► Rejected    └────────────► Cancelled (term.)
//!     │        (term.)                        ▲
//!     └───────────────────────────────────────┘
//!                        cancel
//! ```
//!
//! Stock moves on exactly two edges: `* → Approved` deducts and
//! `Approved → Cancelled` restores. Self-transitions are illegal.

use rxd_schemas::{OrderStatus, TaskStatus};

/// Returned when a status change is not an edge of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal {} transition: {} -> {}",
            self.entity, self.from, self.to
        )
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Legal targets from `from`. Empty for terminal states.
pub fn order_targets(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Approved, Rejected, Cancelled],
        Approved => &[Dispatched, Cancelled],
        Dispatched => &[Delivered],
        Delivered | Cancelled | Rejected => &[],
    }
}

pub fn check_order_transition(from: OrderStatus, to: OrderStatus) -> Result<(), TransitionError> {
    if order_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError {
            entity: "order",
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

pub fn deducts_stock(to: OrderStatus) -> bool {
    to == OrderStatus::Approved
}

pub fn restores_stock(from: OrderStatus, to: OrderStatus) -> bool {
    from == OrderStatus::Approved && to == OrderStatus::Cancelled
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub fn task_targets(from: TaskStatus) -> &'static [TaskStatus] {
    use TaskStatus::*;
    match from {
        Pending => &[InProgress, Completed, Cancelled],
        InProgress => &[Completed, Pending, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn check_task_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
    if task_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError {
            entity: "task",
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}
