//! rxd-ledger
//!
//! Pure rules for the distribution domain. No IO, no clocks, no randomness:
//! callers pass in ids and timestamps, so two stores fed the same inputs
//! produce byte-identical ledger entries.
//!
//! - [`stock`]: zero-floor stock arithmetic, posting, replay, and the
//!   hash-chained stock transaction ledger.
//! - [`workflow`]: order and task status state machines.
//! - [`pricing`]: checked order-line and order totals.

pub mod pricing;
pub mod stock;
pub mod workflow;

pub use pricing::{line_total, order_total};
pub use stock::{
    apply_change, compute_entry_hash, post_adjustment, replay, validate_adjustment, verify,
    ChainStatus, LedgerHead, LedgerVerification,
};
pub use workflow::{
    check_order_transition, check_task_transition, deducts_stock, order_targets, restores_stock,
    task_targets, TransitionError,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invariant violations surfaced by posting and pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A stock adjustment must move stock.
    ZeroChange,
    /// `initial` / `restock` entries must add stock.
    NonPositiveChange { reason: &'static str, change: i64 },
    /// Order-driven entries must reference the order.
    MissingOrderId { reason: &'static str },
    /// Quantity * price or a running total left the i64 range.
    Overflow,
    /// The entry could not be serialized for hashing.
    Hash(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroChange => write!(f, "ledger invariant: quantity_change must not be 0"),
            Self::NonPositiveChange { reason, change } => write!(
                f,
                "ledger invariant: {reason} entries must be > 0, got {change}"
            ),
            Self::MissingOrderId { reason } => {
                write!(f, "ledger invariant: {reason} entries require an order_id")
            }
            Self::Overflow => write!(f, "ledger invariant: arithmetic overflow"),
            Self::Hash(msg) => write!(f, "ledger hash failed: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}
