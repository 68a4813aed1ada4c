//! rxd-service
//!
//! Business operations for the distribution platform. Every operation takes
//! the persistence seam (`&dyn Store`), the authenticated [`Actor`] and its
//! request, enforces role rules, and returns a [`ServiceError`] the HTTP
//! layer maps onto status codes.
//!
//! Stock only ever moves through [`Store::adjust_stock`], which posts a
//! hash-chained ledger entry built by `rxd_ledger::post_adjustment`.

pub mod actor;
pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod orders;
pub mod stock;
pub mod store;
pub mod tasks;
pub mod users;

pub use actor::Actor;
pub use error::ServiceError;
pub use store::{OrderFilter, ProductFilter, StockTxFilter, Store, StoreError, TaskFilter};

use chrono::{DateTime, SubsecRound, Utc};

/// Wall-clock timestamp at the precision Postgres stores, so records read
/// back compare equal to what was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Trim an optional free-text field; blank becomes `None`.
pub(crate) fn clean_opt(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn require_text(field: &str, v: &str) -> Result<String, ServiceError> {
    let t = v.trim();
    if t.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(t.to_string())
}
