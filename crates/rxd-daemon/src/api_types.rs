//! Request and response types specific to the HTTP layer.
//!
//! Business request bodies (`NewOrder`, `ProductPatch`, ...) are the service
//! types themselves; only envelopes and query strings that have no service
//! counterpart live here.

use rxd_schemas::Role;
use rxd_service::StockTxFilter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Machine-readable code, see `ServiceError::code`.
    pub code: String,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub token: String,
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockTxQuery {
    pub product_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
}

impl From<StockTxQuery> for StockTxFilter {
    fn from(q: StockTxQuery) -> Self {
        StockTxFilter {
            product_id: q.product_id,
            order_id: q.order_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusRequest {
    pub status: rxd_schemas::TaskStatus,
}
