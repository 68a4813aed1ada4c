use rxd_ledger::{LedgerError, TransitionError};
use uuid::Uuid;

use crate::store::StoreError;

/// Failure of a business operation.
#[derive(Debug)]
pub enum ServiceError {
    /// Malformed or inconsistent request input.
    Validation(String),
    /// No credentials, or credentials that match nobody.
    Unauthorized,
    /// Authenticated, but not allowed to do this.
    Forbidden(String),
    /// The entity does not exist or is not visible to the caller.
    NotFound(String),
    /// Uniqueness clash or a concurrent status change.
    Conflict(String),
    InsufficientStock {
        product_id: Uuid,
        sku: String,
        requested: i64,
        available: i64,
    },
    InvalidTransition(TransitionError),
    Internal(anyhow::Error),
}

impl ServiceError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub(crate) fn not_found(entity: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "invalid request: {msg}"),
            Self::Unauthorized => write!(f, "missing or invalid credentials"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "{msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::InsufficientStock {
                sku,
                requested,
                available,
                ..
            } => write!(
                f,
                "insufficient stock for {sku}: requested {requested}, available {available}"
            ),
            Self::InvalidTransition(e) => write!(f, "{e}"),
            Self::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::not_found(entity, id),
            StoreError::Duplicate { what } => Self::Conflict(format!("{what} already exists")),
            StoreError::StaleStatus { expected, found } => Self::Conflict(format!(
                "status changed concurrently (expected {expected}, found {found})"
            )),
            StoreError::Ledger(e) => Self::Validation(e.to_string()),
            StoreError::Backend(e) => Self::Internal(e),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition(e)
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        Self::Validation(e.to_string())
    }
}
