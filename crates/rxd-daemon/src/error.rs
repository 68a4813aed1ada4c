//! Mapping of business errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rxd_service::ServiceError;
use tracing::error;

use crate::api_types::ErrorBody;

/// A [`ServiceError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_)
            | ServiceError::InsufficientStock { .. }
            | ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Backend details stay in the log.
            ServiceError::Internal(e) => {
                error!(error = ?e, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: message,
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxd_ledger::check_order_transition;
    use rxd_schemas::OrderStatus;
    use rxd_service::StoreError;
    use uuid::Uuid;

    #[test]
    fn status_mapping() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ServiceError::from(StoreError::StaleStatus {
                    expected: "pending",
                    found: "approved",
                }),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::InsufficientStock {
                    product_id: Uuid::nil(),
                    sku: "A".into(),
                    requested: 2,
                    available: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::InvalidTransition(
                    check_order_transition(OrderStatus::Delivered, OrderStatus::Pending)
                        .unwrap_err(),
                ),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Internal(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, want) in cases {
            assert_eq!(ApiError(err).status(), want);
        }
    }
}
