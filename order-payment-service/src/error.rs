//! Failure taxonomy for payment initiation and verification.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Restaurant is currently not accepting orders")]
    RestaurantInactive,

    #[error("Invalid payment credentials: Missing client ID or secret")]
    InvalidCredentials,

    #[error("Insecure callback URL for production gateway: {0}")]
    InsecureCallback(String),

    /// The gateway rejected or could not complete the call; `details` is the
    /// raw gateway body (or transport message) kept for support.
    #[error("Failed to create Cashfree order: {details}")]
    Gateway { details: String },

    #[error("Could not verify with payment gateway: {0}")]
    GatewayUnavailable(String),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl PaymentError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::RestaurantInactive => "restaurant_inactive",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InsecureCallback(_) => "insecure_callback",
            Self::Gateway { .. } => "gateway",
            Self::GatewayUnavailable(_) => "gateway_unavailable",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<validator::ValidationErrors> for PaymentError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            PaymentError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            PaymentError::RestaurantInactive => {
                AppError::BadRequest(anyhow::anyhow!(PaymentError::RestaurantInactive.to_string()))
            }
            err @ (PaymentError::InvalidCredentials
            | PaymentError::InsecureCallback(_)
            | PaymentError::GatewayUnavailable(_)) => AppError::ProcessingError {
                error: "Failed to create payment".to_string(),
                details: err.to_string(),
            },
            PaymentError::Gateway { details } => AppError::ProcessingError {
                error: "Failed to create payment".to_string(),
                details,
            },
            PaymentError::Storage(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn client_errors_map_to_client_statuses() {
        let response = AppError::from(PaymentError::Validation("Missing required fields".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(PaymentError::RestaurantInactive).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            AppError::from(PaymentError::NotFound("Restaurant not found".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn gateway_errors_keep_raw_body() {
        let err = AppError::from(PaymentError::Gateway {
            details: r#"{"message":"authentication Failed"}"#.into(),
        });
        match err {
            AppError::ProcessingError { details, .. } => {
                assert_eq!(details, r#"{"message":"authentication Failed"}"#)
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
