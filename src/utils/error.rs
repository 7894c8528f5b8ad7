use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

/// Every outcome a handler can fail with maps to its own status and
/// machine-readable code, so clients can tell "sold out" from "log in
/// first" from "try again later" without parsing prose.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Food item not found: {0}")]
    FoodItemNotFound(String),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("Sold out: {0}")]
    SoldOut(String),

    #[error("Already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("Storage temporarily unavailable")]
    StoreUnavailable(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::EventNotFound(_)
            | AppError::FoodItemNotFound(_)
            | AppError::ReservationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SoldOut(_) | AppError::AlreadyCancelled(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::EventNotFound(_) => "EVENT_NOT_FOUND",
            AppError::FoodItemNotFound(_) => "FOOD_ITEM_NOT_FOUND",
            AppError::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            AppError::SoldOut(_) => "SOLD_OUT",
            AppError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::EventNotFound(msg)
            | AppError::FoodItemNotFound(msg)
            | AppError::ReservationNotFound(msg)
            | AppError::SoldOut(msg)
            | AppError::AlreadyCancelled(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::StoreUnavailable(detail) => {
                error!(error = ?self, detail = %detail, "Storage unavailable");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::EventNotFound(msg)
            | AppError::FoodItemNotFound(msg)
            | AppError::ReservationNotFound(msg)
            | AppError::SoldOut(msg)
            | AppError::AlreadyCancelled(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::StoreUnavailable(_) => {
                "Storage is temporarily unavailable, please retry".to_string()
            }
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_out_is_conflict_not_server_error() {
        let err = AppError::SoldOut("No more Pizza available".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "SOLD_OUT");
    }

    #[test]
    fn every_not_found_code_is_distinct() {
        let codes = [
            AppError::EventNotFound(String::new()).code(),
            AppError::FoodItemNotFound(String::new()).code(),
            AppError::ReservationNotFound(String::new()).code(),
        ];
        assert_eq!(
            codes.len(),
            codes.iter().collect::<std::collections::HashSet<_>>().len()
        );
    }

    #[test]
    fn transient_failures_are_retryable_statuses() {
        let err = AppError::StoreUnavailable("connection reset".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
