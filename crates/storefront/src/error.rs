//! Unified error handling for the storefront API.
//!
//! Provides a unified `AppError` type that all route handlers return.
//! Validation and persistence failures surface to the client as structured
//! JSON rejections; internal detail is logged, never leaked. Pricing
//! degradation is deliberately *not* an error anywhere in this crate.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::orders::OrderError;
use crate::services::rates::RatesError;

/// Field-keyed validation errors, in the shape the original API clients
/// expect: `{"field": ["message", ...], "items.0.quantity": [...]}`.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// An empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Whether no errors have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The fields that have errors, in sorted order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Convert to a `Result`: `Ok(())` when empty, `Err(self)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` if any error has been recorded.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Exchange-rate service failed.
    #[error("Rates error: {0}")]
    Rates(#[from] RatesError),

    /// Request payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Resource not found (or not owned by the requester - existence is
    /// not leaked).
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request was well-formed but not processable (e.g. cancelling a
    /// shipped order).
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Repository(inner) => Self::Database(inner),
            OrderError::NotFound => Self::NotFound("Order not found".to_owned()),
            OrderError::AddressNotFound => {
                let mut errors = ValidationErrors::new();
                errors.add("shipping_address_id", "invalid shipping address");
                Self::Validation(errors)
            }
            OrderError::NotCancellable(status) => Self::Unprocessable(format!(
                "only pending orders can be cancelled (current status: {status})"
            )),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Database(_) | Self::Internal(_) | Self::Rates(_)) {
            tracing::error!(error = %self, "Request error");
        }

        let status = match &self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Rates(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) | Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let body = match self {
            Self::Database(_) | Self::Internal(_) => json!({ "message": "Internal server error" }),
            Self::Rates(_) => json!({ "message": "Exchange rate service unavailable" }),
            Self::Validation(errors) => json!({
                "message": "Validation failed",
                "errors": errors,
            }),
            Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::BadRequest(message)
            | Self::Unprocessable(message) => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Unprocessable("test".to_owned())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_errors_are_422_with_field_detail() {
        let mut errors = ValidationErrors::new();
        errors.add("items", "at least one item is required");
        errors.add("items.0.quantity", "the quantity must be at least 1");

        let err = AppError::Validation(errors);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_address_not_found_maps_to_validation() {
        let err = AppError::from(OrderError::AddressNotFound);
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_cancel_guard_maps_to_unprocessable() {
        let err = AppError::from(OrderError::NotCancellable(
            drukmart_core::OrderStatus::Shipped,
        ));
        assert_eq!(get_status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_validation_errors_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "first");
        errors.add("email", "second");
        assert_eq!(errors.fields(), vec!["email"]);
        assert!(errors.clone().into_result().is_err());
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
