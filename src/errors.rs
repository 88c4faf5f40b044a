use sea_orm::error::DbErr;
use uuid::Uuid;

use crate::suppliers::AdapterError;

/// Unified error type for the fulfillment core services.
///
/// The variants map onto the failure classes the order processor has to
/// distinguish: missing records are terminal for a job, unroutable items are
/// a policy failure that alerts before failing, adapter errors carry their
/// own client/server classification, and database errors propagate unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Order {order_id} has {count} unroutable item(s)")]
    UnroutableItems { order_id: Uuid, count: usize },

    #[error("Supplier adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Whether a queue-level retry of the whole job can plausibly succeed.
    ///
    /// Not-found orders, unroutable items, and client-class adapter
    /// rejections will fail the same way on every attempt; transient adapter
    /// and database failures may clear up.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::NotFound(_) => false,
            ServiceError::UnroutableItems { .. } => false,
            ServiceError::ValidationError(_) => false,
            ServiceError::InvalidTransition { .. } => false,
            ServiceError::Config(_) => false,
            ServiceError::Adapter(e) => e.is_retryable(),
            ServiceError::Database(_) => true,
            ServiceError::Queue(_) => true,
            ServiceError::InternalError(_) => true,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_retryable() {
        let err = ServiceError::NotFound("order 123".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn unroutable_is_not_retryable() {
        let err = ServiceError::UnroutableItems {
            order_id: Uuid::new_v4(),
            count: 2,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_class_adapter_error_is_retryable() {
        let err = ServiceError::Adapter(AdapterError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn client_class_adapter_error_is_not_retryable() {
        let err = ServiceError::Adapter(AdapterError::Client {
            status: 422,
            message: "bad payload".to_string(),
        });
        assert!(!err.is_retryable());
    }
}
