use crate::storage::StorageError;

use super::payment::PaymentError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Persistence failure: {0}")]
    Persistence(StorageError),
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
    #[error("Dashboard access denied for user {0}")]
    UnauthorizedDashboardAccess(String),
    #[error("User not registered: {0}")]
    UserNotFound(String),
    #[error("Payment error: {0}")]
    Payment(PaymentError),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(user_id) => Self::UserNotFound(user_id),
            e => Self::Persistence(e),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Checkout(_) => Self::Payment(e),
            e => Self::InvalidSelection(e.to_string()),
        }
    }
}
