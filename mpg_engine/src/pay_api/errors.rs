use thiserror::Error;

use crate::{db_types::Provider, traits::TransactionStoreError};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Payment transaction {0} does not exist")]
    NotFound(String),
    #[error("The transaction was modified concurrently. {0}")]
    Conflict(String),
    #[error("The transaction is not in a valid state for this operation. {0}")]
    InvalidState(String),
    #[error("Payment provider error. {0}")]
    Gateway(String),
    #[error("No payment gateway is configured for {0}")]
    NoGateway(Provider),
    #[error("{0}")]
    Store(#[from] TransactionStoreError),
}
