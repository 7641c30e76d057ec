use serde::Serialize;

use crate::db_types::{PaymentTransaction, TransactionStatus};

/// Published whenever the canonical status of a transaction changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentStatusChangedEvent {
    /// The transaction after the change
    pub transaction: PaymentTransaction,
    pub old_status: TransactionStatus,
}

impl PaymentStatusChangedEvent {
    pub fn new(transaction: PaymentTransaction, old_status: TransactionStatus) -> Self {
        Self { transaction, old_status }
    }

    pub fn new_status(&self) -> TransactionStatus {
        self.transaction.status
    }
}
