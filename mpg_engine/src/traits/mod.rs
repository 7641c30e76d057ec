//! # Transaction persistence
//!
//! [`PaymentTransactionStore`] is the contract a storage backend must satisfy to hold payment transactions. The
//! orchestrator relies on two properties of every backend:
//!
//! * Idempotency keys are unique. A second insert carrying a known key must not create a row; the backend reports the
//!   existing row instead ([`InsertTransactionResult::AlreadyExists`]).
//! * Status changes are conditional. [`PaymentTransactionStore::update_status`] only writes if the row still has the
//!   expected status, which keeps a stale webhook or poll from reverting newer state. A write that matched nothing
//!   returns `None` and the caller decides how to proceed.
//!
//! Rows are never deleted.
mod data_objects;
mod payment_transaction_store;

pub use data_objects::{InsertTransactionResult, StatusUpdate, TransactionQueryFilter};
pub use payment_transaction_store::{PaymentTransactionStore, TransactionStoreError};
