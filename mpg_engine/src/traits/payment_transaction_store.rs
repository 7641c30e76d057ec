use chrono::Duration;
use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::{NewTransaction, PaymentTransaction, Provider, TransactionStatus},
    traits::{InsertTransactionResult, StatusUpdate, TransactionQueryFilter},
};

/// The storage contract for payment transactions.
///
/// Every method is a single atomic operation against the backend. Backends must be cheap to clone (e.g. wrap a
/// connection pool) since each API object holds its own copy.
#[allow(async_fn_in_trait)]
pub trait PaymentTransactionStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new transaction, assigning it a fresh id.
    ///
    /// If the transaction carries an idempotency key that is already taken, nothing is written and the existing
    /// transaction is returned as [`InsertTransactionResult::AlreadyExists`]. This holds even when two inserts with
    /// the same key race each other.
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<InsertTransactionResult, TransactionStoreError>;

    async fn fetch_transaction(&self, id: &str) -> Result<Option<PaymentTransaction>, TransactionStoreError>;

    async fn fetch_transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError>;

    async fn fetch_transaction_by_provider_ref(
        &self,
        provider: Provider,
        provider_ref: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError>;

    /// Transactions matching the filter, newest first.
    async fn search_transactions(
        &self,
        filter: TransactionQueryFilter,
    ) -> Result<Vec<PaymentTransaction>, TransactionStoreError>;

    /// Conditionally changes the status of a transaction. See [`StatusUpdate`]. Returns `None` if the transaction was
    /// no longer in `update.from`.
    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError>;

    /// Overwrites the raw provider status without touching the canonical status. Nothing is written, and `None` is
    /// returned, if the transaction is no longer in `current`.
    async fn record_provider_status(
        &self,
        id: &str,
        current: TransactionStatus,
        provider_status: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError>;

    /// Stores `error` as the last error. If `count_retry` is set, the retry counter is incremented too.
    async fn record_error(
        &self,
        id: &str,
        error: &str,
        count_retry: bool,
    ) -> Result<PaymentTransaction, TransactionStoreError>;

    /// Stores the raw body of an inbound webhook together with the time it was received.
    async fn record_webhook(&self, id: &str, payload: Value) -> Result<PaymentTransaction, TransactionStoreError>;

    /// Non-terminal transactions (`PENDING` or `PROCESSING`) that have a provider reference but have not been updated
    /// for at least `age`. Transactions that have used up `max_retries` are left out. Oldest first, at most `limit`
    /// of them.
    async fn fetch_stale_transactions(
        &self,
        age: Duration,
        max_retries: i64,
        limit: i64,
    ) -> Result<Vec<PaymentTransaction>, TransactionStoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum TransactionStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(String),
    #[error("Transaction could not be stored. {0}")]
    InsertError(String),
}

impl From<sqlx::Error> for TransactionStoreError {
    fn from(e: sqlx::Error) -> Self {
        TransactionStoreError::DatabaseError(e.to_string())
    }
}
