//! `SqliteDatabase` is a concrete implementation of a payment transaction store.
//!
//! It uses SQLite as the backend and implements [`PaymentTransactionStore`].
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use serde_json::Value;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, new_pool, transactions};
use crate::{
    db_types::{NewTransaction, PaymentTransaction, Provider, TransactionStatus},
    traits::{
        InsertTransactionResult,
        PaymentTransactionStore,
        StatusUpdate,
        TransactionQueryFilter,
        TransactionStoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentTransactionStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<InsertTransactionResult, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::idempotent_insert(tx, &mut conn).await
    }

    async fn fetch_transaction(&self, id: &str) -> Result<Option<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction(id, &mut conn).await?;
        Ok(tx)
    }

    async fn fetch_transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction_by_idempotency_key(key, &mut conn).await?;
        Ok(tx)
    }

    async fn fetch_transaction_by_provider_ref(
        &self,
        provider: Provider,
        provider_ref: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction_by_provider_ref(provider, provider_ref, &mut conn).await?;
        Ok(tx)
    }

    async fn search_transactions(
        &self,
        filter: TransactionQueryFilter,
    ) -> Result<Vec<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::search_transactions(filter, &mut conn).await?;
        Ok(result)
    }

    async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let (from, to) = (update.from, update.to);
        let tx = transactions::update_status(id, update, &mut conn).await?;
        if tx.is_some() {
            debug!("🗃️ Transaction {id} moved from {from} to {to}");
        }
        Ok(tx)
    }

    async fn record_provider_status(
        &self,
        id: &str,
        current: TransactionStatus,
        provider_status: &str,
    ) -> Result<Option<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::record_provider_status(id, current, provider_status, &mut conn).await?;
        Ok(tx)
    }

    async fn record_error(
        &self,
        id: &str,
        error: &str,
        count_retry: bool,
    ) -> Result<PaymentTransaction, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::record_error(id, error, count_retry, &mut conn).await
    }

    async fn record_webhook(&self, id: &str, payload: Value) -> Result<PaymentTransaction, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::record_webhook(id, payload, &mut conn).await
    }

    async fn fetch_stale_transactions(
        &self,
        age: Duration,
        max_retries: i64,
        limit: i64,
    ) -> Result<Vec<PaymentTransaction>, TransactionStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::fetch_stale_transactions(age, max_retries, limit, &mut conn).await?;
        Ok(result)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}
