use chrono::{Duration, Utc};
use log::*;
use serde_json::Value;
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewTransaction, PaymentTransaction, Provider, TransactionStatus},
    traits::{InsertTransactionResult, StatusUpdate, TransactionQueryFilter, TransactionStoreError},
};

/// Inserts the transaction, unless its idempotency key is already taken, in which case the transaction holding the key
/// is returned instead.
///
/// The key check relies on the partial unique index on `idempotency_key` rather than a prior lookup, so two concurrent
/// inserts with the same key cannot both succeed.
pub async fn idempotent_insert(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<InsertTransactionResult, TransactionStoreError> {
    let key = tx.idempotency_key.clone();
    match insert_transaction(tx, conn).await {
        Ok(tx) => {
            debug!("🗃️ Transaction {} inserted for {}:{}", tx.id, tx.reference_type, tx.reference_id);
            Ok(InsertTransactionResult::Inserted(tx))
        },
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() && key.is_some() => {
            let key = key.unwrap_or_default();
            debug!("🗃️ Idempotency key {key} is already in use. Returning the existing transaction");
            let existing = fetch_transaction_by_idempotency_key(&key, conn)
                .await?
                .ok_or_else(|| TransactionStoreError::InsertError(format!("Key {key} conflicted but was not found")))?;
            Ok(InsertTransactionResult::AlreadyExists(existing))
        },
        Err(e) => Err(e.into()),
    }
}

async fn insert_transaction(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (
                id,
                reference_type,
                reference_id,
                vendor_id,
                provider,
                provider_ref,
                provider_status,
                status,
                amount,
                currency,
                phone_number,
                description,
                idempotency_key,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(tx.reference_type)
    .bind(tx.reference_id)
    .bind(tx.vendor_id)
    .bind(tx.provider)
    .bind(tx.provider_ref)
    .bind(tx.provider_status)
    .bind(tx.status)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.phone_number)
    .bind(tx.description)
    .bind(tx.idempotency_key)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_transaction(
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_transaction_by_idempotency_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await
}

/// Provider references are only unique per provider. If a provider ever reuses one, the newest transaction wins.
pub async fn fetch_transaction_by_provider_ref(
    provider: Provider,
    provider_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM payment_transactions WHERE provider = $1 AND provider_ref = $2 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(provider)
    .bind(provider_ref)
    .fetch_optional(conn)
    .await
}

/// Fetches transactions according to the criteria in the filter, ordered by `created_at`, newest first.
pub async fn search_transactions(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payment_transactions ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(reference_type) = query.reference_type {
        where_clause.push("reference_type = ");
        where_clause.push_bind_unseparated(reference_type);
    }
    if let Some(reference_id) = query.reference_id {
        where_clause.push("reference_id = ");
        where_clause.push_bind_unseparated(reference_id);
    }
    if let Some(vendor_id) = query.vendor_id {
        where_clause.push("vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
    }
    if let Some(provider) = query.provider {
        where_clause.push("provider = ");
        where_clause.push_bind_unseparated(provider);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, rowid DESC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let transactions = builder.build_query_as::<PaymentTransaction>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_transactions: {}", transactions.len());
    Ok(transactions)
}

/// Changes the status from `update.from` to `update.to`. Nothing is written if the row is no longer in `update.from`.
/// The provider status and last error are only overwritten when supplied.
pub async fn update_status(
    id: &str,
    update: StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let StatusUpdate { from, to, provider_status, last_error } = update;
    let result = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET status = $1,
                provider_status = COALESCE($2, provider_status),
                last_error = COALESCE($3, last_error),
                updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(provider_status)
    .bind(last_error)
    .bind(Utc::now())
    .bind(id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    if result.is_none() {
        trace!("🗃️ Status update {from} -> {to} for {id} matched no rows");
    }
    Ok(result)
}

/// Overwrites the raw provider status, but only while the transaction is still in `current`.
pub async fn record_provider_status(
    id: &str,
    current: TransactionStatus,
    provider_status: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET provider_status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(provider_status)
    .bind(Utc::now())
    .bind(id)
    .bind(current)
    .fetch_optional(conn)
    .await?;
    if result.is_none() {
        trace!("🗃️ Provider status {provider_status} for {id} not recorded. The transaction is no longer {current}");
    }
    Ok(result)
}

pub async fn record_error(
    id: &str,
    error: &str,
    count_retry: bool,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, TransactionStoreError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET last_error = $1, retry_count = retry_count + $2, updated_at = $3
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(i64::from(count_retry))
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    tx.ok_or_else(|| TransactionStoreError::TransactionNotFound(id.to_string()))
}

pub async fn record_webhook(
    id: &str,
    payload: Value,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, TransactionStoreError> {
    let now = Utc::now();
    let tx = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET webhook_payload = $1, webhook_received_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(Json(payload))
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    tx.ok_or_else(|| TransactionStoreError::TransactionNotFound(id.to_string()))
}

pub async fn fetch_stale_transactions(
    age: Duration,
    max_retries: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    let cutoff = Utc::now() - age;
    sqlx::query_as(
        r#"
            SELECT * FROM payment_transactions
            WHERE status IN ($1, $2) AND provider_ref IS NOT NULL AND updated_at <= $3 AND retry_count < $4
            ORDER BY updated_at ASC
            LIMIT $5;
        "#,
    )
    .bind(TransactionStatus::Pending)
    .bind(TransactionStatus::Processing)
    .bind(cutoff)
    .bind(max_retries)
    .bind(limit)
    .fetch_all(conn)
    .await
}
