use log::*;
use mpg_engine::{
    db_types::PaymentTransaction,
    PaymentFlowApi,
    PaymentFlowError,
    PaymentTransactionStore,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::config::ReconciliationConfig;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// On every tick, transactions that are still PENDING or PROCESSING and have not changed for `config.min_age` are
/// polled against their provider. This catches payments whose webhook never arrived.
pub fn start_reconciliation_worker(
    api: PaymentFlowApi<SqliteDatabase>,
    config: ReconciliationConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        info!("🕰️ Reconciliation worker started. Giving up after {} polls per transaction", config.max_retries);
        loop {
            timer.tick().await;
            debug!("🕰️ Running reconciliation job");
            if let Err(e) = sweep(&api, &config).await {
                error!("🕰️ Error running reconciliation job: {e}");
            }
        }
    })
}

/// A single reconciliation pass. Polls up to `config.batch_size` stale transactions that have failed fewer than
/// `config.max_retries` polls so far, and returns the number that reached a final status.
pub async fn sweep<B>(api: &PaymentFlowApi<B>, config: &ReconciliationConfig) -> Result<usize, PaymentFlowError>
where B: PaymentTransactionStore {
    let min_age = chrono::Duration::from_std(config.min_age).unwrap_or_else(|e| {
        warn!("🕰️ Reconciliation age {:?} is out of range. {e}. Using 2 minutes.", config.min_age);
        chrono::Duration::minutes(2)
    });
    let stale = api.fetch_stale_transactions(min_age, config.max_retries, config.batch_size).await?;
    if stale.is_empty() {
        trace!("🕰️ No stale transactions");
        return Ok(0);
    }
    info!("🕰️ {} stale transactions to verify: {}", stale.len(), transaction_list(&stale));
    let settled = reconcile_batch(api, &stale).await;
    info!("🕰️ {settled} of {} transactions reached a final status", stale.len());
    Ok(settled)
}

/// Verifies each transaction in turn and returns the number that are now terminal. One failure does not stop the rest
/// of the batch.
pub async fn reconcile_batch<B>(api: &PaymentFlowApi<B>, batch: &[PaymentTransaction]) -> usize
where B: PaymentTransactionStore {
    let mut settled = 0;
    for tx in batch {
        match api.verify(&tx.id).await {
            Ok(updated) => {
                if updated.status != tx.status {
                    debug!("🕰️ Transaction {} moved from {} to {}", tx.id, tx.status, updated.status);
                }
                if updated.status.is_terminal() {
                    settled += 1;
                }
            },
            Err(e) => warn!("🕰️ Could not reconcile transaction {} (attempt {}). {e}", tx.id, tx.retry_count + 1),
        }
    }
    settled
}

fn transaction_list(transactions: &[PaymentTransaction]) -> String {
    transactions
        .iter()
        .map(|t| format!("[{}] {} {} ({})", t.id, t.provider, t.status, t.retry_count))
        .collect::<Vec<String>>()
        .join(", ")
}
