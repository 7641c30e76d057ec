//! # Status normalization
//!
//! Every provider reports outcomes in its own vocabulary. [`StatusMap`] folds these raw strings into the canonical
//! [`TransactionStatus`]. Matching is case-insensitive. Anything a provider's table does not recognise, and anything
//! from a provider without a table, maps to `PROCESSING`: an unknown status never settles a transaction.
use std::collections::HashMap;

use crate::db_types::{Provider, TransactionStatus};

#[derive(Debug, Clone)]
pub struct StatusMap {
    tables: HashMap<Provider, HashMap<String, TransactionStatus>>,
}

impl Default for StatusMap {
    fn default() -> Self {
        use TransactionStatus::*;
        let mut map = Self { tables: HashMap::new() };
        map.add_vocabulary(Provider::MtnMomo, &[("SUCCESSFUL", Completed), ("FAILED", Failed), ("PENDING", Pending)]);
        // Airtel: Transaction Successful, Transaction Failed, Debit Pending
        map.add_vocabulary(Provider::AirtelMoney, &[("TS", Completed), ("TF", Failed), ("DP", Processing)]);
        map
    }
}

impl StatusMap {
    /// Registers (or extends) the vocabulary for a provider.
    pub fn add_vocabulary(&mut self, provider: Provider, entries: &[(&str, TransactionStatus)]) -> &mut Self {
        let table = self.tables.entry(provider).or_default();
        for (raw, status) in entries {
            table.insert(raw.to_ascii_uppercase(), *status);
        }
        self
    }

    pub fn normalize(&self, provider: Provider, raw_status: &str) -> TransactionStatus {
        self.tables
            .get(&provider)
            .and_then(|table| table.get(raw_status.trim().to_ascii_uppercase().as_str()))
            .copied()
            .unwrap_or(TransactionStatus::Processing)
    }
}
