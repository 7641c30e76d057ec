use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{PaymentTransaction, Provider, ReferenceType, TransactionStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertTransactionResult {
    Inserted(PaymentTransaction),
    /// A transaction with the same idempotency key already exists. This is that transaction.
    AlreadyExists(PaymentTransaction),
}

impl InsertTransactionResult {
    pub fn transaction(&self) -> &PaymentTransaction {
        match self {
            Self::Inserted(tx) | Self::AlreadyExists(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> PaymentTransaction {
        match self {
            Self::Inserted(tx) | Self::AlreadyExists(tx) => tx,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// A conditional status change: `from -> to`, only applied if the row is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub provider_status: Option<String>,
    pub last_error: Option<String>,
}

impl StatusUpdate {
    pub fn new(from: TransactionStatus, to: TransactionStatus) -> Self {
        Self { from, to, provider_status: None, last_error: None }
    }

    pub fn with_provider_status<S: Into<String>>(mut self, status: S) -> Self {
        self.provider_status = Some(status.into());
        self
    }

    pub fn with_last_error<S: Into<String>>(mut self, error: S) -> Self {
        self.last_error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionQueryFilter {
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<String>,
    pub vendor_id: Option<String>,
    pub provider: Option<Provider>,
    pub status: Option<Vec<TransactionStatus>>,
    pub limit: Option<i64>,
}

impl TransactionQueryFilter {
    pub fn with_reference(mut self, reference_type: ReferenceType, reference_id: String) -> Self {
        self.reference_type = Some(reference_type);
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_vendor_id(mut self, vendor_id: String) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.reference_type.is_none() &&
            self.reference_id.is_none() &&
            self.vendor_id.is_none() &&
            self.provider.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for TransactionQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "All transactions");
        }
        let mut parts = Vec::new();
        if let Some(rt) = &self.reference_type {
            parts.push(format!("reference_type: {rt}"));
        }
        if let Some(rid) = &self.reference_id {
            parts.push(format!("reference_id: {rid}"));
        }
        if let Some(vendor) = &self.vendor_id {
            parts.push(format!("vendor_id: {vendor}"));
        }
        if let Some(provider) = &self.provider {
            parts.push(format!("provider: {provider}"));
        }
        if let Some(statuses) = self.status.as_ref().filter(|s| !s.is_empty()) {
            let s = statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            parts.push(format!("status: [{s}]"));
        }
        write!(f, "{}", parts.join(", "))
    }
}
