use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::*;
pub use mpg_common::Amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------       Provider        ---------------------------------------------------------
/// The payment channels the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    MtnMomo,
    AirtelMoney,
    Cash,
    Card,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::MtnMomo => "MTN_MOMO",
            Provider::AirtelMoney => "AIRTEL_MONEY",
            Provider::Cash => "CASH",
            Provider::Card => "CARD",
        }
    }

    /// Cash and card payments are settled at the point of sale. No external provider is involved, so they are
    /// recorded as completed immediately.
    pub fn settles_immediately(&self) -> bool {
        matches!(self, Provider::Cash | Provider::Card)
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MTN_MOMO" => Ok(Self::MtnMomo),
            "AIRTEL_MONEY" => Ok(Self::AirtelMoney),
            "CASH" => Ok(Self::Cash),
            "CARD" => Ok(Self::Card),
            _ => Err(ConversionError(format!("Unknown provider: {s}"))),
        }
    }
}

//--------------------------------------     ReferenceType     ---------------------------------------------------------
/// The kind of business object a payment settles. The engine only carries the reference; it never dereferences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Order,
    Invoice,
    Subscription,
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceType::Order => write!(f, "ORDER"),
            ReferenceType::Invoice => write!(f, "INVOICE"),
            ReferenceType::Subscription => write!(f, "SUBSCRIPTION"),
        }
    }
}

impl FromStr for ReferenceType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ORDER" => Ok(Self::Order),
            "INVOICE" => Ok(Self::Invoice),
            "SUBSCRIPTION" => Ok(Self::Subscription),
            _ => Err(ConversionError(format!("Unknown reference type: {s}"))),
        }
    }
}

//--------------------------------------   TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Recorded locally. The provider has not (yet) acknowledged the request.
    Pending,
    /// The provider accepted the request and the outcome is awaited.
    Processing,
    /// Funds were collected.
    Completed,
    Failed,
    /// A completed payment whose funds were returned.
    Refunded,
    /// Reserved. No flow currently produces it.
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        use TransactionStatus::*;
        matches!(self, Completed | Failed | Refunded | Cancelled)
    }

    /// True if `next` is reachable from `self` along a single edge of the transaction state machine:
    ///
    /// ```text
    /// PENDING ──► PROCESSING ──► COMPLETED ──► REFUNDED
    ///    │             │
    ///    └──► FAILED ◄─┘
    /// ```
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (*self, next),
            (Pending, Processing) |
                (Pending, Failed) |
                (Processing, Completed) |
                (Processing, Failed) |
                (Completed, Refunded)
        )
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Processing => write!(f, "PROCESSING"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Failed => write!(f, "FAILED"),
            TransactionStatus::Refunded => write!(f, "REFUNDED"),
            TransactionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            "CANCELLED" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to PROCESSING");
            TransactionStatus::Processing
        })
    }
}

//--------------------------------------  PaymentTransaction   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub vendor_id: Option<String>,
    pub provider: Provider,
    /// The provider's identifier for this transaction. Set at most once, when the provider accepts the request.
    pub provider_ref: Option<String>,
    /// The last raw status reported by the provider, verbatim.
    pub provider_status: Option<String>,
    pub status: TransactionStatus,
    pub amount: Amount,
    pub currency: String,
    pub phone_number: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub webhook_received_at: Option<DateTime<Utc>>,
    pub webhook_payload: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    NewTransaction     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub vendor_id: Option<String>,
    pub provider: Provider,
    /// Assigned before the provider is contacted, so that a call with an unknown outcome can still be reconciled
    pub provider_ref: Option<String>,
    pub provider_status: Option<String>,
    pub status: TransactionStatus,
    pub amount: Amount,
    pub currency: String,
    pub phone_number: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl NewTransaction {
    pub fn new(reference_type: ReferenceType, reference_id: &str, provider: Provider, amount: Amount) -> Self {
        Self {
            reference_type,
            reference_id: reference_id.to_string(),
            vendor_id: None,
            provider,
            provider_ref: None,
            provider_status: None,
            status: TransactionStatus::Pending,
            amount,
            currency: mpg_common::DEFAULT_CURRENCY.to_string(),
            phone_number: None,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_provider_status<S: Into<String>>(mut self, status: S) -> Self {
        self.provider_status = Some(status.into());
        self
    }

    pub fn with_provider_ref<S: Into<String>>(mut self, provider_ref: S) -> Self {
        self.provider_ref = Some(provider_ref.into());
        self
    }

    pub fn with_vendor<S: Into<String>>(mut self, vendor_id: S) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_phone_number<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
