//! # Gateway adapters
//!
//! A [`PaymentGateway`] is the seam between the engine and an external payment provider. Adapters translate a
//! provider-agnostic [`GatewayRequest`] into whatever the provider's API expects, and report back the provider's raw
//! status in a [`GatewayResponse`]. Interpreting that raw status is the job of the [`crate::StatusMap`], not the
//! adapter.
//!
//! The reference a request is filed under is decided by the engine, not the provider, so that a request whose outcome
//! is unknown can still be looked up later.
//!
//! Adapters for concrete providers live with the HTTP clients that they wrap. The engine only sees the trait, through
//! the [`GatewayRegistry`].
mod registry;

use async_trait::async_trait;
use mpg_common::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::GatewayRegistry;

use crate::db_types::PaymentTransaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    /// The engine's transaction id. Adapters may pass it to the provider as an external reference.
    pub transaction_id: String,
    /// The reference the provider must file the request under. It is already stored with the transaction.
    pub provider_ref: String,
    /// `"{reference_type}:{reference_id}"`, suitable for a payer-facing reference
    pub reference: String,
    pub amount: Amount,
    pub currency: String,
    pub phone_number: Option<String>,
    pub description: Option<String>,
}

impl From<&PaymentTransaction> for GatewayRequest {
    fn from(tx: &PaymentTransaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            provider_ref: tx.provider_ref.clone().unwrap_or_else(|| tx.id.clone()),
            reference: format!("{}:{}", tx.reference_type, tx.reference_id),
            amount: tx.amount,
            currency: tx.currency.clone(),
            phone_number: tx.phone_number.clone(),
            description: tx.description.clone(),
        }
    }
}

impl GatewayRequest {
    /// Checks the fields every mobile money provider needs: a payer phone number and a positive amount.
    pub fn validate_mobile_money(&self) -> Result<&str, GatewayError> {
        let phone = self
            .phone_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::Validation("phone_number is required for mobile money payments".into()))?;
        if !self.amount.is_positive() {
            return Err(GatewayError::Validation("amount must be greater than 0".into()));
        }
        Ok(phone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// The reference the provider reports. For an initiation this should echo [`GatewayRequest::provider_ref`].
    pub provider_ref: String,
    /// The provider's status, verbatim
    pub provider_status: String,
    pub message: String,
}

impl GatewayResponse {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        provider_ref: S1,
        provider_status: S2,
        message: S3,
    ) -> Self {
        Self { provider_ref: provider_ref.into(), provider_status: provider_status.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid payment request. {0}")]
    Validation(String),
    /// The provider did not answer in time. The outcome of the call is unknown.
    #[error("The provider did not respond in time. {0}")]
    Timeout(String),
    #[error("Provider error. {0}")]
    Provider(String),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// The contract every payment provider integration must satisfy.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the provider to collect the payment, filed under `request.provider_ref`. That reference is how later
    /// verifications and webhooks are correlated, whether or not this call returns.
    async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;

    /// Queries the provider for the current status of a previously initiated request. This is a read and may be
    /// repeated freely.
    async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError>;

    /// Returns the funds of a completed payment to the payer.
    async fn refund(&self, provider_ref: &str, amount: Amount) -> Result<GatewayResponse, GatewayError>;
}
