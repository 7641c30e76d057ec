use mpg_common::{Amount, DEFAULT_CURRENCY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db_types::{NewTransaction, Provider, ReferenceType, TransactionStatus},
    pay_api::errors::PaymentFlowError,
};

/// A request to collect `amount` (in minor units) against a business reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub reference_type: ReferenceType,
    pub reference_id: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    pub provider: Provider,
    pub amount: Amount,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Retrying a request with the same key returns the original transaction instead of charging again.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl InitiatePaymentRequest {
    pub fn new(reference_type: ReferenceType, reference_id: &str, provider: Provider, amount: Amount) -> Self {
        Self {
            reference_type,
            reference_id: reference_id.to_string(),
            vendor_id: None,
            provider,
            amount,
            currency: None,
            phone_number: None,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn with_phone_number<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn with_vendor_id<S: Into<String>>(mut self, vendor_id: S) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), PaymentFlowError> {
        if self.reference_id.trim().is_empty() {
            return Err(PaymentFlowError::Validation("reference_id is required".into()));
        }
        if !self.amount.is_positive() {
            return Err(PaymentFlowError::Validation(format!("amount must be greater than 0, not {}", self.amount)));
        }
        Ok(())
    }

    /// The idempotency key, if one was given and is not blank.
    pub fn effective_idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn to_new_transaction(&self) -> NewTransaction {
        let mut tx = NewTransaction::new(self.reference_type, self.reference_id.trim(), self.provider, self.amount);
        tx.vendor_id = self.vendor_id.clone();
        tx.currency =
            self.currency.clone().filter(|c| !c.trim().is_empty()).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        tx.phone_number = self.phone_number.clone();
        tx.description = self.description.clone();
        tx.idempotency_key = self.effective_idempotency_key().map(String::from);
        if self.provider.settles_immediately() {
            tx.with_status(TransactionStatus::Completed).with_provider_status("COMPLETED")
        } else {
            tx.with_provider_ref(Uuid::new_v4().to_string())
        }
    }
}

/// A provider callback, reduced to what the engine needs to reconcile it.
///
/// A callback is matched against the provider reference of a transaction first, and then against the transaction id
/// itself, since some providers echo back the id we sent them rather than the reference. `alternative_refs` are tried
/// the same way, in order, when `external_ref` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub provider: Provider,
    /// The reference the callback refers to
    pub external_ref: String,
    #[serde(default)]
    pub alternative_refs: Vec<String>,
    /// The provider's raw status
    pub status: String,
    /// The callback body, verbatim
    pub raw: Value,
}

impl WebhookPayload {
    pub fn new<S1, S2>(provider: Provider, external_ref: S1, status: S2, raw: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self { provider, external_ref: external_ref.into(), alternative_refs: Vec::new(), status: status.into(), raw }
    }

    pub fn with_alternative_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let primary = self.external_ref.clone();
        self.alternative_refs.extend(refs.into_iter().map(Into::into).filter(|r: &String| *r != primary));
        self
    }

    /// Every reference that may identify the transaction, most specific first.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.external_ref.as_str()).chain(self.alternative_refs.iter().map(String::as_str))
    }
}
