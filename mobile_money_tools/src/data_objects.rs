use serde::{Deserialize, Serialize};

use crate::helpers::string_or_number;

//--------------------------------------     OAuth tokens     ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl AccessToken {
    /// Token lifetime in seconds. Falls back to a conservative minute if the provider omits it.
    pub fn expires_in_secs(&self) -> i64 {
        self.expires_in.as_deref().and_then(|s| s.parse().ok()).unwrap_or(60)
    }
}

//--------------------------------------       MTN MoMo       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtnParty {
    pub party_id_type: String,
    pub party_id: String,
}

impl MtnParty {
    pub fn msisdn(phone: &str) -> Self {
        Self { party_id_type: "MSISDN".to_string(), party_id: phone.trim_start_matches('+').to_string() }
    }
}

/// Body of `POST /collection/v1_0/requesttopay`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToPay {
    pub amount: String,
    pub currency: String,
    pub external_id: String,
    pub payer: MtnParty,
    pub payer_message: String,
    pub payee_note: String,
}

/// Response of `GET /collection/v1_0/requesttopay/{referenceId}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestToPayStatus {
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub financial_transaction_id: Option<String>,
    pub external_id: Option<String>,
    pub payer: Option<MtnParty>,
    pub status: String,
    pub reason: Option<serde_json::Value>,
}

/// Body of `POST /disbursement/v2_0/refund`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MtnRefund {
    pub amount: String,
    pub currency: String,
    pub external_id: String,
    pub payer_message: String,
    pub payee_note: String,
    pub reference_id_to_refund: String,
}

/// The callback MTN posts to `X-Callback-Url` once a request-to-pay reaches a final state.
///
/// Every field is optional and identifiers may arrive as strings or numbers, so that an odd callback can still be
/// acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtnMomoCallback {
    #[serde(default, deserialize_with = "string_or_number")]
    pub reference_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub financial_transaction_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payer: Option<MtnParty>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: Option<String>,
}

impl MtnMomoCallback {
    /// Identifiers that may correlate this callback with a request-to-pay, in order of preference: `referenceId` (the
    /// `X-Reference-Id`), `externalId` (our transaction id) and `financialTransactionId`. Blanks are skipped.
    pub fn references(&self) -> Vec<&str> {
        [&self.reference_id, &self.external_id, &self.financial_transaction_id]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.payer.as_ref().map(|p| p.party_id.as_str())
    }
}

//--------------------------------------     Airtel Money     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct AirtelSubscriber {
    pub country: String,
    pub currency: String,
    pub msisdn: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AirtelPaymentTransaction {
    pub amount: String,
    pub country: String,
    pub currency: String,
    pub id: String,
}

/// Body of `POST /merchant/v2/payments/`
#[derive(Debug, Clone, Serialize)]
pub struct AirtelPaymentRequest {
    pub reference: String,
    pub subscriber: AirtelSubscriber,
    pub transaction: AirtelPaymentTransaction,
}

/// The `status` block that Airtel attaches to every response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirtelResponseStatus {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirtelTransactionData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub airtel_money_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirtelData {
    #[serde(default)]
    pub transaction: AirtelTransactionData,
}

/// Common envelope of the payment, enquiry and refund responses.
#[derive(Debug, Clone, Deserialize)]
pub struct AirtelResponse {
    #[serde(default)]
    pub data: AirtelData,
    #[serde(default)]
    pub status: AirtelResponseStatus,
}

/// The transaction block of an Airtel callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AirtelCallbackTransaction {
    /// The id we sent with the payment request
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub airtel_money_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status_code: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub msisdn: Option<String>,
}

impl AirtelCallbackTransaction {
    /// The id we sent with the payment request. Airtel's own `airtel_money_id` is never known to us beforehand, so it
    /// cannot identify a transaction.
    pub fn provider_ref(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    /// The transaction status code (`TS`, `TF`, ...). Callbacks carry it in `status_code` and enquiries in `status`;
    /// some payloads have both, with an HTTP style number in one of them. A non-numeric value wins over a numeric one,
    /// and `status_code` wins over `status`.
    pub fn status(&self) -> Option<&str> {
        let values = [&self.status_code, &self.status]
            .into_iter()
            .filter_map(|s| s.as_deref().map(str::trim))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        let is_numeric = |s: &&str| s.chars().all(|c| c.is_ascii_digit());
        values.iter().copied().find(|s| !is_numeric(s)).or_else(|| values.first().copied())
    }
}

/// Airtel callbacks normally wrap the details in a `transaction` object, but flat payloads are seen in the wild too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AirtelMoneyCallback {
    Wrapped { transaction: AirtelCallbackTransaction },
    Flat(AirtelCallbackTransaction),
}

impl AirtelMoneyCallback {
    pub fn transaction(&self) -> &AirtelCallbackTransaction {
        match self {
            Self::Wrapped { transaction } => transaction,
            Self::Flat(transaction) => transaction,
        }
    }
}
