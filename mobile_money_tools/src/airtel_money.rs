use std::sync::Arc;

use log::*;
use mpg_common::Amount;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::Serialize;
use serde_json::json;

use crate::{
    config::AirtelMoneyConfig,
    data_objects::{
        AccessToken,
        AirtelPaymentRequest,
        AirtelPaymentTransaction,
        AirtelResponse,
        AirtelSubscriber,
        AirtelTransactionData,
    },
    helpers::{local_msisdn, TokenCache},
    MobileMoneyApiError,
};

#[derive(Clone)]
pub struct AirtelMoneyApi {
    config: AirtelMoneyConfig,
    client: Arc<Client>,
    token: TokenCache,
}

impl AirtelMoneyApi {
    pub fn new(config: AirtelMoneyConfig) -> Result<Self, MobileMoneyApiError> {
        let mut headers = HeaderMap::with_capacity(4);
        let country =
            HeaderValue::from_str(&config.country).map_err(|e| MobileMoneyApiError::Initialization(e.to_string()))?;
        let currency =
            HeaderValue::from_str(&config.currency).map_err(|e| MobileMoneyApiError::Initialization(e.to_string()))?;
        headers.insert("X-Country", country);
        headers.insert("X-Currency", currency);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("*/*"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MobileMoneyApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: TokenCache::default() })
    }

    pub fn config(&self) -> &AirtelMoneyConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn access_token(&self) -> Result<String, MobileMoneyApiError> {
        if let Some(token) = self.token.get().await {
            return Ok(token);
        }
        debug!("🔑️ Requesting a new Airtel Money token");
        let body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret.reveal(),
            "grant_type": "client_credentials",
        });
        let response = self.client.post(self.url("/auth/oauth2/token")).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("🔑️ Airtel Money token request failed. {status}: {message}");
            return Err(MobileMoneyApiError::AuthenticationError(format!("{status}: {message}")));
        }
        let token = response.json::<AccessToken>().await?;
        self.token.set(token.access_token.clone(), token.expires_in_secs()).await;
        trace!("🔑️ New Airtel Money token cached for {}s", token.expires_in_secs());
        Ok(token.access_token)
    }

    /// Sends an authorized request and unwraps Airtel's response envelope. Airtel reports business failures with
    /// HTTP 200 and `status.success = false`, so both layers are checked.
    pub async fn rest_query<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<AirtelResponse, MobileMoneyApiError> {
        let token = self.access_token().await?;
        let url = self.url(path);
        trace!("Sending Airtel Money request: {method} {url}");
        let mut req = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await?;
            return Err(MobileMoneyApiError::QueryError { status, message });
        }
        let result =
            response.json::<AirtelResponse>().await.map_err(|e| MobileMoneyApiError::JsonError(e.to_string()))?;
        if !result.status.success {
            let code = result.status.response_code.clone().or_else(|| result.status.code.clone()).unwrap_or_default();
            let message = result.status.message.clone().unwrap_or_default();
            return Err(MobileMoneyApiError::Rejected(format!("{code} {message}").trim().to_string()));
        }
        Ok(result)
    }

    /// Pushes a USSD payment prompt to the subscriber. `transaction_id` is our identifier for the payment and is what
    /// Airtel echoes back in enquiries and callbacks.
    pub async fn initiate_payment(
        &self,
        transaction_id: &str,
        phone_number: &str,
        amount: Amount,
        reference: &str,
    ) -> Result<AirtelTransactionData, MobileMoneyApiError> {
        let body = AirtelPaymentRequest {
            reference: reference.to_string(),
            subscriber: AirtelSubscriber {
                country: self.config.country.clone(),
                currency: self.config.currency.clone(),
                msisdn: local_msisdn(phone_number, &self.config.dial_code),
            },
            transaction: AirtelPaymentTransaction {
                amount: amount.to_major_string(),
                country: self.config.country.clone(),
                currency: self.config.currency.clone(),
                id: transaction_id.to_string(),
            },
        };
        debug!("📲️ Sending Airtel Money payment {transaction_id} for {amount} {}", self.config.currency);
        let result = self.rest_query(Method::POST, "/merchant/v2/payments/", Some(body)).await?;
        info!("📲️ Airtel Money accepted payment {transaction_id}");
        Ok(result.data.transaction)
    }

    pub async fn payment_status(&self, transaction_id: &str) -> Result<AirtelTransactionData, MobileMoneyApiError> {
        let path = format!("/standard/v1/payments/{transaction_id}");
        let result = self.rest_query::<()>(Method::GET, &path, None).await?;
        debug!(
            "📲️ Airtel Money payment {transaction_id} is {}",
            result.data.transaction.status.as_deref().unwrap_or("unknown")
        );
        Ok(result.data.transaction)
    }

    /// Refunds a successful payment. Airtel identifies the payment by its own `airtel_money_id`, which is looked up
    /// first.
    pub async fn refund(&self, transaction_id: &str) -> Result<AirtelTransactionData, MobileMoneyApiError> {
        let payment = self.payment_status(transaction_id).await?;
        let airtel_money_id = payment.airtel_money_id.filter(|s| !s.is_empty()).ok_or_else(|| {
            MobileMoneyApiError::Rejected(format!("Payment {transaction_id} has no Airtel Money id to refund"))
        })?;
        let body = json!({ "transaction": { "airtel_money_id": airtel_money_id } });
        debug!("💸️ Requesting Airtel Money refund of {transaction_id} ({airtel_money_id})");
        let result = self.rest_query(Method::POST, "/standard/v1/payments/refund", Some(body)).await?;
        info!("💸️ Airtel Money accepted refund of {transaction_id}");
        Ok(result.data.transaction)
    }
}
