use std::{fmt::Display, sync::Arc};

use log::*;
use mpg_common::{Amount, Secret};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    RequestBuilder,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::MtnMomoConfig,
    data_objects::{AccessToken, MtnParty, MtnRefund, RequestToPay, RequestToPayStatus},
    helpers::{new_reference_id, TokenCache},
    MobileMoneyApiError,
};

/// MTN splits its Open API into products, each with its own subscription key and token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtnProduct {
    Collection,
    Disbursement,
}

impl MtnProduct {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Disbursement => "disbursement",
        }
    }
}

impl Display for MtnProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone)]
pub struct MtnMomoApi {
    config: MtnMomoConfig,
    client: Arc<Client>,
    collection_token: TokenCache,
    disbursement_token: TokenCache,
}

impl MtnMomoApi {
    pub fn new(config: MtnMomoConfig) -> Result<Self, MobileMoneyApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.target_environment.as_str())
            .map_err(|e| MobileMoneyApiError::Initialization(e.to_string()))?;
        headers.insert("X-Target-Environment", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MobileMoneyApiError::Initialization(e.to_string()))?;
        Ok(Self {
            config,
            client: Arc::new(client),
            collection_token: TokenCache::default(),
            disbursement_token: TokenCache::default(),
        })
    }

    pub fn config(&self) -> &MtnMomoConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn subscription_key(&self, product: MtnProduct) -> &Secret<String> {
        match product {
            MtnProduct::Collection => &self.config.collection_subscription_key,
            MtnProduct::Disbursement => &self.config.disbursement_subscription_key,
        }
    }

    fn token_cache(&self, product: MtnProduct) -> &TokenCache {
        match product {
            MtnProduct::Collection => &self.collection_token,
            MtnProduct::Disbursement => &self.disbursement_token,
        }
    }

    /// Returns a cached bearer token for the product, or exchanges the API user and key for a new one.
    pub async fn access_token(&self, product: MtnProduct) -> Result<String, MobileMoneyApiError> {
        let cache = self.token_cache(product);
        if let Some(token) = cache.get().await {
            return Ok(token);
        }
        debug!("🔑️ Requesting a new MTN MoMo {product} token");
        let url = self.url(&format!("/{}/token/", product.path()));
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.api_user, Some(self.config.api_key.reveal()))
            .header("Ocp-Apim-Subscription-Key", self.subscription_key(product).reveal())
            .header("Content-Length", "0")
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("🔑️ MTN MoMo {product} token request failed. {status}: {message}");
            return Err(MobileMoneyApiError::AuthenticationError(format!("{status}: {message}")));
        }
        let token = response.json::<AccessToken>().await?;
        cache.set(token.access_token.clone(), token.expires_in_secs()).await;
        trace!("🔑️ New MTN MoMo {product} token cached for {}s", token.expires_in_secs());
        Ok(token.access_token)
    }

    async fn authorized(
        &self,
        product: MtnProduct,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, MobileMoneyApiError> {
        let token = self.access_token(product).await?;
        let url = self.url(path);
        trace!("Sending MTN MoMo request: {method} {url}");
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Ocp-Apim-Subscription-Key", self.subscription_key(product).reveal()))
    }

    /// MTN acknowledges commands with `202 Accepted` and an empty body. The outcome is fetched separately.
    async fn send_command<B: Serialize>(&self, req: RequestBuilder, body: &B) -> Result<(), MobileMoneyApiError> {
        let response = req.json(body).send().await?;
        match response.status() {
            StatusCode::ACCEPTED | StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => {
                let message = response.text().await.unwrap_or_default();
                Err(MobileMoneyApiError::Rejected(format!("Duplicate reference id. {message}")))
            },
            s => {
                let message = response.text().await?;
                Err(MobileMoneyApiError::QueryError { status: s.as_u16(), message })
            },
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, MobileMoneyApiError> {
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("MTN MoMo query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MobileMoneyApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(MobileMoneyApiError::QueryError { status, message })
        }
    }

    /// Asks the payer to approve a debit on their handset. `reference_id` becomes the `X-Reference-Id` that identifies
    /// the request in all later calls and callbacks. It must be a UUID v4 that has not been used before; see
    /// [`new_reference_id`].
    pub async fn request_to_pay(
        &self,
        reference_id: &str,
        phone_number: &str,
        amount: Amount,
        currency: &str,
        external_id: &str,
        message: &str,
    ) -> Result<(), MobileMoneyApiError> {
        let body = RequestToPay {
            amount: amount.to_major_string(),
            currency: currency.to_string(),
            external_id: external_id.to_string(),
            payer: MtnParty::msisdn(phone_number),
            payer_message: message.to_string(),
            payee_note: message.to_string(),
        };
        let mut req =
            self.authorized(MtnProduct::Collection, Method::POST, "/collection/v1_0/requesttopay").await?;
        req = req.header("X-Reference-Id", reference_id);
        if let Some(callback) = &self.config.callback_url {
            req = req.header("X-Callback-Url", callback.as_str());
        }
        debug!("📲️ Sending MTN MoMo request-to-pay {reference_id} for {amount} {currency}");
        self.send_command(req, &body).await?;
        info!("📲️ MTN MoMo accepted request-to-pay {reference_id}");
        Ok(())
    }

    pub async fn request_to_pay_status(&self, reference_id: &str) -> Result<RequestToPayStatus, MobileMoneyApiError> {
        let path = format!("/collection/v1_0/requesttopay/{reference_id}");
        let req = self.authorized(MtnProduct::Collection, Method::GET, &path).await?;
        let status = self.fetch::<RequestToPayStatus>(req).await?;
        debug!("📲️ MTN MoMo request-to-pay {reference_id} is {}", status.status);
        Ok(status)
    }

    /// Refunds a completed request-to-pay through the disbursement product. Returns the reference id of the refund.
    pub async fn refund(
        &self,
        reference_id_to_refund: &str,
        amount: Amount,
        currency: &str,
    ) -> Result<String, MobileMoneyApiError> {
        let reference_id = new_reference_id();
        let body = MtnRefund {
            amount: amount.to_major_string(),
            currency: currency.to_string(),
            external_id: reference_id_to_refund.to_string(),
            payer_message: format!("Refund of {reference_id_to_refund}"),
            payee_note: format!("Refund of {reference_id_to_refund}"),
            reference_id_to_refund: reference_id_to_refund.to_string(),
        };
        let mut req = self.authorized(MtnProduct::Disbursement, Method::POST, "/disbursement/v2_0/refund").await?;
        req = req.header("X-Reference-Id", reference_id.as_str());
        if let Some(callback) = &self.config.callback_url {
            req = req.header("X-Callback-Url", callback.as_str());
        }
        debug!("💸️ Requesting MTN MoMo refund of {amount} {currency} for {reference_id_to_refund}");
        self.send_command(req, &body).await?;
        info!("💸️ MTN MoMo accepted refund {reference_id} for {reference_id_to_refund}");
        Ok(reference_id)
    }
}
