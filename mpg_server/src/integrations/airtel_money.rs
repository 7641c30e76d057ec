use async_trait::async_trait;
use log::*;
use mobile_money_tools::{AirtelMoneyApi, AirtelMoneyConfig, MobileMoneyApiError};
use mpg_common::Amount;
use mpg_engine::{GatewayError, GatewayRequest, GatewayResponse, PaymentGateway};

use crate::integrations::gateway_error;

/// Collects payments with Airtel Money USSD push. The engine's provider reference is sent as the Airtel transaction id,
/// which Airtel echoes back in enquiries and callbacks.
#[derive(Clone)]
pub struct AirtelMoneyGateway {
    api: AirtelMoneyApi,
}

impl AirtelMoneyGateway {
    pub fn new(config: AirtelMoneyConfig) -> Result<Self, MobileMoneyApiError> {
        let api = AirtelMoneyApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &AirtelMoneyApi {
        &self.api
    }
}

#[async_trait]
impl PaymentGateway for AirtelMoneyGateway {
    async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let phone = request.validate_mobile_money()?;
        let data = self
            .api
            .initiate_payment(&request.provider_ref, phone, request.amount, &request.reference)
            .await
            .map_err(gateway_error)?;
        if let Some(id) = data.id.as_deref().filter(|id| !id.is_empty() && *id != request.provider_ref) {
            let (tx_id, expected) = (&request.transaction_id, &request.provider_ref);
            warn!("📲️ Airtel returned id {id} for {tx_id}. Callbacks are expected to use {expected}");
        }
        // Debit Pending
        let status = data.status.unwrap_or_else(|| "DP".to_string());
        let message = data.message.unwrap_or_else(|| "Payment prompt sent to the payer".to_string());
        Ok(GatewayResponse::new(request.provider_ref.as_str(), status, message))
    }

    async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError> {
        let data = self.api.payment_status(provider_ref).await.map_err(gateway_error)?;
        Ok(GatewayResponse::new(provider_ref, data.status.unwrap_or_default(), data.message.unwrap_or_default()))
    }

    async fn refund(&self, provider_ref: &str, amount: Amount) -> Result<GatewayResponse, GatewayError> {
        let data = self.api.refund(provider_ref).await.map_err(gateway_error)?;
        let refund_ref = data.airtel_money_id.or(data.id).unwrap_or_else(|| provider_ref.to_string());
        let currency = &self.api.config().currency;
        let message =
            data.message.unwrap_or_else(|| format!("Refund of {amount} {currency} initiated for {provider_ref}"));
        Ok(GatewayResponse::new(refund_ref, data.status.unwrap_or_else(|| "TS".to_string()), message))
    }
}
