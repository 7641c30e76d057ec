use async_trait::async_trait;
use log::*;
use mobile_money_tools::{MobileMoneyApiError, MtnMomoApi, MtnMomoConfig};
use mpg_common::Amount;
use mpg_engine::{GatewayError, GatewayRequest, GatewayResponse, PaymentGateway};

use crate::integrations::gateway_error;

/// Collects payments with MTN MoMo request-to-pay. The engine's provider reference is sent as the `X-Reference-Id`, and
/// the transaction id as the `externalId`.
#[derive(Clone)]
pub struct MtnMomoGateway {
    api: MtnMomoApi,
}

impl MtnMomoGateway {
    pub fn new(config: MtnMomoConfig) -> Result<Self, MobileMoneyApiError> {
        let api = MtnMomoApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &MtnMomoApi {
        &self.api
    }
}

#[async_trait]
impl PaymentGateway for MtnMomoGateway {
    async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let phone = request.validate_mobile_money()?;
        let message = request.description.as_deref().unwrap_or(request.reference.as_str());
        let reference_id = request.provider_ref.as_str();
        trace!("📲️ Requesting MTN MoMo payment for {} as {reference_id}", request.transaction_id);
        self.api
            .request_to_pay(reference_id, phone, request.amount, &request.currency, &request.transaction_id, message)
            .await
            .map_err(gateway_error)?;
        Ok(GatewayResponse::new(reference_id, "PENDING", "Payment prompt sent to the payer"))
    }

    async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError> {
        let status = self.api.request_to_pay_status(provider_ref).await.map_err(gateway_error)?;
        let message = status.reason.map(|r| r.to_string()).unwrap_or_default();
        Ok(GatewayResponse::new(provider_ref, status.status, message))
    }

    async fn refund(&self, provider_ref: &str, amount: Amount) -> Result<GatewayResponse, GatewayError> {
        let currency = self.api.config().currency.clone();
        let refund_ref = self.api.refund(provider_ref, amount, &currency).await.map_err(gateway_error)?;
        let message = format!("Refund of {amount} {currency} initiated for {provider_ref}");
        Ok(GatewayResponse::new(refund_ref, "SUCCESSFUL", message))
    }
}
