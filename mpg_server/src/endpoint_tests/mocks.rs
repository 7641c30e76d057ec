use async_trait::async_trait;
use mockall::mock;
use mpg_common::Amount;
use mpg_engine::{GatewayError, GatewayRequest, GatewayResponse, PaymentGateway};

mock! {
    pub Gateway {}
    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
        async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError>;
        async fn refund(&self, provider_ref: &str, amount: Amount) -> Result<GatewayResponse, GatewayError>;
    }
}

/// A gateway that accepts every payment under the reference it was given and reports `status`.
pub fn accepting_gateway(status: &'static str) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate().returning(move |r| Ok(GatewayResponse::new(r.provider_ref.clone(), status, "accepted")));
    gateway
}
