use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;

use crate::{db_types::Provider, gateways::PaymentGateway};

/// Maps each provider to the adapter that handles it. Built once at start-up and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<Provider, Arc<dyn PaymentGateway>>,
}

impl Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers = self.providers();
        providers.sort_by_key(|p| p.as_str());
        write!(f, "GatewayRegistry({providers:?})")
    }
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: PaymentGateway + 'static>(&mut self, provider: Provider, gateway: G) -> &mut Self {
        self.register_arc(provider, Arc::new(gateway))
    }

    pub fn register_arc(&mut self, provider: Provider, gateway: Arc<dyn PaymentGateway>) -> &mut Self {
        if self.gateways.insert(provider, gateway).is_some() {
            warn!("🔌️ Gateway for {provider} was already registered. It has been replaced.");
        } else {
            info!("🔌️ Gateway for {provider} registered");
        }
        self
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.gateways.keys().copied().collect()
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use mpg_common::Amount;

    use super::*;
    use crate::gateways::{GatewayError, GatewayRequest, GatewayResponse};

    struct Echo;

    #[async_trait]
    impl PaymentGateway for Echo {
        async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::new(request.provider_ref.as_str(), "PENDING", "ok"))
        }

        async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::new(provider_ref, "SUCCESSFUL", "ok"))
        }

        async fn refund(&self, provider_ref: &str, _: Amount) -> Result<GatewayResponse, GatewayError> {
            Ok(GatewayResponse::new(provider_ref, "SUCCESSFUL", "ok"))
        }
    }

    #[tokio::test]
    async fn lookup_by_provider() {
        let mut registry = GatewayRegistry::new();
        registry.register(Provider::MtnMomo, Echo);
        assert!(registry.get(Provider::AirtelMoney).is_none());
        assert!(registry.get(Provider::Card).is_none());
        let gateway = registry.get(Provider::MtnMomo).unwrap();
        let res = gateway.verify("abc").await.unwrap();
        assert_eq!(res.provider_ref, "abc");
        assert_eq!(format!("{registry:?}"), "GatewayRegistry([MtnMomo])");
    }
}
