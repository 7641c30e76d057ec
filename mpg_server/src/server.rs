use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use futures::FutureExt;
use log::*;
use mpg_engine::{
    db_types::Provider,
    events::{EventHandlers, EventHooks, EventProducers, PaymentStatusChangedEvent},
    GatewayRegistry,
    PaymentFlowApi,
    PaymentTransactionStore,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, WebhookHmacConfig},
    errors::ServerError,
    integrations::{AirtelMoneyGateway, MtnMomoGateway},
    middleware::WebhookSignatureFactory,
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        AirtelMoneyWebhookRoute,
        InitiatePaymentRoute,
        MtnMomoWebhookRoute,
        PaymentByIdRoute,
        PaymentsForReferenceRoute,
        PaymentsForVendorRoute,
        RefundPaymentRoute,
        VerifyPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateways = build_gateway_registry(&config)?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.reconciliation.enabled {
        let api = PaymentFlowApi::new(db.clone(), gateways.clone(), producers.clone());
        let _worker = start_reconciliation_worker(api, config.reconciliation.clone());
    }
    let srv = create_server_instance(config, db, gateways, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateways: GatewayRegistry,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone(), gateways.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mpg::access_log"))
            .app_data(web::Data::new(payments_api))
            .service(health)
            .configure(|cfg| {
                configure_api::<SqliteDatabase>(cfg, &config.mtn_webhook_hmac, &config.airtel_webhook_hmac)
            })
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the `/api/v1` routes. The app must supply a `web::Data<PaymentFlowApi<B>>`.
///
/// Each provider's webhook gets its own signature check, since the providers sign with different secrets.
pub fn configure_api<B: PaymentTransactionStore + 'static>(
    cfg: &mut ServiceConfig,
    mtn_hmac: &WebhookHmacConfig,
    airtel_hmac: &WebhookHmacConfig,
) {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ServerError::CouldNotDeserializePayload(err.to_string()).into());
    let webhooks = web::scope("/webhooks")
        .service(
            web::scope("/mtn-momo")
                .wrap(WebhookSignatureFactory::new(Provider::MtnMomo, mtn_hmac))
                .service(MtnMomoWebhookRoute::<B>::new()),
        )
        .service(
            web::scope("/airtel-money")
                .wrap(WebhookSignatureFactory::new(Provider::AirtelMoney, airtel_hmac))
                .service(AirtelMoneyWebhookRoute::<B>::new()),
        );
    let api = web::scope("/api/v1")
        .app_data(json_config)
        .service(webhooks)
        .service(InitiatePaymentRoute::<B>::new())
        .service(PaymentsForReferenceRoute::<B>::new())
        .service(PaymentsForVendorRoute::<B>::new())
        .service(PaymentByIdRoute::<B>::new())
        .service(VerifyPaymentRoute::<B>::new())
        .service(RefundPaymentRoute::<B>::new());
    cfg.service(api);
}

/// Registers an adapter for every mobile money provider that has credentials configured. Payments for the others fail
/// with a "no gateway" error. Cash and card payments never need one.
pub fn build_gateway_registry(config: &ServerConfig) -> Result<GatewayRegistry, ServerError> {
    let mut registry = GatewayRegistry::new();
    if config.mtn_momo.has_credentials() {
        let gateway = MtnMomoGateway::new(config.mtn_momo.clone())
            .map_err(|e| ServerError::InitializeError(format!("Could not create the MTN MoMo client. {e}")))?;
        registry.register(Provider::MtnMomo, gateway);
    } else {
        warn!("🔌️ MTN MoMo credentials are not configured. MTN MoMo payments will be unavailable.");
    }
    if config.airtel_money.has_credentials() {
        let gateway = AirtelMoneyGateway::new(config.airtel_money.clone())
            .map_err(|e| ServerError::InitializeError(format!("Could not create the Airtel Money client. {e}")))?;
        registry.register(Provider::AirtelMoney, gateway);
    } else {
        warn!("🔌️ Airtel Money credentials are not configured. Airtel Money payments will be unavailable.");
    }
    Ok(registry)
}

fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(|ev: PaymentStatusChangedEvent| {
        async move {
            let tx = &ev.transaction;
            info!(
                "📬️ Payment {} for {}:{} moved from {} to {}",
                tx.id, tx.reference_type, tx.reference_id, ev.old_status, tx.status
            );
        }
        .boxed()
    });
    hooks
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registry_only_holds_configured_providers() {
        let config = ServerConfig::default();
        let registry = build_gateway_registry(&config).expect("registry");
        assert!(registry.get(Provider::MtnMomo).is_none());
        assert!(registry.get(Provider::AirtelMoney).is_none());

        let mut config = ServerConfig::default();
        config.airtel_money.client_id = "client".into();
        config.airtel_money.client_secret = mpg_common::Secret::new("shh".to_string());
        let registry = build_gateway_registry(&config).expect("registry");
        assert!(registry.get(Provider::AirtelMoney).is_some());
        assert!(registry.get(Provider::MtnMomo).is_none());
    }
}
