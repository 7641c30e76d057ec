use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use mpg_engine::{
    db_types::Provider,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    GatewayRegistry,
    PaymentFlowApi,
    SqliteDatabase,
};
use serde_json::Value;

use crate::{config::WebhookHmacConfig, endpoint_tests::mocks::MockGateway, routes::health, server::configure_api};

pub async fn test_api(gateways: GatewayRegistry) -> PaymentFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    PaymentFlowApi::new(db, gateways, EventProducers::default())
}

pub fn registry_with(provider: Provider, gateway: MockGateway) -> GatewayRegistry {
    let mut registry = GatewayRegistry::new();
    registry.register(provider, gateway);
    registry
}

/// Sends `req` to an app with the full API mounted and webhook signature checks switched off.
pub async fn send(api: &PaymentFlowApi<SqliteDatabase>, req: TestRequest) -> (StatusCode, String) {
    let no_hmac = WebhookHmacConfig::disabled("X-Signature");
    send_with_hmac(api, req, &no_hmac).await
}

pub async fn send_with_hmac(
    api: &PaymentFlowApi<SqliteDatabase>,
    req: TestRequest,
    hmac: &WebhookHmacConfig,
) -> (StatusCode, String) {
    let app = App::new()
        .app_data(web::Data::new(api.clone()))
        .service(health)
        .configure(|cfg| configure_api::<SqliteDatabase>(cfg, hmac, hmac));
    let service = test::init_service(app).await;
    debug!("🚀️ Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = actix_web::body::to_bytes(res.into_body()).await.map(|b| b.to_vec()).unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON. {e}: {body}"))
}
