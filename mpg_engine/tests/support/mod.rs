#![allow(dead_code)]

use async_trait::async_trait;
use log::*;
use mockall::mock;
use mpg_engine::{
    db_types::{Amount, Provider, ReferenceType},
    events::EventProducers,
    GatewayError,
    GatewayRegistry,
    GatewayRequest,
    GatewayResponse,
    InitiatePaymentRequest,
    PaymentFlowApi,
    PaymentGateway,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

mock! {
    pub Gateway {}
    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn initiate(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
        async fn verify(&self, provider_ref: &str) -> Result<GatewayResponse, GatewayError>;
        async fn refund(&self, provider_ref: &str, amount: Amount) -> Result<GatewayResponse, GatewayError>;
    }
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/mpg_engine_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Could not drop {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn setup(gateways: GatewayRegistry) -> PaymentFlowApi<SqliteDatabase> {
    setup_with_producers(gateways, EventProducers::default()).await
}

pub async fn setup_with_producers(
    gateways: GatewayRegistry,
    producers: EventProducers,
) -> PaymentFlowApi<SqliteDatabase> {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    PaymentFlowApi::new(db, gateways, producers)
}

pub async fn tear_down(mut api: PaymentFlowApi<SqliteDatabase>) {
    use mpg_engine::PaymentTransactionStore;
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    let _ = Sqlite::drop_database(&url).await;
}

pub fn registry_with(provider: Provider, gateway: MockGateway) -> GatewayRegistry {
    let mut registry = GatewayRegistry::new();
    registry.register(provider, gateway);
    registry
}

pub fn mtn_request(reference_id: &str, amount: i64) -> InitiatePaymentRequest {
    InitiatePaymentRequest::new(ReferenceType::Order, reference_id, Provider::MtnMomo, Amount::from(amount))
        .with_phone_number("260961234567")
}

pub fn accepted(request: &GatewayRequest, status: &str) -> Result<GatewayResponse, GatewayError> {
    Ok(GatewayResponse::new(request.provider_ref.clone(), status, "accepted"))
}

pub fn airtel_request(reference_id: &str, amount: i64) -> InitiatePaymentRequest {
    InitiatePaymentRequest::new(ReferenceType::Order, reference_id, Provider::AirtelMoney, Amount::from(amount))
        .with_phone_number("0971234567")
}
