use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use mpg_engine::{
    db_types::{Amount, Provider, ReferenceType, TransactionStatus},
    GatewayError,
    GatewayResponse,
    InitiatePaymentRequest,
    PaymentFlowApi,
    SqliteDatabase,
};

use super::{
    helpers::{registry_with, test_api},
    mocks::{accepting_gateway, MockGateway},
};
use crate::{
    config::ReconciliationConfig,
    reconciliation_worker::{reconcile_batch, sweep},
};

async fn subscription_payment(api: &PaymentFlowApi<SqliteDatabase>, reference: &str) -> String {
    let req =
        InitiatePaymentRequest::new(ReferenceType::Subscription, reference, Provider::MtnMomo, Amount::from(990))
            .with_phone_number("260961234567");
    api.initiate(req).await.expect("initiate").id
}

fn eager_sweep(max_retries: i64) -> ReconciliationConfig {
    ReconciliationConfig { min_age: Duration::ZERO, max_retries, ..Default::default() }
}

#[actix_web::test]
async fn batch_settles_what_it_can() {
    // Remembers the reference of each payment, in the order they were initiated
    let refs = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut gateway = MockGateway::new();
    let seen = Arc::clone(&refs);
    gateway.expect_initiate().times(3).returning(move |r| {
        seen.lock().unwrap().push(r.provider_ref.clone());
        Ok(GatewayResponse::new(r.provider_ref.clone(), "PENDING", ""))
    });
    let seen = Arc::clone(&refs);
    gateway.expect_verify().times(3).returning(move |r| {
        let position = seen.lock().unwrap().iter().position(|p| p == r);
        match position {
            Some(0) => Ok(GatewayResponse::new(r, "SUCCESSFUL", "")),
            Some(1) => Ok(GatewayResponse::new(r, "PENDING", "")),
            _ => Err(GatewayError::Timeout("operation timed out".into())),
        }
    });
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    for i in 1..=3 {
        subscription_payment(&api, &format!("sub-{i}")).await;
    }
    let mut batch = Vec::new();
    for i in 1..=3 {
        batch.extend(api.list_by_reference(ReferenceType::Subscription, &format!("sub-{i}")).await.expect("list"));
    }
    assert_eq!(batch.len(), 3);

    let settled = reconcile_batch(&api, &batch).await;
    assert_eq!(settled, 1);
    let statuses = futures::future::join_all(batch.iter().map(|tx| api.fetch(&tx.id))).await;
    let statuses = statuses.into_iter().map(|r| r.expect("fetch")).collect::<Vec<_>>();
    assert_eq!(statuses[0].status, TransactionStatus::Completed);
    assert_eq!(statuses[1].status, TransactionStatus::Processing);
    assert_eq!(statuses[2].status, TransactionStatus::Processing);
    assert_eq!(statuses[2].retry_count, 1);
}

#[actix_web::test]
async fn sweep_stops_polling_after_max_retries() {
    let mut gateway = accepting_gateway("PENDING");
    gateway.expect_verify().times(2).returning(|_| Err(GatewayError::Provider("503 Service Unavailable".into())));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    let id = subscription_payment(&api, "sub-retry").await;

    let config = eager_sweep(2);
    for _ in 0..4 {
        assert_eq!(sweep(&api, &config).await.expect("sweep"), 0);
    }
    let tx = api.fetch(&id).await.expect("transaction");
    assert_eq!(tx.retry_count, 2);
    assert_eq!(tx.status, TransactionStatus::Processing);
    assert_eq!(tx.last_error.as_deref(), Some("Provider error. 503 Service Unavailable"));
}

#[actix_web::test]
async fn sweep_settles_a_timed_out_initiation() {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate().times(1).returning(|_| Err(GatewayError::Timeout("operation timed out".into())));
    gateway.expect_verify().times(1).returning(|r| Ok(GatewayResponse::new(r, "SUCCESSFUL", "")));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    let req = InitiatePaymentRequest::new(ReferenceType::Subscription, "sub-lost", Provider::MtnMomo, Amount::from(5))
        .with_phone_number("260961234567");
    assert!(api.initiate(req).await.is_err());
    let pending = api.list_by_reference(ReferenceType::Subscription, "sub-lost").await.expect("list").remove(0);
    assert_eq!(pending.status, TransactionStatus::Pending);

    assert_eq!(sweep(&api, &eager_sweep(10)).await.expect("sweep"), 1);
    assert_eq!(api.fetch(&pending.id).await.expect("transaction").status, TransactionStatus::Completed);
    // Nothing is left to poll
    assert_eq!(sweep(&api, &eager_sweep(10)).await.expect("sweep"), 0);
}
