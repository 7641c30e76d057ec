use actix_web::{http::StatusCode, test::TestRequest};
use mpg_common::Secret;
use mpg_engine::{
    db_types::{Provider, TransactionStatus},
    GatewayRegistry,
    PaymentFlowApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::{
    helpers::{json, registry_with, send, send_with_hmac, test_api},
    mocks::accepting_gateway,
};
use crate::{config::WebhookHmacConfig, helpers::calculate_hmac};

/// Initiates a payment and returns its id and provider reference.
async fn initiate(api: &PaymentFlowApi<SqliteDatabase>, provider: &str) -> (String, String) {
    let body = json!({
        "reference_type": "ORDER",
        "reference_id": "order-55",
        "provider": provider,
        "amount": 1200,
        "phone_number": "260971234567"
    });
    let (status, body) = send(api, TestRequest::post().uri("/api/v1/payments").set_json(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let tx = json(&body);
    (tx["id"].as_str().expect("id").to_string(), tx["provider_ref"].as_str().expect("provider_ref").to_string())
}

fn mtn_callback(reference_id: &str, external_id: &str, status: &str) -> Value {
    json!({
        "financialTransactionId": "23503452",
        "externalId": external_id,
        "referenceId": reference_id,
        "amount": "12",
        "currency": "ZMW",
        "payer": { "partyIdType": "MSISDN", "partyId": "260971234567" },
        "status": status
    })
}

fn post(uri: &str, body: Value) -> TestRequest {
    TestRequest::post().uri(uri).set_json(body)
}

#[actix_web::test]
async fn mtn_webhook_completes_the_payment() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let (id, reference) = initiate(&api, "MTN_MOMO").await;

    let callback = mtn_callback(&reference, &id, "SUCCESSFUL");
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"status": "processed", "transaction_id": id}));

    let tx = api.fetch(&id).await.expect("transaction");
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.provider_status.as_deref(), Some("SUCCESSFUL"));
    assert!(tx.webhook_received_at.is_some());
    let stored = tx.webhook_payload.expect("payload").0;
    assert_eq!(stored["financialTransactionId"], "23503452");

    // Redelivery is harmless
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "processed");
    assert_eq!(api.fetch(&id).await.expect("transaction").status, TransactionStatus::Completed);
}

#[actix_web::test]
async fn mtn_webhook_without_a_reference_id_matches_the_external_id() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let (id, _) = initiate(&api, "MTN_MOMO").await;

    let callback = json!({"externalId": id, "financialTransactionId": "999", "status": "SUCCESSFUL"});
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"status": "processed", "transaction_id": id}));
    assert_eq!(api.fetch(&id).await.expect("transaction").status, TransactionStatus::Completed);

    // An unknown referenceId does not hide a matching externalId
    let (other, _) = initiate(&api, "MTN_MOMO").await;
    let callback = mtn_callback("stranger", &other, "FAILED");
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["transaction_id"], other.as_str());
    assert_eq!(api.fetch(&other).await.expect("transaction").status, TransactionStatus::Failed);
}

#[actix_web::test]
async fn late_failure_does_not_undo_a_completed_payment() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let (id, reference) = initiate(&api, "MTN_MOMO").await;
    let _ = send(&api, post("/api/v1/webhooks/mtn-momo", mtn_callback(&reference, &id, "SUCCESSFUL"))).await;
    let (status, _) = send(&api, post("/api/v1/webhooks/mtn-momo", mtn_callback(&reference, &id, "FAILED"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(api.fetch(&id).await.expect("transaction").status, TransactionStatus::Completed);
}

#[actix_web::test]
async fn unmatched_webhooks_are_acknowledged_but_ignored() {
    let api = test_api(GatewayRegistry::new()).await;
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", mtn_callback("nobody", "", "SUCCESSFUL"))).await;
    assert_eq!(status, StatusCode::OK);
    let ack = json(&body);
    assert_eq!(ack["status"], "ignored");
    assert_eq!(ack["reason"], "No MTN_MOMO transaction with reference nobody");

    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", json!({"status": "SUCCESSFUL"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ignored");

    let (status, body) = send(&api, post("/api/v1/webhooks/airtel-money", json!({"transaction": {}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ignored");
}

#[actix_web::test]
async fn only_bodies_that_are_not_json_are_bad_requests() {
    let api = test_api(GatewayRegistry::new()).await;
    for uri in ["/api/v1/webhooks/mtn-momo", "/api/v1/webhooks/airtel-money"] {
        let (status, _) = send(&api, TestRequest::post().uri(uri).set_payload("<xml/>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Valid JSON in a shape we don't know is acknowledged, so the provider stops redelivering it
        let (status, body) = send(&api, post(uri, json!("SUCCESSFUL"))).await;
        assert_eq!(status, StatusCode::OK);
        let ack = json(&body);
        assert_eq!(ack["status"], "ignored");
        assert!(ack["reason"].as_str().expect("reason").starts_with("Unrecognised"), "{ack}");
    }
}

#[actix_web::test]
async fn loosely_typed_mtn_callbacks_are_still_reconciled() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let (id, reference) = initiate(&api, "MTN_MOMO").await;

    // A null status is no status. The payload is still stored.
    let callback = json!({"referenceId": reference, "status": null});
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "processed");
    let tx = api.fetch(&id).await.expect("transaction");
    assert_eq!(tx.status, TransactionStatus::Processing);
    assert!(tx.webhook_received_at.is_some());

    // Numeric identifiers are read as text
    let callback = json!({"referenceId": 12345, "financialTransactionId": 987, "status": "SUCCESSFUL"});
    let (status, body) = send(&api, post("/api/v1/webhooks/mtn-momo", callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["reason"], "No MTN_MOMO transaction with reference 12345");
}

#[actix_web::test]
async fn airtel_webhook_in_both_shapes() {
    let api = test_api(registry_with(Provider::AirtelMoney, accepting_gateway("DP"))).await;

    // Airtel echoes back the id it was sent, which is the provider reference
    let (paid, reference) = initiate(&api, "AIRTEL_MONEY").await;
    let wrapped = json!({
        "transaction": {
            "id": reference,
            "message": "Paid",
            "status_code": "TS",
            "airtel_money_id": "MP210603.1234.L06941"
        }
    });
    let (status, body) = send(&api, post("/api/v1/webhooks/airtel-money", wrapped)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["transaction_id"], paid.as_str());
    assert_eq!(api.fetch(&paid).await.expect("transaction").status, TransactionStatus::Completed);

    // Our transaction id works too
    let (declined, _) = initiate(&api, "AIRTEL_MONEY").await;
    let flat = json!({"id": declined, "status": "TF", "message": "Insufficient funds"});
    let (status, _) = send(&api, post("/api/v1/webhooks/airtel-money", flat)).await;
    assert_eq!(status, StatusCode::OK);
    let tx = api.fetch(&declined).await.expect("transaction");
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(tx.provider_status.as_deref(), Some("TF"));
}

#[actix_web::test]
async fn airtel_webhook_with_status_and_status_code() {
    let api = test_api(registry_with(Provider::AirtelMoney, accepting_gateway("DP"))).await;
    let (id, reference) = initiate(&api, "AIRTEL_MONEY").await;
    let both = json!({"transaction": {"id": reference, "status": "TS", "status_code": "200"}});
    let (status, body) = send(&api, post("/api/v1/webhooks/airtel-money", both)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!({"status": "processed", "transaction_id": id}));
    let tx = api.fetch(&id).await.expect("transaction");
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.provider_status.as_deref(), Some("TS"));
}

#[actix_web::test]
async fn signed_webhooks() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let (id, reference) = initiate(&api, "MTN_MOMO").await;
    let hmac = WebhookHmacConfig {
        header: "X-Callback-Signature".into(),
        secret: Secret::new("callback-secret".to_string()),
        enabled: true,
    };
    let body = mtn_callback(&reference, &id, "SUCCESSFUL").to_string();

    let unsigned = TestRequest::post().uri("/api/v1/webhooks/mtn-momo").set_payload(body.clone());
    let (status, res) = send_with_hmac(&api, unsigned, &hmac).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&res)["error"], "Webhook signature rejected. No MTN_MOMO signature found in X-Callback-Signature");
    assert_eq!(api.fetch(&id).await.expect("transaction").status, TransactionStatus::Processing);

    let signature = calculate_hmac("callback-secret", body.as_bytes());
    let signed = TestRequest::post()
        .uri("/api/v1/webhooks/mtn-momo")
        .insert_header(("X-Callback-Signature", signature))
        .set_payload(body);
    let (status, body) = send_with_hmac(&api, signed, &hmac).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "processed");
    assert_eq!(api.fetch(&id).await.expect("transaction").status, TransactionStatus::Completed);

    // Payment routes are not signed
    let (status, _) = send_with_hmac(&api, TestRequest::get().uri(&format!("/api/v1/payments/{id}")), &hmac).await;
    assert_eq!(status, StatusCode::OK);
}
