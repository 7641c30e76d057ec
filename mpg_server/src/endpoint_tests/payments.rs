use actix_web::{http::StatusCode, test::TestRequest};
use mpg_engine::{db_types::Provider, GatewayError, GatewayRegistry, GatewayResponse};
use serde_json::json;

use super::{
    helpers::{json, registry_with, send, test_api},
    mocks::{accepting_gateway, MockGateway},
};

fn cash_payment(reference_id: &str) -> serde_json::Value {
    json!({
        "reference_type": "ORDER",
        "reference_id": reference_id,
        "vendor_id": "vendor-7",
        "provider": "CASH",
        "amount": 5000
    })
}

fn mtn_payment(reference_id: &str) -> serde_json::Value {
    json!({
        "reference_type": "INVOICE",
        "reference_id": reference_id,
        "provider": "MTN_MOMO",
        "amount": 2500,
        "phone_number": "260961234567"
    })
}

#[actix_web::test]
async fn cash_payment_is_created_completed() {
    let api = test_api(GatewayRegistry::new()).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(cash_payment("order-1"));
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let tx = json(&body);
    assert_eq!(tx["status"], "COMPLETED");
    assert_eq!(tx["amount"], 5000);
    assert_eq!(tx["currency"], "ZMW");
    assert_eq!(tx["reference_type"], "ORDER");
    assert_eq!(tx["vendor_id"], "vendor-7");

    let id = tx["id"].as_str().expect("id");
    let (status, body) = send(&api, TestRequest::get().uri(&format!("/api/v1/payments/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["id"], id);
}

#[actix_web::test]
async fn mobile_money_payment_is_processing_after_initiation() {
    let api = test_api(registry_with(Provider::MtnMomo, accepting_gateway("PENDING"))).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(mtn_payment("inv-1"));
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let tx = json(&body);
    assert_eq!(tx["status"], "PROCESSING");
    assert_eq!(tx["provider_ref"].as_str().map(str::len), Some(36));
    assert_ne!(tx["provider_ref"], tx["id"]);
    assert_eq!(tx["provider_status"], "PENDING");
}

#[actix_web::test]
async fn idempotency_header_overrides_the_body() {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate().times(1).returning(|r| Ok(GatewayResponse::new(r.provider_ref.clone(), "PENDING", "")));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;

    let mut body = mtn_payment("inv-2");
    body["idempotency_key"] = json!("body-key");
    let first = TestRequest::post()
        .uri("/api/v1/payments")
        .insert_header(("Idempotency-Key", "header-key"))
        .set_json(body.clone());
    let (status, first) = send(&api, first).await;
    assert_eq!(status, StatusCode::CREATED);
    let first = json(&first);
    assert_eq!(first["idempotency_key"], "header-key");

    let retry =
        TestRequest::post().uri("/api/v1/payments").insert_header(("Idempotency-Key", "header-key")).set_json(body);
    let (status, retry) = send(&api, retry).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json(&retry)["id"], first["id"]);
}

#[actix_web::test]
async fn invalid_payment_requests_are_rejected() {
    let api = test_api(GatewayRegistry::new()).await;
    let mut body = cash_payment("order-2");
    body["amount"] = json!(0);
    let (status, res) = send(&api, TestRequest::post().uri("/api/v1/payments").set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&res)["error"].as_str().unwrap().starts_with("Invalid payment request."));

    let mut body = cash_payment("order-2");
    body["provider"] = json!("PIGEON_POST");
    let (status, res) = send(&api, TestRequest::post().uri("/api/v1/payments").set_json(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&res)["error"].as_str().unwrap().starts_with("Payload deserialization error."));

    let req = TestRequest::post()
        .uri("/api/v1/payments")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json");
    let (status, _) = send(&api, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/vendor/vendor-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!([]));
}

#[actix_web::test]
async fn unknown_payments_are_not_found() {
    let api = test_api(GatewayRegistry::new()).await;
    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/no-such-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].is_string());
    let (status, _) = send(&api, TestRequest::post().uri("/api/v1/payments/no-such-id/refund")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&api, TestRequest::post().uri("/api/v1/payments/no-such-id/verify")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unconfigured_provider_is_unavailable() {
    let api = test_api(GatewayRegistry::new()).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(mtn_payment("inv-3"));
    let (status, body) = send(&api, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["error"], "Payment provider unavailable. No gateway is configured for MTN_MOMO");

    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/reference/invoice/inv-3")).await;
    assert_eq!(status, StatusCode::OK);
    let txs = json(&body);
    assert_eq!(txs[0]["status"], "FAILED");
    assert_eq!(txs[0]["provider_status"], "NO_GATEWAY");
}

#[actix_web::test]
async fn provider_rejection_is_a_bad_gateway() {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate().returning(|_| Err(GatewayError::Provider("payer limit reached".into())));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(mtn_payment("inv-4"));
    let (status, _) = send(&api, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn timed_out_payment_can_be_verified_later() {
    let mut gateway = MockGateway::new();
    gateway.expect_initiate().times(1).returning(|_| Err(GatewayError::Timeout("operation timed out".into())));
    gateway.expect_verify().times(1).returning(|r| Ok(GatewayResponse::new(r, "SUCCESSFUL", "")));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(mtn_payment("inv-6"));
    let (status, _) = send(&api, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, body) = send(&api, TestRequest::get().uri("/api/v1/payments/reference/INVOICE/inv-6")).await;
    let tx = json(&body)[0].clone();
    assert_eq!(tx["status"], "PENDING");
    assert!(tx["provider_ref"].is_string());
    let id = tx["id"].as_str().expect("id");
    let (status, body) = send(&api, TestRequest::post().uri(&format!("/api/v1/payments/{id}/verify"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "COMPLETED");
}

#[actix_web::test]
async fn verify_and_refund() {
    let mut gateway = accepting_gateway("PENDING");
    gateway.expect_verify().times(1).returning(|r| Ok(GatewayResponse::new(r, "SUCCESSFUL", "")));
    gateway.expect_refund().times(1).returning(|_, _| Ok(GatewayResponse::new("refund-1", "SUCCESSFUL", "")));
    let api = test_api(registry_with(Provider::MtnMomo, gateway)).await;
    let req = TestRequest::post().uri("/api/v1/payments").set_json(mtn_payment("inv-5"));
    let (_, body) = send(&api, req).await;
    let id = json(&body)["id"].as_str().expect("id").to_string();

    // Not settled yet
    let (status, _) = send(&api, TestRequest::post().uri(&format!("/api/v1/payments/{id}/refund"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&api, TestRequest::post().uri(&format!("/api/v1/payments/{id}/verify"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "COMPLETED");

    let (status, body) = send(&api, TestRequest::post().uri(&format!("/api/v1/payments/{id}/refund"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "REFUNDED");

    // A second refund is not allowed
    let (status, _) = send(&api, TestRequest::post().uri(&format!("/api/v1/payments/{id}/refund"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn list_by_reference_and_vendor() {
    let api = test_api(GatewayRegistry::new()).await;
    for reference in ["order-10", "order-10", "order-11"] {
        let (status, _) =
            send(&api, TestRequest::post().uri("/api/v1/payments").set_json(cash_payment(reference))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/reference/Order/order-10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(2));

    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/reference/INVOICE/order-10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), json!([]));

    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/vendor/vendor-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(3));

    let (status, body) = send(&api, TestRequest::get().uri("/api/v1/payments/reference/parcel/order-10")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "Could not read request path: Conversion error: Unknown reference type: parcel");
}
