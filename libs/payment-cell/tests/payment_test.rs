use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::{Extension, Json};
use axum_extra::TypedHeader;
use assert_matches::assert_matches;
use async_trait::async_trait;
use headers::Authorization;
use reqwest::Url;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};

use payment_cell::handlers;
use payment_cell::{
    HmacSigner, PaymentCallbackRequest, PaymentCallbackService, PaymentError,
    PaymentLinkService, PaymentSigner, SignatureRequest, SignatureResponse,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

/// Signs with a fixed value and records what it was asked to sign.
#[derive(Default)]
struct RecordingSigner {
    requests: Mutex<Vec<SignatureRequest>>,
}

#[async_trait]
impl PaymentSigner for RecordingSigner {
    async fn sign(&self, request: &SignatureRequest) -> Result<SignatureResponse, PaymentError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(SignatureResponse::signed("recorded-signature".to_string()))
    }
}

struct UnreachableSigner;

#[async_trait]
impl PaymentSigner for UnreachableSigner {
    async fn sign(&self, _request: &SignatureRequest) -> Result<SignatureResponse, PaymentError> {
        Err(PaymentError::SignatureError("connection refused".to_string()))
    }
}

fn query_params(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

async fn mount_appointment(mock_server: &MockServer, appointment_id: Uuid, status: &str, price: Option<i64>) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                status,
                price,
            )
        ])))
        .mount(mock_server)
        .await;
}

async fn forbid_writes(mock_server: &MockServer) {
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn link_is_signed_over_the_transmitted_fields() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;
    forbid_writes(&mock_server).await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let signer = Arc::new(RecordingSigner::default());
    let service = PaymentLinkService::with_signer(&config, signer.clone());
    let user = TestUser::patient("minji@example.com").with_name("Kim Minji").to_user();

    let link = service.build_payment_link(Some(&user), appointment_id, "token").await.unwrap();

    let signed = signer.requests.lock().unwrap().clone();
    assert_eq!(signed.len(), 1);
    let signed = &signed[0];

    let params = query_params(&link.url);
    assert!(link.url.starts_with("https://pay.example.com/card/pay?"));
    assert_eq!(params["CPID"], signed.merchant_id);
    assert_eq!(params["CPID"], "TESTCPID");
    assert_eq!(params["ORDERNO"], signed.order_no);
    assert_eq!(params["ORDERNO"], link.order_no);
    assert_eq!(params["AMOUNT"], signed.amount);
    assert_eq!(params["AMOUNT"], "30000");
    assert_eq!(params["PAYMETHOD"], signed.pay_method);
    assert_eq!(params["TYPE"], signed.transaction_type);
    assert_eq!(params["SIGNATURE"], "recorded-signature");
    assert_eq!(params["PRODUCT_NM"], "Consultation: Dr. Lee");
    assert_eq!(params["BUYER_NM"], "Kim Minji");
    assert_eq!(params["BUYER_EMAIL"], "minji@example.com");
    assert_eq!(params["TIMESTAMP"], link.timestamp);
    assert_eq!(params["RETURN_URL"], "http://localhost:3000/api/payment/callback");
    assert!(link.order_no.starts_with("ORD-"));
}

#[tokio::test]
async fn local_signature_verifies_against_the_url() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(45000)).await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let service = PaymentLinkService::new(&config);
    let user = TestUser::patient("patient@example.com").to_user();

    let link = service.build_payment_link(Some(&user), appointment_id, "token").await.unwrap();
    let params = query_params(&link.url);

    let expected = HmacSigner::new(&config.payment_auth_key)
        .compute(&SignatureRequest::new(&params["CPID"], &params["ORDERNO"], &params["AMOUNT"]))
        .unwrap();
    assert_eq!(params["SIGNATURE"], expected);
    assert_eq!(params["BUYER_NM"], "Guest");
}

#[tokio::test]
async fn every_attempt_gets_a_new_order_number() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let signer = Arc::new(RecordingSigner::default());
    let service = PaymentLinkService::with_signer(&config, signer.clone());
    let user = TestUser::patient("patient@example.com").to_user();

    service.build_payment_link(Some(&user), appointment_id, "token").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    service.build_payment_link(Some(&user), appointment_id, "token").await.unwrap();

    let signed = signer.requests.lock().unwrap().clone();
    assert_eq!(signed.len(), 2);
    assert_ne!(signed[0].order_no, signed[1].order_no);
}

#[tokio::test]
async fn unpriced_appointment_cannot_be_paid() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "PENDING", None).await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let signer = Arc::new(RecordingSigner::default());
    let service = PaymentLinkService::with_signer(&config, signer.clone());
    let user = TestUser::patient("patient@example.com").to_user();

    let result = service.build_payment_link(Some(&user), appointment_id, "token").await;

    assert_matches!(result, Err(PaymentError::InvalidState(_)));
    assert!(signer.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let service = PaymentLinkService::new(&config);
    let user = TestUser::patient("patient@example.com").to_user();

    let result = service.build_payment_link(Some(&user), Uuid::new_v4(), "token").await;
    assert_matches!(result, Err(PaymentError::NotFound));
}

#[tokio::test]
async fn no_session_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let service = PaymentLinkService::new(&config);

    let result = service.build_payment_link(None, Uuid::new_v4(), "token").await;

    assert_matches!(result, Err(PaymentError::Unauthorized));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn signer_failures_surface_as_signature_errors() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;

    let mut config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::patient("patient@example.com").to_user();

    let service = PaymentLinkService::with_signer(&config, Arc::new(UnreachableSigner));
    let result = service.build_payment_link(Some(&user), appointment_id, "token").await;
    assert_matches!(result, Err(PaymentError::SignatureError(_)));

    config.payment_auth_key = String::new();
    let service = PaymentLinkService::new(&config);
    let result = service.build_payment_link(Some(&user), appointment_id, "token").await;
    assert_matches!(result, Err(PaymentError::SignatureError(msg)) if msg.contains("auth key"));
}

#[tokio::test]
async fn remote_signer_receives_the_gateway_tuple() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;

    Mock::given(method("POST"))
        .and(path("/sign"))
        .and(body_partial_json(json!({
            "CPID": "TESTCPID",
            "AMOUNT": "30000",
            "PAYMETHOD": "CARD",
            "TYPE": "P"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "KIWOOM_ENC": "remote-hash"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = TestConfig::with_supabase_url(&mock_server.uri());
    config.payment_signer_url = format!("{}/sign", mock_server.uri());
    let user = TestUser::patient("patient@example.com").to_user();

    let link = PaymentLinkService::new(&config)
        .build_payment_link(Some(&user), appointment_id, "token")
        .await
        .unwrap();

    assert_eq!(query_params(&link.url)["SIGNATURE"], "remote-hash");
}

#[tokio::test]
async fn remote_signer_refusal_carries_its_message() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;

    Mock::given(method("POST"))
        .and(path("/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "merchant suspended"
        })))
        .mount(&mock_server)
        .await;

    let mut config = TestConfig::with_supabase_url(&mock_server.uri());
    config.payment_signer_url = format!("{}/sign", mock_server.uri());
    let user = TestUser::patient("patient@example.com").to_user();

    let result = PaymentLinkService::new(&config)
        .build_payment_link(Some(&user), appointment_id, "token")
        .await;

    assert_matches!(result, Err(PaymentError::SignatureError(msg)) if msg == "merchant suspended");
}

#[tokio::test]
async fn link_handler_maps_errors_to_http_statuses() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "PENDING", None).await;

    let config = Arc::new(TestConfig::with_supabase_url(&mock_server.uri()));
    let user = TestUser::patient("patient@example.com").to_user();

    let result = handlers::create_payment_link(
        State(config.clone()),
        Path(appointment_id),
        TypedHeader(Authorization::bearer("token").unwrap()),
        Some(Extension(user)),
    ).await;
    assert_matches!(result, Err(AppError::Conflict(_)));

    let result = handlers::create_payment_link(
        State(config),
        Path(appointment_id),
        TypedHeader(Authorization::bearer("token").unwrap()),
        None,
    ).await;
    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn successful_callback_confirms_the_appointment() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(json!({ "status": "CONFIRMED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "CONFIRMED",
                Some(30000),
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Arc::new(TestConfig::with_supabase_url(&mock_server.uri()));

    let Json(body) = handlers::payment_callback(
        State(config),
        Json(PaymentCallbackRequest {
            appointment_id,
            result: "SUCCESS".to_string(),
        }),
    ).await.unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "CONFIRMED");
}

#[tokio::test]
async fn failed_callback_leaves_the_appointment_alone() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    mount_appointment(&mock_server, appointment_id, "AWAITING_PAYMENT", Some(30000)).await;
    forbid_writes(&mock_server).await;

    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let outcome = PaymentCallbackService::new(&config)
        .handle_callback(&PaymentCallbackRequest {
            appointment_id,
            result: "FAIL".to_string(),
        }, "anon")
        .await
        .unwrap();

    assert!(!outcome.confirmed);
    assert_eq!(outcome.status.as_str(), "AWAITING_PAYMENT");
}

#[tokio::test]
async fn callback_for_unknown_appointment_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = Arc::new(TestConfig::with_supabase_url(&mock_server.uri()));
    let request: PaymentCallbackRequest = serde_json::from_value(json!({
        "appointmentId": Uuid::new_v4(),
        "result": "SUCCESS"
    })).unwrap();

    let result = handlers::payment_callback(State(config), Json(request)).await;
    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn remote_signer_sends_exactly_the_tuple() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sign"))
        .and(body_json(json!({
            "CPID": "CP001",
            "ORDERNO": "ORD-1-1",
            "AMOUNT": "1000",
            "PAYMETHOD": "CARD",
            "TYPE": "P"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "KIWOOM_ENC": "hash"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let signer = payment_cell::RemoteSigner::new(&format!("{}/sign", mock_server.uri()));
    let response = signer.sign(&SignatureRequest::new("CP001", "ORD-1-1", "1000")).await.unwrap();

    assert_eq!(response.into_signature().unwrap(), "hash");
}
