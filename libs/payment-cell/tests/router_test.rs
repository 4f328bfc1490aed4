use std::sync::Arc;

use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::{payment_routes, PaymentState};
use shared_utils::locks::KeyedLocks;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn app(config: &TestConfig) -> axum::Router {
    payment_routes(Arc::new(PaymentState::new(config.to_arc(), KeyedLocks::new())))
}

fn bearer(config: &TestConfig, user: &TestUser) -> String {
    format!("Bearer {}", JwtTestUtils::create_test_token(user, &config.jwt_secret, None))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_period_end_endpoint() {
    let config = TestConfig::default();
    let user = TestUser::doctor("doc@example.com", "clinic-a");

    let response = app(&config)
        .oneshot(
            Request::get("/period-end?period=monthly&payment_date=2025-01-10T10:00:00&occurrence_date=2025-01-14")
                .header("Authorization", bearer(&config, &user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["period_end_date"], json!("2025-02-14T23:59:59.999"));
}

#[tokio::test]
async fn test_single_period_without_occurrence_is_open_ended() {
    let config = TestConfig::default();
    let user = TestUser::receptionist("front@example.com", "clinic-a");

    let response = app(&config)
        .oneshot(
            Request::get("/period-end?period=single&payment_date=2025-01-10")
                .header("Authorization", bearer(&config, &user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["period_end_date"], Value::Null);
}

#[tokio::test]
async fn test_invalid_payment_signature_is_unauthorized() {
    let config = TestConfig::default();
    let user = TestUser::receptionist("front@example.com", "clinic-a");
    let token = JwtTestUtils::create_invalid_signature_token(&user);

    let response = app(&config)
        .oneshot(
            Request::get("/period-end?period=monthly&payment_date=2025-01-10")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_cannot_record_payments() {
    let config = TestConfig::default();
    let user = TestUser::doctor("doc@example.com", "clinic-a");

    let response = app(&config)
        .oneshot(
            Request::post("/")
                .header("Authorization", bearer(&config, &user))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "doctor_id": Uuid::new_v4(),
                        "appointment_id": Uuid::new_v4(),
                        "amount": 100.0,
                        "payment_period": "monthly",
                        "service_fee": 300.0
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_payment_fans_out_status() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&server.uri());
    let user = TestUser::receptionist("front@example.com", "clinic-a");
    let template_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let template = MockSupabaseResponses::template_response(&template_id, "clinic-a", &doctor_id, "2025-01-07");
    let mut completed = template.clone();
    completed["status"] = json!("completed");
    completed["awaiting_payment"] = json!(false);
    completed["payment_completed"] = json!(true);
    let mut payment = MockSupabaseResponses::payment_response(&Uuid::new_v4().to_string(), "clinic-a", &template_id, 300.0);
    payment["doctor_id"] = json!(doctor_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([template.clone()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("booking_id", "eq.booking-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([template])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "appointment_id": template_id,
            "period_end_date": "2025-02-14T23:59:59.999"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([payment.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("is_deleted", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("booking_id", "eq.booking-1"))
        .and(body_partial_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(&config)
        .oneshot(
            Request::post("/")
                .header("Authorization", bearer(&config, &user))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "doctor_id": doctor_id,
                        "appointment_id": format!("{}_instance_2025-01-14", template_id),
                        "amount": 300.0,
                        "payment_status": "completed",
                        "payment_period": "monthly",
                        "payment_date": "2025-01-10T10:00:00",
                        "service_fee": 300.0
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking"]["status"], json!("completed"));
    assert_eq!(body["booking"]["payment_completed"], json!(true));
    assert_eq!(body["booking"]["updated_appointments"], json!(1));
}
