mod common;

use apcreation::{
    config::{ContactConfig, NotifyConfig},
    contact::{BudgetRange, ProjectType, SubmissionStatus},
    Config,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{app, app_with, body_json, json_request};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, header as has_header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn inquiry() -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "message": "We need packaging for a new tea brand.",
    })
}

fn from_address(body: &Value, address: &str) -> Request<Body> {
    let mut request = json_request("POST", "/submit-contact", body);
    request.headers_mut().insert("x-forwarded-for", address.parse().unwrap());
    request
}

#[tokio::test]
async fn accepted_submission_is_stored_normalized() {
    let app = app().await;
    let body = json!({
        "name": "  Ada Lovelace  ",
        "email": " ADA@Example.com ",
        "phone": "   ",
        "company": "Analytical Engines",
        "projectType": "packaging",
        "budgetRange": "5k-10k",
        "message": "  We need packaging for a new tea brand.  ",
    });

    let response =
        app.router.clone().oneshot(json_request("POST", "/submit-contact", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply = body_json(response).await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], "Your message has been sent successfully!");
    assert_eq!(reply["remaining"], 2);

    let stored = app.submissions.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    let stored = &stored[0];
    assert_eq!(stored.name, "Ada Lovelace");
    assert_eq!(stored.email, "ada@example.com");
    assert_eq!(stored.phone, None);
    assert_eq!(stored.company.as_deref(), Some("Analytical Engines"));
    assert_eq!(stored.project_type, Some(ProjectType::Packaging));
    assert_eq!(stored.budget_range, Some(BudgetRange::From5kTo10k));
    assert_eq!(stored.message, "We need packaging for a new tea brand.");
    assert_eq!(stored.status, SubmissionStatus::New);
}

#[tokio::test]
async fn invalid_fields_are_rejected_before_storage() {
    let app = app().await;

    let mut body = inquiry();
    body["name"] = json!("A");
    let response =
        app.router.clone().oneshot(json_request("POST", "/submit-contact", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Name must be between 2 and 100 characters");

    let mut body = inquiry();
    body["email"] = json!("not-an-email");
    let response =
        app.router.clone().oneshot(json_request("POST", "/submit-contact", &body)).await.unwrap();
    assert_eq!(body_json(response).await["error"], "Please provide a valid email address");

    let mut body = inquiry();
    body["message"] = json!("too short");
    let response =
        app.router.clone().oneshot(json_request("POST", "/submit-contact", &body)).await.unwrap();
    assert_eq!(
        body_json(response).await["error"],
        "Message must be between 10 and 1000 characters"
    );

    assert!(app.submissions.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/submit-contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid request body");
}

#[tokio::test]
async fn other_methods_get_a_json_405() {
    let app = app().await;
    let request =
        Request::builder().method("GET").uri("/submit-contact").body(Body::empty()).unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await["error"], "Method not allowed");
}

#[tokio::test]
async fn fourth_submission_in_window_is_limited() {
    let app = app().await;

    for remaining in [2, 1, 0] {
        let response =
            app.router.clone().oneshot(from_address(&inquiry(), "203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["remaining"], remaining);
    }

    let response =
        app.router.clone().oneshot(from_address(&inquiry(), "203.0.113.7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "3600");
    let reply = body_json(response).await;
    assert_eq!(reply["error"], "Too many submissions. Please try again in 60 minutes.");
    assert!(reply["retryAfter"].as_u64().unwrap() > 3_599_000);

    // a different address with the same email is a different client
    let response =
        app.router.clone().oneshot(from_address(&inquiry(), "198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.submissions.list().await.unwrap().len(), 4);
}

#[tokio::test]
async fn window_follows_configuration() {
    let app = app_with(Config {
        contact: ContactConfig { max_per_window: 1, window: Duration::from_secs(90) },
        ..Config::default()
    })
    .await;

    let first = app.router.clone().oneshot(from_address(&inquiry(), "203.0.113.7")).await.unwrap();
    assert_eq!(body_json(first).await["remaining"], 0);

    let second = app.router.clone().oneshot(from_address(&inquiry(), "203.0.113.7")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(second).await["error"],
        "Too many submissions. Please try again in 2 minutes."
    );
}

#[tokio::test]
async fn storage_failure_is_reported_generically() {
    let app = app().await;
    app.submissions.pool().close().await;

    let response =
        app.router.oneshot(json_request("POST", "/submit-contact", &inquiry())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Failed to submit your message. Please try again."
    );
}

async fn app_notifying(server: &MockServer) -> common::TestApp {
    app_with(Config {
        notify: Some(NotifyConfig {
            api_key: "re_test".to_owned(),
            api_url: format!("{}/emails", server.uri()),
            from: "AP Creation <site@apcreation.in>".to_owned(),
            to: "hello@apcreation.in".to_owned(),
        }),
        ..Config::default()
    })
    .await
}

#[tokio::test]
async fn stored_submission_is_emailed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(has_header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "to": ["hello@apcreation.in"],
            "reply_to": "ada@example.com",
            "subject": "New contact submission from Ada Lovelace",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_notifying(&server).await;
    let response =
        app.router.oneshot(json_request("POST", "/submit-contact", &inquiry())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn email_failure_does_not_fail_the_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_notifying(&server).await;
    let response =
        app.router.oneshot(json_request("POST", "/submit-contact", &inquiry())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.submissions.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn preflight_and_health_are_answered() {
    let app = app().await;

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/submit-contact")
        .header(header::ORIGIN, "https://apcreation.in")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,apikey")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.oneshot(health).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::body_text(response).await, "ok");
}
