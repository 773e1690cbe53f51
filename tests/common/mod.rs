#![allow(dead_code)]

use apcreation::{contact::SubmissionStore, db, router, AppState, Config};
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;

pub const ADMIN_TOKEN: &str = "admin-secret";

pub struct TestApp {
    pub router: Router,
    pub submissions: SubmissionStore,
}

pub async fn app_with(config: Config) -> TestApp {
    let db_pool = db::memory_pool().await.expect("in-memory database");
    let state = AppState::new(config, db_pool).expect("app state");
    TestApp {
        submissions: state.submissions.clone(),
        router: router(state),
    }
}

pub async fn app() -> TestApp {
    app_with(Config {
        admin_token: Some(ADMIN_TOKEN.to_owned()),
        ..Config::default()
    })
    .await
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
