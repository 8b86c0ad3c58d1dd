//! Shared helpers for handler tests: in-memory state, token minting, and a
//! oneshot request driver.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower::util::ServiceExt;

use lanehaul_core::domain::party::Actor;
use lanehaul_db::fixtures::test_pool;
use lanehaul_notify::{RecordingEmailGateway, RecordingSmsGateway};

use crate::auth::issue_token;
use crate::bootstrap::{assemble_state, AppState};

pub struct TestContext {
    pub email: RecordingEmailGateway,
    pub sms: RecordingSmsGateway,
    pub dispatcher_task: JoinHandle<()>,
    pub secret: SecretString,
}

pub async fn test_state() -> (AppState, TestContext) {
    let pool = test_pool().await;
    let email = RecordingEmailGateway::default();
    let sms = RecordingSmsGateway::default();
    let secret: SecretString = "handler-test-secret-0123".to_string().into();

    let (state, dispatcher_task) = assemble_state(
        pool,
        120,
        &secret,
        Arc::new(email.clone()),
        Arc::new(sms.clone()),
    );

    (state, TestContext { email, sms, dispatcher_task, secret })
}

pub fn bearer(context: &TestContext, actor: &Actor) -> String {
    let token = issue_token(&context.secret, actor, 3600).expect("issue token");
    format!("Bearer {token}")
}

pub async fn call(
    router: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, token);
    }

    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = router.oneshot(request).await.expect("route request");
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse response body")
    };

    (status, payload)
}
