//! End-to-end suite execution against an in-process API
//!
//! Each test stands up a small axum app, describes a specification
//! tree against it, compiles, and runs.

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use restspec_core::{Credentials, ExpectError, ParamKind, SpecTree};
use restspec_runner::Runner;

async fn spawn_app(router: Router) -> String {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn app() -> Router {
    Router::new()
        .route(
            "/users/:id",
            get(|Path(id): Path<String>| async move {
                Json(json!({"id": id, "name": "Ada"}))
            })
            .delete(|Path(_id): Path<String>| async { StatusCode::NO_CONTENT }),
        )
        .route(
            "/users",
            post(|Json(body): Json<Value>| async move {
                (StatusCode::CREATED, Json(body))
            }),
        )
        .route(
            "/params",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                Json(json!(query))
            }),
        )
        .route(
            "/secrets",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth == "Basic dTpw" {
                    (StatusCode::OK, Json(json!({"ok": true})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "nope"})))
                }
            }),
        )
}

#[tokio::test]
async fn path_substitution_status_and_body_pattern() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("user service", &base);
    spec.begin("user by id");
    spec.resource("users", Some("/users/{id}")).unwrap();
    spec.method("GET", None).unwrap();
    spec.path_param("id", 42);
    spec.expect_status(200);
    spec.expect_header("Content-Type", "application/json");
    spec.expect_body(json!({"id": "42", "name": "/.*/"}));
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.total, 1);
    assert_eq!(report.failed, 0, "case failed: {:?}", report.cases[0].error);
    assert_eq!(report.cases[0].name, "user service users GET user by id");
}

#[tokio::test]
async fn removed_query_category_keeps_only_fresh_additions() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("listing", &base);
    spec.resource("params echo", Some("/params")).unwrap();
    spec.method("GET", None).unwrap();
    spec.query("limit", 10);
    spec.begin("without inherited query");
    spec.remove_params(ParamKind::Query);
    spec.begin("with its own offset");
    spec.query("offset", 5);
    spec.expect_status(200);
    spec.expect_body(json!({"offset": "5"}));
    spec.expect_check(Arc::new(|resp| {
        let echoed = resp.body.as_ref().and_then(Value::as_object);
        match echoed {
            Some(map) if !map.contains_key("limit") => Ok(()),
            Some(_) => Err(ExpectError::Check("inherited 'limit' leaked through".into())),
            None => Err(ExpectError::MissingBody),
        }
    }));
    spec.end().unwrap();
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.failed, 0, "case failed: {:?}", report.cases[0].error);
}

#[tokio::test]
async fn delete_description_compiles_to_a_delete_request() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("user service", &base);
    spec.begin("remove user");
    spec.resource("users", Some("/users/{id}")).unwrap();
    spec.method("DELETE", None).unwrap();
    spec.path_param("id", 7);
    spec.expect_status(204);
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.failed, 0, "case failed: {:?}", report.cases[0].error);
}

#[tokio::test]
async fn body_params_assemble_into_one_json_payload() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("user service", &base);
    spec.begin("create user");
    spec.resource("users", Some("/users")).unwrap();
    spec.method("POST", None).unwrap();
    spec.body("name", "ada");
    spec.body("email", "ada@example.com");
    spec.expect_status(201);
    spec.expect_body(json!({"name": "ada", "email": "/@example/"}));
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.failed, 0, "case failed: {:?}", report.cases[0].error);
}

#[tokio::test]
async fn basic_credentials_produce_an_authorization_header() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("secrets", &base);
    spec.auth_scheme("basic", json!({}));
    spec.use_credentials(Credentials::basic("reader", "u", "p"));
    spec.resource("secrets", Some("/secrets")).unwrap();
    spec.begin("authorized read");
    spec.method("GET", None).unwrap();
    spec.expect_status(200);
    spec.expect_body(json!({"ok": true}));
    spec.end().unwrap();
    spec.begin("anonymous read is rejected");
    spec.remove_credentials();
    spec.method("GET", None).unwrap();
    spec.expect_status(401);
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 0, "failures: {:?}", report.cases);
}

#[tokio::test]
async fn expectation_mismatch_fails_the_case_with_the_first_error() {
    let base = spawn_app(app()).await;

    let mut spec = SpecTree::root("user service", &base);
    spec.begin("wrong status");
    spec.resource("users", Some("/users/{id}")).unwrap();
    spec.method("GET", None).unwrap();
    spec.path_param("id", 1);
    spec.expect_status(404);
    spec.expect_body(json!({"name": "/^Z/"}));
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.failed, 1);
    let error = report.cases[0].error.as_deref().unwrap();
    assert!(error.contains("expected status 404"), "got: {error}");
}

#[tokio::test]
async fn transport_failure_fails_the_case_without_running_expectations() {
    // Nothing listens on this port.
    let mut spec = SpecTree::root("unreachable", "http://127.0.0.1:1");
    spec.begin("connection refused");
    spec.method("GET", None).unwrap();
    spec.expect_check(Arc::new(|_| {
        panic!("expectations must not run after a transport failure")
    }));
    spec.end().unwrap();

    let report = Runner::new().run(&spec.compile().unwrap()).await;
    assert_eq!(report.failed, 1);
    assert!(report.cases[0].error.is_some());
}
