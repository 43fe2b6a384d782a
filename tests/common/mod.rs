use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rfid_tracker::identity::{Credentials, Identity, IdentityError, IdentityProvider};
use rfid_tracker::migration::{Migrator, MigratorTrait};
use rfid_tracker::{api, SeaOrmStore, Tracker};
use sea_orm::{ConnectOptions, Database};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Vouches for whatever email is passed as the access token.
#[derive(Debug)]
pub struct EchoIdentity;

#[async_trait]
impl IdentityProvider for EchoIdentity {
    async fn verified_identity(&self, credentials: Credentials<'_>) -> Result<Identity, IdentityError> {
        Ok(Identity {
            email: credentials.access_token.to_string(),
            name: None,
            picture: None,
        })
    }
}

pub async fn app() -> Router {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();

    let tracker = Tracker::new(Arc::new(SeaOrmStore::new(conn)), Arc::new(EchoIdentity));
    api::router(Arc::new(tracker))
}

pub async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    let req = builder.body(body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap_or(json!(null))
    };
    (status, json)
}

pub async fn login(router: &Router, email: &str) -> String {
    let (status, body) = call(
        router,
        "POST",
        "/login",
        None,
        Some(json!({"id_token": "id", "access_token": email, "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}
