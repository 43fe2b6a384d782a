#![cfg(feature = "migration")]

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{app, call, login};

async fn seed(router: &axum::Router, token: &str) {
    let (status, _) = call(
        router,
        "POST",
        "/sensor",
        Some(token),
        Some(json!({"name": "North gate", "sensor_id": "S1", "location": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        router,
        "POST",
        "/item",
        Some(token),
        Some(json!({"name": "Drill", "item_id": "I1", "tags": ["TAG1"], "location_whitelist": ["B"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn reported_event_is_listed_with_its_item() {
    let router = app().await;
    let token = login(&router, "ada@example.com").await;
    seed(&router, &token).await;

    let (status, created) = call(
        &router,
        "POST",
        "/event",
        None,
        Some(json!({
            "sensor_id": "S1",
            "tag_id": "TAG1",
            "event_timestamp": 1000,
            "event_details": "seen"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["alert"], json!("UNREAD"));

    let (status, events) = call(&router, "GET", "/event?sensor_id=S1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["item_id"], json!("I1"));

    let (_, count) = call(&router, "GET", "/event_count", Some(&token), None).await;
    assert_eq!(count, json!({"event_count": 1}));
}

#[tokio::test]
async fn event_for_unknown_tag_is_rejected() {
    let router = app().await;
    let token = login(&router, "ada@example.com").await;
    seed(&router, &token).await;

    let (status, body) = call(
        &router,
        "POST",
        "/event",
        None,
        Some(json!({"sensor_id": "S1", "tag_id": "TAG9", "event_timestamp": 1, "event_details": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_FAILED"));
}

#[tokio::test]
async fn credentials_are_checked_before_anything_else() {
    let router = app().await;

    let (status, body) = call(&router, "GET", "/event", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("UNAUTHENTICATED"));

    let (status, body) = call(&router, "GET", "/sensor", Some("not-a-token"), None).await;
    assert_eq!(status.as_u16(), 498);
    assert_eq!(body["code"], json!("TOKEN_EXPIRED"));
}

#[tokio::test]
async fn limited_users_can_read_but_not_write() {
    let router = app().await;
    let master = login(&router, "ada@example.com").await;

    let (status, user) = call(
        &router,
        "POST",
        "/user",
        Some(&master),
        Some(json!({"name": "Bob", "email": "bob@example.com", "access": "limited"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["access"], json!(2));

    let limited = login(&router, "bob@example.com").await;
    let (status, _) = call(&router, "GET", "/sensor", Some(&limited), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &router,
        "POST",
        "/sensor",
        Some(&limited),
        Some(json!({"name": "Dock", "sensor_id": "S2"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!("PERMISSION_DENIED"));

    let (status, _) = call(&router, "GET", "/user", Some(&limited), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unregistered_users_cannot_log_in() {
    let router = app().await;
    login(&router, "ada@example.com").await;

    let (status, body) = call(
        &router,
        "POST",
        "/login",
        None,
        Some(json!({"id_token": "id", "access_token": "eve@example.com", "email": "eve@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("UNAUTHENTICATED"));
}

#[tokio::test]
async fn resource_lifecycle() {
    let router = app().await;
    let token = login(&router, "ada@example.com").await;
    seed(&router, &token).await;

    let (status, body) = call(
        &router,
        "POST",
        "/sensor",
        Some(&token),
        Some(json!({"name": "Copy", "sensor_id": "S1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("ALREADY_EXISTS"));

    let (status, _) = call(
        &router,
        "POST",
        "/sensor",
        Some(&token),
        Some(json!({"sensor_id": "S3"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = call(
        &router,
        "PUT",
        "/sensor/S1",
        Some(&token),
        Some(json!({"description": "main entrance"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], json!("main entrance"));
    assert_eq!(updated["location"], json!("A"));

    let (status, _) = call(&router, "DELETE", "/sensor/S1", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&router, "GET", "/sensor/S1", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("NOT_FOUND"));

    let (status, sensors) = call(&router, "GET", "/sensor", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sensors, json!([]));
}

#[tokio::test]
async fn searches_carry_activity_and_references() {
    let router = app().await;
    let token = login(&router, "ada@example.com").await;
    seed(&router, &token).await;
    for ts in [10, 30, 20] {
        call(
            &router,
            "POST",
            "/event",
            None,
            Some(json!({"sensor_id": "S1", "tag_id": "TAG1", "event_timestamp": ts, "event_details": "seen"})),
        )
        .await;
    }

    let (status, items) = call(
        &router,
        "POST",
        "/search/item",
        Some(&token),
        Some(json!({"query": "dri"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items[0]["last_activity"][0]["event_timestamp"], json!(30));
    assert_eq!(items[0]["last_activity"].as_array().unwrap().len(), 1);

    let (status, events) = call(
        &router,
        "POST",
        "/search/event",
        Some(&token),
        Some(json!({"sensor": {"query": "north"}, "limit": 2, "skip": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_timestamp"], json!(20));
    assert_eq!(events[0]["sensor"]["sensor_id"], json!("S1"));
    assert_eq!(events[0]["item"]["item_id"], json!("I1"));

    let (_, page) = call(&router, "GET", "/event?limit=1&skip=1", Some(&token), None).await;
    assert_eq!(page[0]["event_timestamp"], json!(20));
}
