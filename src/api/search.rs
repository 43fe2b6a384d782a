use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::events::DEFAULT_EVENT_LIMIT;
use super::{ApiError, AppState};
use crate::access::AccessLevel;
use crate::event::{ActivityOf, EventFilter};
use crate::tracker::EventSearch;
use crate::Document;

#[derive(Debug, Deserialize)]
pub(super) struct SearchRequest {
    query: Option<String>,
    #[serde(default = "one")]
    history_limit: u64,
    #[serde(default)]
    history_skip: u64,
}

fn one() -> u64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Pattern {
    query: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct EventSearchRequest {
    start_timestamp_range: Option<Value>,
    end_timestamp_range: Option<Value>,
    limit: Option<u64>,
    #[serde(default)]
    skip: u64,
    #[serde(default)]
    alert_only: bool,
    sensor: Option<Pattern>,
    item: Option<Pattern>,
}

pub(super) async fn sensors(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<Document>>, ApiError> {
    search_with_activity(app, headers, body, ActivityOf::Sensor).await
}

pub(super) async fn items(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<Document>>, ApiError> {
    search_with_activity(app, headers, body, ActivityOf::Item).await
}

async fn search_with_activity(
    app: AppState,
    headers: HeaderMap,
    body: Result<Json<SearchRequest>, JsonRejection>,
    of: ActivityOf,
) -> Result<Json<Vec<Document>>, ApiError> {
    app.authorize(&headers, AccessLevel::Limited).await?;
    let Json(request) = body?;
    let query = request
        .query
        .ok_or_else(|| ApiError::Validation("attribute query is required".into()))?;
    let found = app
        .tracker()
        .search_with_activity(of, &query, request.history_limit, request.history_skip)
        .await?;
    Ok(Json(found))
}

/// `POST /search/event`.
pub(super) async fn events(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<EventSearchRequest>, JsonRejection>,
) -> Result<Json<Vec<Document>>, ApiError> {
    app.authorize(&headers, AccessLevel::Limited).await?;
    let Json(request) = body?;

    let search = EventSearch {
        sensor_query: request.sensor.and_then(|p| p.query),
        item_query: request.item.and_then(|p| p.query),
        filter: EventFilter {
            start_timestamp: request.start_timestamp_range.filter(|v| !v.is_null()),
            end_timestamp: request.end_timestamp_range.filter(|v| !v.is_null()),
            alert_only: request.alert_only,
            limit: Some(request.limit.unwrap_or(DEFAULT_EVENT_LIMIT)),
            skip: request.skip,
            ..Default::default()
        },
    };
    Ok(Json(app.tracker().search_events(search).await?))
}
