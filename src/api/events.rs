use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::access::AccessLevel;
use crate::event::{EventFilter, NewEvent, OneOrMany};
use crate::Document;

pub(super) const DEFAULT_EVENT_LIMIT: u64 = 50;

/// `POST /event`. Sensors report without a token.
pub(super) async fn register(
    State(app): State<AppState>,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(event) = body?;
    let record = app.tracker().register_event(event).await?;
    Ok((StatusCode::CREATED, Json(Value::Object(record.into_document()))))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct EventQuery {
    sensor_id: Option<String>,
    item_id: Option<String>,
    start_timestamp_range: Option<String>,
    end_timestamp_range: Option<String>,
    #[serde(default)]
    alert_only: bool,
    limit: Option<u64>,
    #[serde(default)]
    skip: u64,
}

impl EventQuery {
    fn into_filter(self) -> EventFilter {
        EventFilter {
            sensor_id: self.sensor_id.as_deref().and_then(id_list),
            item_id: self.item_id.as_deref().and_then(id_list),
            start_timestamp: self.start_timestamp_range.as_deref().map(scalar),
            end_timestamp: self.end_timestamp_range.as_deref().map(scalar),
            alert_only: self.alert_only,
            limit: Some(self.limit.unwrap_or(DEFAULT_EVENT_LIMIT)),
            skip: self.skip,
        }
    }
}

/// `GET /event`.
pub(super) async fn list(
    State(app): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> Result<Json<Vec<Document>>, ApiError> {
    app.authorize(&headers, AccessLevel::Limited).await?;
    let Query(query) = query?;
    let events = app.tracker().events().filter(&query.into_filter()).await?;
    Ok(Json(events))
}

/// `GET /event_count`.
pub(super) async fn count(State(app): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    app.authorize(&headers, AccessLevel::Limited).await?;
    let n = app.tracker().event_count().await?;
    Ok(Json(json!({ "event_count": n })))
}

/// `S1` is a scalar, `S1,S2` a set. Empty entries are dropped.
fn id_list(raw: &str) -> Option<OneOrMany> {
    let ids: Vec<Value> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect();
    match ids.len() {
        0 => None,
        1 => ids.into_iter().next().map(OneOrMany::One),
        _ => Some(OneOrMany::Many(ids)),
    }
}

/// Query strings carry no types; numeric bounds compare as numbers.
fn scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
