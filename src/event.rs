//! Event ingestion and the compound event filter.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::alert;
use crate::clock::{self, Clock};
use crate::mapper::{not_deleted, Mapper, MapperError, Record};
use crate::query::{Filter, FindOptions, Sort};
use crate::schema::{EntitySchema, EVENT, ITEM, SENSOR};
use crate::store::DocumentStore;
use crate::Document;

/// A scalar or a set of candidate values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

impl OneOrMany {
    fn into_filter(self, field: &str) -> Filter {
        match self {
            OneOrMany::Many(values) => Filter::is_in(field, values),
            OneOrMany::One(value) => Filter::Eq(field.to_string(), value),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(Value::String(value.to_string()))
    }
}

impl From<Vec<Value>> for OneOrMany {
    fn from(values: Vec<Value>) -> Self {
        OneOrMany::Many(values)
    }
}

/// Predicates for [`Events::filter`]. Every field is optional; the active
/// ones are ANDed.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub sensor_id: Option<OneOrMany>,
    pub item_id: Option<OneOrMany>,
    /// Inclusive lower bound on `event_timestamp`.
    pub start_timestamp: Option<Value>,
    /// Inclusive upper bound on `event_timestamp`.
    pub end_timestamp: Option<Value>,
    pub alert_only: bool,
    pub limit: Option<u64>,
    pub skip: u64,
}

impl EventFilter {
    /// Results are sorted most recent first; skip and limit apply after
    /// sorting.
    pub fn to_find_options(&self) -> FindOptions {
        let mut filter = not_deleted();

        if let Some(sensor_id) = self.sensor_id.clone() {
            filter = filter.and(sensor_id.into_filter("sensor_id"));
        }
        if let Some(item_id) = self.item_id.clone() {
            filter = filter.and(item_id.into_filter("item_id"));
        }
        if self.start_timestamp.is_some() || self.end_timestamp.is_some() {
            filter = filter.and(Filter::Range {
                field: "event_timestamp".to_string(),
                gte: self.start_timestamp.clone(),
                lte: self.end_timestamp.clone(),
            });
        }
        if self.alert_only {
            filter = filter.and(Filter::exists("alert"));
        }

        let mut options = FindOptions::new(filter)
            .sort(Sort::descending("event_timestamp"))
            .skip(self.skip);
        options.limit = self.limit;
        options
    }
}

/// An incoming sensor reading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEvent {
    pub sensor_id: Option<Value>,
    pub tag_id: Option<Value>,
    pub event_timestamp: Option<Value>,
    pub event_details: Option<Value>,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("missing field for registration: {0}")]
    MissingField(&'static str),

    #[error("sensor not registered: {0}")]
    UnknownSensor(Value),

    #[error("no item registered for tag {0}")]
    UnknownTag(Value),

    #[error(transparent)]
    Mapper(#[from] MapperError),
}

/// Whose history [`Events::last_activity`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOf {
    Sensor,
    Item,
}

impl ActivityOf {
    /// Event field referencing the entity; also its business id field.
    pub fn field(self) -> &'static str {
        match self {
            ActivityOf::Sensor => "sensor_id",
            ActivityOf::Item => "item_id",
        }
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            ActivityOf::Sensor => &SENSOR,
            ActivityOf::Item => &ITEM,
        }
    }
}

/// The event collection: a [`Mapper`] plus event-specific queries.
#[derive(Debug, Clone, Copy)]
pub struct Events<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> Events<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn mapper(&self) -> Mapper<'a> {
        Mapper::new(self.store, &EVENT)
    }

    /// Flattened events matching `filter`, most recent first.
    pub async fn filter(&self, filter: &EventFilter) -> Result<Vec<Document>, MapperError> {
        let docs = self
            .store
            .find(EVENT.collection, filter.to_find_options())
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| Record::from_document(&EVENT, doc).into_document())
            .collect())
    }

    /// The most recent events reported by one sensor or concerning one item.
    pub async fn last_activity(
        &self,
        of: ActivityOf,
        id: &Value,
        limit: u64,
        skip: u64,
    ) -> Result<Vec<Document>, MapperError> {
        let filter = EventFilter {
            limit: Some(limit),
            skip,
            ..Default::default()
        };
        let mut options = filter.to_find_options();
        options.filter = options
            .filter
            .and(Filter::Eq(of.field().to_string(), id.clone()));
        let docs = self.store.find(EVENT.collection, options).await?;
        Ok(docs
            .into_iter()
            .map(|doc| Record::from_document(&EVENT, doc).into_document())
            .collect())
    }

    /// Resolves the reporting sensor and the tagged item, evaluates the
    /// item's location policy and stores the event.
    pub async fn register(&self, clock: &dyn Clock, event: NewEvent) -> Result<Record, EventError> {
        let sensor_id = present(event.sensor_id, "sensor_id")?;
        let tag_id = present(event.tag_id, "tag_id")?;
        let event_timestamp = present(event.event_timestamp, "event_timestamp")?;
        let event_details = present(event.event_details, "event_details")?;

        let sensor = self
            .store
            .find_one(
                SENSOR.collection,
                &not_deleted().and(Filter::Eq("sensor_id".to_string(), sensor_id.clone())),
            )
            .await
            .map_err(MapperError::from)?
            .ok_or_else(|| EventError::UnknownSensor(sensor_id.clone()))?;

        let item = self
            .store
            .find_one(
                ITEM.collection,
                &not_deleted().and(Filter::Eq("tags".to_string(), tag_id.clone())),
            )
            .await
            .map_err(MapperError::from)?
            .ok_or_else(|| EventError::UnknownTag(tag_id.clone()))?;

        let flag = alert::evaluate(
            item.get("location_blacklist"),
            item.get("location_whitelist"),
            sensor.get("location"),
        );

        let mut payload = Document::new();
        payload.insert(
            "received_timestamp".into(),
            Value::from(clock::unix_seconds(clock.now())),
        );
        payload.insert("event_timestamp".into(), event_timestamp);
        payload.insert("event_details".into(), event_details);
        payload.insert("sensor_id".into(), sensor_id);
        payload.insert("tag_id".into(), tag_id);
        if let Some(item_id) = item.get("item_id") {
            payload.insert("item_id".into(), item_id.clone());
        }
        if let Some(flag) = flag {
            payload.insert("alert".into(), Value::from(flag.as_str()));
        }

        let record = self.mapper().create(&payload).await?;
        if flag.is_some() {
            info!(event = ?record.id(), item = ?record.get("item_id"), "location alert raised");
        } else {
            debug!(event = ?record.id(), "event registered");
        }
        Ok(record)
    }
}

fn present(value: Option<Value>, field: &'static str) -> Result<Value, EventError> {
    match value {
        Some(Value::Null) | None => Err(EventError::MissingField(field)),
        Some(Value::String(s)) if s.is_empty() => Err(EventError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sets_lower_to_membership_and_scalars_to_equality() {
        let filter = EventFilter {
            sensor_id: Some(OneOrMany::from(vec![json!("S1"), json!("S2")])),
            item_id: Some(OneOrMany::from("I1")),
            ..Default::default()
        };
        let opts = filter.to_find_options();
        let matches = |v: Value| opts.filter.matches(&crate::test_util::doc(v));
        assert!(matches(json!({"sensor_id": "S2", "item_id": "I1"})));
        assert!(!matches(json!({"sensor_id": "S3", "item_id": "I1"})));
        assert!(!matches(json!({"sensor_id": "S1", "item_id": "I2"})));
    }

    #[test]
    fn one_or_many_deserializes_both_shapes() {
        let one: OneOrMany = serde_json::from_value(json!("S1")).unwrap();
        let many: OneOrMany = serde_json::from_value(json!(["S1", "S2"])).unwrap();
        assert_eq!(one, OneOrMany::One(json!("S1")));
        assert_eq!(many, OneOrMany::Many(vec![json!("S1"), json!("S2")]));
    }
}
