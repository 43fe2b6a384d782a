//! Location policy check applied when an event is registered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::same_value;

/// Marker stored in an event's `alert` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertFlag {
    Unread,
}

impl AlertFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertFlag::Unread => "UNREAD",
        }
    }
}

/// Decides whether an event reported at `sensor_location` for an item with
/// the given location lists must be flagged.
///
/// Each list may be absent, a single location or an array of locations. The
/// blacklist is consulted first and the first matching rule wins. A sensor
/// with no location is a member of no list.
pub fn evaluate(
    blacklist: Option<&Value>,
    whitelist: Option<&Value>,
    sensor_location: Option<&Value>,
) -> Option<AlertFlag> {
    if let Some(list) = configured(blacklist) {
        if contains(list, sensor_location) {
            return Some(AlertFlag::Unread);
        }
    }

    if let Some(list) = configured(whitelist) {
        if !contains(list, sensor_location) {
            return Some(AlertFlag::Unread);
        }
    }

    None
}

fn configured(list: Option<&Value>) -> Option<&Value> {
    list.filter(|v| !v.is_null())
}

fn contains(list: &Value, location: Option<&Value>) -> bool {
    let Some(location) = location.filter(|v| !v.is_null()) else {
        return false;
    };
    match list {
        Value::Array(items) => items.iter().any(|item| same_value(item, location)),
        single => same_value(single, location),
    }
}
