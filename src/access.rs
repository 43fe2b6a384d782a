//! Ordered access levels.
//!
//! Levels are stored as integers where a *lower* value is *more* privileged:
//! `master = -1`, `default = 1`, `limited = 2`. [`grants`] is the only place
//! that ordering is interpreted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    Master,
    Default,
    Limited,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown access level: {0}")]
pub struct UnknownAccessLevel(pub String);

impl AccessLevel {
    pub const fn value(self) -> i64 {
        match self {
            AccessLevel::Master => -1,
            AccessLevel::Default => 1,
            AccessLevel::Limited => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AccessLevel::Master => "master",
            AccessLevel::Default => "default",
            AccessLevel::Limited => "limited",
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            -1 => Some(AccessLevel::Master),
            1 => Some(AccessLevel::Default),
            2 => Some(AccessLevel::Limited),
            _ => None,
        }
    }

    /// Accepts the stored integer form as well as the string aliases.
    pub fn from_json(value: &Value) -> Result<Self, UnknownAccessLevel> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .and_then(Self::from_value)
                .ok_or_else(|| UnknownAccessLevel(n.to_string())),
            Value::String(s) => s.parse(),
            other => Err(UnknownAccessLevel(other.to_string())),
        }
    }

    pub fn to_json(self) -> Value {
        Value::from(self.value())
    }
}

/// Whether a holder of `held` may perform an operation requiring `required`.
pub fn grants(held: AccessLevel, required: AccessLevel) -> bool {
    held.value() <= required.value()
}

impl FromStr for AccessLevel {
    type Err = UnknownAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master" | "-1" => Ok(AccessLevel::Master),
            "default" | "1" => Ok(AccessLevel::Default),
            "limited" | "2" => Ok(AccessLevel::Limited),
            _ => Err(UnknownAccessLevel(s.to_string())),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        AccessLevel::from_json(&value).map_err(serde::de::Error::custom)
    }
}
