//! Core data models used throughout Event Harvester.
//!
//! Events move through three shapes:
//!
//! 1. [`CandidateEvent`]: untrusted output parsed from the language model.
//! 2. [`CanonicalEvent`]: normalized, with every field either known or
//!    explicitly unknown.
//! 3. [`EventRow`] / [`StoredEvent`]: the store representation, where
//!    unknown fields are spelled with sentinel strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Placeholder written for any unknown field other than location.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Placeholder written for an unknown location.
///
/// Distinct from [`NOT_AVAILABLE`]; the low-quality sweep matches each
/// sentinel on its own column.
pub const LOCATION_UNAVAILABLE: &str = "We're sorry, not available";

/// One event as returned by the model, before any validation.
///
/// Field names follow the model's output contract (`Date`, `Name`, ...).
/// Lowercase spellings are accepted as aliases. Any field may be missing;
/// falsy JSON values (`null`, `""`, `false`, `0`, `[]`, `{}`) deserialize to
/// `None` and other scalars are stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateEvent {
    #[serde(rename = "Date", alias = "date", default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(rename = "Name", alias = "name", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "Time", alias = "time", default, deserialize_with = "lenient_text")]
    pub time: Option<String>,
    #[serde(
        rename = "Location",
        alias = "location",
        default,
        deserialize_with = "lenient_text"
    )]
    pub location: Option<String>,
    #[serde(
        rename = "Description",
        alias = "description",
        default,
        deserialize_with = "lenient_text"
    )]
    pub description: Option<String>,
    #[serde(rename = "Price", alias = "price", default, deserialize_with = "lenient_text")]
    pub price: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

/// Convert a loosely typed JSON value to text, treating falsy values as absent.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// A normalized event. `None` means the model did not provide the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub date: Option<String>,
    pub name: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
}

impl CanonicalEvent {
    /// Materialize the store form, substituting sentinels for unknown fields.
    pub fn to_row(&self) -> EventRow {
        let or_na = |field: &Option<String>| {
            field.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };
        EventRow {
            name: or_na(&self.name),
            price: or_na(&self.price),
            location: self
                .location
                .clone()
                .unwrap_or_else(|| LOCATION_UNAVAILABLE.to_string()),
            date: or_na(&self.date),
            time: or_na(&self.time),
            description: or_na(&self.description),
        }
    }
}

/// The six persisted event columns. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub name: String,
    pub price: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub description: String,
}

/// A persisted row together with its store identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    #[serde(flatten)]
    pub row: EventRow,
}
