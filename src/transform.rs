//! # Model Transformer
//!
//! Turns domain records into JSON shaped by a response schema. Property names
//! come from the schema (camelCase on the wire) while values are read from the
//! record under their snake_case name:
//!
//! ```rust
//! use swaggerware::transform::{RecordValue, Transformer};
//! use swaggerware::spec::build_spec;
//! use swaggerware::registry::RouteRegistry;
//! use serde_json::json;
//!
//! let spec = build_spec(json!({"definitions": {}}), &RouteRegistry::new(), "").unwrap();
//! let schema = json!({"type": "object", "properties": {"userName": {"type": "string"}}});
//! let record = RecordValue::from(json!({"user_name": "alice"}));
//! let out = Transformer::new(&spec).transform(&schema, &record).unwrap();
//! assert_eq!(out, json!({"userName": "alice"}));
//! ```
//!
//! Records reach the transformer through the [`Record`] capability trait, so
//! plain JSON mappings and hand-written structs are handled alike. A property
//! the record does not have is left out of the output; a property the record
//! has with a null value is emitted as `null`.

use crate::spec::{OperationSpec, Specification};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

static FIRST_CAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.)([A-Z][a-z]+)").expect("word-start regex should be valid")
});
static ALL_CAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-z0-9])([A-Z])").expect("word-boundary regex should be valid")
});

/// Convert a camelCase (or PascalCase) name to snake_case.
///
/// `userName` becomes `user_name`, `HTTPResponseCode` becomes
/// `http_response_code`. Names already in snake_case are unchanged.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let step = FIRST_CAP.replace_all(name, "${1}_${2}");
    ALL_CAP.replace_all(&step, "${1}_${2}").to_lowercase()
}

/// Rename every mapping key in `value` to snake_case, recursively.
/// String values are left alone.
#[must_use]
pub fn camel_to_snake_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camel_to_snake(&k), camel_to_snake_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camel_to_snake_keys).collect()),
        other => other,
    }
}

/// Read access to a domain record by field name.
pub trait Record: fmt::Debug + Send + Sync {
    /// The value of `name`, or `None` when the record has no such field.
    fn get(&self, name: &str) -> Option<RecordValue>;

    /// Every field, used when the record is serialized without a schema.
    fn fields(&self) -> Vec<(String, RecordValue)>;
}

impl Record for Map<String, Value> {
    fn get(&self, name: &str) -> Option<RecordValue> {
        Map::get(self, name).cloned().map(RecordValue::from)
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        self.iter()
            .map(|(k, v)| (k.clone(), RecordValue::from(v.clone())))
            .collect()
    }
}

impl Record for BTreeMap<String, RecordValue> {
    fn get(&self, name: &str) -> Option<RecordValue> {
        BTreeMap::get(self, name).cloned()
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// A value read from a record.
#[derive(Debug, Clone)]
pub enum RecordValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Timezone(Tz),
    List(Vec<RecordValue>),
    Record(Arc<dyn Record>),
}

impl RecordValue {
    /// Wrap a struct-backed record.
    pub fn record(record: impl Record + 'static) -> Self {
        RecordValue::Record(Arc::new(record))
    }

    /// Null, false, zero and empty values are falsy; everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            RecordValue::Null => false,
            RecordValue::Bool(b) => *b,
            RecordValue::Integer(i) => *i != 0,
            RecordValue::Number(n) => *n != 0.0,
            RecordValue::String(s) => !s.is_empty(),
            RecordValue::List(items) => !items.is_empty(),
            RecordValue::Record(r) => !r.fields().is_empty(),
            RecordValue::Date(_)
            | RecordValue::Time(_)
            | RecordValue::DateTime(_)
            | RecordValue::Timezone(_) => true,
        }
    }

    /// Serialize without a schema: field names as the record has them,
    /// dates and times in their ISO forms.
    #[must_use]
    pub fn to_plain_json(&self) -> Value {
        match self {
            RecordValue::Null => Value::Null,
            RecordValue::Bool(b) => Value::Bool(*b),
            RecordValue::Integer(i) => Value::from(*i),
            RecordValue::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
            RecordValue::String(s) => Value::String(s.clone()),
            RecordValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            RecordValue::Time(t) => Value::String(t.format("%H:%M:%S").to_string()),
            RecordValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            RecordValue::Timezone(tz) => Value::String(tz.name().to_string()),
            RecordValue::List(items) => {
                Value::Array(items.iter().map(RecordValue::to_plain_json).collect())
            }
            RecordValue::Record(record) => Value::Object(
                record
                    .fields()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_plain_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for RecordValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RecordValue::Null,
            Value::Bool(b) => RecordValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RecordValue::Integer(i),
                None => RecordValue::Number(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => RecordValue::String(s),
            Value::Array(items) => {
                RecordValue::List(items.into_iter().map(RecordValue::from).collect())
            }
            Value::Object(map) => RecordValue::Record(Arc::new(map)),
        }
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Bool(b)
    }
}

impl From<i64> for RecordValue {
    fn from(i: i64) -> Self {
        RecordValue::Integer(i)
    }
}

impl From<i32> for RecordValue {
    fn from(i: i32) -> Self {
        RecordValue::Integer(i64::from(i))
    }
}

impl From<f64> for RecordValue {
    fn from(n: f64) -> Self {
        RecordValue::Number(n)
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::String(s)
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::String(s.to_string())
    }
}

impl From<NaiveDate> for RecordValue {
    fn from(d: NaiveDate) -> Self {
        RecordValue::Date(d)
    }
}

impl From<NaiveTime> for RecordValue {
    fn from(t: NaiveTime) -> Self {
        RecordValue::Time(t)
    }
}

impl From<DateTime<Utc>> for RecordValue {
    fn from(dt: DateTime<Utc>) -> Self {
        RecordValue::DateTime(dt)
    }
}

impl From<Tz> for RecordValue {
    fn from(tz: Tz) -> Self {
        RecordValue::Timezone(tz)
    }
}

impl<T: Into<RecordValue>> From<Option<T>> for RecordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RecordValue::Null, Into::into)
    }
}

impl<T: Into<RecordValue>> From<Vec<T>> for RecordValue {
    fn from(items: Vec<T>) -> Self {
        RecordValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Why a value could not be shaped by its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The handler has no operation spec
    NoOperation,
    /// The operation declares no schema for this status
    NoSchema(u16),
    UnresolvedRef(String),
    /// The value does not have the shape the schema describes
    Shape(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NoOperation => write!(f, "handler has no operation spec"),
            TransformError::NoSchema(status) => {
                write!(f, "no response schema declared for status {status}")
            }
            TransformError::UnresolvedRef(pointer) => {
                write!(f, "unresolvable reference `{pointer}`")
            }
            TransformError::Shape(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for TransformError {}

/// The schema a response with `status` must follow.
pub fn response_schema_for(
    operation: Option<&OperationSpec>,
    status: u16,
) -> Result<&Value, TransformError> {
    operation
        .ok_or(TransformError::NoOperation)?
        .response_schema(status)
        .ok_or(TransformError::NoSchema(status))
}

/// Shapes records by schema nodes of one specification.
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    spec: &'a Specification,
}

impl<'a> Transformer<'a> {
    #[must_use]
    pub fn new(spec: &'a Specification) -> Self {
        Self { spec }
    }

    fn resolve(&self, schema: &'a Value) -> Result<&'a Value, TransformError> {
        let mut current = schema;
        // bounded so a self-referencing alias cannot loop
        for _ in 0..32 {
            match current.get("$ref").and_then(Value::as_str) {
                Some(pointer) => {
                    current = self
                        .spec
                        .resolve_ref(pointer)
                        .ok_or_else(|| TransformError::UnresolvedRef(pointer.to_string()))?;
                }
                None => return Ok(current),
            }
        }
        Err(TransformError::Shape("reference chain too deep".to_string()))
    }

    /// Shape `value` by `schema`.
    pub fn transform(&self, schema: &'a Value, value: &RecordValue) -> Result<Value, TransformError> {
        let schema = self.resolve(schema)?;
        let kind = schema.get("type").and_then(Value::as_str);
        let properties = schema.get("properties").and_then(Value::as_object);

        match (kind, properties) {
            (Some("object") | None, Some(properties)) => self.object(properties, value),
            (Some("array"), _) => self.array(schema.get("items"), value),
            _ => Ok(self.leaf(schema, value)),
        }
    }

    fn object(
        &self,
        properties: &'a Map<String, Value>,
        value: &RecordValue,
    ) -> Result<Value, TransformError> {
        let record = match value {
            RecordValue::Null => return Ok(Value::Null),
            RecordValue::Record(record) => record,
            other => {
                return Err(TransformError::Shape(format!(
                    "expected a record, got {}",
                    other.to_plain_json()
                )))
            }
        };

        let mut out = Map::with_capacity(properties.len());
        for (name, property_schema) in properties {
            let field = record
                .get(&camel_to_snake(name))
                .or_else(|| record.get(name));
            if let Some(field) = field {
                out.insert(name.clone(), self.transform(property_schema, &field)?);
            }
        }
        Ok(Value::Object(out))
    }

    fn array(&self, items: Option<&'a Value>, value: &RecordValue) -> Result<Value, TransformError> {
        match (value, items) {
            (RecordValue::Null, _) => Ok(Value::Null),
            (RecordValue::List(elements), Some(items)) => elements
                .iter()
                .map(|element| self.transform(items, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (RecordValue::List(_), None) => Ok(value.to_plain_json()),
            (other, _) => Err(TransformError::Shape(format!(
                "expected a list, got {}",
                other.to_plain_json()
            ))),
        }
    }

    fn leaf(&self, schema: &Value, value: &RecordValue) -> Value {
        let format = schema.get("format").and_then(Value::as_str);
        if !value.is_truthy() {
            return value.to_plain_json();
        }
        match (format, value) {
            (Some("date"), RecordValue::Date(d)) => Value::String(d.format("%Y-%m-%d").to_string()),
            (Some("date"), RecordValue::DateTime(dt)) => {
                Value::String(dt.date_naive().format("%Y-%m-%d").to_string())
            }
            (Some("time"), RecordValue::Time(t)) => Value::String(t.format("%H:%M:%S").to_string()),
            (Some("time"), RecordValue::DateTime(dt)) => {
                Value::String(dt.time().format("%H:%M:%S").to_string())
            }
            (Some("timezone"), RecordValue::Timezone(tz)) => Value::String(tz.name().to_string()),
            _ => value.to_plain_json(),
        }
    }
}
