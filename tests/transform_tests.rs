#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Tests for shaping records by response schemas

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use swaggerware::format::FormatRegistry;
use swaggerware::registry::RouteRegistry;
use swaggerware::schema::SchemaValidator;
use swaggerware::spec::{build_spec, Specification};
use swaggerware::transform::{Record, RecordValue, Transformer};
use swaggerware::validator_cache::ValidatorCache;

fn spec() -> Specification {
    let base = json!({
        "swagger": "2.0",
        "info": {"title": "t", "version": "1"},
        "definitions": {
            "Appointment": {
                "type": "object",
                "required": ["userName", "day", "startsAt", "timezone"],
                "properties": {
                    "userName": {"type": "string"},
                    "day": {"type": "string", "format": "date"},
                    "startsAt": {"type": "string", "format": "time"},
                    "timezone": {"type": "string", "format": "timezone"},
                    "createdAt": {"type": "string", "format": "date-time"},
                    "note": {"type": "string", "x-nullable": true},
                    "attendeeIds": {"type": "array", "items": {"type": "integer"}}
                }
            },
            "Calendar": {
                "type": "object",
                "properties": {
                    "ownerName": {"type": "string"},
                    "appointments": {
                        "type": "array",
                        "items": {"$ref": "#/definitions/Appointment"}
                    }
                }
            },
            "CalendarAlias": {"$ref": "#/definitions/Calendar"}
        }
    });
    build_spec(base, &RouteRegistry::new(), "").unwrap()
}

fn schemas(spec: &Specification) -> SchemaValidator {
    SchemaValidator::new(
        &spec.definitions(),
        FormatRegistry::with_defaults(),
        ValidatorCache::default(),
    )
    .unwrap()
}

#[derive(Debug)]
struct Appointment {
    user_name: String,
    day: NaiveDate,
    starts_at: NaiveTime,
    timezone: chrono_tz::Tz,
    note: Option<String>,
    attendee_ids: Vec<i64>,
}

impl Record for Appointment {
    fn get(&self, name: &str) -> Option<RecordValue> {
        match name {
            "user_name" => Some(self.user_name.as_str().into()),
            "day" => Some(self.day.into()),
            "starts_at" => Some(self.starts_at.into()),
            "timezone" => Some(self.timezone.into()),
            "note" => Some(self.note.clone().into()),
            "attendee_ids" => Some(self.attendee_ids.clone().into()),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(String, RecordValue)> {
        ["user_name", "day", "starts_at", "timezone", "note", "attendee_ids"]
            .iter()
            .filter_map(|n| self.get(n).map(|v| ((*n).to_string(), v)))
            .collect()
    }
}

fn appointment() -> Appointment {
    Appointment {
        user_name: "alice".to_string(),
        day: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        starts_at: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        timezone: chrono_tz::Europe::Berlin,
        note: None,
        attendee_ids: vec![3, 4],
    }
}

#[test]
fn test_snake_case_record_to_declared_names() {
    let spec = spec();
    let schema = json!({"type": "object", "properties": {"userName": {"type": "string"}}});
    let mut record = Map::new();
    record.insert("user_name".to_string(), json!("alice"));
    let out = Transformer::new(&spec)
        .transform(&schema, &RecordValue::record(record))
        .unwrap();
    assert_eq!(out, json!({"userName": "alice"}));
}

#[test]
fn test_null_skips_format_conversion() {
    let spec = spec();
    let schema = json!({"type": "string", "format": "date", "nullable": true});
    let out = Transformer::new(&spec)
        .transform(&schema, &RecordValue::from(None::<NaiveDate>))
        .unwrap();
    assert_eq!(out, Value::Null);
}

#[test]
fn test_struct_record_round_trips_through_validation() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/Appointment"});
    let out = Transformer::new(&spec)
        .transform(&schema, &RecordValue::record(appointment()))
        .unwrap();

    assert_eq!(
        out,
        json!({
            "userName": "alice",
            "day": "2024-02-29",
            "startsAt": "09:30:00",
            "timezone": "Europe/Berlin",
            "note": null,
            "attendeeIds": [3, 4]
        })
    );
    assert!(schemas(&spec).validate(&out, &schema).is_ok());
}

#[test]
fn test_missing_optional_property_is_absent() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/Appointment"});
    let out = Transformer::new(&spec)
        .transform(&schema, &RecordValue::record(appointment()))
        .unwrap();
    let obj = out.as_object().unwrap();
    assert!(!obj.contains_key("createdAt"));
    assert!(obj.contains_key("note"));
}

#[test]
fn test_transform_is_idempotent() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/Appointment"});
    let transformer = Transformer::new(&spec);
    let once = transformer
        .transform(&schema, &RecordValue::record(appointment()))
        .unwrap();
    let twice = transformer
        .transform(&schema, &RecordValue::from(once.clone()))
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_nested_arrays_and_alias_refs() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/CalendarAlias"});
    let mut calendar: BTreeMap<String, RecordValue> = BTreeMap::new();
    calendar.insert("owner_name".to_string(), "bob".into());
    calendar.insert(
        "appointments".to_string(),
        RecordValue::List(vec![RecordValue::record(appointment())]),
    );

    let out = Transformer::new(&spec)
        .transform(&schema, &RecordValue::record(calendar))
        .unwrap();
    assert_eq!(out["ownerName"], json!("bob"));
    assert_eq!(out["appointments"][0]["startsAt"], json!("09:30:00"));
    assert!(schemas(&spec).validate(&out, &schema).is_ok());
}

#[test]
fn test_datetime_rendered_by_declared_format() {
    let spec = spec();
    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let transformer = Transformer::new(&spec);
    let date = json!({"type": "string", "format": "date"});
    let time = json!({"type": "string", "format": "time"});
    assert_eq!(
        transformer.transform(&date, &RecordValue::from(at)).unwrap(),
        json!("2024-05-06")
    );
    assert_eq!(
        transformer.transform(&time, &RecordValue::from(at)).unwrap(),
        json!("07:08:09")
    );
}

#[test]
fn test_unresolvable_ref_is_an_error() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/Missing"});
    assert!(Transformer::new(&spec)
        .transform(&schema, &RecordValue::Null)
        .is_err());
}

#[test]
fn test_non_record_for_object_schema_is_an_error() {
    let spec = spec();
    let schema = json!({"$ref": "#/definitions/Appointment"});
    assert!(Transformer::new(&spec)
        .transform(&schema, &RecordValue::from("alice"))
        .is_err());
}
