#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Tests for schema, request and response validation

use http::Method;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use swaggerware::dispatcher::{HandlerRequest, HandlerResponse, HeaderVec};
use swaggerware::format::FormatRegistry;
use swaggerware::ids::RequestId;
use swaggerware::registry::{Route, RouteRegistry};
use swaggerware::router::ParamVec;
use swaggerware::schema::{SchemaError, SchemaValidator};
use swaggerware::spec::{build_spec, Specification};
use swaggerware::validator::{ValidationError, Validator};
use swaggerware::validator_cache::ValidatorCache;

const SEARCH_DOC: &str = "Search.
---
parameters:
  - name: email
    in: query
    required: true
    type: string
  - name: page
    in: query
    type: integer
    minimum: 1
  - name: verbose
    in: query
    type: boolean
  - name: kind
    in: query
    type: string
    enum: [a, b]
responses:
  200:
    description: Matches
    schema:
      type: array
      items:
        $ref: '#/definitions/Thing'
  204:
    description: Nothing to report
";

fn base() -> Value {
    json!({
        "swagger": "2.0",
        "info": {"title": "t", "version": "1"},
        "definitions": {
            "ErrorResponse": {
                "type": "object",
                "required": ["code", "name", "description"],
                "properties": {
                    "code": {"type": "integer"},
                    "name": {"type": "string"},
                    "description": {"type": "string"}
                }
            },
            "Thing": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string"},
                    "bornOn": {"type": "string", "format": "date", "x-nullable": true}
                }
            }
        }
    })
}

fn spec() -> Arc<Specification> {
    let mut registry = RouteRegistry::new();
    registry.add(Route::new(Method::GET, "/things", "search").doc(SEARCH_DOC));
    Arc::new(build_spec(base(), &registry, "").unwrap())
}

fn validator() -> Validator {
    Validator::new(spec(), FormatRegistry::with_defaults(), ValidatorCache::default()).unwrap()
}

fn schemas() -> SchemaValidator {
    let definitions: Map<String, Value> = base()["definitions"].as_object().unwrap().clone();
    SchemaValidator::new(&definitions, FormatRegistry::with_defaults(), ValidatorCache::default())
        .unwrap()
}

fn request(query: &[(&str, &str)]) -> HandlerRequest {
    let query_params: ParamVec = query
        .iter()
        .map(|(k, v)| (Arc::from(*k), (*v).to_string()))
        .collect();
    HandlerRequest {
        request_id: RequestId::new(),
        method: Method::GET,
        path: "/things".to_string(),
        handler_name: "search".to_string(),
        path_params: ParamVec::new(),
        query_params,
        headers: HeaderVec::new(),
        body: Vec::new(),
        operation: spec().operation("search"),
    }
}

#[test]
fn test_missing_required_query_parameter() {
    let err = validator().validate_request(&request(&[])).unwrap_err();
    assert_eq!(err.status(), 400);
    assert_eq!(
        err,
        ValidationError::Request("Missing required query-parameters: email".to_string())
    );
}

#[test]
fn test_query_parameters_coerced_before_check() {
    let v = validator();
    assert!(v
        .validate_request(&request(&[("email", "a@b.c"), ("page", "2"), ("verbose", "false")]))
        .is_ok());

    let err = v
        .validate_request(&request(&[("email", "a@b.c"), ("page", "0")]))
        .unwrap_err();
    assert_eq!(err.status(), 400);

    let err = v
        .validate_request(&request(&[("email", "a@b.c"), ("page", "two")]))
        .unwrap_err();
    assert_eq!(err.status(), 400);
}

#[test]
fn test_last_repeated_query_value_wins() {
    let v = validator();
    assert!(v
        .validate_request(&request(&[("email", "a@b.c"), ("page", "0"), ("page", "3")]))
        .is_ok());
}

#[test]
fn test_enum_violation_names_the_value() {
    let err = validator()
        .validate_request(&request(&[("email", "a@b.c"), ("kind", "c")]))
        .unwrap_err();
    let message = err.message();
    assert!(message.contains("\"c\""), "{message}");
    assert!(message.contains("is not one of"), "{message}");
}

#[test]
fn test_enum_schema_directly() {
    let err = schemas()
        .validate(&json!("c"), &json!({"type": "string", "enum": ["a", "b"]}))
        .unwrap_err();
    match err {
        SchemaError::Invalid(message) => {
            assert!(message.contains("\"c\""), "{message}");
            assert!(message.contains("is not one of"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_nullable_accepts_null_only_when_marked() {
    let s = schemas();
    let nullable = json!({"type": "string", "format": "date", "nullable": true});
    let x_nullable = json!({"type": "string", "enum": ["a", "b"], "x-nullable": true});
    let strict = json!({"type": "string", "enum": ["a", "b"]});

    assert!(s.validate(&Value::Null, &nullable).is_ok());
    assert!(s.validate(&json!("2024-01-31"), &nullable).is_ok());
    assert!(s.validate(&json!("2024-02-31"), &nullable).is_err());
    assert!(s.validate(&Value::Null, &x_nullable).is_ok());
    assert!(s.validate(&json!("z"), &x_nullable).is_err());
    assert!(s.validate(&Value::Null, &strict).is_err());
}

#[test]
fn test_nullable_property_through_ref() {
    let s = schemas();
    let thing = json!({"$ref": "#/definitions/Thing"});
    assert!(s.validate(&json!({"name": "x", "bornOn": null}), &thing).is_ok());
    assert!(s.validate(&json!({"bornOn": "2020-01-01"}), &thing).is_err());
}

#[test]
fn test_unknown_format_is_distinct() {
    let err = schemas()
        .validate(&json!("x"), &json!({"type": "string", "format": "galaxy"}))
        .unwrap_err();
    assert_eq!(err, SchemaError::UnknownFormat("galaxy".to_string()));
}

#[test]
fn test_standard_formats_accepted_in_schemas() {
    let s = schemas();
    let ip = json!({"type": "string", "format": "ipv4"});
    assert!(s.validate(&json!("10.0.0.1"), &ip).is_ok());
    assert!(matches!(
        s.validate(&json!("nope"), &ip),
        Err(SchemaError::Invalid(_))
    ));
    let uri = json!({"type": "string", "format": "uri"});
    assert!(s.validate(&json!("https://example.com/x"), &uri).is_ok());
}

#[test]
fn test_type_arrays_rejected() {
    let err = schemas()
        .validate(&json!("x"), &json!({"type": ["string", "null"]}))
        .unwrap_err();
    assert!(matches!(err, SchemaError::TypeArray(_)));
}

#[test]
fn test_unresolved_ref() {
    let err = schemas()
        .validate(&json!({}), &json!({"$ref": "#/definitions/Nope"}))
        .unwrap_err();
    assert_eq!(err, SchemaError::UnresolvedRef("#/definitions/Nope".to_string()));
}

#[test]
fn test_unknown_format_in_operation_fails_precompile() {
    let doc = "x\n---\nparameters:\n  - name: when\n    in: query\n    type: string\n    format: stardate\nresponses:\n  200:\n    description: ok\n";
    let mut registry = RouteRegistry::new();
    registry.add(Route::new(Method::GET, "/x", "x").doc(doc));
    let spec = Arc::new(build_spec(base(), &registry, "").unwrap());
    let v = Validator::new(spec, FormatRegistry::with_defaults(), ValidatorCache::default())
        .unwrap();
    assert!(v.precompile().is_err());
}

#[test]
fn test_response_status_must_be_declared() {
    let v = validator();
    let op = spec().operation("search").unwrap();
    let resp = HandlerResponse::json(202, &json!([]));
    let err = v.validate_response(Some(&*op), &resp).unwrap_err();
    assert_eq!(err.status(), 500);
    assert_eq!(err.message(), "Response `202` not defined in schema");
}

#[test]
fn test_response_body_checked_against_schema() {
    let v = validator();
    let op = spec().operation("search").unwrap();
    let good = HandlerResponse::json(200, &json!([{"name": "a", "bornOn": null}]));
    assert!(v.validate_response(Some(&*op), &good).is_ok());

    let bad = HandlerResponse::json(200, &json!([{"bornOn": "2020-01-01"}]));
    assert!(matches!(
        v.validate_response(Some(&*op), &bad),
        Err(ValidationError::Response(_))
    ));

    let garbage = HandlerResponse::new(200, b"{".to_vec()).with_content_type("application/json");
    assert_eq!(
        v.validate_response(Some(&*op), &garbage).unwrap_err().status(),
        500
    );
}

#[test]
fn test_declared_status_without_schema_accepted() {
    let v = validator();
    let op = spec().operation("search").unwrap();
    assert!(v
        .validate_response(Some(&*op), &HandlerResponse::new(204, Vec::new()))
        .is_ok());
}

#[test]
fn test_default_error_responses_validate() {
    let v = validator();
    let op = spec().operation("search").unwrap();
    let resp = HandlerResponse::error(400, "Missing required query-parameters: email");
    assert!(v.validate_response(Some(&*op), &resp).is_ok());
    let resp = HandlerResponse::error(500, "boom");
    assert!(v.validate_response(Some(&*op), &resp).is_ok());
}

#[test]
fn test_no_operation_skips_validation() {
    let v = validator();
    let mut req = request(&[]);
    req.operation = None;
    assert!(v.validate_request(&req).is_ok());
    assert!(v
        .validate_response(None, &HandlerResponse::new(799, Vec::new()))
        .is_ok());
}

#[test]
fn test_precompile_counts_schemas() {
    // email, page, verbose, kind, 200, 400, 500
    assert_eq!(validator().precompile().unwrap(), 7);
}
