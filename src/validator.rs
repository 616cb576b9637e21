//! # Request/Response Validator
//!
//! Checks inbound requests and outbound responses against the operation spec
//! of the route they belong to. Routes without an operation spec are not
//! checked at all.
//!
//! Inbound, in order:
//!
//! 1. path parameters, coerced to their declared scalar type
//! 2. query parameters: unknown names are rejected, required names must be
//!    present, and each value is coerced to its declared type and checked
//! 3. the body, when a body parameter is declared: it must parse as JSON,
//!    must not be empty, and must match the body schema
//!
//! Outbound, the status actually returned must be declared. When its entry
//! carries a schema, the body is parsed as JSON whatever its content type
//! and must match it.
//!
//! Inbound failures become [`ValidationError::Request`] (answered with 400),
//! outbound failures [`ValidationError::Response`] (answered with 500).
//! Defects in the schemas themselves, such as an unknown format, are
//! [`ValidationError::Schema`] and also answered with 500.

use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::format::FormatRegistry;
use crate::router::ParamVec;
use crate::schema::{SchemaError, SchemaValidator};
use crate::spec::{
    OperationSpec, ParameterLocation, ParameterMeta, SpecError, SpecIssue, Specification,
};
use crate::transform::RecordValue;
use crate::validator_cache::ValidatorCache;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a request or response was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The request does not conform to the operation spec
    Request(String),
    /// The response does not conform to the operation spec
    Response(String),
    /// A schema involved is itself defective
    Schema(SchemaError),
}

impl ValidationError {
    /// HTTP status the failure is answered with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            ValidationError::Request(_) => 400,
            ValidationError::Response(_) | ValidationError::Schema(_) => 500,
        }
    }

    /// The human-readable detail placed in the error body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ValidationError::Request(message) | ValidationError::Response(message) => {
                message.clone()
            }
            ValidationError::Schema(e) => e.to_string(),
        }
    }

    /// The error response replacing the handler's output.
    #[must_use]
    pub fn to_response(&self) -> HandlerResponse {
        HandlerResponse::error(self.status(), &self.message())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Request(message) => write!(f, "invalid request: {message}"),
            ValidationError::Response(message) => write!(f, "invalid response: {message}"),
            ValidationError::Schema(e) => write!(f, "schema defect: {e}"),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Schema(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of applying a schema, with instance failures tagged as request
/// or response failures by `wrap`.
fn classify(
    result: Result<(), SchemaError>,
    wrap: fn(String) -> ValidationError,
) -> Result<(), ValidationError> {
    match result {
        Ok(()) => Ok(()),
        Err(SchemaError::Invalid(message)) => Err(wrap(message)),
        Err(other) => Err(ValidationError::Schema(other)),
    }
}

/// Convert a parameter's wire string to the JSON value its schema expects.
///
/// Integers and numbers that do not parse stay strings so the schema check
/// reports the type mismatch. Booleans must read `true` or `false`.
fn coerce_scalar(kind: Option<&str>, raw: &str) -> Result<Value, String> {
    match kind {
        Some("integer") => Ok(raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string()))),
        Some("number") => Ok(raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(raw.to_string()), Value::Number)),
        Some("boolean") => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("`{raw}` is not a boolean")),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn coerce_parameter(meta: &ParameterMeta, raw: &str) -> Result<Value, String> {
    if meta.schema_type() == Some("array") {
        let item_kind = meta
            .schema
            .as_ref()
            .and_then(|s| s.get("items"))
            .and_then(|items| items.get("type"))
            .and_then(Value::as_str);
        let separator = match meta
            .schema
            .as_ref()
            .and_then(|s| s.get("collectionFormat"))
            .and_then(Value::as_str)
        {
            Some("ssv") => ' ',
            Some("tsv") => '\t',
            Some("pipes") => '|',
            _ => ',',
        };
        return raw
            .split(separator)
            .map(|item| coerce_scalar(item_kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    coerce_scalar(meta.schema_type(), raw)
}

fn last_value<'a>(params: &'a ParamVec, name: &str) -> Option<&'a str> {
    params
        .iter()
        .rfind(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v.as_str())
}

/// Validates requests and responses against one [`Specification`].
#[derive(Debug, Clone)]
pub struct Validator {
    spec: Arc<Specification>,
    schemas: SchemaValidator,
}

impl Validator {
    /// Build a validator; every definition of `spec` is checked against the
    /// format table here.
    pub fn new(
        spec: Arc<Specification>,
        formats: FormatRegistry,
        cache: ValidatorCache,
    ) -> Result<Self, SchemaError> {
        let schemas = SchemaValidator::new(&spec.definitions(), formats, cache)?;
        Ok(Self { spec, schemas })
    }

    #[must_use]
    pub fn spec(&self) -> &Arc<Specification> {
        &self.spec
    }

    #[must_use]
    pub fn schemas(&self) -> &SchemaValidator {
        &self.schemas
    }

    /// Compile every parameter and response schema of every operation.
    ///
    /// Returns the number of schemas compiled, or every defect found.
    pub fn precompile(&self) -> Result<usize, SpecError> {
        let mut compiled = 0;
        let mut issues = Vec::new();
        let mut handlers: Vec<&String> = self.spec.operations().keys().collect();
        handlers.sort();

        for handler in handlers {
            let Some(op) = self.spec.operation(handler) else {
                continue;
            };
            let parameter_schemas = op.parameters.iter().filter_map(|p| {
                let location = format!("{handler}.parameters.{}", p.name);
                p.schema.as_ref().map(|s| (location, s))
            });
            let response_schemas = op.responses.iter().filter_map(|(status, r)| {
                let location = format!("{handler}.responses.{status}");
                r.schema.as_ref().map(|s| (location, s))
            });

            for (location, schema) in parameter_schemas.chain(response_schemas) {
                match self.schemas.compile(schema) {
                    Ok(_) => compiled += 1,
                    Err(e) => issues.push(SpecIssue::new(location, "schema", e.to_string())),
                }
            }
        }

        if !issues.is_empty() {
            return Err(SpecError::Issues(issues));
        }
        info!(compiled = compiled, "Schemas precompiled");
        Ok(compiled)
    }

    /// Check an inbound request; `Ok` when it has no operation spec.
    pub fn validate_request(&self, req: &HandlerRequest) -> Result<(), ValidationError> {
        let Some(op) = req.operation.as_deref() else {
            return Ok(());
        };
        self.validate_path(op, &req.path_params)?;
        self.validate_query(op, &req.query_params)?;
        self.validate_body(op, req)
    }

    /// Check the path parameters of a request.
    pub fn validate_path(
        &self,
        op: &OperationSpec,
        params: &ParamVec,
    ) -> Result<(), ValidationError> {
        for (name, _) in params {
            if !op
                .parameters_in(ParameterLocation::Path)
                .any(|p| p.name == name.as_ref())
            {
                debug!(
                    handler = %op.handler_name,
                    parameter = %name,
                    "Undeclared path parameter"
                );
            }
        }

        for meta in op.parameters_in(ParameterLocation::Path) {
            let Some(raw) = last_value(params, &meta.name) else {
                return Err(ValidationError::Request(format!(
                    "Missing path-parameter: {}",
                    meta.name
                )));
            };
            let Some(schema) = meta.schema.as_ref() else {
                continue;
            };
            let value = coerce_parameter(meta, raw).map_err(|e| {
                ValidationError::Request(format!("Invalid path-parameter {}: {e}", meta.name))
            })?;
            classify(
                self.schemas.validate(&value, schema),
                ValidationError::Request,
            )?;
        }
        Ok(())
    }

    /// Check the query string of a request.
    pub fn validate_query(
        &self,
        op: &OperationSpec,
        params: &ParamVec,
    ) -> Result<(), ValidationError> {
        let declared: Vec<&ParameterMeta> = op.parameters_in(ParameterLocation::Query).collect();

        for (name, _) in params {
            if !declared.iter().any(|p| p.name == name.as_ref()) {
                return Err(ValidationError::Request(format!(
                    "Invalid query-parameter: {name}"
                )));
            }
        }

        let missing: BTreeSet<&str> = declared
            .iter()
            .filter(|p| p.required && last_value(params, &p.name).is_none())
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::Request(format!(
                "Missing required query-parameters: {}",
                missing.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        for meta in declared {
            let (Some(raw), Some(schema)) = (last_value(params, &meta.name), meta.schema.as_ref())
            else {
                continue;
            };
            let value = coerce_parameter(meta, raw).map_err(|e| {
                ValidationError::Request(format!("Invalid query-parameter {}: {e}", meta.name))
            })?;
            classify(
                self.schemas.validate(&value, schema),
                ValidationError::Request,
            )?;
        }
        Ok(())
    }

    /// Check the body of a request against its declared body parameter.
    pub fn validate_body(
        &self,
        op: &OperationSpec,
        req: &HandlerRequest,
    ) -> Result<(), ValidationError> {
        let Some(schema) = op.body_parameter().and_then(|p| p.schema.as_ref()) else {
            return Ok(());
        };
        let body = req.json_body().map_err(|e| {
            ValidationError::Request(format!("Request body is not valid JSON: {e}"))
        })?;
        if !RecordValue::from(body.clone()).is_truthy() {
            return Err(ValidationError::Request("Missing request-body".to_string()));
        }
        classify(self.schemas.validate(&body, schema), ValidationError::Request)
    }

    /// Check an outbound response against the operation spec.
    pub fn validate_response(
        &self,
        op: Option<&OperationSpec>,
        resp: &HandlerResponse,
    ) -> Result<(), ValidationError> {
        let Some(op) = op else {
            return Ok(());
        };
        let Some(declared) = op.response(resp.status) else {
            return Err(ValidationError::Response(format!(
                "Response `{}` not defined in schema",
                resp.status
            )));
        };
        let Some(schema) = declared.schema.as_ref() else {
            return Ok(());
        };

        let body = resp.json_body().map_err(|e| {
            ValidationError::Response(format!("Response body is not valid JSON: {e}"))
        })?;
        classify(self.schemas.validate(&body, schema), ValidationError::Response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(schema: Value) -> ParameterMeta {
        ParameterMeta {
            name: "p".to_string(),
            location: ParameterLocation::Query,
            required: false,
            schema: Some(schema),
        }
    }

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(coerce_parameter(&meta(json!({"type": "integer"})), "42"), Ok(json!(42)));
        assert_eq!(coerce_parameter(&meta(json!({"type": "integer"})), "x"), Ok(json!("x")));
        assert_eq!(coerce_parameter(&meta(json!({"type": "number"})), "1.5"), Ok(json!(1.5)));
        assert_eq!(coerce_parameter(&meta(json!({"type": "boolean"})), "True"), Ok(json!(true)));
        assert!(coerce_parameter(&meta(json!({"type": "boolean"})), "yes").is_err());
        assert_eq!(coerce_parameter(&meta(json!({"type": "string"})), "1"), Ok(json!("1")));
    }

    #[test]
    fn test_coerce_arrays() {
        let schema = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(coerce_parameter(&meta(schema), "1,2,3"), Ok(json!([1, 2, 3])));
        let pipes = json!({"type": "array", "collectionFormat": "pipes", "items": {"type": "string"}});
        assert_eq!(coerce_parameter(&meta(pipes), "a|b"), Ok(json!(["a", "b"])));
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(ValidationError::Request("x".into()).status(), 400);
        assert_eq!(ValidationError::Response("x".into()).status(), 500);
        let schema = ValidationError::Schema(SchemaError::UnknownFormat("colour".into()));
        assert_eq!(schema.status(), 500);
        assert_eq!(schema.message(), "Unknown format `colour` in schema");
    }
}
