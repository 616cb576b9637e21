//! # Schema Validator
//!
//! Validates JSON values against schema nodes taken from the merged
//! specification. `$ref` pointers of the form `#/definitions/<Name>` resolve
//! against the specification's `definitions`.
//!
//! Two keywords behave differently from stock Draft 4:
//!
//! - `type` must be a single type name. A list of types is rejected outright.
//!   A node marked `nullable: true` (or `x-nullable: true`) also accepts
//!   `null`.
//! - `enum` on a nullable node also accepts `null`.
//!
//! Both are implemented by lowering each schema node before it is handed to
//! the `jsonschema` compiler: nullable nodes get `"null"` added to their type
//! and enum, type lists fail with [`SchemaError::TypeArray`], and any `format`
//! missing from the [`FormatRegistry`] fails with
//! [`SchemaError::UnknownFormat`]. The lowered node is wrapped together with
//! the lowered definitions so internal references resolve, compiled once, and
//! kept in the [`ValidatorCache`].

use crate::format::FormatRegistry;
use crate::validator_cache::ValidatorCache;
use jsonschema::{Draft, Validator};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Errors raised while compiling or applying a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The instance does not conform to the schema
    Invalid(String),
    /// The schema names a format with no registered checker
    UnknownFormat(String),
    /// The schema declares `type` as a list
    TypeArray(Value),
    /// A `$ref` points at a definition that does not exist
    UnresolvedRef(String),
    /// The lowered schema was rejected by the compiler
    Compile(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Invalid(message) => write!(f, "{message}"),
            SchemaError::UnknownFormat(name) => write!(f, "Unknown format `{name}` in schema"),
            SchemaError::TypeArray(types) => {
                write!(f, "Swagger 2.0 doesn't allow type-arrays (got {types})")
            }
            SchemaError::UnresolvedRef(pointer) => write!(f, "Unresolvable reference `{pointer}`"),
            SchemaError::Compile(message) => write!(f, "Invalid schema: {message}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Whether a schema node accepts an explicit `null`.
#[must_use]
pub fn is_nullable(node: &Map<String, Value>) -> bool {
    ["nullable", "x-nullable"]
        .iter()
        .any(|key| node.get(*key).and_then(Value::as_bool).unwrap_or(false))
}

struct Lowering<'a> {
    formats: &'a FormatRegistry,
    definition_names: &'a BTreeSet<String>,
}

impl Lowering<'_> {
    fn node(&self, node: &Value) -> Result<Value, SchemaError> {
        let Some(obj) = node.as_object() else {
            return Ok(node.clone());
        };

        if let Some(Value::Array(types)) = obj.get("type") {
            return Err(SchemaError::TypeArray(Value::Array(types.clone())));
        }
        if let Some(Value::String(name)) = obj.get("format") {
            if !self.formats.contains(name) {
                return Err(SchemaError::UnknownFormat(name.clone()));
            }
        }
        if let Some(Value::String(pointer)) = obj.get("$ref") {
            match pointer.strip_prefix(DEFINITIONS_PREFIX) {
                Some(name) if self.definition_names.contains(name) => {}
                _ => return Err(SchemaError::UnresolvedRef(pointer.clone())),
            }
        }

        let mut out = Map::with_capacity(obj.len() + 1);
        for (key, value) in obj {
            let lowered = match key.as_str() {
                "properties" | "patternProperties" | "definitions" => self.map(value)?,
                "items" => match value {
                    Value::Array(items) => self.list(items)?,
                    other => self.node(other)?,
                },
                "allOf" | "anyOf" | "oneOf" => match value {
                    Value::Array(items) => self.list(items)?,
                    other => other.clone(),
                },
                "additionalProperties" | "additionalItems" | "not" => self.node(value)?,
                _ => value.clone(),
            };
            out.insert(key.clone(), lowered);
        }

        if is_nullable(obj) {
            if let Some(Value::String(kind)) = out.get("type").cloned() {
                out.insert("type".to_string(), json!([kind, "null"]));
            }
            if let Some(Value::Array(options)) = out.get_mut("enum") {
                if !options.contains(&Value::Null) {
                    options.push(Value::Null);
                }
            }
        }

        Ok(Value::Object(out))
    }

    fn map(&self, value: &Value) -> Result<Value, SchemaError> {
        match value {
            Value::Object(entries) => {
                let mut out = Map::with_capacity(entries.len());
                for (name, schema) in entries {
                    out.insert(name.clone(), self.node(schema)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn list(&self, items: &[Value]) -> Result<Value, SchemaError> {
        items
            .iter()
            .map(|item| self.node(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

/// Validates instances against schema nodes of one specification.
///
/// Cheap to clone; clones share the compiled-validator cache.
#[derive(Clone)]
pub struct SchemaValidator {
    definitions: Arc<Map<String, Value>>,
    definition_names: Arc<BTreeSet<String>>,
    formats: FormatRegistry,
    cache: ValidatorCache,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("definitions", &self.definition_names)
            .field("formats", &self.formats)
            .field("cached", &self.cache.size())
            .finish()
    }
}

impl SchemaValidator {
    /// Build a validator over `definitions`.
    ///
    /// Every definition is lowered up front, so a definition using an unknown
    /// format or a type list fails here rather than on first use.
    pub fn new(
        definitions: &Map<String, Value>,
        formats: FormatRegistry,
        cache: ValidatorCache,
    ) -> Result<Self, SchemaError> {
        let definition_names: BTreeSet<String> = definitions.keys().cloned().collect();
        let lowering = Lowering {
            formats: &formats,
            definition_names: &definition_names,
        };
        let mut lowered = Map::with_capacity(definitions.len());
        for (name, definition) in definitions {
            lowered.insert(name.clone(), lowering.node(definition)?);
        }
        Ok(Self {
            definitions: Arc::new(lowered),
            definition_names: Arc::new(definition_names),
            formats,
            cache,
        })
    }

    /// The format table this validator checks against.
    #[must_use]
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Lower a schema node without compiling it.
    pub fn lower(&self, schema: &Value) -> Result<Value, SchemaError> {
        Lowering {
            formats: &self.formats,
            definition_names: &self.definition_names,
        }
        .node(schema)
    }

    /// Compile (or fetch from cache) the validator for `schema`.
    pub fn compile(&self, schema: &Value) -> Result<Arc<Validator>, SchemaError> {
        self.cache.get_or_compile(schema, || {
            let lowered = self.lower(schema)?;
            let document = json!({
                "allOf": [lowered],
                "definitions": Value::Object((*self.definitions).clone()),
            });
            let options = self
                .formats
                .names()
                .filter_map(|name| self.formats.get(name).ok().map(|check| (name.to_string(), check)))
                .fold(jsonschema::options(), |options, (name, check)| {
                    options.with_format(name, move |s: &str| {
                        check(&Value::String(s.to_owned())).is_ok()
                    })
                });
            options
                .with_draft(Draft::Draft4)
                .should_validate_formats(true)
                .should_ignore_unknown_formats(false)
                .build(&document)
                .map_err(|e| SchemaError::Compile(e.to_string()))
        })
    }

    /// Validate `instance` against `schema`.
    ///
    /// The first violation is reported as [`SchemaError::Invalid`]; schema
    /// defects surface as their own variants.
    pub fn validate(&self, instance: &Value, schema: &Value) -> Result<(), SchemaError> {
        let validator = self.compile(schema)?;
        validator
            .validate(instance)
            .map_err(|err| SchemaError::Invalid(err.to_string()))
    }
}
