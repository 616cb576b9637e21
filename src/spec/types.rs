use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl ParameterLocation {
    /// Parse the Swagger `in` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "body" => Some(ParameterLocation::Body),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Body => write!(f, "body"),
            ParameterLocation::FormData => write!(f, "formData"),
        }
    }
}

/// One declared operation parameter.
///
/// For `in: body` the schema is the parameter's `schema` entry. For every
/// other location Swagger 2.0 inlines the type on the parameter itself, so
/// the schema is the parameter object minus `name`, `in`, `required` and
/// `description`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<Value>,
}

impl ParameterMeta {
    /// Declared scalar type (`type` keyword of the schema), if any.
    #[must_use]
    pub fn schema_type(&self) -> Option<&str> {
        self.schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
    }
}

/// One entry of an operation's `responses` map.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub description: Option<String>,
    pub schema: Option<Value>,
}

/// The documented contract of one handler.
///
/// Shared by every HTTP method the handler's route serves. Built once while
/// the [`Specification`] is constructed and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub handler_name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterMeta>,
    pub responses: BTreeMap<u16, ResponseSpec>,
    pub requires_auth: bool,
    /// The fragment as inserted into `paths`, default errors included
    pub document: Value,
}

impl OperationSpec {
    /// Parameters declared for one location.
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterMeta> + '_ {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// The first `in: body` parameter, if declared.
    #[must_use]
    pub fn body_parameter(&self) -> Option<&ParameterMeta> {
        self.parameters_in(ParameterLocation::Body).next()
    }

    #[must_use]
    pub fn response(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses.get(&status)
    }

    /// Schema declared for `status`, if the status is declared and carries one.
    #[must_use]
    pub fn response_schema(&self, status: u16) -> Option<&Value> {
        self.responses.get(&status).and_then(|r| r.schema.as_ref())
    }
}

/// The merged, immutable API specification.
///
/// Holds the full Swagger document (`paths`, `definitions`, `basePath`, ...)
/// and an index from handler name to its [`OperationSpec`].
#[derive(Debug, Clone)]
pub struct Specification {
    pub(crate) document: Value,
    pub(crate) operations: HashMap<String, Arc<OperationSpec>>,
}

impl Specification {
    /// The merged document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The `definitions` section (empty when absent).
    #[must_use]
    pub fn definitions(&self) -> Map<String, Value> {
        self.document
            .get("definitions")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        self.document
            .get("basePath")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Operation spec attached to `handler_name`, if its documentation carried one.
    #[must_use]
    pub fn operation(&self, handler_name: &str) -> Option<Arc<OperationSpec>> {
        self.operations.get(handler_name).cloned()
    }

    /// All operation specs keyed by handler name.
    #[must_use]
    pub fn operations(&self) -> &HashMap<String, Arc<OperationSpec>> {
        &self.operations
    }

    /// Resolve an internal JSON pointer such as `#/definitions/User`.
    #[must_use]
    pub fn resolve_ref(&self, pointer: &str) -> Option<&Value> {
        let pointer = pointer.strip_prefix('#')?;
        self.document.pointer(pointer)
    }

    /// The document as served by the spec endpoint: `host` replaced by the
    /// caller's host header.
    #[must_use]
    pub fn with_host(&self, host: &str) -> Value {
        let mut doc = self.document.clone();
        if let Value::Object(map) = &mut doc {
            map.insert("host".to_string(), Value::String(host.to_string()));
        }
        doc
    }
}

/// A single problem found while building the specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl SpecIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SpecIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Failure to load or build the specification.
#[derive(Debug)]
pub enum SpecError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    /// Structurally wrong document or fragment
    InvalidDocument(String),
    /// Every problem found across all routes
    Issues(Vec<SpecIssue>),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            SpecError::Yaml(e) => write!(f, "invalid YAML: {e}"),
            SpecError::Json(e) => write!(f, "invalid JSON: {e}"),
            SpecError::InvalidDocument(message) => write!(f, "{message}"),
            SpecError::Issues(issues) => {
                write!(f, "specification has {} issue(s)", issues.len())?;
                for issue in issues {
                    write!(f, "\n  {issue}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SpecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpecError::Io { source, .. } => Some(source),
            SpecError::Yaml(e) => Some(e),
            SpecError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for SpecError {
    fn from(e: serde_yaml::Error) -> Self {
        SpecError::Yaml(e)
    }
}

impl From<serde_json::Error> for SpecError {
    fn from(e: serde_json::Error) -> Self {
        SpecError::Json(e)
    }
}
