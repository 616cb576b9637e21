use super::load::{load_base_document, parse_doc_fragment};
use super::types::{
    OperationSpec, ParameterLocation, ParameterMeta, ResponseSpec, SpecError, SpecIssue,
    Specification,
};
use crate::registry::{Route, RouteRegistry};
use http::Method;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reference every injected default error response points at.
pub const ERROR_RESPONSE_REF: &str = "#/definitions/ErrorResponse";

/// Parameter keys that describe the parameter rather than its value.
const PARAMETER_META_KEYS: [&str; 4] = ["name", "in", "required", "description"];

/// Default responses injected into every operation, keyed by status.
#[must_use]
pub fn default_errors(requires_auth: bool) -> Vec<(u16, &'static str)> {
    let mut defaults = vec![
        (400, "The request doesn't conform to the specification"),
        (500, "Internal Server Error"),
    ];
    if requires_auth {
        defaults.push((401, "Authentication header missing or invalid"));
    }
    defaults
}

/// Add the default error entries to a fragment's `responses`, leaving any
/// entry the fragment already declares untouched.
pub fn add_default_errors(responses: &mut Map<String, Value>, requires_auth: bool) {
    for (status, description) in default_errors(requires_auth) {
        responses.entry(status.to_string()).or_insert_with(|| {
            json!({
                "description": description,
                "schema": {"$ref": ERROR_RESPONSE_REF},
            })
        });
    }
}

/// Turn a registered route template into a `paths` key: placeholders written
/// `{name}` and the base path removed.
#[must_use]
pub fn spec_path(route: &Route, base_path: &str) -> String {
    let template = route.template();
    let base = base_path.trim_end_matches('/');
    let relative = if base.is_empty() {
        template.as_str()
    } else {
        match template.strip_prefix(base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => template.as_str(),
        }
    };
    if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("/{relative}")
    }
}

/// Methods an operation spec is published under.
fn documented_methods(route: &Route) -> impl Iterator<Item = &Method> {
    route
        .methods
        .iter()
        .filter(|m| **m != Method::OPTIONS && **m != Method::HEAD)
}

fn collect_refs<'a>(node: &'a Value, out: &mut Vec<&'a str>) {
    match node {
        Value::Object(obj) => {
            if let Some(Value::String(pointer)) = obj.get("$ref") {
                out.push(pointer);
            }
            obj.values().for_each(|child| collect_refs(child, out));
        }
        Value::Array(items) => items.iter().for_each(|child| collect_refs(child, out)),
        _ => {}
    }
}

fn parse_parameters(
    fragment: &Map<String, Value>,
    location: &str,
    issues: &mut Vec<SpecIssue>,
) -> Vec<ParameterMeta> {
    let Some(Value::Array(raw)) = fragment.get("parameters") else {
        return Vec::new();
    };

    let mut parameters = Vec::with_capacity(raw.len());
    for (index, param) in raw.iter().enumerate() {
        let at = format!("{location}.parameters[{index}]");
        let Some(obj) = param.as_object() else {
            issues.push(SpecIssue::new(at, "parameter", "parameter is not a mapping"));
            continue;
        };
        let Some(name) = obj.get("name").and_then(Value::as_str) else {
            issues.push(SpecIssue::new(at, "parameter", "parameter has no `name`"));
            continue;
        };
        let raw_in = obj.get("in").and_then(Value::as_str).unwrap_or_default();
        let Some(param_location) = ParameterLocation::parse(raw_in) else {
            issues.push(SpecIssue::new(
                at,
                "parameter",
                format!("unsupported location `{raw_in}` for `{name}`"),
            ));
            continue;
        };

        let schema = if param_location == ParameterLocation::Body {
            obj.get("schema").cloned()
        } else {
            let inline: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| !PARAMETER_META_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (!inline.is_empty()).then_some(Value::Object(inline))
        };

        parameters.push(ParameterMeta {
            name: name.to_string(),
            // path parameters are always required in Swagger 2.0
            required: param_location == ParameterLocation::Path
                || obj.get("required").and_then(Value::as_bool).unwrap_or(false),
            location: param_location,
            schema,
        });
    }
    parameters
}

fn parse_responses(
    responses: &Map<String, Value>,
    location: &str,
    issues: &mut Vec<SpecIssue>,
) -> BTreeMap<u16, ResponseSpec> {
    let mut out = BTreeMap::new();
    for (code, entry) in responses {
        if code == "default" {
            continue;
        }
        let Ok(status) = code.parse::<u16>() else {
            issues.push(SpecIssue::new(
                format!("{location}.responses"),
                "response",
                format!("`{code}` is not a status code"),
            ));
            continue;
        };
        out.insert(
            status,
            ResponseSpec {
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                schema: entry.get("schema").cloned(),
            },
        );
    }
    out
}

/// Parse one route's documentation into its operation spec.
///
/// Returns `None` when the route documents no fragment or when its fragment
/// has problems; problems are pushed onto `issues`.
fn build_operation(
    route: &Route,
    document: &Value,
    issues: &mut Vec<SpecIssue>,
) -> Option<OperationSpec> {
    let location = route.handler_name.as_str();
    let doc = route.doc.as_deref()?;

    let mut fragment = match parse_doc_fragment(doc) {
        Ok(Some(fragment)) => fragment,
        Ok(None) => {
            debug!(handler = %location, "No specification fragment in documentation");
            return None;
        }
        Err(e) => {
            issues.push(SpecIssue::new(location, "fragment", e.to_string()));
            return None;
        }
    };
    let obj = fragment.as_object_mut()?;

    let Some(Value::Object(responses)) = obj.get_mut("responses") else {
        issues.push(SpecIssue::new(
            location,
            "responses",
            "operation declares no `responses` mapping",
        ));
        return None;
    };
    add_default_errors(responses, route.requires_auth);

    let before = issues.len();
    let mut refs = Vec::new();
    collect_refs(&fragment, &mut refs);
    for pointer in refs {
        let resolves = pointer
            .strip_prefix('#')
            .and_then(|p| document.pointer(p))
            .is_some();
        if !resolves {
            issues.push(SpecIssue::new(
                location,
                "unresolved_ref",
                format!("`{pointer}` does not resolve"),
            ));
        }
    }

    let obj = fragment.as_object()?;
    let parameters = parse_parameters(obj, location, issues);
    let responses = obj
        .get("responses")
        .and_then(Value::as_object)
        .map(|r| parse_responses(r, location, issues))
        .unwrap_or_default();
    if issues.len() > before {
        return None;
    }

    Some(OperationSpec {
        handler_name: route.handler_name.clone(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        tags: obj
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        parameters,
        responses,
        requires_auth: route.requires_auth,
        document: fragment,
    })
}

/// Merge the documentation fragments of every registered route into `base`.
///
/// `basePath` is taken from the argument and `paths` is rebuilt from the
/// routes alone. Every problem found across all routes is collected and
/// reported together as [`SpecError::Issues`].
pub fn build_spec(
    base: Value,
    registry: &RouteRegistry,
    base_path: &str,
) -> Result<Specification, SpecError> {
    let Value::Object(mut root) = base else {
        return Err(SpecError::InvalidDocument(
            "base document is not a mapping".to_string(),
        ));
    };
    root.insert("basePath".to_string(), Value::String(base_path.to_string()));
    root.insert("paths".to_string(), Value::Object(Map::new()));
    let mut document = Value::Object(root);

    let mut issues = Vec::new();
    let mut operations = HashMap::new();
    let mut paths = Map::new();

    for route in registry.iter() {
        let Some(operation) = build_operation(route, &document, &mut issues) else {
            continue;
        };
        let path = spec_path(route, base_path);
        let entry = paths
            .entry(path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            for method in documented_methods(route) {
                methods.insert(
                    method.as_str().to_ascii_lowercase(),
                    operation.document.clone(),
                );
            }
        }
        debug!(
            handler = %route.handler_name,
            path = %path,
            responses = operation.responses.len(),
            "Operation spec attached"
        );
        operations.insert(route.handler_name.clone(), Arc::new(operation));
    }

    if !issues.is_empty() {
        for issue in &issues {
            warn!(
                location = %issue.location,
                kind = %issue.kind,
                message = %issue.message,
                "Specification issue"
            );
        }
        return Err(SpecError::Issues(issues));
    }

    if let Some(slot) = document.get_mut("paths") {
        *slot = Value::Object(paths);
    }
    info!(
        operations = operations.len(),
        base_path = %base_path,
        "Specification built"
    );
    Ok(Specification {
        document,
        operations,
    })
}

/// Read the base document from disk and build the specification.
pub fn load_spec(
    base_document: &Path,
    registry: &RouteRegistry,
    base_path: &str,
) -> Result<Specification, SpecError> {
    let base = load_base_document(base_document)?;
    build_spec(base, registry, base_path)
}
