use super::types::SpecError;
use serde_json::{Map, Value};
use std::path::Path;

/// Line separating prose from the embedded Swagger fragment in handler docs.
pub const FRAGMENT_SEPARATOR: &str = "---";

/// Convert a parsed YAML tree into JSON.
///
/// Mapping keys that are numbers or booleans (`200:` under `responses`) become
/// strings; tags are dropped. Key order is preserved.
pub fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, SpecError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| SpecError::InvalidDocument(format!("non-finite number {n}")))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut out = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => {
                        return Err(SpecError::InvalidDocument(format!(
                            "unsupported mapping key {other:?}"
                        )))
                    }
                };
                out.insert(key, yaml_to_json(value)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Parse a YAML (or JSON, which is YAML) document.
pub fn load_yaml_str(content: &str) -> Result<Value, SpecError> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
    yaml_to_json(raw)
}

/// Read the base document that fragments are merged into.
///
/// `.json` files are parsed as JSON, everything else as YAML. The base must
/// be a mapping; its `definitions` get the nullable compatibility pass.
pub fn load_base_document(path: &Path) -> Result<Value, SpecError> {
    let content = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut doc = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&content)?
    } else {
        load_yaml_str(&content)?
    };
    if !doc.is_object() {
        return Err(SpecError::InvalidDocument(format!(
            "{} is not a mapping",
            path.display()
        )));
    }
    make_backwards_compatible(&mut doc);
    Ok(doc)
}

/// Give every `nullable` schema node an `x-nullable` marker with the same
/// value, across all `definitions`.
pub fn make_backwards_compatible(doc: &mut Value) {
    if let Some(Value::Object(definitions)) = doc.get_mut("definitions") {
        for definition in definitions.values_mut() {
            make_definition_backwards_compatible(definition);
        }
    }
}

/// Recursive nullable pass for one schema node.
pub fn make_definition_backwards_compatible(node: &mut Value) {
    let Value::Object(obj) = node else {
        return;
    };
    if let Some(nullable) = obj.get("nullable").and_then(Value::as_bool) {
        obj.insert("x-nullable".to_string(), Value::Bool(nullable));
    }
    for (key, child) in obj.iter_mut() {
        match key.as_str() {
            "properties" | "patternProperties" | "definitions" => {
                if let Value::Object(entries) = child {
                    entries
                        .values_mut()
                        .for_each(make_definition_backwards_compatible);
                }
            }
            "items" | "allOf" | "anyOf" | "oneOf" => match child {
                Value::Array(items) => items
                    .iter_mut()
                    .for_each(make_definition_backwards_compatible),
                other => make_definition_backwards_compatible(other),
            },
            "additionalProperties" | "not" => make_definition_backwards_compatible(child),
            _ => {}
        }
    }
}

/// Normalize documentation text: drop leading/trailing blank lines, strip the
/// first line, and remove the indentation shared by the remaining lines.
#[must_use]
pub fn clean_doc(doc: &str) -> Vec<String> {
    let lines: Vec<&str> = doc.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim_start().to_string()
            } else {
                line.get(indent..)
                    .unwrap_or_else(|| line.trim_start())
                    .trim_end()
                    .to_string()
            }
        })
        .collect();

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned
}

/// Extract the Swagger fragment embedded in handler documentation.
///
/// Returns `Ok(None)` when the documentation has no `---` line. When the
/// fragment lacks a `description`, one is synthesized from the prose lines
/// above the separator. Inline parameter and response schemas get the
/// nullable compatibility pass.
pub fn parse_doc_fragment(doc: &str) -> Result<Option<Value>, SpecError> {
    let lines = clean_doc(doc);
    let Some(separator) = lines.iter().position(|l| l.trim() == FRAGMENT_SEPARATOR) else {
        return Ok(None);
    };

    let fragment = lines[separator + 1..].join("\n");
    let mut spec = load_yaml_str(&fragment)?;
    let Value::Object(obj) = &mut spec else {
        return Err(SpecError::InvalidDocument(
            "documentation fragment is not a mapping".to_string(),
        ));
    };

    if !obj.contains_key("description") {
        let description = lines[..separator]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        obj.insert("description".to_string(), Value::String(description));
    }

    if let Some(Value::Array(parameters)) = obj.get_mut("parameters") {
        for parameter in parameters.iter_mut() {
            if let Some(schema) = parameter.get_mut("schema") {
                make_definition_backwards_compatible(schema);
            }
        }
    }
    if let Some(Value::Object(responses)) = obj.get_mut("responses") {
        for response in responses.values_mut() {
            if let Some(schema) = response.get_mut("schema") {
                make_definition_backwards_compatible(schema);
            }
        }
    }

    Ok(Some(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"Return one user.
        Looked up by id.

        ---
        tags: [users]
        parameters:
          - name: id
            in: path
            type: string
            required: true
        responses:
          200:
            description: The user
            schema:
              type: object
              properties:
                birthDate: {type: string, format: date, nullable: true}
    "#;

    #[test]
    fn test_no_separator_contributes_nothing() {
        assert_eq!(parse_doc_fragment("Just prose.\nNo fragment.").unwrap(), None);
    }

    #[test]
    fn test_description_synthesized_from_prose() {
        let spec = parse_doc_fragment(DOC).unwrap().unwrap();
        assert_eq!(spec["description"], json!("Return one user. Looked up by id."));
        assert_eq!(spec["tags"], json!(["users"]));
    }

    #[test]
    fn test_explicit_description_kept() {
        let doc = "Prose\n---\ndescription: explicit\nresponses: {}\n";
        let spec = parse_doc_fragment(doc).unwrap().unwrap();
        assert_eq!(spec["description"], json!("explicit"));
    }

    #[test]
    fn test_integer_response_keys_become_strings() {
        let spec = parse_doc_fragment(DOC).unwrap().unwrap();
        assert!(spec["responses"].get("200").is_some());
    }

    #[test]
    fn test_inline_nullable_marked() {
        let spec = parse_doc_fragment(DOC).unwrap().unwrap();
        let field = &spec["responses"]["200"]["schema"]["properties"]["birthDate"];
        assert_eq!(field["x-nullable"], json!(true));
    }

    #[test]
    fn test_malformed_fragment_is_an_error() {
        let doc = "Prose\n---\nresponses: [unclosed\n";
        assert!(parse_doc_fragment(doc).is_err());
        let doc = "Prose\n---\n- just\n- a list\n";
        assert!(matches!(
            parse_doc_fragment(doc),
            Err(SpecError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_backwards_compatible_definitions() {
        let mut doc = json!({
            "definitions": {
                "User": {
                    "type": "object",
                    "properties": {
                        "nickname": {"type": "string", "nullable": true},
                        "tags": {"type": "array", "items": {"type": "string", "nullable": false}}
                    }
                }
            }
        });
        make_backwards_compatible(&mut doc);
        let props = &doc["definitions"]["User"]["properties"];
        assert_eq!(props["nickname"]["x-nullable"], json!(true));
        assert_eq!(props["tags"]["items"]["x-nullable"], json!(false));
        assert!(props["tags"].get("x-nullable").is_none());
    }

    #[test]
    fn test_clean_doc_dedents() {
        let lines = clean_doc("  first\n      a:\n        b: 1\n      c: 2\n");
        assert_eq!(lines, vec!["first", "a:", "  b: 1", "c: 2"]);
    }
}
