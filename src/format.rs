//! # Format Checker
//!
//! Named scalar refinements (`format: password`, `format: timezone`, ...) are
//! checked through an explicit registration table. Each entry maps a format
//! name to a plain function; the table is built once at startup and handed to
//! the [`SchemaValidator`](crate::schema::SchemaValidator), which registers
//! every entry with the underlying `jsonschema` compiler.
//!
//! Unlike stock JSON Schema behaviour, a format name that is not in the table
//! is an error ([`FormatError::Unknown`]) and never passes silently: we own
//! both the schemas and the validator, so an unknown name is almost always a
//! typo in a documentation fragment.
//!
//! ```rust
//! use swaggerware::format::{FormatError, FormatRegistry};
//! use serde_json::json;
//!
//! let formats = FormatRegistry::with_defaults();
//! assert!(formats.check("timezone", &json!("Europe/Amsterdam")).is_ok());
//! assert!(matches!(
//!     formats.check("colour", &json!("red")),
//!     Err(FormatError::Unknown(_))
//! ));
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use jsonschema::Draft;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Standard JSON Schema formats checked by `jsonschema` itself.
pub const STANDARD_FORMATS: [&str; 15] = [
    "uri",
    "uri-reference",
    "uri-template",
    "iri",
    "iri-reference",
    "hostname",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "idn-email",
    "uuid",
    "regex",
    "json-pointer",
    "relative-json-pointer",
    "duration",
];

/// One compiled `{"format": name}` validator per standard format. A name the
/// compiler does not know is left out and reported as unknown.
static STANDARD_VALIDATORS: Lazy<BTreeMap<&'static str, jsonschema::Validator>> =
    Lazy::new(|| {
        STANDARD_FORMATS
            .iter()
            .filter_map(|name| {
                jsonschema::options()
                    .with_draft(Draft::Draft202012)
                    .should_validate_formats(true)
                    .should_ignore_unknown_formats(false)
                    .build(&json!({"format": name}))
                    .ok()
                    .map(|validator| (*name, validator))
            })
            .collect()
    });

/// Check `instance` with the compiler's own implementation of `name`.
pub fn check_standard(name: &str, instance: &Value) -> Result<(), FormatError> {
    let validator = STANDARD_VALIDATORS
        .get(name)
        .ok_or_else(|| FormatError::Unknown(name.to_string()))?;
    validator
        .validate(instance)
        .map_err(|e| FormatError::invalid(name, e.to_string()))
}

macro_rules! standard_checks {
    ($($check:ident => $name:literal),* $(,)?) => {
        $(
            fn $check(instance: &Value) -> Result<(), FormatError> {
                check_standard($name, instance)
            }
        )*

        const STANDARD_CHECKS: [(&str, FormatCheck); STANDARD_FORMATS.len()] =
            [$(($name, $check)),*];
    };
}

standard_checks! {
    check_uri => "uri",
    check_uri_reference => "uri-reference",
    check_uri_template => "uri-template",
    check_iri => "iri",
    check_iri_reference => "iri-reference",
    check_hostname => "hostname",
    check_idn_hostname => "idn-hostname",
    check_ipv4 => "ipv4",
    check_ipv6 => "ipv6",
    check_idn_email => "idn-email",
    check_uuid => "uuid",
    check_regex => "regex",
    check_json_pointer => "json-pointer",
    check_relative_json_pointer => "relative-json-pointer",
    check_duration => "duration",
}

/// Signature of a single format check.
pub type FormatCheck = fn(&Value) -> Result<(), FormatError>;

/// Failure raised by the format table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No checker is registered under this name
    Unknown(String),
    /// The checker rejected the value
    Invalid {
        /// Format name the value was checked against
        format: String,
        /// Human-readable reason
        message: String,
    },
}

impl FormatError {
    fn invalid(format: &str, message: impl Into<String>) -> Self {
        FormatError::Invalid {
            format: format.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Unknown(name) => write!(f, "Unknown format `{name}` in schema"),
            FormatError::Invalid { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Registration table of named format checks.
#[derive(Clone)]
pub struct FormatRegistry {
    checks: BTreeMap<String, FormatCheck>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FormatRegistry {
    /// An empty table. Every format lookup fails with [`FormatError::Unknown`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            checks: BTreeMap::new(),
        }
    }

    /// The built-in table: every name in [`STANDARD_FORMATS`] plus
    /// `password`, `timezone`, `date`, `time`, `date-time` and `email`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (name, check) in STANDARD_CHECKS {
            registry.register(name, check);
        }
        registry.register("password", check_password);
        registry.register("timezone", check_timezone);
        registry.register("date", check_date);
        registry.register("time", check_time);
        registry.register("date-time", check_date_time);
        registry.register("email", check_email);
        registry
    }

    /// Register (or replace) a check. Underscores in `name` become hyphens so
    /// `date_time` and `date-time` name the same format.
    pub fn register(&mut self, name: &str, check: FormatCheck) {
        self.checks.insert(name.replace('_', "-"), check);
    }

    /// Whether a checker exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    /// Look up a check by name.
    pub fn get(&self, name: &str) -> Result<FormatCheck, FormatError> {
        self.checks
            .get(name)
            .copied()
            .ok_or_else(|| FormatError::Unknown(name.to_string()))
    }

    /// Check `instance` against the named format.
    pub fn check(&self, name: &str, instance: &Value) -> Result<(), FormatError> {
        let check = self.get(name)?;
        check(instance)
    }
}

/// Any string is a password.
pub fn check_password(instance: &Value) -> Result<(), FormatError> {
    if instance.is_string() {
        Ok(())
    } else {
        Err(FormatError::invalid(
            "password",
            format!("{instance} is not a string"),
        ))
    }
}

/// Strings must name an IANA timezone; other types pass.
pub fn check_timezone(instance: &Value) -> Result<(), FormatError> {
    match instance.as_str() {
        Some(name) => name
            .parse::<Tz>()
            .map(|_| ())
            .map_err(|_| FormatError::invalid("timezone", format!("Invalid timezone {name}"))),
        None => Ok(()),
    }
}

/// `YYYY-MM-DD`
pub fn check_date(instance: &Value) -> Result<(), FormatError> {
    match instance.as_str() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|e| FormatError::invalid("date", format!("Invalid date {s}: {e}"))),
        None => Ok(()),
    }
}

/// `HH:MM:SS`, optionally with fractional seconds.
pub fn check_time(instance: &Value) -> Result<(), FormatError> {
    match instance.as_str() {
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
            .map(|_| ())
            .map_err(|e| FormatError::invalid("time", format!("Invalid time {s}: {e}"))),
        None => Ok(()),
    }
}

/// RFC 3339 timestamp.
pub fn check_date_time(instance: &Value) -> Result<(), FormatError> {
    match instance.as_str() {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|_| ())
            .map_err(|e| FormatError::invalid("date-time", format!("Invalid date-time {s}: {e}"))),
        None => Ok(()),
    }
}

pub fn check_email(instance: &Value) -> Result<(), FormatError> {
    match instance.as_str() {
        Some(s) => match s.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(FormatError::invalid("email", format!("Invalid email {s}"))),
        },
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_format_is_distinct_from_invalid_value() {
        let formats = FormatRegistry::with_defaults();
        assert_eq!(
            formats.check("colour", &json!("red")),
            Err(FormatError::Unknown("colour".to_string()))
        );
        assert!(matches!(
            formats.check("timezone", &json!("Mars/Olympus_Mons")),
            Err(FormatError::Invalid { .. })
        ));
    }

    #[test]
    fn test_timezone() {
        let formats = FormatRegistry::with_defaults();
        assert!(formats.check("timezone", &json!("UTC")).is_ok());
        assert!(formats.check("timezone", &json!("America/New_York")).is_ok());
        // non-strings are left to the type keyword
        assert!(formats.check("timezone", &json!(42)).is_ok());
        let err = formats.check("timezone", &json!("Nowhere/Special")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid timezone Nowhere/Special");
    }

    #[test]
    fn test_password_requires_string() {
        let formats = FormatRegistry::with_defaults();
        assert!(formats.check("password", &json!("hunter2")).is_ok());
        assert!(formats.check("password", &json!(12345)).is_err());
    }

    #[test]
    fn test_register_normalizes_underscores() {
        let mut formats = FormatRegistry::empty();
        formats.register("upper_case", |v| match v.as_str() {
            Some(s) if s.chars().all(|c| !c.is_lowercase()) => Ok(()),
            _ => Err(FormatError::Invalid {
                format: "upper-case".into(),
                message: "lowercase found".into(),
            }),
        });
        assert!(formats.contains("upper-case"));
        assert!(!formats.contains("upper_case"));
        assert!(formats.check("upper-case", &json!("ABC")).is_ok());
        assert!(formats.check("upper-case", &json!("abc")).is_err());
    }

    #[test]
    fn test_standard_formats_known() {
        let formats = FormatRegistry::with_defaults();
        assert!(formats.contains("uri"));
        assert!(formats.contains("ipv4"));
        assert!(formats.check("uri", &json!("https://example.com/a")).is_ok());
        assert!(formats.check("ipv4", &json!("10.0.0.1")).is_ok());
        assert!(matches!(
            formats.check("ipv4", &json!("300.1.1.1")),
            Err(FormatError::Invalid { .. })
        ));
        assert!(formats.check("uuid", &json!("not-a-uuid")).is_err());
        assert_eq!(
            formats.check("colour", &json!("red")),
            Err(FormatError::Unknown("colour".to_string()))
        );
    }

    #[test]
    fn test_every_standard_format_compiles() {
        for name in STANDARD_FORMATS {
            assert!(STANDARD_VALIDATORS.contains_key(name), "{name}");
        }
    }

    #[test]
    fn test_date_and_time() {
        let formats = FormatRegistry::with_defaults();
        assert!(formats.check("date", &json!("2024-02-29")).is_ok());
        assert!(formats.check("date", &json!("2023-02-29")).is_err());
        assert!(formats.check("time", &json!("23:59:01")).is_ok());
        assert!(formats.check("time", &json!("25:00:00")).is_err());
        assert!(formats.check("date-time", &json!("2024-01-01T10:00:00Z")).is_ok());
    }
}
