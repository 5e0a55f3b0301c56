//! Declarative payload schema for books.
//!
//! [`BOOK_SCHEMA`] lists every accepted field with its type and whether it is
//! required or forbidden for each [`Operation`]. [`validate`] interprets the
//! table; there are no per-field code paths. Fields absent from the table are
//! rejected.

use serde_json::{Map, Value};
use std::fmt;

/// Write operation a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// Whether a field must or must not appear for a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Forbidden,
}

/// Expected JSON shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// String of the form `scheme:rest` (RFC 3986)
    Uri,
    Integer { minimum: Option<i64> },
}

impl FieldKind {
    fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Uri => "string",
            FieldKind::Integer { .. } => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub on_create: Presence,
    pub on_update: Presence,
}

impl FieldRule {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            on_create: Presence::Required,
            on_update: Presence::Required,
        }
    }

    fn presence(&self, operation: Operation) -> Presence {
        match operation {
            Operation::Create => self.on_create,
            Operation::Update => self.on_update,
        }
    }
}

pub static BOOK_SCHEMA: &[FieldRule] = &[
    FieldRule {
        name: "isbn",
        kind: FieldKind::String,
        on_create: Presence::Required,
        on_update: Presence::Forbidden,
    },
    FieldRule::required("amazon_url", FieldKind::Uri),
    FieldRule::required("author", FieldKind::String),
    FieldRule::required("language", FieldKind::String),
    FieldRule::required("pages", FieldKind::Integer { minimum: Some(1) }),
    FieldRule::required("publisher", FieldKind::String),
    FieldRule::required("title", FieldKind::String),
    FieldRule::required("year", FieldKind::Integer { minimum: None }),
];

/// Ordered list of violated-constraint messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a book payload against [`BOOK_SCHEMA`].
pub fn validate(payload: Value, operation: Operation) -> Result<Value, ValidationErrors> {
    validate_with(BOOK_SCHEMA, payload, operation)
}

/// Validate `payload` against an arbitrary rule table.
///
/// Returns the payload untouched on success. Messages follow rule order,
/// then unknown keys in lexicographic order.
pub fn validate_with(
    rules: &[FieldRule],
    payload: Value,
    operation: Operation,
) -> Result<Value, ValidationErrors> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationErrors(vec![
            "instance is not of a type(s) object".to_string(),
        ]));
    };

    let mut errors = Vec::new();

    for rule in rules {
        match (rule.presence(operation), object.get(rule.name)) {
            (Presence::Required, None) => {
                errors.push(format!("instance requires property \"{}\"", rule.name));
            }
            (Presence::Required, Some(value)) => check_value(rule, value, &mut errors),
            (Presence::Forbidden, Some(_)) => {
                errors.push(format!("instance.{} is not allowed", rule.name));
            }
            (Presence::Forbidden, None) => {}
        }
    }

    errors.extend(unknown_fields(rules, object));

    if errors.is_empty() {
        Ok(payload)
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_value(rule: &FieldRule, value: &Value, errors: &mut Vec<String>) {
    let type_error = || {
        format!(
            "instance.{} is not of a type(s) {}",
            rule.name,
            rule.kind.type_name()
        )
    };

    match rule.kind {
        FieldKind::String => {
            if !value.is_string() {
                errors.push(type_error());
            }
        }
        FieldKind::Uri => match value.as_str() {
            None => errors.push(type_error()),
            Some(s) if !looks_like_uri(s) => errors.push(format!(
                "instance.{} does not conform to the \"uri\" format",
                rule.name
            )),
            Some(_) => {}
        },
        FieldKind::Integer { minimum } => match as_integer(value) {
            None => errors.push(type_error()),
            Some(n) => {
                if let Some(min) = minimum.filter(|min| n < *min) {
                    errors.push(format!(
                        "instance.{} must be greater than or equal to {}",
                        rule.name, min
                    ));
                }
            }
        },
    }
}

/// Integral JSON number, including floats with no fractional part (`264.0`).
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Rewrite integral floats in `Integer` fields as plain integers so the
/// payload decodes into `i64` columns.
pub fn normalize_integers(rules: &[FieldRule], payload: &mut Value) {
    let Some(object) = payload.as_object_mut() else {
        return;
    };

    for rule in rules {
        if !matches!(rule.kind, FieldKind::Integer { .. }) {
            continue;
        }
        if let Some(value) = object.get_mut(rule.name) {
            if let Some(n) = as_integer(value) {
                *value = Value::from(n);
            }
        }
    }
}

fn unknown_fields(rules: &[FieldRule], object: &Map<String, Value>) -> Vec<String> {
    let mut unknown: Vec<&String> = object
        .keys()
        .filter(|key| !rules.iter().any(|rule| rule.name == key.as_str()))
        .collect();
    unknown.sort();

    unknown
        .into_iter()
        .map(|key| format!("instance.{} is not allowed", key))
        .collect()
}

/// `scheme:rest` with an RFC 3986 scheme and a non-empty remainder.
fn looks_like_uri(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());

    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !s.chars().any(char::is_whitespace)
}
