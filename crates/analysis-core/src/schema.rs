//! Field-by-field reader for untyped JSON mappings.
//!
//! Contract models are read one field at a time so that every structural
//! problem (missing key, wrong type, unknown literal) is recorded with its
//! path. Numeric bounds are declared with `validator` on the models and are
//! checked on each nested model as soon as it has been read. Nothing is
//! coerced: a value either deserializes into the declared field type or
//! becomes a [`Violation`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::ValidationErrorsKind;

use crate::error::{ValidationError, Violation};

/// A contract model: named, with its bounds declared through
/// `#[derive(validator::Validate)]`.
pub trait Model: validator::Validate {
    /// Name used in [`ValidationError::model`].
    const MODEL: &'static str;

    /// Check the bounds of a value built directly in Rust.
    fn check(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        check_bounds("", self, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(Self::MODEL, violations))
        }
    }

    /// Consume and hand back the value only if it satisfies its constraints.
    fn validated(self) -> Result<Self, ValidationError>
    where
        Self: Sized,
    {
        self.check()?;
        Ok(self)
    }
}

/// Structural reading of a model out of a JSON object.
pub trait FromSchema: Sized {
    /// Returns `None` when any field failed; the failures are already in the
    /// reader's violation list.
    fn read(reader: &mut ObjectReader<'_>) -> Option<Self>;
}

/// Read and validate `T` from an untyped value, reporting all violations.
pub fn parse<T>(value: &Value) -> Result<T, ValidationError>
where
    T: FromSchema + Model,
{
    let mut violations = Vec::new();
    let parsed = match ObjectReader::new(String::new(), value, &mut violations) {
        Some(mut reader) => T::read(&mut reader),
        None => None,
    };
    if let Some(model) = &parsed {
        check_bounds("", model, &mut violations);
    }
    match parsed {
        Some(model) if violations.is_empty() => Ok(model),
        _ => {
            tracing::debug!(
                model = T::MODEL,
                violations = violations.len(),
                "schema validation failed"
            );
            Err(ValidationError::new(T::MODEL, violations))
        }
    }
}

/// Join a parent path and a child key.
pub fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Run the declared bounds of `model` and record each failure under `path`.
/// Failures already recorded by a nested read are not repeated.
fn check_bounds<T: validator::Validate + ?Sized>(path: &str, model: &T, out: &mut Vec<Violation>) {
    if let Err(errors) = model.validate() {
        let mut found = Vec::new();
        flatten(path, &errors, &mut found);
        for violation in found {
            if !out.contains(&violation) {
                out.push(violation);
            }
        }
    }
}

fn flatten(path: &str, errors: &validator::ValidationErrors, out: &mut Vec<Violation>) {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (field, kind) in fields {
        let field_path = join(path, field);
        match kind {
            ValidationErrorsKind::Field(errs) => {
                for err in errs {
                    out.push(Violation::new(field_path.clone(), describe(err)));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(&field_path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    flatten(&format!("{field_path}[{i}]"), inner, out);
                }
            }
        }
    }
}

fn describe(err: &validator::ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }
    let param = |name: &str| err.params.get(name).and_then(Value::as_f64);
    let got = param("value").map(|v| format!(", got {v}")).unwrap_or_default();
    match (&*err.code, param("min"), param("max")) {
        ("range", Some(min), Some(max)) => format!("must be between {min} and {max}{got}"),
        ("range", Some(min), None) => format!("must be greater than or equal to {min}{got}"),
        ("range", None, Some(max)) => format!("must be less than or equal to {max}{got}"),
        (code, ..) => format!("failed {code} check{got}"),
    }
}

pub struct ObjectReader<'a> {
    path: String,
    map: &'a Map<String, Value>,
    violations: &'a mut Vec<Violation>,
}

impl<'a> ObjectReader<'a> {
    /// Wraps `value` if it is a JSON object; otherwise records a violation at
    /// `path` and returns `None`.
    pub fn new(path: String, value: &'a Value, violations: &'a mut Vec<Violation>) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                path,
                map,
                violations,
            }),
            other => {
                violations.push(Violation::new(
                    path,
                    format!("expected an object, got {}", kind(other)),
                ));
                None
            }
        }
    }

    fn field_path(&self, key: &str) -> String {
        join(&self.path, key)
    }

    fn fail(&mut self, path: String, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn decode<T: DeserializeOwned>(&mut self, path: String, value: &Value) -> Option<T> {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => Some(v),
            Err(err) => {
                self.fail(path, err.to_string());
                None
            }
        }
    }

    /// A field that must be present and non-null.
    pub fn required<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let path = self.field_path(key);
        let map = self.map;
        match map.get(key) {
            None => {
                self.fail(path, "field required");
                None
            }
            Some(Value::Null) => {
                self.fail(path, "field required, got null");
                None
            }
            Some(value) => self.decode(path, value),
        }
    }

    /// A field that may be missing or null. The outer `None` signals a
    /// violation, the inner one an absent value.
    pub fn optional<T: DeserializeOwned>(&mut self, key: &str) -> Option<Option<T>> {
        let map = self.map;
        match map.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(value) => {
                let path = self.field_path(key);
                self.decode(path, value).map(Some)
            }
        }
    }

    /// A field with a schema default used only when the key is missing.
    /// An explicit null is still a type violation.
    pub fn or_else<T: DeserializeOwned>(&mut self, key: &str, default: impl FnOnce() -> T) -> Option<T> {
        let map = self.map;
        match map.get(key) {
            None => Some(default()),
            Some(value) => {
                let path = self.field_path(key);
                self.decode(path, value)
            }
        }
    }

    pub fn or_default<T: DeserializeOwned + Default>(&mut self, key: &str) -> Option<T> {
        self.or_else(key, T::default)
    }

    /// Record a violation for every key outside `allowed`.
    pub fn deny_unknown(&mut self, allowed: &[&str]) {
        let map = self.map;
        for key in map.keys().filter(|k| !allowed.contains(&k.as_str())) {
            let path = self.field_path(key);
            let message = format!("unexpected key, expected one of {}", allowed.join(", "));
            self.fail(path, message);
        }
    }

    /// A required nested model. Its bounds are checked as soon as it reads,
    /// whatever happens to its siblings.
    pub fn object<T: FromSchema + validator::Validate>(&mut self, key: &str) -> Option<T> {
        let path = self.field_path(key);
        let map = self.map;
        let value = match map.get(key) {
            None | Some(Value::Null) => {
                self.fail(path, "field required");
                return None;
            }
            Some(value) => value,
        };
        let model = {
            let mut child = ObjectReader::new(path.clone(), value, &mut *self.violations)?;
            T::read(&mut child)?
        };
        check_bounds(&path, &model, &mut *self.violations);
        Some(model)
    }

    /// A string-keyed mapping whose entries are decoded one by one, so a bad
    /// entry is reported at its own key. Missing means empty.
    pub fn entries<T: DeserializeOwned>(&mut self, key: &str, expected: &str) -> Option<BTreeMap<String, T>> {
        let path = self.field_path(key);
        let map = self.map;
        let entries = match map.get(key) {
            None => return Some(BTreeMap::new()),
            Some(Value::Object(entries)) => entries,
            Some(other) => {
                let message = format!("expected an object, got {}", kind(other));
                self.fail(path, message);
                return None;
            }
        };

        let mut out = BTreeMap::new();
        let mut ok = true;
        for (name, value) in entries {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(v) => {
                    out.insert(name.clone(), v);
                }
                Err(_) => {
                    let message = format!("expected {expected}, got {}", kind(value));
                    self.fail(join(&path, name), message);
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }

    /// A list of nested models; missing means empty when `default_empty`.
    pub fn object_list<T: FromSchema + validator::Validate>(&mut self, key: &str, default_empty: bool) -> Option<Vec<T>> {
        let path = self.field_path(key);
        let map = self.map;
        let items = match map.get(key) {
            None if default_empty => return Some(Vec::new()),
            None => {
                self.fail(path, "field required");
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(other) => {
                let message = format!("expected an array, got {}", kind(other));
                self.fail(path, message);
                return None;
            }
        };

        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{i}]");
            let read = ObjectReader::new(item_path.clone(), item, &mut *self.violations)
                .and_then(|mut child| T::read(&mut child));
            match read {
                Some(v) => {
                    check_bounds(&item_path, &v, &mut *self.violations);
                    out.push(v);
                }
                None => ok = false,
            }
        }
        ok.then_some(out)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
