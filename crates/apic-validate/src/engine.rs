//! # Validation Engine
//!
//! Compiles resolved schemas with the `jsonschema` crate (Draft 7) and
//! converts its errors into [`ValidationError`]s:
//!
//! - the instance JSON pointer becomes a dot path, so `/tags/2` is
//!   reported as `tags.2`;
//! - the failing keyword (last schema path segment) becomes the
//!   constraint, with `additionalProperties` reported as `additionalProp`;
//! - `required` errors point at the missing property itself;
//! - the keyword's own schema value is attached as context, so a
//!   `minItems` error carries `minItems: 2`;
//! - the offending value is read from the payload as received, falling
//!   back to the validated instance when the paths diverge.
//!
//! [`SchemaCache`] keeps compiled validators so each derived schema is
//! compiled once per registry rather than once per message.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Validator};
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{ContractError, ValidationError};
use crate::normalize::to_draft7;

/// Keywords whose schema value is attached to the error.
const CONTEXT_KEYWORDS: &[&str] = &[
    "type",
    "enum",
    "const",
    "format",
    "pattern",
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
];

/// A compiled validator together with the Draft 7 schema it was built from.
pub struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl CompiledSchema {
    /// Normalise an OpenAPI-dialect schema and compile it.
    ///
    /// `location` names the schema in errors, e.g. `POST /users body`.
    pub fn compile(schema: &Value, location: &str) -> Result<Self, ContractError> {
        let schema = to_draft7(schema);
        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft7);
        let validator = opts.build(&schema).map_err(|e| {
            tracing::error!(%location, error = %e, "schema failed to compile");
            ContractError::Schema {
                location: location.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { schema, validator })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Every violation in `instance`. Offending values are read from
    /// `original`.
    pub fn errors(&self, instance: &Value, original: &Value) -> Vec<ValidationError> {
        self.validator
            .iter_errors(instance)
            .flat_map(|error| self.convert(&error, original))
            .collect()
    }

    fn convert(&self, error: &jsonschema::ValidationError<'_>, original: &Value) -> Vec<ValidationError> {
        let instance_pointer = error.instance_path.to_string();
        let schema_pointer = error.schema_path.to_string();
        let property = dot_path(&instance_pointer);
        let message = error.to_string();

        match &error.kind {
            ValidationErrorKind::Required { property: missing } => {
                let name = missing
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| missing.to_string());
                vec![ValidationError::new(join(&property, &name), "required", message, Value::Null)]
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
                .iter()
                .map(|name| {
                    let pointer = format!("{instance_pointer}/{}", escape(name));
                    ValidationError::new(
                        join(&property, name),
                        "additionalProp",
                        format!("additional property '{name}' is not allowed"),
                        original.pointer(&pointer).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect(),
            _ => {
                let keyword = schema_pointer.rsplit('/').next().unwrap_or_default().to_string();
                let value = original
                    .pointer(&instance_pointer)
                    .cloned()
                    .unwrap_or_else(|| error.instance.clone().into_owned());
                let mut converted = ValidationError::new(property, keyword.clone(), message, value);
                if CONTEXT_KEYWORDS.contains(&keyword.as_str()) {
                    if let Some(expected) = self.schema.pointer(&schema_pointer) {
                        converted = converted.with_context(keyword, expected.clone());
                    }
                }
                vec![converted]
            }
        }
    }
}

/// `/a/0/b~1c` → `a.0.b/c`.
pub fn dot_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Keep the first error reported for each property path.
///
/// A nullable property validated against "type or null" can fail both
/// the `type` and the `anyOf` keyword for one bad value; only the first
/// is kept. The rule applies at every depth. Used for responses.
pub fn first_per_property(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert(error.property.clone()))
        .collect()
}

/// Keep only the first of a `type`/`anyOf` pair on one property; every
/// other error is kept. Used for requests, which report the full list.
pub fn collapse_type_any_of(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| {
            !matches!(error.constraint.as_str(), "type" | "anyOf") || seen.insert(error.property.clone())
        })
        .collect()
}

/// Entries kept by [`SchemaCache::default`].
pub const DEFAULT_SCHEMA_CACHE_CAPACITY: usize = 1024;

/// Compiled validators keyed by the schema they were built from.
///
/// Cloning shares the underlying table. Entries are never evicted; once
/// `capacity` is reached, new schemas are compiled without being stored.
#[derive(Clone)]
pub struct SchemaCache {
    compiled: Arc<RwLock<HashMap<String, Arc<CompiledSchema>>>>,
    capacity: usize,
}

impl SchemaCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            compiled: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The compiled form of `schema`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// [`ContractError::Schema`] when the schema does not compile.
    pub fn compile(&self, schema: &Value, location: &str) -> Result<Arc<CompiledSchema>, ContractError> {
        let key = schema.to_string();
        if let Some(hit) = self.compiled.read().get(&key) {
            return Ok(Arc::clone(hit));
        }
        let compiled = Arc::new(CompiledSchema::compile(schema, location)?);
        let mut table = self.compiled.write();
        if table.len() < self.capacity {
            tracing::trace!(%location, "caching compiled schema");
            table.entry(key).or_insert_with(|| Arc::clone(&compiled));
        }
        Ok(compiled)
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_CACHE_CAPACITY)
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("entries", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors(schema: Value, instance: Value) -> Vec<ValidationError> {
        CompiledSchema::compile(&schema, "test")
            .unwrap()
            .errors(&instance, &instance)
    }

    #[test]
    fn pointer_becomes_dot_path() {
        assert_eq!(dot_path(""), "");
        assert_eq!(dot_path("/test/2"), "test.2");
        assert_eq!(dot_path("/a~1b/c~0d"), "a/b.c~d");
    }

    #[test]
    fn type_error_names_property_and_keyword() {
        let found = errors(
            json!({"type": "object", "properties": {"test": {"type": "boolean"}}, "required": ["test"]}),
            json!({"test": "abcdef"}),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].property, "test");
        assert_eq!(found[0].constraint, "type");
        assert_eq!(found[0].value, json!("abcdef"));
        assert_eq!(found[0].context_value("type"), Some(&json!("boolean")));
    }

    #[test]
    fn required_points_at_missing_property() {
        let found = errors(
            json!({"type": "object", "properties": {"inner": {"type": "object", "required": ["x"]}}}),
            json!({"inner": {}}),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].property, "inner.x");
        assert_eq!(found[0].constraint, "required");
        assert_eq!(found[0].value, Value::Null);
    }

    #[test]
    fn additional_properties_are_reported_individually() {
        let found = errors(
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
            json!({"a": 1, "b": 2}),
        );
        let mut props: Vec<&str> = found.iter().map(|e| e.property.as_str()).collect();
        props.sort_unstable();
        assert_eq!(props, ["a", "b"]);
        assert!(found.iter().all(|e| e.constraint == "additionalProp"));
    }

    #[test]
    fn array_items_use_index_segments() {
        let found = errors(
            json!({"type": "object", "properties": {"ids": {"type": "array", "items": {"type": "integer"}}}}),
            json!({"ids": [1, 2, "x"]}),
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].property, "ids.2");
        assert_eq!(found[0].value, json!("x"));
    }

    #[test]
    fn bound_keywords_carry_their_limit() {
        let found = errors(
            json!({"type": "object", "properties": {"test": {"type": "array", "minItems": 2}}}),
            json!({"test": [123]}),
        );
        assert_eq!(found[0].constraint, "minItems");
        assert_eq!(found[0].context_value("minItems"), Some(&json!(2)));
    }

    #[test]
    fn value_is_read_from_original_payload() {
        let compiled = CompiledSchema::compile(
            &json!({"type": "object", "properties": {"n": {"type": "integer", "maximum": 5}}}),
            "test",
        )
        .unwrap();
        let found = compiled.errors(&json!({"n": 9}), &json!({"n": "9"}));
        assert_eq!(found[0].value, json!("9"));
    }

    #[test]
    fn invalid_schema_fails_to_compile() {
        let err = CompiledSchema::compile(&json!({"type": 12}), "broken").err().unwrap();
        assert!(matches!(err, ContractError::Schema { .. }));
    }

    #[test]
    fn type_and_any_of_pair_collapses_to_one() {
        let deduped = first_per_property(vec![
            ValidationError::new("a", "type", "wrong type", json!(1)),
            ValidationError::new("a", "anyOf", "no branch matched", json!(1)),
            ValidationError::new("b", "required", "missing", Value::Null),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].constraint, "type");
        assert_eq!(deduped[1].property, "b");
    }

    #[test]
    fn request_collapse_keeps_distinct_constraints() {
        let kept = collapse_type_any_of(vec![
            ValidationError::new("code", "minLength", "too short", json!("ab")),
            ValidationError::new("code", "pattern", "no match", json!("ab")),
            ValidationError::new("n", "type", "wrong type", json!("x")),
            ValidationError::new("n", "anyOf", "no branch matched", json!("x")),
        ]);
        let constraints: Vec<&str> = kept.iter().map(|e| e.constraint.as_str()).collect();
        assert_eq!(constraints, ["minLength", "pattern", "type"]);
    }

    #[test]
    fn cache_compiles_each_schema_once() {
        let cache = SchemaCache::default();
        let schema = json!({"type": "object", "required": ["id"]});
        let first = cache.compile(&schema, "test").unwrap();
        let second = cache.clone().compile(&schema, "test").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let disabled = SchemaCache::disabled();
        disabled.compile(&schema, "test").unwrap();
        assert!(disabled.is_empty());
    }
}
