//! # Payload Narrowing
//!
//! A discriminated union can only be checked once the payload says which
//! branch applies. [`Components::narrow`] inlines a schema like
//! [`Components::inline`], but every union it meets is replaced by the
//! branch the payload selects at that position: at the root, inside
//! properties, inside `allOf` members (an envelope around a union payload)
//! and per element of an array.
//!
//! A union whose discriminator value selects nothing is recorded as a
//! [`DiscriminatorMiss`] and accepts any value, so each miss is reported
//! once instead of as a cascade of branch failures.

use serde_json::{json, Map, Value};

use crate::components::Components;
use crate::error::SpecError;
use crate::merge::merge_all_of;
use crate::reference::ComponentKey;
use crate::request_body::DiscriminatedUnion;

/// A discriminator value that selected no branch.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorMiss {
    /// Dot path of the discriminator property, e.g. `data.test_type`.
    pub property: String,
    pub value: Value,
}

impl From<DiscriminatorMiss> for SpecError {
    fn from(miss: DiscriminatorMiss) -> Self {
        SpecError::DiscriminatorMismatch {
            property_name: miss.property,
            value: miss.value,
        }
    }
}

/// A self-contained schema for one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Narrowed {
    pub schema: Value,
    pub misses: Vec<DiscriminatorMiss>,
}

impl Components {
    /// Inline `schema`, select every discriminated union branch using
    /// `payload`, then merge every `allOf`.
    ///
    /// # Errors
    ///
    /// Reference resolution errors, including
    /// [`SpecError::CircularReference`]. Unmatched discriminators are not
    /// errors here; they are returned in [`Narrowed::misses`].
    pub fn narrow(&self, schema: &Value, payload: &Value) -> Result<Narrowed, SpecError> {
        let mut walk = Walk {
            components: self,
            stack: Vec::new(),
            path: Vec::new(),
            misses: Vec::new(),
        };
        let schema = walk.node(schema, Some(payload))?;
        Ok(Narrowed {
            schema: merge_all_of(&schema),
            misses: walk.misses,
        })
    }
}

struct Walk<'a> {
    components: &'a Components,
    stack: Vec<ComponentKey>,
    path: Vec<String>,
    misses: Vec<DiscriminatorMiss>,
}

impl Walk<'_> {
    /// `instance` is the payload value this node applies to, `None` when
    /// unknown or absent.
    fn node(&mut self, node: &Value, instance: Option<&Value>) -> Result<Value, SpecError> {
        match node {
            Value::Object(map) => {
                if let Some(parsed) = ComponentKey::from_ref_node(node) {
                    return self.expand(parsed?, instance);
                }
                let nullable_null = instance.is_some_and(Value::is_null)
                    && map.get("nullable").and_then(Value::as_bool) == Some(true);
                if let (Some(instance), Some(union), false) =
                    (instance, DiscriminatedUnion::from_schema(node), nullable_null)
                {
                    return self.select(map, &union?, instance);
                }
                self.keywords(map, instance)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.node(item, None))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn expand(&mut self, key: ComponentKey, instance: Option<&Value>) -> Result<Value, SpecError> {
        if self.stack.contains(&key) {
            return Err(SpecError::CircularReference {
                key: key.to_string(),
            });
        }
        let components = self.components;
        let target = components.schema(&key)?;
        self.stack.push(key);
        let expanded = self.node(target, instance);
        self.stack.pop();
        expanded
    }

    fn select(
        &mut self,
        map: &Map<String, Value>,
        union: &DiscriminatedUnion,
        instance: &Value,
    ) -> Result<Value, SpecError> {
        let key = match union.select(instance) {
            Ok(key) => key.clone(),
            Err(SpecError::DiscriminatorMismatch { property_name, value }) => {
                let property = self.join(&property_name);
                tracing::debug!(%property, %value, "discriminator selected no branch");
                self.misses.push(DiscriminatorMiss { property, value });
                return Ok(json!({}));
            }
            Err(other) => return Err(other),
        };
        let branch = self.expand(key, Some(instance))?;

        let siblings: Map<String, Value> = map
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "oneOf" | "discriminator"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if siblings.is_empty() {
            return Ok(branch);
        }
        let siblings = self.keywords(&siblings, Some(instance))?;
        Ok(json!({ "allOf": [branch, siblings] }))
    }

    fn keywords(&mut self, map: &Map<String, Value>, instance: Option<&Value>) -> Result<Value, SpecError> {
        let mut out = Map::new();
        for (keyword, value) in map {
            let narrowed = match (keyword.as_str(), value) {
                ("properties", Value::Object(properties)) => {
                    let mut narrowed = Map::new();
                    for (name, schema) in properties {
                        let child = instance.and_then(|i| i.get(name.as_str()));
                        self.path.push(name.clone());
                        let result = self.node(schema, child);
                        self.path.pop();
                        narrowed.insert(name.clone(), result?);
                    }
                    Value::Object(narrowed)
                }
                ("allOf", Value::Array(members)) => members
                    .iter()
                    .map(|member| self.node(member, instance))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)?,
                ("items", Value::Object(_)) => self.items(value, instance)?,
                _ => self.node(value, None)?,
            };
            out.insert(keyword.clone(), narrowed);
        }
        Ok(Value::Object(out))
    }

    /// One shared item schema, or positional item schemas when the
    /// elements select different branches.
    fn items(&mut self, schema: &Value, instance: Option<&Value>) -> Result<Value, SpecError> {
        let shared = self.node(schema, None)?;
        let Some(Value::Array(elements)) = instance else {
            return Ok(shared);
        };
        let mut positional = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            self.path.push(index.to_string());
            let result = self.node(schema, Some(element));
            self.path.pop();
            positional.push(result?);
        }
        if positional.iter().all(|item| *item == shared) {
            Ok(shared)
        } else {
            Ok(Value::Array(positional))
        }
    }

    fn join(&self, name: &str) -> String {
        self.path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> Components {
        let mut c = Components::default();
        c.insert_schema(
            "test_type_1",
            json!({"type": "object", "properties": {"test_type": {"type": "string"}, "a": {"type": "integer"}}, "required": ["a"]}),
        );
        c.insert_schema(
            "test_type_2",
            json!({"type": "object", "properties": {"test_type": {"type": "string"}, "b": {"type": "string"}}, "required": ["b"]}),
        );
        c.insert_schema(
            "Union",
            DiscriminatedUnion::new(
                "test_type",
                [ComponentKey::schema("test_type_1"), ComponentKey::schema("test_type_2")],
            )
            .schema(),
        );
        c.insert_schema(
            "Envelope",
            json!({"type": "object", "properties": {"ok": {"type": "boolean"}}, "required": ["ok"]}),
        );
        c.insert_schema(
            "Enveloped",
            json!({"allOf": [
                {"$ref": "#/components/schemas/Envelope"},
                {"type": "object", "properties": {"data": {"$ref": "#/components/schemas/Union"}}}
            ]}),
        );
        c
    }

    #[test]
    fn union_inside_an_envelope_is_narrowed() {
        let c = components();
        let narrowed = c
            .narrow(&ComponentKey::schema("Enveloped").ref_node(), &json!({"ok": true, "data": {"test_type": "test_type_1"}}))
            .unwrap();
        assert!(narrowed.misses.is_empty());
        assert_eq!(narrowed.schema["required"], json!(["ok"]));
        assert_eq!(narrowed.schema["properties"]["data"]["required"], json!(["a"]));
        assert!(narrowed.schema["properties"]["data"].get("oneOf").is_none());
    }

    #[test]
    fn nested_miss_is_reported_at_its_path() {
        let c = components();
        let narrowed = c
            .narrow(&ComponentKey::schema("Enveloped").ref_node(), &json!({"ok": true, "data": {"test_type": "test_type_3"}}))
            .unwrap();
        assert_eq!(
            narrowed.misses,
            vec![DiscriminatorMiss {
                property: "data.test_type".into(),
                value: json!("test_type_3"),
            }]
        );
        assert_eq!(narrowed.schema["properties"]["data"], json!({}));
    }

    #[test]
    fn absent_union_value_is_left_unselected() {
        let c = components();
        let narrowed = c.narrow(&ComponentKey::schema("Enveloped").ref_node(), &json!({"ok": true})).unwrap();
        assert!(narrowed.misses.is_empty());
        assert!(narrowed.schema["properties"]["data"]["oneOf"].is_array());
    }

    #[test]
    fn array_elements_select_their_own_branch() {
        let c = components();
        let schema = json!({"type": "array", "items": {"$ref": "#/components/schemas/Union"}});
        let narrowed = c
            .narrow(&schema, &json!([{"test_type": "test_type_1"}, {"test_type": "test_type_2"}, {"test_type": "x"}]))
            .unwrap();
        let items = narrowed.schema["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["required"], json!(["a"]));
        assert_eq!(items[1]["required"], json!(["b"]));
        assert_eq!(narrowed.misses[0].property, "2.test_type");
    }

    #[test]
    fn plain_arrays_keep_a_shared_item_schema() {
        let c = components();
        let schema = json!({"type": "array", "items": {"$ref": "#/components/schemas/Envelope"}});
        let narrowed = c.narrow(&schema, &json!([{"ok": true}, {"ok": false}])).unwrap();
        assert!(narrowed.schema["items"].is_object());
    }

    #[test]
    fn union_siblings_are_kept() {
        let c = components();
        let mut schema = c.schema(&ComponentKey::schema("Union")).unwrap().clone();
        schema["description"] = json!("A test");
        let narrowed = c.narrow(&schema, &json!({"test_type": "test_type_2"})).unwrap();
        assert_eq!(narrowed.schema["description"], json!("A test"));
        assert_eq!(narrowed.schema["required"], json!(["b"]));
    }
}
