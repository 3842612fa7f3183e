//! # Coercion Stage
//!
//! Rewrites a request's raw values through each declared parameter's
//! coercion rule, before validation. Locations are visited in a fixed
//! order: path, query, post body, headers.
//!
//! Absent parameters with a declared default receive it. Object-typed
//! values are walked recursively so that nested properties missing from
//! the payload also receive their defaults.
//!
//! This stage never fails. A declaration that cannot be resolved is
//! logged and skipped; the validation stage reports it properly.

use std::collections::BTreeMap;

use apic_core::{Parameter, ParameterKind, ParameterLocation};
use apic_spec::{Components, EndpointSpecification};
use serde_json::{Map, Value};

use crate::values::RequestValues;

/// Coerce `values` in place according to `spec`.
pub fn coerce_request(spec: &EndpointSpecification, components: &Components, values: &mut RequestValues) {
    coerce_location(spec, components, ParameterLocation::Path, &mut values.path);
    coerce_location(spec, components, ParameterLocation::Query, &mut values.query);
    coerce_body(spec, components, &mut values.body);
    coerce_headers(spec, components, &mut values.headers);
}

fn coerce_location(
    spec: &EndpointSpecification,
    components: &Components,
    location: ParameterLocation,
    values: &mut Map<String, Value>,
) {
    match spec.params(location, components) {
        Ok(params) => coerce_map(&params, values),
        Err(err) => {
            tracing::warn!(method = %spec.method(), path = spec.path(), %location, error = %err, "skipping coercion");
        }
    }
}

fn coerce_body(spec: &EndpointSpecification, components: &Components, body: &mut Value) {
    if spec.post_body().is_none() {
        return;
    }
    let params = match spec.post_params_for(components, body) {
        Ok(params) => params,
        Err(err) => {
            tracing::debug!(method = %spec.method(), path = spec.path(), error = %err, "post parameters unresolved, body left as received");
            return;
        }
    };
    if params.is_empty() {
        return;
    }
    if body.is_null() && params.values().any(|p| p.default_value().is_some()) {
        *body = Value::Object(Map::new());
    }
    if let Value::Object(map) = body {
        coerce_map(&params, map);
    }
}

fn coerce_headers(spec: &EndpointSpecification, components: &Components, headers: &mut Map<String, Value>) {
    let params = match spec.params(ParameterLocation::Header, components) {
        Ok(params) => params,
        Err(err) => {
            tracing::warn!(method = %spec.method(), path = spec.path(), error = %err, "skipping header coercion");
            return;
        }
    };
    for (name, param) in &params {
        let stored = headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned();
        match stored {
            Some(key) => {
                if let Some(raw) = headers.remove(&key) {
                    headers.insert(key, coerce_value(param, raw));
                }
            }
            None => {
                if let Some(default) = param.default_value() {
                    headers.insert(name.clone(), coerce_value(param, default.clone()));
                }
            }
        }
    }
}

fn coerce_map(params: &BTreeMap<String, Parameter>, values: &mut Map<String, Value>) {
    for (name, param) in params {
        match values.remove(name) {
            Some(raw) => {
                values.insert(name.clone(), coerce_value(param, raw));
            }
            None => {
                if let Some(default) = param.default_value() {
                    values.insert(name.clone(), coerce_value(param, default.clone()));
                }
            }
        }
    }
}

/// Coerce one value, recursing into object properties and array items.
pub fn coerce_value(param: &Parameter, raw: Value) -> Value {
    match param.kind() {
        ParameterKind::Object(rules) => match raw {
            Value::Object(mut map) => {
                coerce_map(&rules.properties, &mut map);
                Value::Object(map)
            }
            other => param.coerce(other),
        },
        ParameterKind::Array(rules) => {
            let coerced = param.coerce(raw);
            match (coerced, rules.items.as_deref()) {
                (Value::Array(items), Some(item_param)) if needs_deep_pass(item_param) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| coerce_value(item_param, item))
                        .collect(),
                ),
                (coerced, _) => coerced,
            }
        }
        _ => param.coerce(raw),
    }
}

fn needs_deep_pass(param: &Parameter) -> bool {
    matches!(param.kind(), ParameterKind::Object(_) | ParameterKind::Array(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apic_core::HttpMethod;
    use apic_spec::{ComponentKey, DiscriminatedUnion, RequestBody};
    use serde_json::json;

    #[test]
    fn path_query_and_header_values_are_coerced() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users/{id}")
            .path_param("id", Parameter::integer())
            .query_param("active", Parameter::boolean())
            .query_param("tags", Parameter::array_of(Parameter::string()))
            .header_param("X-Page", Parameter::integer());
        let mut values = RequestValues::new()
            .with_path("id", "42")
            .with_query("active", "TRUE")
            .with_query("tags", "a, b")
            .with_header("x-page", "3");
        coerce_request(&spec, &Components::default(), &mut values);
        assert_eq!(values.path["id"], json!(42));
        assert_eq!(values.query["active"], json!(true));
        assert_eq!(values.query["tags"], json!(["a", "b"]));
        assert_eq!(values.headers["x-page"], json!(3));
    }

    #[test]
    fn defaults_fill_absent_parameters() {
        let spec = EndpointSpecification::new(HttpMethod::Get, "/users")
            .query_param("limit", Parameter::integer().default(20))
            .header_param("X-Locale", Parameter::string().default("en"));
        let mut values = RequestValues::new();
        coerce_request(&spec, &Components::default(), &mut values);
        assert_eq!(values.query["limit"], json!(20));
        assert_eq!(values.headers["X-Locale"], json!("en"));
    }

    #[test]
    fn nested_object_defaults_are_filled_recursively() {
        let address = Parameter::object_with([
            ("city", Parameter::string().required()),
            ("country", Parameter::string().required().default("NL")),
            (
                "geo",
                Parameter::object_with([("precision", Parameter::integer().default(6))]).default(json!({})),
            ),
        ]);
        let spec = EndpointSpecification::new(HttpMethod::Post, "/users")
            .post_param("name", Parameter::string())
            .post_param("address", address);
        let mut values = RequestValues::new().with_body(json!({"name": 7, "address": {"city": "Delft"}}));
        coerce_request(&spec, &Components::default(), &mut values);
        assert_eq!(
            values.body,
            json!({
                "name": "7",
                "address": {"city": "Delft", "country": "NL", "geo": {"precision": 6}}
            })
        );
    }

    #[test]
    fn union_body_is_coerced_through_the_selected_branch() {
        let mut components = Components::default();
        components.insert_schema(
            "Count",
            json!({"type": "object", "properties": {"kind": {"type": "string"}, "n": {"type": "integer"}}}),
        );
        let spec = EndpointSpecification::new(HttpMethod::Post, "/things").post_body_request(RequestBody::union(
            DiscriminatedUnion::new("kind", [ComponentKey::schema("Count")]),
        ));
        let mut values = RequestValues::new().with_body(json!({"kind": "Count", "n": "5"}));
        coerce_request(&spec, &components, &mut values);
        assert_eq!(values.body["n"], json!(5));
    }

    #[test]
    fn unmatched_union_leaves_body_untouched() {
        let spec = EndpointSpecification::new(HttpMethod::Post, "/things").post_body_request(RequestBody::union(
            DiscriminatedUnion::new("kind", [ComponentKey::schema("Count")]),
        ));
        let body = json!({"kind": "Other", "n": "5"});
        let mut values = RequestValues::new().with_body(body.clone());
        coerce_request(&spec, &Components::default(), &mut values);
        assert_eq!(values.body, body);
    }

    #[test]
    fn arrays_of_objects_are_walked() {
        let item = Parameter::object_with([("qty", Parameter::integer().default(1))]);
        let param = Parameter::array_of(item);
        assert_eq!(
            coerce_value(&param, json!([{}, {"qty": "4"}])),
            json!([{"qty": 1}, {"qty": 4}])
        );
    }
}
