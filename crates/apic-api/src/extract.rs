//! # Request Value Extraction
//!
//! Builds [`RequestValues`] from the pieces axum hands a handler or
//! middleware: the header map, the raw query string, path parameters
//! and the body bytes.

use std::collections::HashMap;

use apic_validate::RequestValues;
use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Header values as strings. Repeated headers keep the last value;
/// values that are not valid UTF-8 are skipped.
pub fn header_values(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|text| (name.as_str().to_string(), Value::String(text.to_string())))
        })
        .collect()
}

/// Decode `a=1&b=2&b=3` into `{"a": "1", "b": ["2", "3"]}`.
pub fn query_values(query: Option<&str>) -> Result<Map<String, Value>, ApiError> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(Map::new());
    };
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(|e| ApiError::MalformedBody(format!("query string: {e}")))?;
    Ok(collect_pairs(pairs))
}

/// Path parameters as strings, keyed by template name.
pub fn path_values(params: &HashMap<String, String>) -> Map<String, Value> {
    params
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect()
}

/// Decode a body according to its content type.
///
/// JSON bodies are parsed as-is, form bodies become string pairs, an
/// empty body is `null`. Other content types are left as a string.
pub fn body_value(headers: &HeaderMap, bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(bytes).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
        return Ok(Value::Object(collect_pairs(pairs)));
    }
    if content_type.starts_with("application/json") || content_type.ends_with("+json") {
        return serde_json::from_slice(bytes).map_err(|e| ApiError::MalformedBody(e.to_string()));
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Assemble request values from already decoded parts.
pub fn request_values(
    headers: &HeaderMap,
    query: Option<&str>,
    path: &HashMap<String, String>,
    body: &Bytes,
) -> Result<RequestValues, ApiError> {
    Ok(RequestValues {
        path: path_values(path),
        query: query_values(query)?,
        headers: header_values(headers),
        body: body_value(headers, body)?,
        ..RequestValues::default()
    })
}

/// Repeated keys collapse into an array in order of appearance.
fn collect_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in pairs {
        let value = Value::String(value);
        match out.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn repeated_query_keys_become_arrays() {
        let values = query_values(Some("a=1&b=2&b=3&b=4&c=x%20y")).unwrap();
        assert_eq!(Value::Object(values), json!({"a": "1", "b": ["2", "3", "4"], "c": "x y"}));
    }

    #[test]
    fn empty_query_is_empty_map() {
        assert!(query_values(None).unwrap().is_empty());
        assert!(query_values(Some("")).unwrap().is_empty());
    }

    #[test]
    fn headers_are_read_as_strings() {
        let mut headers = HeaderMap::new();
        headers.insert("x-page", HeaderValue::from_static("3"));
        let values = header_values(&headers);
        assert_eq!(values["x-page"], json!("3"));
    }

    #[test]
    fn bodies_decode_by_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(body_value(&headers, &Bytes::new()).unwrap(), Value::Null);
        assert_eq!(
            body_value(&headers, &Bytes::from_static(br#"{"n": 1}"#)).unwrap(),
            json!({"n": 1})
        );

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        assert_eq!(
            body_value(&headers, &Bytes::from_static(b"tag=a&tag=b&n=1")).unwrap(),
            json!({"tag": ["a", "b"], "n": "1"})
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = body_value(&HeaderMap::new(), &Bytes::from_static(b"{nope")).unwrap_err();
        assert!(matches!(err, ApiError::MalformedBody(_)));
    }

    #[test]
    fn request_values_combine_every_location() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", HeaderValue::from_static("abc"));
        let path = HashMap::from([("id".to_string(), "7".to_string())]);
        let values = request_values(&headers, Some("q=z"), &path, &Bytes::from_static(b"[1]")).unwrap();
        assert_eq!(values.path["id"], json!("7"));
        assert_eq!(values.query["q"], json!("z"));
        assert_eq!(values.headers["x-trace"], json!("abc"));
        assert_eq!(values.body, json!([1]));
    }
}
