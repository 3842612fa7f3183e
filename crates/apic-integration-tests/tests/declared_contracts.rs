//! # Declared Contracts
//!
//! Loads a declaration document and drives requests and responses
//! through coercion and validation, covering the behaviours clients rely
//! on: lenient type handling, dot-path errors, merged compositions and
//! discriminated bodies.

use std::sync::Arc;

use apic_core::HttpMethod;
use apic_spec::SpecificationRegistry;
use apic_validate::{ContractError, ContractValidator, RequestValues, ValidationConfig, ValidationStatus};
use proptest::prelude::*;
use serde_json::{json, Value};

const DECLARATIONS: &str = r##"
info:
  title: Contract Tests
  version: 2.0.0
components:
  schemas:
    A:
      type: object
      properties:
        a: { type: string }
      required: [a]
    B:
      type: object
      properties:
        b: { type: integer }
      required: [b]
    AB:
      allOf:
        - $ref: "#/components/schemas/A"
        - $ref: "#/components/schemas/B"
    test_type_1:
      type: object
      properties:
        test_type: { type: string }
        count: { type: integer, minimum: 0 }
      required: [test_type, count]
    test_type_2:
      type: object
      properties:
        test_type: { type: string }
        label: { type: string }
      required: [test_type, label]
  parameters:
    Page:
      name: page
      in: query
      schema: { type: integer, minimum: 1, default: 1 }
endpoints:
  - method: post
    path: /flags
    body:
      params:
        test: { type: boolean, required: true }
    responses:
      200: Stored
  - method: get
    path: /items
    parameters:
      shared: [parameters/Page]
      query:
        test:
          type: array
          items: { type: integer }
          minItems: 2
    responses:
      200: { schema: { type: array } }
  - method: get
    path: /ab
    responses:
      200: schemas/AB
  - method: post
    path: /tests
    body:
      request:
        schema:
          oneOf:
            - $ref: "#/components/schemas/test_type_1"
            - $ref: "#/components/schemas/test_type_2"
          discriminator:
            propertyName: test_type
    responses:
      201: Created
  - method: get
    path: /users/{id}
    parameters:
      path:
        id: { type: integer, minimum: 1 }
      header:
        X-Api-Version: { type: integer, required: true }
    responses:
      200:
        schema:
          type: object
          properties:
            id: { type: integer }
            nickname: { type: string, nullable: true, maxLength: 8 }
          required: [id]
      default: Unexpected error
"##;

fn validator() -> ContractValidator {
    let mut registry = SpecificationRegistry::default();
    registry.apply_declarations("contracts.yaml", DECLARATIONS).unwrap();
    assert!(registry.check_references().is_empty());
    ContractValidator::new(
        Arc::new(registry),
        ValidationConfig::default().with_response_validation(true),
    )
}

fn request(method: HttpMethod, path: &str, values: &mut RequestValues) -> Result<(), ContractError> {
    validator().process_request(method, path, values)
}

fn response(method: HttpMethod, path: &str, status: u16, payload: Value) -> Result<(), ContractError> {
    let v = validator();
    let (spec, _) = v.find_endpoint(method, path).unwrap();
    v.validate_response(spec, status, &payload)
}

#[test]
fn non_boolean_string_fails_with_one_type_error() {
    let mut values = RequestValues::new().with_body(json!({"test": "abcdef"}));
    let err = request(HttpMethod::Post, "/flags", &mut values).unwrap_err();
    let errors = err.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].property, "test");
    assert_eq!(errors[0].constraint, "type");
    assert_eq!(values.metadata.validation, ValidationStatus::Fail);
}

#[test]
fn numeric_one_is_accepted_as_true() {
    let mut values = RequestValues::new().with_body(json!({"test": 1}));
    request(HttpMethod::Post, "/flags", &mut values).unwrap();
    assert_eq!(values.body, json!({"test": true}));
    assert_eq!(values.metadata.validation, ValidationStatus::Pass);
}

#[test]
fn single_query_value_fails_min_items() {
    let mut values = RequestValues::new().with_query("test", "123");
    let err = request(HttpMethod::Get, "/items", &mut values).unwrap_err();
    let errors = err.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].property, "test");
    assert_eq!(errors[0].constraint, "minItems");
    assert_eq!(errors[0].context_value("minItems"), Some(&json!(2)));
}

#[test]
fn comma_separated_query_passes_and_shared_default_applies() {
    let mut values = RequestValues::new().with_query("test", "1,2,3");
    request(HttpMethod::Get, "/items", &mut values).unwrap();
    assert_eq!(values.query["test"], json!([1, 2, 3]));
    assert_eq!(values.query["page"], json!(1));
}

#[test]
fn merged_all_of_reports_each_missing_field() {
    let err = response(HttpMethod::Get, "/ab", 200, json!({})).unwrap_err();
    let mut missing: Vec<&str> = err.validation_errors().iter().map(|e| e.property.as_str()).collect();
    missing.sort_unstable();
    assert_eq!(missing, ["a", "b"]);
    assert!(err.validation_errors().iter().all(|e| e.constraint == "required"));
    assert_eq!(err.status_code(), 591);
}

#[test]
fn unknown_discriminator_value_is_rejected() {
    let mut values = RequestValues::new().with_body(json!({"test_type": "test_type_3"}));
    let err = request(HttpMethod::Post, "/tests", &mut values).unwrap_err();
    let errors = err.validation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].constraint, "discriminator");
    assert_eq!(errors[0].message, "value did not match any available schemas");
    assert_eq!(errors[0].value, json!("test_type_3"));
}

#[test]
fn discriminated_body_is_coerced_and_validated_by_its_branch() {
    let mut values = RequestValues::new().with_body(json!({"test_type": "test_type_1", "count": "4"}));
    request(HttpMethod::Post, "/tests", &mut values).unwrap();
    assert_eq!(values.body["count"], json!(4));

    let mut values = RequestValues::new().with_body(json!({"test_type": "test_type_2"}));
    let err = request(HttpMethod::Post, "/tests", &mut values).unwrap_err();
    assert_eq!(err.validation_errors()[0].property, "label");
}

#[test]
fn path_and_header_parameters_are_checked() {
    let mut values = RequestValues::new().with_header("x-api-version", "2");
    request(HttpMethod::Get, "/users/9", &mut values).unwrap();
    assert_eq!(values.path["id"], json!(9));
    assert_eq!(values.headers["x-api-version"], json!(2));

    let mut values = RequestValues::new();
    let err = request(HttpMethod::Get, "/users/0", &mut values).unwrap_err();
    let mut props: Vec<&str> = err.validation_errors().iter().map(|e| e.property.as_str()).collect();
    props.sort_unstable();
    assert_eq!(props, ["X-Api-Version", "id"]);
}

#[test]
fn nullable_property_reports_a_single_error() {
    response(HttpMethod::Get, "/users/1", 200, json!({"id": 1, "nickname": null})).unwrap();
    let err = response(HttpMethod::Get, "/users/1", 200, json!({"id": 1, "nickname": "far too long"})).unwrap_err();
    assert_eq!(err.validation_errors().len(), 1);
    assert_eq!(err.validation_errors()[0].property, "nickname");
    assert_eq!(err.validation_errors()[0].constraint, "maxLength");
}

#[test]
fn undeclared_status_uses_the_default_response() {
    // The default response is description-only, so any payload passes.
    response(HttpMethod::Get, "/users/1", 503, json!({"anything": true})).unwrap();
}

#[test]
fn unknown_route_is_reported() {
    let err = request(HttpMethod::Get, "/nowhere", &mut RequestValues::new()).unwrap_err();
    assert!(matches!(err, ContractError::UnknownEndpoint { .. }));
}

proptest! {
    #[test]
    fn positive_path_ids_always_pass(id in 1u32..1_000_000) {
        let path = format!("/users/{id}");
        let mut values = RequestValues::new().with_header("X-Api-Version", "1");
        let outcome = request(HttpMethod::Get, &path, &mut values);
        prop_assert!(outcome.is_ok());
        prop_assert_eq!(&values.path["id"], &json!(id));
    }
}
