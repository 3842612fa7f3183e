//! # apic-validate — Coercion and Validation Stages
//!
//! The request pipeline for the API contract engine:
//!
//! 1. **Coercion** ([`coerce_request`]): raw wire values are rewritten
//!    through each declared parameter's rule, with defaults filled in.
//! 2. **Validation** ([`validate_request`]): path and query, post body and
//!    headers are each checked against a JSON Schema built from the
//!    declaration, after a lenient pass that fills required defaults and
//!    converts compatible scalars.
//! 3. **Response validation** ([`validate_response`]): optional, checks a
//!    handler's payload against the schema declared for its status.
//!
//! Errors carry dot-path property names, the failing constraint and its
//! limit. Request failures list every broken constraint; response
//! failures are deduplicated to one per property.
//!
//! [`ContractValidator`] bundles a shared registry and
//! [`ValidationConfig`] for transport layers.

pub mod coercion;
pub mod config;
pub mod engine;
pub mod error;
pub mod lenient;
pub mod normalize;
pub mod request;
pub mod response;
pub mod validator;
pub mod values;

pub use coercion::{coerce_request, coerce_value};
pub use config::ValidationConfig;
pub use engine::{collapse_type_any_of, dot_path, first_per_property, CompiledSchema, SchemaCache};
pub use error::{ContractError, RequestValidationFailure, ResponseValidationFailure, ValidationError};
pub use normalize::to_draft7;
pub use request::{validate_request, validate_request_cached};
pub use response::{validate_response, validate_response_cached};
pub use validator::{match_template, ContractValidator};
pub use values::{RequestMetadata, RequestValues, ValidationStatus};

#[cfg(test)]
mod proptests {
    use apic_core::{HttpMethod, Parameter};
    use apic_spec::{Components, EndpointSpecification};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::*;

    fn endpoint() -> EndpointSpecification {
        EndpointSpecification::new(HttpMethod::Get, "/search")
            .query_param("page", Parameter::integer().minimum(1.0).required())
            .query_param("exact", Parameter::boolean())
            .query_param("tags", Parameter::array_of(Parameter::string()).max_items(5))
    }

    fn run(values: &mut RequestValues) -> Result<(), ContractError> {
        let spec = endpoint();
        let components = Components::default();
        coerce_request(&spec, &components, values);
        validate_request(&spec, &components, values, &ValidationConfig::default())
    }

    proptest! {
        /// Well-formed wire strings always pass once coerced.
        #[test]
        fn stringified_valid_values_pass(page in 1i64..10_000, exact in any::<bool>(), tags in prop::collection::vec("[a-z]{1,6}", 1..5)) {
            let mut values = RequestValues::new()
                .with_query("page", page.to_string())
                .with_query("exact", exact.to_string())
                .with_query("tags", tags.join(","));
            prop_assert!(run(&mut values).is_ok());
            prop_assert_eq!(&values.query["page"], &json!(page));
            prop_assert_eq!(&values.query["exact"], &json!(exact));
            prop_assert_eq!(values.metadata.validation, ValidationStatus::Pass);
        }

        /// Failures never echo a `type` error as `anyOf` on one property,
        /// and every invalid parameter is named.
        #[test]
        fn errors_name_each_invalid_parameter(page in "[a-z]{0,4}", exact in "[a-z]{2,5}", tags in prop::collection::vec("[a-z]{1,3}", 6..9)) {
            let mut values = RequestValues::new()
                .with_query("page", page)
                .with_query("exact", exact)
                .with_query("tags", Value::from(tags));
            let err = run(&mut values).unwrap_err();
            let errors = err.validation_errors();
            for property in ["page", "tags"] {
                prop_assert!(errors.iter().any(|e| e.property == property), "no error for {}", property);
            }
            for property in ["page", "exact", "tags"] {
                let echoes = errors
                    .iter()
                    .filter(|e| e.property == property && matches!(e.constraint.as_str(), "type" | "anyOf"))
                    .count();
                prop_assert!(echoes <= 1);
            }
            prop_assert_eq!(values.metadata.validation, ValidationStatus::Fail);
        }
    }
}
