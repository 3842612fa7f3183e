//! # apic-core — Parameter Type Model
//!
//! Leaf crate of the API contract engine. Defines the typed parameter
//! descriptors every endpoint declaration is built from, and the rules
//! that coerce loosely typed wire values into those types.
//!
//! ## Key Design Principles
//!
//! 1. **Closed kind set.** [`ParameterKind`] is a sum type over the six
//!    parameter kinds; kind-specific constraints live in the variant they
//!    belong to and every `match` is exhaustive.
//!
//! 2. **Immutable values.** Builder methods consume and return the
//!    parameter. Nothing mutates a parameter after declaration.
//!
//! 3. **Total coercion.** [`Parameter::coerce`] never fails; values no rule
//!    applies to pass through for the validation stage to reject.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `apic-*` crates.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod coerce;
pub mod error;
pub mod field;
pub mod method;
pub mod parameter;
pub mod schema;
pub mod status;

pub use error::CoreError;
pub use field::FieldDescriptor;
pub use method::{HttpMethod, ParameterLocation};
pub use parameter::{
    ArrayRules, NumericRules, ObjectRules, Parameter, ParameterKind, ParameterType, StringRules,
};
pub use status::{default_description, status_text, BAD_RESPONSE, QUIET_INTERNAL_SERVER_ERROR};
