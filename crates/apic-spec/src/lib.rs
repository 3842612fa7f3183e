//! # apic-spec — Endpoint Specifications and Registry
//!
//! Declares what each endpoint accepts and returns, and owns the shared
//! components those declarations reference.
//!
//! - [`EndpointSpecification`]: parameters per location, post body,
//!   responses per status, scopes.
//! - [`SpecificationRegistry`]: all endpoints plus named components,
//!   reference resolution, aggregate document generation and cache
//!   persistence.
//! - [`Components`]: `$ref` inlining, `allOf` merging and discriminator
//!   branch selection.
//!
//! The registry is plain data. Build it once, wrap it in an `Arc`, and
//! share it; no operation on the request path takes `&mut`.

pub mod cache;
pub mod components;
pub mod declaration;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod merge;
pub mod narrow;
pub mod reference;
pub mod registry;
pub mod request_body;
pub mod response;

pub use cache::CacheFormat;
pub use components::{Component, Components, SharedParameter};
pub use document::{DocumentInfo, OPENAPI_VERSION};
pub use endpoint::{object_schema, EndpointSpecification};
pub use error::SpecError;
pub use merge::{merge_all_of, recursive_distinct_merge};
pub use narrow::{DiscriminatorMiss, Narrowed};
pub use reference::{ComponentKey, ComponentKind};
pub use registry::{EndpointKey, ReferenceProblem, SpecificationRegistry};
pub use request_body::{BodySchema, DiscriminatedUnion, PostBody, PostParameters, RequestBody};
pub use response::{ResolvedResponse, ResponseComponent, ResponseDescriptor};
