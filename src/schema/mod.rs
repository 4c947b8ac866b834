//! # Schema
//!
//! Optional per-namespace JSON Schemas, enforced at write time.
//!
//! - A namespace without a schema accepts any JSON document
//! - A namespace with a schema rejects documents that break it
//! - Only the first violation is reported

mod errors;
mod json_schema;
mod registry;
mod validator;

pub use errors::{SchemaError, SchemaResult, ValidationDetails, ROOT_PATH};
pub use json_schema::{JsonSchema, JsonType};
pub use registry::{
    is_schema_namespace, schema_namespace, SchemaRegistry, SCHEMA_KEY, SCHEMA_NAMESPACE_SUFFIX,
};
pub use validator::SchemaValidator;
