//! dataplug Transforms - Record engines used between the codec stages
//!
//! This crate provides the per-record logic of the pipeline, independent of I/O:
//!
//! - Compiled schemas with default filling and additional-property stripping
//! - The validator/filter stage with invert and fail policies
//! - Schema-driven flattening of nested records into flat rows
//! - Flat metadata and flat JSON Schema derivation (no records required)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod defaults;
pub mod error;
pub mod flatten;
pub mod schema;
pub mod transform;
pub mod validator;

// Re-export commonly used types
pub use error::{SchemaError, TransformError};
pub use flatten::{flat_json_schema, flat_metadata, FlatColumn, FlatEntity, FlattenPlan, Flattener};
pub use schema::Schema;
pub use transform::{Emitted, Transform};
pub use validator::{RecordValidator, ValidationCounters, ValidatorOptions};
