//! Schema-driven flattening
//!
//! A [`FlattenPlan`] is derived once from a schema and a root entity name.
//! Objects are inlined as dotted columns; arrays become child entities named
//! `<parent>/<column>`. The plan drives two things:
//!
//! - [`Flattener`], the transform stage that expands each nested record into
//!   flat rows (entity row first, then children in declaration order)
//! - [`flat_metadata`] and [`flat_json_schema`], pure descriptions of the flat
//!   shape that need no records at all

mod metadata;
mod plan;
mod rows;

pub use metadata::{flat_json_schema, flat_metadata, FlatColumn, FlatEntity};
pub use plan::{ColumnType, EntityPlan, FlattenPlan, Property, Shape};
pub use rows::Flattener;
