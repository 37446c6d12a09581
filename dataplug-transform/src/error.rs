//! Error types for schema handling and record transforms

use thiserror::Error;

/// Errors raised while compiling a schema or deriving a flatten plan
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// Schema is not a well-formed JSON Schema document.
    #[error("Invalid schema: {0}")]
    Invalid(String),
    /// Schema shape cannot be decomposed into flat entities.
    #[error("Cannot flatten schema at '{path}': {reason}")]
    Unflattenable {
        /// Schema location (`#/properties/...`)
        path: String,
        /// What is wrong with it
        reason: String,
    },
    /// `$ref` points outside the document or to nothing.
    #[error("Unresolvable schema reference '{0}'")]
    UnresolvedRef(String),
    /// Reference chain or nesting is deeper than the supported maximum.
    #[error("Schema nesting at '{0}' exceeds the maximum depth")]
    TooDeep(String),
}

/// Errors raised by a transform stage for a single record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// Record failed validation and the fail policy is active.
    #[error("Invalid data: {details}")]
    Invalid {
        /// Validation error details
        details: String,
    },
    /// Record does not have the shape the schema declares.
    #[error("Record does not match schema at '{path}': {reason}")]
    Structure {
        /// Entity-qualified column path
        path: String,
        /// Mismatch description
        reason: String,
    },
}

impl TransformError {
    /// Whether the error concerns a single record and may be skipped without aborting
    pub fn is_record_level(&self) -> bool {
        matches!(self, TransformError::Structure { .. })
    }
}
