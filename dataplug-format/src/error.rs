//! Error types for configuration handling

use thiserror::Error;

/// Errors raised while resolving raw option values against a declaration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Value could not be coerced into the declared type or format.
    #[error("Invalid \"{parameter}\" value: failed to parse \"{value}\" as {expected}")]
    InvalidValue {
        /// Parameter name (`name[]` for array items)
        parameter: String,
        /// Raw value as supplied
        value: String,
        /// Human readable expected type
        expected: String,
    },
    /// Value is not one of the declared choices.
    #[error("Invalid \"{parameter}\" value: \"{value}\" is not one of {choices}")]
    InvalidChoice {
        /// Parameter name
        parameter: String,
        /// Coerced value rendered as JSON
        value: String,
        /// Allowed values rendered as a comma-separated list
        choices: String,
    },
    /// Required parameter was not supplied and has no default.
    #[error("Missing required parameter \"{0}\"")]
    MissingRequired(String),
    /// Parameter is not part of the declaration.
    #[error("Unknown parameter \"{0}\"")]
    UnknownParameter(String),
    /// Scalar parameter was supplied more than once.
    #[error("Parameter \"{0}\" was given more than once")]
    Duplicate(String),
    /// Two mutually exclusive parameters were both supplied.
    #[error("Parameters \"{parameter}\" and \"{conflicts_with}\" cannot be used together")]
    Conflict {
        /// Parameter that declared the conflict
        parameter: String,
        /// Parameter it conflicts with
        conflicts_with: String,
    },
    /// Raw option was not in `key=value` or `key` form.
    #[error("Malformed option \"{0}\": expected KEY=VALUE")]
    Malformed(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ConfigError>;
