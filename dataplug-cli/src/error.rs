use crate::catalog::CatalogError;
use dataplug_format::constants::{EXIT_SOFTWARE, EXIT_USAGE};
use dataplug_io::{CollectionError, PipelineError};
use dataplug_transform::SchemaError;
use thiserror::Error;

/// Any failure of a command
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Cannot start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Catalog(_) | CliError::Schema(_) => EXIT_USAGE,
            CliError::Collection(err) => err.exit_code(),
            CliError::Pipeline(err) => err.exit_code(),
            CliError::Runtime(_) | CliError::Io(_) | CliError::Json(_) => EXIT_SOFTWARE,
        }
    }
}
