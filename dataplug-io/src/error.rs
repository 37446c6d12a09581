//! Error types for stages, pipelines and collections

use dataplug_format::constants::{EXIT_DATA_ERROR, EXIT_SOFTWARE, EXIT_USAGE};
use dataplug_format::{ConfigError, StageKind};
use dataplug_transform::{SchemaError, TransformError};
use thiserror::Error;

/// Failure raised by a single stage
#[derive(Debug, Error)]
pub enum StageError {
    /// Reading or writing the underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Input is not a well-formed JSON array
    #[error("Malformed JSON at byte {offset}: {reason}")]
    Parse {
        /// Absolute byte offset in the input
        offset: u64,
        /// What was wrong
        reason: String,
    },
    /// Serializing a record failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A transform rejected a record
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// Connector options could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StageError {
    /// Whether the failure was caused by the data rather than the environment
    pub fn is_data_error(&self) -> bool {
        matches!(self, StageError::Parse { .. } | StageError::Transform(_))
    }
}

/// Failure of a whole pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed terminally
    #[error("{stage} failed: {source}")]
    Stage {
        /// Role of the failing stage
        stage: StageKind,
        /// Underlying failure
        #[source]
        source: StageError,
    },
    /// Stage flow kinds do not line up
    #[error("Invalid stage chain: {0}")]
    Chain(String),
}

impl PipelineError {
    /// Wrap a stage failure
    pub fn stage(stage: StageKind, source: StageError) -> Self {
        PipelineError::Stage { stage, source }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Stage { source, .. } if source.is_data_error() => EXIT_DATA_ERROR,
            PipelineError::Stage {
                source: StageError::Config(_),
                ..
            } => EXIT_USAGE,
            _ => EXIT_SOFTWARE,
        }
    }
}

/// Failure to plan a command against a collection
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The collection lacks what the command needs
    #[error("Collection '{collection}' has no {capability}")]
    MissingCapability {
        /// Collection name
        collection: String,
        /// Missing capability (`schema`, `source` or `target`)
        capability: &'static str,
    },
    /// Unknown connector kind in the catalog
    #[error("Unknown {role} connector kind '{kind}'")]
    UnknownConnector {
        /// `source` or `target`
        role: &'static str,
        /// Requested kind
        kind: String,
    },
    /// Connector settings are invalid
    #[error("Invalid connector settings: {0}")]
    Settings(String),
    /// Connector options could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Schema could not be compiled or flattened
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Connector stages do not form a valid pipeline
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// Opening the origin or destination failed
    #[error("{stage} could not be opened: {source}")]
    Open {
        /// `source` or `sink`
        stage: StageKind,
        /// Underlying failure
        #[source]
        source: StageError,
    },
}

impl CollectionError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            CollectionError::Open {
                source: StageError::Config(_),
                ..
            } => EXIT_USAGE,
            CollectionError::Open { .. } | CollectionError::Pipeline(_) => EXIT_SOFTWARE,
            _ => EXIT_USAGE,
        }
    }
}
