//! Built-in connectors
//!
//! Catalog entries name a connector `kind`; any other settings of the entry
//! become preset option values that `--set` assignments can still override.

mod discard;
mod file;
mod inline;

pub use discard::DiscardTarget;
pub use file::{FileSource, FileTarget};
pub use inline::InlineSource;

use crate::collection::{SourceFactory, TargetFactory};
use crate::error::CollectionError;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Connector kinds usable as a source
pub const SOURCE_KINDS: &[&str] = &["file", "inline"];
/// Connector kinds usable as a target
pub const TARGET_KINDS: &[&str] = &["file", "discard"];

/// Build a source connector from its catalog settings
pub fn build_source(kind: &str, settings: &Map<String, Value>) -> Result<Arc<dyn SourceFactory>, CollectionError> {
    match kind {
        "file" => Ok(Arc::new(FileSource::new(settings)?)),
        "inline" => Ok(Arc::new(InlineSource::from_settings(settings)?)),
        other => Err(CollectionError::UnknownConnector {
            role: "source",
            kind: other.to_string(),
        }),
    }
}

/// Build a target connector from its catalog settings
pub fn build_target(kind: &str, settings: &Map<String, Value>) -> Result<Arc<dyn TargetFactory>, CollectionError> {
    match kind {
        "file" => Ok(Arc::new(FileTarget::new(settings)?)),
        "discard" if settings.is_empty() => Ok(Arc::new(DiscardTarget)),
        "discard" => Err(CollectionError::Settings(
            "the discard target takes no settings".to_string(),
        )),
        other => Err(CollectionError::UnknownConnector {
            role: "target",
            kind: other.to_string(),
        }),
    }
}
