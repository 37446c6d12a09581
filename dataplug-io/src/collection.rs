//! Collections and connector factories

use crate::error::{CollectionError, StageError};
use crate::stage::StageDescriptor;
use async_trait::async_trait;
use dataplug_format::{ConfigDeclaration, ResolvedConfig};
use dataplug_transform::Schema;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Produces the stages that read a collection
#[async_trait]
pub trait SourceFactory: Send + Sync + fmt::Debug {
    /// Connector kind as written in the catalog
    fn kind(&self) -> &'static str;

    /// Options accepted by [`create_output`](Self::create_output)
    fn declaration(&self) -> ConfigDeclaration;

    /// Open the origin; the last returned stage yields records
    async fn create_output(&self, config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError>;
}

/// Produces the stages that write a collection
#[async_trait]
pub trait TargetFactory: Send + Sync + fmt::Debug {
    /// Connector kind as written in the catalog
    fn kind(&self) -> &'static str;

    /// Options accepted by [`create_input`](Self::create_input)
    fn declaration(&self) -> ConfigDeclaration;

    /// Open the destination; the first returned stage accepts records
    async fn create_input(&self, config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError>;
}

/// Named data domain with optional schema, source and target
#[derive(Debug, Clone)]
pub struct Collection {
    /// Unique name
    pub name: String,
    /// Catalog file the collection was declared in
    pub origin: Option<PathBuf>,
    /// Compiled schema
    pub schema: Option<Schema>,
    /// Reading capability
    pub source: Option<Arc<dyn SourceFactory>>,
    /// Writing capability
    pub target: Option<Arc<dyn TargetFactory>>,
}

impl Collection {
    /// Collection without any capability
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: None,
            schema: None,
            source: None,
            target: None,
        }
    }

    /// Set the catalog file
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach a schema
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Attach a source connector
    pub fn with_source(mut self, source: Arc<dyn SourceFactory>) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a target connector
    pub fn with_target(mut self, target: Arc<dyn TargetFactory>) -> Self {
        self.target = Some(target);
        self
    }

    /// Schema, or an error naming the missing capability
    pub fn require_schema(&self) -> Result<&Schema, CollectionError> {
        self.schema.as_ref().ok_or_else(|| self.missing("schema"))
    }

    /// Source connector, or an error naming the missing capability
    pub fn require_source(&self) -> Result<&Arc<dyn SourceFactory>, CollectionError> {
        self.source.as_ref().ok_or_else(|| self.missing("source"))
    }

    /// Target connector, or an error naming the missing capability
    pub fn require_target(&self) -> Result<&Arc<dyn TargetFactory>, CollectionError> {
        self.target.as_ref().ok_or_else(|| self.missing("target"))
    }

    /// Names of the capabilities this collection offers
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.schema.is_some() {
            out.push("schema");
        }
        if self.source.is_some() {
            out.push("source");
        }
        if self.target.is_some() {
            out.push("target");
        }
        out
    }

    fn missing(&self, capability: &'static str) -> CollectionError {
        CollectionError::MissingCapability {
            collection: self.name.clone(),
            capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::DiscardTarget;
    use serde_json::json;

    #[test]
    fn capabilities_are_explicit() {
        let schema = Schema::compile(json!({"type": "object"})).unwrap();
        let collection = Collection::new("events")
            .with_schema(schema)
            .with_target(Arc::new(DiscardTarget));

        assert_eq!(collection.capabilities(), vec!["schema", "target"]);
        assert!(collection.require_schema().is_ok());
        assert!(collection.require_target().is_ok());
        let err = collection.require_source().unwrap_err();
        assert_eq!(err.to_string(), "Collection 'events' has no source");
    }
}
