//! Records embedded in the catalog

use crate::collection::SourceFactory;
use crate::error::{CollectionError, StageError};
use crate::stage::StageDescriptor;
use async_trait::async_trait;
use dataplug_format::{ConfigDeclaration, ParameterDeclaration, ParameterType, Record, ResolvedConfig};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Source yielding a fixed list of records
#[derive(Debug, Clone)]
pub struct InlineSource {
    records: Arc<Vec<Record>>,
    declaration: ConfigDeclaration,
}

impl InlineSource {
    /// Source over `records`
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
            declaration: Self::base_declaration(),
        }
    }

    /// Source built from catalog settings: `records` plus option presets
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self, CollectionError> {
        let mut presets = settings.clone();
        let records = match presets.remove("records") {
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(CollectionError::Settings(
                    "inline 'records' must be an array".to_string(),
                ))
            }
            None => Vec::new(),
        };
        let declaration = Self::base_declaration().with_presets(&presets)?;
        Ok(Self {
            records: Arc::new(records),
            declaration,
        })
    }

    fn base_declaration() -> ConfigDeclaration {
        ConfigDeclaration::new()
            .parameter(
                "offset",
                ParameterDeclaration::of(ParameterType::Integer)
                    .describe("Number of records to skip")
                    .minimum(0)
                    .default_value(json!(0)),
            )
            .parameter(
                "limit",
                ParameterDeclaration::of(ParameterType::Integer)
                    .describe("Maximum number of records to yield")
                    .minimum(0),
            )
    }
}

#[async_trait]
impl SourceFactory for InlineSource {
    fn kind(&self) -> &'static str {
        "inline"
    }

    fn declaration(&self) -> ConfigDeclaration {
        self.declaration.clone()
    }

    async fn create_output(&self, config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError> {
        let offset = config.get_count("offset")?.unwrap_or(0);
        let limit = config.get_count("limit")?.unwrap_or(usize::MAX);

        let records: Vec<Record> = self.records.iter().skip(offset).take(limit).cloned().collect();
        let stream = futures::stream::iter(records.into_iter().map(Ok)).boxed();
        Ok(vec![StageDescriptor::RecordSource(stream)])
    }
}
