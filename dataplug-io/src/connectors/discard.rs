use crate::collection::TargetFactory;
use crate::error::StageError;
use crate::stage::{DiscardSink, StageDescriptor};
use async_trait::async_trait;
use dataplug_format::{ConfigDeclaration, ResolvedConfig};

/// Target that accepts and drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardTarget;

#[async_trait]
impl TargetFactory for DiscardTarget {
    fn kind(&self) -> &'static str {
        "discard"
    }

    fn declaration(&self) -> ConfigDeclaration {
        ConfigDeclaration::new()
    }

    async fn create_input(&self, _config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError> {
        Ok(vec![StageDescriptor::RecordSink(Box::new(DiscardSink))])
    }
}
