//! Local JSON array files

use crate::collection::{SourceFactory, TargetFactory};
use crate::error::StageError;
use crate::json::{EncodeOptions, JsonArrayDecoder};
use crate::stage::StageDescriptor;
use async_trait::async_trait;
use dataplug_format::{ConfigDeclaration, ConfigError, ParameterDeclaration, ParameterType, ResolvedConfig};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tracing::debug;

fn required_path(config: &ResolvedConfig) -> Result<PathBuf, StageError> {
    config
        .get_str("path")
        .map(PathBuf::from)
        .ok_or_else(|| StageError::Config(ConfigError::MissingRequired("path".to_string())))
}

/// Reads a JSON array from a file
#[derive(Debug, Clone)]
pub struct FileSource {
    declaration: ConfigDeclaration,
}

impl FileSource {
    /// Source whose options are preset from catalog `settings`
    pub fn new(settings: &Map<String, Value>) -> Result<Self, ConfigError> {
        let declaration = ConfigDeclaration::new()
            .parameter(
                "path",
                ParameterDeclaration::of(ParameterType::String)
                    .describe("File to read the JSON array from")
                    .required(),
            )
            .with_presets(settings)?;
        Ok(Self { declaration })
    }
}

#[async_trait]
impl SourceFactory for FileSource {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn declaration(&self) -> ConfigDeclaration {
        self.declaration.clone()
    }

    async fn create_output(&self, config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError> {
        let path = required_path(config)?;
        let file = File::open(&path).await?;
        debug!(path = %path.display(), "Opened source file");
        Ok(vec![
            StageDescriptor::ByteSource(Box::new(file)),
            StageDescriptor::Decode(JsonArrayDecoder::new()),
        ])
    }
}

/// Writes a JSON array to a file
#[derive(Debug, Clone)]
pub struct FileTarget {
    declaration: ConfigDeclaration,
}

impl FileTarget {
    /// Target whose options are preset from catalog `settings`
    pub fn new(settings: &Map<String, Value>) -> Result<Self, ConfigError> {
        let declaration = ConfigDeclaration::new()
            .parameter(
                "path",
                ParameterDeclaration::of(ParameterType::String)
                    .describe("File to write the JSON array to")
                    .required(),
            )
            .parameter(
                "indent",
                ParameterDeclaration::of(ParameterType::Integer)
                    .describe("Pretty-print width, 0 for compact output")
                    .minimum(0),
            )
            .parameter(
                "overwrite",
                ParameterDeclaration::of(ParameterType::Boolean)
                    .describe("Replace an existing file")
                    .default_value(json!(false)),
            )
            .with_presets(settings)?;
        Ok(Self { declaration })
    }
}

#[async_trait]
impl TargetFactory for FileTarget {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn declaration(&self) -> ConfigDeclaration {
        self.declaration.clone()
    }

    async fn create_input(&self, config: &ResolvedConfig) -> Result<Vec<StageDescriptor>, StageError> {
        let path = required_path(config)?;
        let indent = config.get_count("indent")?;
        let overwrite = config.get_bool("overwrite").unwrap_or(false);
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(&path).await?;
        debug!(path = %path.display(), overwrite, "Opened target file");

        Ok(vec![
            StageDescriptor::Encode(EncodeOptions {
                indent,
                abort_on_error: true,
            }),
            StageDescriptor::ByteSink(Box::new(file)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::stage::DiscardSink;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn source_reads_records_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.json");
        std::fs::write(&path, r#"[{"id":1},{"id":2}]"#).unwrap();

        let source = FileSource::new(&Map::new()).unwrap();
        let config = source
            .declaration()
            .resolve([format!("path={}", path.display())])
            .unwrap();
        let summary = PipelineBuilder::new()
            .stages(source.create_output(&config).await.unwrap())
            .stage(StageDescriptor::RecordSink(Box::new(DiscardSink)))
            .build()
            .unwrap()
            .run(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.records_read, 2);
    }

    #[tokio::test]
    async fn missing_source_file_is_an_io_error() {
        let source = FileSource::new(&Map::new()).unwrap();
        let config = source.declaration().resolve(["path=/nonexistent/in.json"]).unwrap();
        let err = source.create_output(&config).await.err().unwrap();
        assert!(matches!(err, StageError::Io(_)));
    }

    #[tokio::test]
    async fn target_refuses_to_overwrite_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "[]").unwrap();

        let mut presets = Map::new();
        presets.insert("path".to_string(), json!(path.display().to_string()));
        let target = FileTarget::new(&presets).unwrap();

        let config = target.declaration().resolve(Vec::<String>::new()).unwrap();
        assert!(target.create_input(&config).await.is_err());

        let config = target.declaration().resolve(["overwrite"]).unwrap();
        let stages = target.create_input(&config).await.unwrap();
        assert_eq!(stages.len(), 2);
    }

    #[test]
    fn target_presets_are_type_checked() {
        let settings = json!({"indent": -1});
        assert!(FileTarget::new(settings.as_object().unwrap()).is_err());
        let settings = json!({"overwrite": "sometimes"});
        assert!(FileTarget::new(settings.as_object().unwrap()).is_err());
        let settings = json!({"path": 7});
        assert!(FileSource::new(settings.as_object().unwrap()).is_err());
    }
}
