//! Per-command pipeline planning
//!
//! Every command is the same orchestrator fed a different ordered list of
//! stage descriptors:
//!
//! | command   | stages                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `filter`  | stdin, decode, validate, encode, stdout                       |
//! | `scan`    | stdin, decode, validate, discard                              |
//! | `flatten` | stdin, decode, flatten, tap(`flattened`), encode, stdout      |
//! | `source`  | source stages, tap(`supplied`), encode, stdout                |
//! | `target`  | stdin, decode, tap(`consumed`), target stages                 |

use crate::collection::Collection;
use crate::error::CollectionError;
use crate::json::{EncodeOptions, JsonArrayDecoder};
use crate::pipeline::{ErrorPolicy, Pipeline, PipelineBuilder};
use crate::progress::CounterStyle;
use crate::stage::{ByteReader, ByteWriter, DiscardSink, StageDescriptor, Tap};
use dataplug_format::{Counters, RunOptions, StageKind};
use dataplug_transform::{
    FlattenPlan, Flattener, RecordValidator, ValidationCounters, ValidatorOptions,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Pipeline-backed commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Validate records and pass the valid ones through
    Filter,
    /// Validate records and only count them
    Scan,
    /// Expand records into flat entity rows
    Flatten,
    /// Read a collection to stdout
    Source,
    /// Write stdin into a collection
    Target,
}

impl Operation {
    /// Command name
    pub fn name(self) -> &'static str {
        match self {
            Operation::Filter => "filter",
            Operation::Scan => "scan",
            Operation::Flatten => "flatten",
            Operation::Source => "source",
            Operation::Target => "target",
        }
    }

    /// Progress counters in display order, with their styles
    pub fn counters(self) -> Vec<(&'static str, CounterStyle)> {
        match self {
            Operation::Filter => vec![
                ("filtered", CounterStyle::EVALUATED),
                ("valid", CounterStyle::VALID),
                ("invalid", CounterStyle::INVALID),
            ],
            Operation::Scan => vec![
                ("scanned", CounterStyle::EVALUATED),
                ("valid", CounterStyle::VALID),
                ("invalid", CounterStyle::INVALID),
            ],
            Operation::Flatten => vec![("flattened", CounterStyle::FLOW)],
            Operation::Source => vec![("supplied", CounterStyle::FLOW)],
            Operation::Target => vec![("consumed", CounterStyle::FLOW)],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte streams a command reads from and writes to
pub struct Endpoints {
    /// Input array (stdin)
    pub input: ByteReader,
    /// Output array (stdout)
    pub output: ByteWriter,
}

impl Endpoints {
    /// Process stdin and stdout
    pub fn stdio() -> Self {
        Self {
            input: Box::new(tokio::io::stdin()),
            output: Box::new(tokio::io::stdout()),
        }
    }
}

/// A planned command, ready to run
pub struct PlannedOperation {
    /// Assembled pipeline
    pub pipeline: Pipeline,
    /// Counters updated by the pipeline stages
    pub counters: Counters,
    /// Display styles matching `counters` by position
    pub styles: Vec<CounterStyle>,
}

/// Build the pipeline for `operation` on `collection`
///
/// `params` are raw `key=value` connector options; only `source` and `target`
/// use them. Opening the origin or destination happens here, so open errors
/// surface before any record moves.
pub async fn plan_operation(
    operation: Operation,
    collection: &Collection,
    options: &RunOptions,
    params: &[String],
    endpoints: Endpoints,
) -> Result<PlannedOperation, CollectionError> {
    let layout = operation.counters();
    let counters = Counters::with_names(layout.iter().map(|(name, _)| *name));
    let styles = layout.iter().map(|(_, style)| *style).collect();
    let counter = |name: &str| counters.get(name).unwrap_or_default();

    let Endpoints { input, output } = endpoints;
    let encode = StageDescriptor::Encode(EncodeOptions {
        indent: options.indent_width(),
        abort_on_error: options.abort_on_write_error(),
    });

    let stages: Vec<StageDescriptor> = match operation {
        Operation::Filter | Operation::Scan => {
            let schema = collection.require_schema()?.clone();
            let (validator_options, evaluated) = if operation == Operation::Filter {
                (ValidatorOptions::filter(options.invert, options.fail), "filtered")
            } else {
                (ValidatorOptions::scan(options.invert, options.fail), "scanned")
            };
            let validator = RecordValidator::new(
                schema,
                validator_options,
                ValidationCounters {
                    evaluated: counter(evaluated),
                    valid: counter("valid"),
                    invalid: counter("invalid"),
                },
            );
            let mut stages = vec![
                StageDescriptor::ByteSource(input),
                StageDescriptor::Decode(JsonArrayDecoder::new()),
                StageDescriptor::transform(validator),
            ];
            if operation == Operation::Filter {
                stages.push(encode);
                stages.push(StageDescriptor::ByteSink(output));
            } else {
                stages.push(StageDescriptor::RecordSink(Box::new(DiscardSink)));
            }
            stages
        }
        Operation::Flatten => {
            let schema = collection.require_schema()?;
            let name = options.collection_name(&collection.name);
            let plan = FlattenPlan::from_schema(schema.document(), name)?;
            vec![
                StageDescriptor::ByteSource(input),
                StageDescriptor::Decode(JsonArrayDecoder::new()),
                StageDescriptor::transform(Flattener::new(Arc::new(plan), options.metadata)),
                StageDescriptor::transform(Tap::new(counter("flattened"))),
                encode,
                StageDescriptor::ByteSink(output),
            ]
        }
        Operation::Source => {
            let factory = collection.require_source()?;
            let config = factory.declaration().resolve(params)?;
            let mut stages = factory
                .create_output(&config)
                .await
                .map_err(|source| CollectionError::Open {
                    stage: StageKind::Source,
                    source,
                })?;
            stages.push(StageDescriptor::transform(Tap::new(counter("supplied"))));
            stages.push(encode);
            stages.push(StageDescriptor::ByteSink(output));
            stages
        }
        Operation::Target => {
            let factory = collection.require_target()?;
            let config = factory.declaration().resolve(params)?;
            let target_stages = factory
                .create_input(&config)
                .await
                .map_err(|source| CollectionError::Open {
                    stage: StageKind::Sink,
                    source,
                })?;
            let mut stages = vec![
                StageDescriptor::ByteSource(input),
                StageDescriptor::Decode(JsonArrayDecoder::new()),
                StageDescriptor::transform(Tap::new(counter("consumed"))),
            ];
            stages.extend(target_stages);
            stages
        }
    };

    debug!(operation = %operation, collection = %collection.name, stages = ?stages, "Planned pipeline");

    let pipeline = PipelineBuilder::new()
        .stages(stages)
        .policy(ErrorPolicy {
            abort: options.abort || options.fail,
        })
        .build()?;

    Ok(PlannedOperation {
        pipeline,
        counters,
        styles,
    })
}
