//! dataplug I/O - Streaming pipelines over JSON arrays
//!
//! This crate provides everything that moves records:
//!
//! - The incremental JSON array decoder and the array writer
//! - Stage descriptors, record sinks and the pipeline orchestrator
//! - Collections and the built-in `file`, `inline` and `discard` connectors
//! - Per-command pipeline planning
//! - The progress reporter and interrupt handling

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod connectors;
pub mod error;
pub mod json;
pub mod operation;
pub mod pipeline;
pub mod progress;
pub mod signal;
pub mod stage;

// Re-export commonly used types
pub use collection::{Collection, SourceFactory, TargetFactory};
pub use error::{CollectionError, PipelineError, StageError};
pub use json::{EncodeOptions, JsonArrayDecoder, JsonArrayWriter};
pub use operation::{plan_operation, Endpoints, Operation, PlannedOperation};
pub use pipeline::{ErrorPolicy, Pipeline, PipelineBuilder, PipelineSummary};
pub use progress::{CounterStyle, ProgressReporter};
pub use signal::cancel_on_interrupt;
pub use stage::{DiscardSink, RecordSink, SinkState, StageDescriptor, Tap};
pub use tokio_util::sync::CancellationToken;
