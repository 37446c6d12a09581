//! Pipeline orchestrator
//!
//! A pipeline is a source-side record stream, a chain of transforms and a
//! sink. The run loop pulls one record at a time, pushes it through every
//! transform and awaits the sink for each output before pulling again, so a
//! slow sink throttles the source and at most one input record is in flight.
//!
//! Error policy: record-level transform errors are skipped with a warning
//! unless `abort` is set; every other failure ends the run. On a terminal
//! failure the sink is still finished best-effort so partial output stays a
//! valid JSON array.

use crate::error::{PipelineError, StageError};
use crate::json::JsonArrayWriter;
use crate::stage::{RecordSink, RecordStream, SinkState, StageDescriptor};
use dataplug_format::{Flow, Record, StageKind};
use dataplug_transform::{Emitted, Transform};
use futures::StreamExt;
use smallvec::smallvec;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How record-level failures are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Escalate record-level errors to a pipeline abort
    pub abort: bool,
}

/// Outcome of a completed (or interrupted) run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Records pulled from the source
    pub records_read: u64,
    /// Records accepted by the sink
    pub records_written: u64,
    /// Input records dropped because of a record-level error
    pub records_skipped: u64,
    /// Run stopped early on an interrupt
    pub cancelled: bool,
}

/// Collects stage descriptors and checks that they form a valid chain
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    stages: Vec<StageDescriptor>,
    policy: ErrorPolicy,
}

impl PipelineBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one stage
    pub fn stage(mut self, stage: StageDescriptor) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append several stages in order
    pub fn stages<I: IntoIterator<Item = StageDescriptor>>(mut self, stages: I) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Set the error policy
    pub fn policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate flow kinds and fuse the descriptors into a runnable pipeline
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        check_flow(&self.stages)?;

        let mut stages = self.stages.into_iter().peekable();

        let source: RecordStream = match stages.next() {
            Some(StageDescriptor::RecordSource(stream)) => stream,
            Some(StageDescriptor::ByteSource(reader)) => match stages.next() {
                Some(StageDescriptor::Decode(decoder)) => FramedRead::new(reader, decoder).boxed(),
                other => return Err(unexpected("a decoder after the byte source", other)),
            },
            other => return Err(unexpected("a source", other)),
        };

        let mut transforms: Vec<Box<dyn Transform>> = Vec::new();
        while let Some(StageDescriptor::Transform(_)) = stages.peek() {
            if let Some(StageDescriptor::Transform(transform)) = stages.next() {
                transforms.push(transform);
            }
        }

        let sink: Box<dyn RecordSink> = match stages.next() {
            Some(StageDescriptor::RecordSink(sink)) => sink,
            Some(StageDescriptor::Encode(options)) => match stages.next() {
                Some(StageDescriptor::ByteSink(writer)) => {
                    Box::new(JsonArrayWriter::new(writer, options))
                }
                other => return Err(unexpected("a byte sink after the encoder", other)),
            },
            other => return Err(unexpected("a sink", other)),
        };

        if let Some(extra) = stages.next() {
            return Err(unexpected("nothing after the sink", Some(extra)));
        }

        debug!(transforms = transforms.len(), "Pipeline assembled");
        Ok(Pipeline {
            source,
            transforms,
            sink,
            policy: self.policy,
        })
    }
}

fn check_flow(stages: &[StageDescriptor]) -> Result<(), PipelineError> {
    let (Some(first), Some(last)) = (stages.first(), stages.last()) else {
        return Err(PipelineError::Chain("no stages".to_string()));
    };
    if first.input().is_some() {
        return Err(PipelineError::Chain(format!("{:?} cannot start a pipeline", first)));
    }
    if last.output().is_some() {
        return Err(PipelineError::Chain(format!("{:?} cannot end a pipeline", last)));
    }
    for pair in stages.windows(2) {
        let (upstream, downstream) = (&pair[0], &pair[1]);
        if upstream.output() != downstream.input() {
            return Err(PipelineError::Chain(format!(
                "{:?} produces {} but {:?} expects {}",
                upstream,
                flow_name(upstream.output()),
                downstream,
                flow_name(downstream.input()),
            )));
        }
    }
    Ok(())
}

fn flow_name(flow: Option<Flow>) -> String {
    flow.map(|flow| flow.to_string())
        .unwrap_or_else(|| "nothing".to_string())
}

fn unexpected(expected: &str, found: Option<StageDescriptor>) -> PipelineError {
    match found {
        Some(stage) => PipelineError::Chain(format!("expected {}, found {:?}", expected, stage)),
        None => PipelineError::Chain(format!("expected {}, found end of chain", expected)),
    }
}

/// Result of pushing one input record through the transforms
enum Outcome {
    Emit(Emitted),
    Skip,
}

/// Runnable pipeline
pub struct Pipeline {
    source: RecordStream,
    transforms: Vec<Box<dyn Transform>>,
    sink: Box<dyn RecordSink>,
    policy: ErrorPolicy,
}

impl Pipeline {
    /// Drive the pipeline to completion, a terminal error or cancellation
    pub async fn run(mut self, cancel: CancellationToken) -> Result<PipelineSummary, PipelineError> {
        let mut summary = PipelineSummary::default();

        'pull: loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Interrupted, discarding remaining input");
                    summary.cancelled = true;
                    break 'pull;
                }
                next = self.source.next() => next,
            };

            let record = match next {
                None => break,
                Some(Ok(record)) => record,
                Some(Err(err)) => {
                    let stage = if matches!(err, StageError::Parse { .. }) {
                        StageKind::Deserializer
                    } else {
                        StageKind::Source
                    };
                    return Err(self.abort(stage, err).await);
                }
            };
            summary.records_read += 1;

            let outputs = match self.transform(record) {
                Ok(Outcome::Emit(outputs)) => outputs,
                Ok(Outcome::Skip) => {
                    summary.records_skipped += 1;
                    continue;
                }
                Err((stage, err)) => return Err(self.abort(stage, err).await),
            };

            for output in outputs {
                let written = tokio::select! {
                    biased;
                    written = self.sink.write(output) => written,
                    _ = cancel.cancelled() => {
                        warn!("Interrupted during a pending write, output is incomplete");
                        summary.cancelled = true;
                        return Ok(summary);
                    }
                };
                match written {
                    Ok(SinkState::Ready) => summary.records_written += 1,
                    Ok(SinkState::Closed) => {
                        debug!("Sink closed, stopping");
                        break 'pull;
                    }
                    Err(err) => return Err(self.abort(StageKind::Sink, err).await),
                }
            }
        }

        self.sink
            .finish()
            .await
            .map_err(|err| PipelineError::stage(StageKind::Sink, err))?;
        debug!(
            read = summary.records_read,
            written = summary.records_written,
            skipped = summary.records_skipped,
            cancelled = summary.cancelled,
            "Pipeline finished"
        );
        Ok(summary)
    }

    fn transform(&mut self, record: Record) -> Result<Outcome, (StageKind, StageError)> {
        let mut batch: Emitted = smallvec![record];
        for transform in self.transforms.iter_mut() {
            let mut next = Emitted::new();
            for record in batch {
                match transform.apply(record) {
                    Ok(emitted) => next.extend(emitted),
                    Err(err) if err.is_record_level() && !self.policy.abort => {
                        warn!(stage = %transform.kind(), error = %err, "Skipping record");
                        return Ok(Outcome::Skip);
                    }
                    Err(err) => return Err((transform.kind(), err.into())),
                }
            }
            if next.is_empty() {
                return Ok(Outcome::Emit(next));
            }
            batch = next;
        }
        Ok(Outcome::Emit(batch))
    }

    /// Stop pulling, close the sink best-effort and build the terminal error
    async fn abort(&mut self, stage: StageKind, err: StageError) -> PipelineError {
        error!(stage = %stage, error = %err, "Aborting pipeline");
        if let Err(finish_err) = self.sink.finish().await {
            debug!(error = %finish_err, "Could not close output after failure");
        }
        PipelineError::stage(stage, err)
    }
}
