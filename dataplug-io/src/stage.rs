//! Stage descriptors and record sinks

use crate::error::StageError;
use crate::json::{EncodeOptions, JsonArrayDecoder};
use async_trait::async_trait;
use dataplug_format::{Counter, Flow, Record, StageKind};
use dataplug_transform::{Emitted, Transform, TransformError};
use futures::stream::BoxStream;
use smallvec::smallvec;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte input
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed byte output
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;
/// Lazy stream of records
pub type RecordStream = BoxStream<'static, Result<Record, StageError>>;

/// Whether a sink still accepts records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Keep sending
    Ready,
    /// Downstream went away; stop sending and finish
    Closed,
}

/// Terminal consumer of records
#[async_trait]
pub trait RecordSink: Send {
    /// Accept one record
    async fn write(&mut self, record: Record) -> Result<SinkState, StageError>;

    /// Flush and release the destination
    async fn finish(&mut self) -> Result<(), StageError>;
}

/// Sink that accepts and drops every record
#[derive(Debug, Default)]
pub struct DiscardSink;

#[async_trait]
impl RecordSink for DiscardSink {
    async fn write(&mut self, _record: Record) -> Result<SinkState, StageError> {
        Ok(SinkState::Ready)
    }

    async fn finish(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}

/// Transform that counts records passing through unchanged
#[derive(Debug, Clone)]
pub struct Tap {
    counter: Counter,
}

impl Tap {
    /// Count into `counter`
    pub fn new(counter: Counter) -> Self {
        Self { counter }
    }
}

impl Transform for Tap {
    fn kind(&self) -> StageKind {
        StageKind::Tap
    }

    fn apply(&mut self, record: Record) -> Result<Emitted, TransformError> {
        self.counter.inc();
        Ok(smallvec![record])
    }
}

/// One link of a pipeline, listed in source-to-sink order
pub enum StageDescriptor {
    /// Byte input, followed by [`StageDescriptor::Decode`]
    ByteSource(ByteReader),
    /// Ready-made record stream
    RecordSource(RecordStream),
    /// JSON array decoder
    Decode(JsonArrayDecoder),
    /// Per-record transform (validate, flatten, tap)
    Transform(Box<dyn Transform>),
    /// JSON array encoder, followed by [`StageDescriptor::ByteSink`]
    Encode(EncodeOptions),
    /// Byte output
    ByteSink(ByteWriter),
    /// Record consumer
    RecordSink(Box<dyn RecordSink>),
}

impl StageDescriptor {
    /// Wrap a transform
    pub fn transform<T: Transform + 'static>(transform: T) -> Self {
        StageDescriptor::Transform(Box::new(transform))
    }

    /// Role used to attribute errors
    pub fn kind(&self) -> StageKind {
        match self {
            StageDescriptor::ByteSource(_) | StageDescriptor::RecordSource(_) => StageKind::Source,
            StageDescriptor::Decode(_) => StageKind::Deserializer,
            StageDescriptor::Transform(transform) => transform.kind(),
            StageDescriptor::Encode(_) => StageKind::Serializer,
            StageDescriptor::ByteSink(_) | StageDescriptor::RecordSink(_) => StageKind::Sink,
        }
    }

    /// What the stage consumes, `None` for sources
    pub fn input(&self) -> Option<Flow> {
        match self {
            StageDescriptor::ByteSource(_) | StageDescriptor::RecordSource(_) => None,
            StageDescriptor::Decode(_) | StageDescriptor::ByteSink(_) => Some(Flow::Bytes),
            StageDescriptor::Transform(_)
            | StageDescriptor::Encode(_)
            | StageDescriptor::RecordSink(_) => Some(Flow::Records),
        }
    }

    /// What the stage produces, `None` for sinks
    pub fn output(&self) -> Option<Flow> {
        match self {
            StageDescriptor::ByteSource(_) | StageDescriptor::Encode(_) => Some(Flow::Bytes),
            StageDescriptor::RecordSource(_)
            | StageDescriptor::Decode(_)
            | StageDescriptor::Transform(_) => Some(Flow::Records),
            StageDescriptor::ByteSink(_) | StageDescriptor::RecordSink(_) => None,
        }
    }

    fn variant(&self) -> &'static str {
        match self {
            StageDescriptor::ByteSource(_) => "ByteSource",
            StageDescriptor::RecordSource(_) => "RecordSource",
            StageDescriptor::Decode(_) => "Decode",
            StageDescriptor::Transform(_) => "Transform",
            StageDescriptor::Encode(_) => "Encode",
            StageDescriptor::ByteSink(_) => "ByteSink",
            StageDescriptor::RecordSink(_) => "RecordSink",
        }
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.variant(), self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tap_counts_and_forwards() {
        let counter = Counter::new();
        let mut tap = Tap::new(counter.clone());
        let out = tap.apply(json!({"a": 1})).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn flow_kinds_describe_each_descriptor() {
        let decode = StageDescriptor::Decode(JsonArrayDecoder::new());
        assert_eq!(decode.input(), Some(Flow::Bytes));
        assert_eq!(decode.output(), Some(Flow::Records));
        assert_eq!(format!("{:?}", decode), "Decode(deserializer)");

        let sink = StageDescriptor::RecordSink(Box::new(DiscardSink));
        assert_eq!(sink.input(), Some(Flow::Records));
        assert_eq!(sink.output(), None);

        let tap = StageDescriptor::transform(Tap::new(Counter::new()));
        assert_eq!(tap.kind(), StageKind::Tap);
    }
}
