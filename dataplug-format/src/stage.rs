//! Stage kinds and record flow kinds

use std::fmt;

/// Role of a stage within a pipeline, used to attribute errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Produces bytes or records from an origin
    Source,
    /// Parses a byte stream into records
    Deserializer,
    /// Validates records against a schema
    Validator,
    /// Expands records into flat rows
    Flattener,
    /// Observes records without changing them
    Tap,
    /// Frames records as a byte stream
    Serializer,
    /// Delivers bytes or records to a destination
    Sink,
}

impl StageKind {
    /// Lowercase label used in logs and diagnostics
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Source => "source",
            StageKind::Deserializer => "deserializer",
            StageKind::Validator => "validator",
            StageKind::Flattener => "flattener",
            StageKind::Tap => "tap",
            StageKind::Serializer => "serializer",
            StageKind::Sink => "sink",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What travels on a link between two stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Raw bytes of a JSON array
    Bytes,
    /// Deserialized records
    Records,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Bytes => f.write_str("bytes"),
            Flow::Records => f.write_str("records"),
        }
    }
}
