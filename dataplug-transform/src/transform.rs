//! Record transform stage trait

use crate::error::TransformError;
use dataplug_format::{Record, StageKind};
use smallvec::SmallVec;

/// Records emitted for a single input record (usually zero or one)
pub type Emitted = SmallVec<[Record; 1]>;

/// A stage that maps one input record to zero or more output records
///
/// Stages own the record they receive; whatever they emit passes exclusively
/// downstream. Errors are either record-level (see
/// [`TransformError::is_record_level`]) or terminal for the pipeline.
pub trait Transform: Send {
    /// Stage role used to attribute errors
    fn kind(&self) -> StageKind;

    /// Process a single record
    fn apply(&mut self, record: Record) -> Result<Emitted, TransformError>;
}
