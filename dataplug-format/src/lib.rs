//! dataplug Format - Core primitives shared by every pipeline crate
//!
//! This crate provides the vocabulary of the dataplug pipeline with no I/O
//! dependencies. It includes:
//!
//! - Exit codes and timing constants
//! - Error types for configuration handling
//! - Stage kinds and record flow kinds
//! - Run options shared by all commands
//! - Progress counters
//! - Configuration declarations and typed coercion of raw option values

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod constants;
pub mod counters;
pub mod error;
pub mod options;
pub mod stage;

// Re-export commonly used types
pub use config::{ConfigDeclaration, ParameterDeclaration, ParameterType, ResolvedConfig, StringFormat};
pub use counters::{Counter, Counters};
pub use error::{ConfigError, Result};
pub use options::RunOptions;
pub use stage::{Flow, StageKind};

/// A single structured unit of data flowing through a pipeline.
///
/// Object key order is preserved (`serde_json` is built with `preserve_order`).
pub type Record = serde_json::Value;
