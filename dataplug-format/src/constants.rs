//! Exit codes and tuning constants

use std::time::Duration;

/// Successful run.
pub const EXIT_OK: u8 = 0;
/// Command was used incorrectly: bad option value, missing capability (`EX_USAGE`).
pub const EXIT_USAGE: u8 = 64;
/// Input data was incorrect in some way (`EX_DATAERR`).
pub const EXIT_DATA_ERROR: u8 = 65;
/// Internal software error, including I/O failures (`EX_SOFTWARE`).
pub const EXIT_SOFTWARE: u8 = 70;

/// Interval between two progress renders.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Separator between inlined object properties in flattened column names.
pub const COLUMN_SEPARATOR: &str = ".";
/// Separator between parent and child entity names in flattened output.
pub const ENTITY_SEPARATOR: &str = "/";
/// Column name used for child entities made of scalar array items.
pub const SCALAR_ITEM_COLUMN: &str = "value";

/// Maximum nesting of `$ref` resolution while deriving a flatten plan.
pub const MAX_SCHEMA_DEPTH: usize = 32;

/// Default catalog file looked up in the working directory.
pub const DEFAULT_CATALOG: &str = "dataplug.toml";
