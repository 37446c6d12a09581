//! Compiled collection schemas

use crate::defaults;
use crate::error::SchemaError;
use dataplug_format::constants::MAX_SCHEMA_DEPTH;
use dataplug_format::Record;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// JSON Schema document paired with its compiled validator
///
/// Compiling checks the document against its meta-schema, so a `Schema` is
/// always well-formed. Cloning is cheap.
#[derive(Clone)]
pub struct Schema {
    document: Arc<Value>,
    validator: Arc<jsonschema::Validator>,
}

impl Schema {
    /// Compile a schema document
    pub fn compile(document: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&document)
            .map_err(|err| SchemaError::Invalid(err.to_string()))?;
        Ok(Self {
            document: Arc::new(document),
            validator: Arc::new(validator),
        })
    }

    /// Raw schema document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Whether `record` satisfies the schema
    pub fn is_valid(&self, record: &Record) -> bool {
        self.validator.is_valid(record)
    }

    /// Validation errors for `record`, each prefixed with the offending location
    pub fn errors(&self, record: &Record) -> Vec<String> {
        self.validator
            .iter_errors(record)
            .map(|err| {
                let location = err.instance_path.to_string();
                if location.is_empty() {
                    err.to_string()
                } else {
                    format!("{}: {}", location, err)
                }
            })
            .collect()
    }

    /// Optionally fill declared defaults into `record` and strip undeclared
    /// properties of objects that forbid additional properties
    pub fn prepare(&self, record: &mut Record, fill_defaults: bool, strip_additional: bool) {
        let how = defaults::Preparation {
            defaults: fill_defaults,
            strip: strip_additional,
        };
        defaults::fill(&self.document, &self.document, record, how, 0);
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// Follow local `$ref`s from `node` until a concrete schema is reached
pub(crate) fn resolve_ref<'a>(
    root: &'a Value,
    mut node: &'a Value,
    path: &str,
) -> Result<&'a Value, SchemaError> {
    let mut hops = 0;
    while let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        hops += 1;
        if hops > MAX_SCHEMA_DEPTH {
            return Err(SchemaError::TooDeep(path.to_string()));
        }
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;
        node = if pointer.is_empty() {
            root
        } else {
            root.pointer(pointer)
                .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?
        };
    }
    Ok(node)
}

/// JSON type names declared by a schema node, empty when unconstrained
pub(crate) fn type_names(node: &Value) -> Vec<String> {
    match node.get("type") {
        Some(Value::String(kind)) => vec![kind.clone()],
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Human readable JSON type of a value
pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
