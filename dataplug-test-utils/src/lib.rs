//! dataplug Test Utilities
//!
//! This crate provides shared testing utilities and fixtures for the dataplug
//! workspace: record builders, sample schemas, an in-memory async writer and
//! on-disk collection catalogs.

use serde_json::{json, Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio::io::AsyncWrite;

/// Builder for creating test records with fields in insertion order
pub struct RecordBuilder {
    fields: Map<String, Value>,
}

impl RecordBuilder {
    /// Create a new record builder
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Add a field with a string value
    pub fn string(mut self, key: &str, value: &str) -> Self {
        self.fields
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Add a field with an integer value
    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.fields.insert(key.to_string(), Value::Number(value.into()));
        self
    }

    /// Add a field with a boolean value
    pub fn bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), Value::Bool(value));
        self
    }

    /// Add a field with a null value
    pub fn null(mut self, key: &str) -> Self {
        self.fields.insert(key.to_string(), Value::Null);
        self
    }

    /// Add a field with an object value
    pub fn object(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Add a field with an array value
    pub fn array(mut self, key: &str, value: Vec<Value>) -> Self {
        self.fields.insert(key.to_string(), Value::Array(value));
        self
    }

    /// Build the record
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample schemas shared by unit and integration tests
pub mod schemas {
    use serde_json::{json, Value};

    /// Object with a single integer property `a`
    pub fn integer_a() -> Value {
        json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}}
        })
    }

    /// Object with an optional nested object `a.b`
    pub fn nested_a_b() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "object", "properties": {"b": {"type": "integer"}}}
            }
        })
    }

    /// Orders with an inlined customer, a line-item child entity, a tag list
    /// and a referenced address definition
    pub fn orders() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "id": {"type": "integer"},
                "status": {"type": "string", "enum": ["new", "paid", "shipped"], "default": "new"},
                "placed": {"type": "string", "format": "date-time"},
                "customer": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "address": {"$ref": "#/definitions/address"}
                    },
                    "required": ["name"]
                },
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sku": {"type": "string"},
                            "qty": {"type": "integer", "default": 1}
                        },
                        "required": ["sku"]
                    }
                },
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["id", "customer"],
            "definitions": {
                "address": {
                    "type": "object",
                    "properties": {
                        "city": {"type": "string"},
                        "zip": {"type": "string"}
                    }
                }
            }
        })
    }
}

/// Generate test data with various patterns
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// Valid orders matching [`schemas::orders`]
    pub fn orders(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                RecordBuilder::new()
                    .int("id", i as i64)
                    .object("customer", json!({"name": format!("customer_{}", i % 10)}))
                    .array(
                        "items",
                        (0..(i % 3))
                            .map(|n| json!({"sku": format!("sku_{}", n), "qty": n + 1}))
                            .collect(),
                    )
                    .build()
            })
            .collect()
    }

    /// Records alternating between a valid and an invalid `a` for
    /// [`schemas::integer_a`]
    pub fn mixed_a(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    RecordBuilder::new().int("a", i as i64).build()
                } else {
                    RecordBuilder::new().string("a", &i.to_string()).build()
                }
            })
            .collect()
    }

    /// Records with Unicode and escape edge cases in strings
    pub fn unicode_edge_records() -> Vec<Value> {
        vec![
            RecordBuilder::new().string("s", "Hello, 世界! 🌍").build(),
            RecordBuilder::new().string("s", "quote \" and ] bracket").build(),
            RecordBuilder::new().string("s", "back\\slash, {brace}").build(),
            RecordBuilder::new().null("s").build(),
        ]
    }
}

/// In-memory [`AsyncWrite`] whose contents stay readable after the writer is
/// handed to a pipeline
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    /// Contents decoded as UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Contents parsed as one JSON document
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.contents()).expect("buffer holds valid JSON")
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// [`AsyncWrite`] that fails every write with the given error kind
#[derive(Debug, Clone, Copy)]
pub struct FailingWriter(pub io::ErrorKind);

impl AsyncWrite for FailingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(self.0, "writer refused")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Collection catalog written to a temporary directory
///
/// Schemas are stored under `schemas/` and referenced relative to the
/// catalog file, the way a hand-written catalog would.
pub struct CatalogFixture {
    dir: TempDir,
    entries: Vec<String>,
}

impl CatalogFixture {
    /// Create an empty catalog in a fresh temporary directory
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("schemas"))?;
        Ok(Self {
            dir,
            entries: Vec::new(),
        })
    }

    /// Add a `[[collection]]` entry; `extra` is appended verbatim as TOML
    pub fn collection(mut self, name: &str, schema: Option<&Value>, extra: &str) -> io::Result<Self> {
        let mut entry = format!("[[collection]]\nname = \"{}\"\n", name);
        if let Some(schema) = schema {
            let relative = format!("schemas/{}.json", name);
            fs::write(self.dir.path().join(&relative), schema.to_string())?;
            entry.push_str(&format!("schema = \"{}\"\n", relative));
        }
        entry.push_str(extra);
        self.entries.push(entry);
        Ok(self)
    }

    /// Write the catalog file and return its path
    pub fn write(&self) -> io::Result<PathBuf> {
        let path = self.path();
        fs::write(&path, self.entries.join("\n"))?;
        Ok(path)
    }

    /// Path of the catalog file
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("dataplug.toml")
    }

    /// Directory holding the catalog
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use serde_json::Value;

    /// Assert that object keys appear in exactly the given order
    pub fn assert_key_order(actual: &Value, expected: &[&str]) {
        let keys: Vec<&str> = actual
            .as_object()
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(keys, expected, "key order of {}", actual);
    }
}
