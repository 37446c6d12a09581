//! Collection catalog loaded from TOML
//!
//! ```toml
//! [[collection]]
//! name = "orders"
//! schema = "schemas/orders.json"   # relative to the catalog file
//! source = { kind = "file" }
//! target = { kind = "file", overwrite = true }
//! ```

use dataplug_io::connectors::{build_source, build_target};
use dataplug_io::{Collection, CollectionError};
use dataplug_transform::Schema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Cannot read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Collection '{0}' is declared more than once")]
    Duplicate(String),
    #[error("Schema of collection '{collection}' ({path}): {reason}")]
    Schema {
        collection: String,
        path: PathBuf,
        reason: String,
    },
    #[error("Collection '{collection}': {source}")]
    Connector {
        collection: String,
        #[source]
        source: CollectionError,
    },
    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    collection: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionEntry {
    name: String,
    schema: Option<PathBuf>,
    source: Option<ConnectorEntry>,
    target: Option<ConnectorEntry>,
}

#[derive(Debug, Deserialize)]
struct ConnectorEntry {
    kind: String,
    #[serde(flatten)]
    settings: Map<String, Value>,
}

/// Collections declared in one catalog file
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    collections: Vec<Collection>,
}

impl Catalog {
    /// Read and compile every collection of the catalog at `path`
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile = toml::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut collections: Vec<Collection> = Vec::with_capacity(file.collection.len());
        for entry in file.collection {
            if collections.iter().any(|existing| existing.name == entry.name) {
                return Err(CatalogError::Duplicate(entry.name));
            }
            collections.push(load_collection(entry, base, path)?);
        }
        debug!(path = %path.display(), collections = collections.len(), "Loaded catalog");

        Ok(Self {
            path: path.to_path_buf(),
            collections,
        })
    }

    /// Catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collection called `name`
    pub fn get(&self, name: &str) -> Result<&Collection, CatalogError> {
        self.collections
            .iter()
            .find(|collection| collection.name == name)
            .ok_or_else(|| CatalogError::UnknownCollection(name.to_string()))
    }

    /// Collections in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }
}

fn load_collection(entry: CollectionEntry, base: &Path, origin: &Path) -> Result<Collection, CatalogError> {
    let mut collection = Collection::new(entry.name.clone()).with_origin(origin);

    if let Some(relative) = &entry.schema {
        let schema_path = base.join(relative);
        let schema_error = |reason: String| CatalogError::Schema {
            collection: entry.name.clone(),
            path: schema_path.clone(),
            reason,
        };
        let text = fs::read_to_string(&schema_path).map_err(|err| schema_error(err.to_string()))?;
        let document: Value =
            serde_json::from_str(&text).map_err(|err| schema_error(err.to_string()))?;
        let schema = Schema::compile(document).map_err(|err| schema_error(err.to_string()))?;
        collection = collection.with_schema(schema);
    }

    let connector_error = |source: CollectionError| CatalogError::Connector {
        collection: entry.name.clone(),
        source,
    };
    if let Some(source) = &entry.source {
        let factory = build_source(&source.kind, &source.settings).map_err(connector_error)?;
        collection = collection.with_source(factory);
    }
    if let Some(target) = &entry.target {
        let factory = build_target(&target.kind, &target.settings).map_err(connector_error)?;
        collection = collection.with_target(factory);
    }
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataplug_test_utils::{schemas, CatalogFixture};

    #[test]
    fn loads_collections_with_relative_schemas() {
        let fixture = CatalogFixture::new()
            .unwrap()
            .collection("orders", Some(&schemas::orders()), "source = { kind = \"file\" }\n")
            .unwrap()
            .collection(
                "users",
                None,
                "[collection.source]\nkind = \"inline\"\nrecords = [{ id = 1 }, { id = 2 }]\n",
            )
            .unwrap();
        let catalog = Catalog::load(&fixture.write().unwrap()).unwrap();

        let orders = catalog.get("orders").unwrap();
        assert_eq!(orders.capabilities(), vec!["schema", "source"]);
        let users = catalog.get("users").unwrap();
        assert_eq!(users.capabilities(), vec!["source"]);
        assert!(matches!(
            catalog.get("missing"),
            Err(CatalogError::UnknownCollection(_))
        ));
    }

    #[test]
    fn rejects_duplicates_and_unknown_kinds() {
        let fixture = CatalogFixture::new()
            .unwrap()
            .collection("a", None, "")
            .unwrap()
            .collection("a", None, "")
            .unwrap();
        let err = Catalog::load(&fixture.write().unwrap()).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(name) if name == "a"));

        let fixture = CatalogFixture::new()
            .unwrap()
            .collection("a", None, "target = { kind = \"s3\" }\n")
            .unwrap();
        let err = Catalog::load(&fixture.write().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Unknown target connector kind 's3'"));
    }

    #[test]
    fn malformed_schemas_are_rejected_at_load() {
        let fixture = CatalogFixture::new()
            .unwrap()
            .collection("bad", Some(&serde_json::json!({"type": 12})), "")
            .unwrap();
        let err = Catalog::load(&fixture.write().unwrap()).unwrap_err();
        assert!(matches!(err, CatalogError::Schema { .. }));
    }
}
