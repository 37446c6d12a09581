//! Decomposition plan derived from a schema

use crate::error::SchemaError;
use crate::schema::{resolve_ref, type_names};
use dataplug_format::constants::{COLUMN_SEPARATOR, ENTITY_SEPARATOR, MAX_SCHEMA_DEPTH};
use serde_json::{Map, Value};

/// Declared type information of a single flat column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnType {
    /// JSON type names, empty when unconstrained
    pub types: Vec<String>,
    /// Declared `format`, if any
    pub format: Option<String>,
}

/// How a schema node is laid out in the flat output
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Stored as-is in one column
    Column(ColumnType),
    /// Inlined: each property becomes one or more dotted columns
    Object(Vec<Property>),
    /// Each element becomes a row of a child entity
    Array(Box<EntityPlan>),
}

/// Object property in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property key
    pub name: String,
    /// Listed in the parent's `required`
    pub required: bool,
    /// Declared `default`
    pub default: Option<Value>,
    /// Layout of the property value
    pub shape: Shape,
}

impl Property {
    /// Property always carries a value when its parent object is present
    pub fn always_present(&self) -> bool {
        self.required || self.default.is_some()
    }
}

/// One flat entity (the root collection or a child array)
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPlan {
    /// Entity name, `root` or `root/column.path`
    pub name: String,
    /// Name of the parent entity
    pub parent: Option<String>,
    /// Layout of each row: an object, or a single scalar column
    pub shape: Shape,
}

/// Complete decomposition plan for a collection schema
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenPlan {
    root: EntityPlan,
}

impl FlattenPlan {
    /// Derive the plan for `schema`, naming the root entity `name`
    pub fn from_schema(schema: &Value, name: &str) -> Result<Self, SchemaError> {
        let builder = PlanBuilder { root: schema };
        let node = resolve_ref(schema, schema, "#")?;
        let properties = node
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::Unflattenable {
                path: "#".to_string(),
                reason: "root schema must be an object with properties".to_string(),
            })?;
        let properties = builder.properties(node, properties, name, "", "#", 0)?;
        Ok(Self {
            root: EntityPlan {
                name: name.to_string(),
                parent: None,
                shape: Shape::Object(properties),
            },
        })
    }

    /// Root entity
    pub fn root(&self) -> &EntityPlan {
        &self.root
    }

    /// Root entity name
    pub fn name(&self) -> &str {
        &self.root.name
    }
}

struct PlanBuilder<'a> {
    root: &'a Value,
}

impl<'a> PlanBuilder<'a> {
    fn properties(
        &self,
        node: &'a Value,
        properties: &'a Map<String, Value>,
        entity: &str,
        prefix: &str,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Property>, SchemaError> {
        let required: Vec<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut out = Vec::with_capacity(properties.len());
        for (key, property) in properties {
            let property_path = format!("{}/properties/{}", path, key);
            let resolved = resolve_ref(self.root, property, &property_path)?;
            let column = join_column(prefix, key);
            let shape = self.shape(resolved, entity, &column, &property_path, depth + 1)?;
            out.push(Property {
                name: key.clone(),
                required: required.contains(&key.as_str()),
                default: resolved.get("default").cloned(),
                shape,
            });
        }
        Ok(out)
    }

    fn shape(
        &self,
        node: &'a Value,
        entity: &str,
        column: &str,
        path: &str,
        depth: usize,
    ) -> Result<Shape, SchemaError> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err(SchemaError::TooDeep(path.to_string()));
        }
        let types = type_names(node);
        let allows = |kind: &str| types.is_empty() || types.iter().any(|t| t == kind);

        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            if allows("object") {
                let properties = self.properties(node, properties, entity, column, path, depth)?;
                return Ok(Shape::Object(properties));
            }
        }

        let is_array = types.iter().any(|t| t == "array")
            || (types.is_empty() && node.get("items").is_some());
        if is_array {
            let child_name = format!("{}{}{}", entity, ENTITY_SEPARATOR, column);
            let items_path = format!("{}/items", path);
            let child_shape = match node.get("items").filter(|items| items.is_object()) {
                Some(items) => {
                    let items = resolve_ref(self.root, items, &items_path)?;
                    match items.get("properties").and_then(Value::as_object) {
                        Some(properties) if allows_object(items) => Shape::Object(self.properties(
                            items,
                            properties,
                            &child_name,
                            "",
                            &items_path,
                            depth + 1,
                        )?),
                        _ => Shape::Column(column_type(items)),
                    }
                }
                None => Shape::Column(ColumnType::default()),
            };
            return Ok(Shape::Array(Box::new(EntityPlan {
                name: child_name,
                parent: Some(entity.to_string()),
                shape: child_shape,
            })));
        }

        Ok(Shape::Column(column_type(node)))
    }
}

fn allows_object(node: &Value) -> bool {
    let types = type_names(node);
    types.is_empty() || types.iter().any(|t| t == "object")
}

fn column_type(node: &Value) -> ColumnType {
    ColumnType {
        types: type_names(node),
        format: node.get("format").and_then(Value::as_str).map(str::to_string),
    }
}

pub(crate) fn join_column(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, COLUMN_SEPARATOR, key)
    }
}
