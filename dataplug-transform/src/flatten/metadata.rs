//! Flat shape descriptions derived from a plan

use super::plan::{join_column, ColumnType, EntityPlan, FlattenPlan, Property, Shape};
use dataplug_format::constants::SCALAR_ITEM_COLUMN;
use serde_json::{json, Map, Value};

/// One flat entity with its columns in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntity {
    /// Entity name
    pub name: String,
    /// Parent entity, `None` for the root
    pub parent: Option<String>,
    /// Columns in declaration order
    pub columns: Vec<FlatColumn>,
}

/// One flat column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatColumn {
    /// Dotted column name
    pub name: String,
    /// Declared JSON types
    pub types: Vec<String>,
    /// Declared `format`
    pub format: Option<String>,
    /// Every object hop on the way to the column is always present
    pub required: bool,
}

impl FlattenPlan {
    /// Entities in emission order (pre-order, children in declaration order)
    pub fn describe(&self) -> Vec<FlatEntity> {
        let mut out = Vec::new();
        describe_entity(self.root(), &mut out);
        out
    }
}

fn describe_entity(entity: &EntityPlan, out: &mut Vec<FlatEntity>) {
    let mut columns = Vec::new();
    let mut children = Vec::new();
    match &entity.shape {
        Shape::Object(properties) => {
            describe_columns(properties, "", true, &mut columns, &mut children)
        }
        Shape::Column(column) => columns.push(flat_column(SCALAR_ITEM_COLUMN, column, true)),
        Shape::Array(child) => children.push(child.as_ref()),
    }
    out.push(FlatEntity {
        name: entity.name.clone(),
        parent: entity.parent.clone(),
        columns,
    });
    for child in children {
        describe_entity(child, out);
    }
}

fn describe_columns<'a>(
    properties: &'a [Property],
    prefix: &str,
    present: bool,
    columns: &mut Vec<FlatColumn>,
    children: &mut Vec<&'a EntityPlan>,
) {
    for property in properties {
        let column = join_column(prefix, &property.name);
        let required = present && property.always_present();
        match &property.shape {
            Shape::Column(kind) => columns.push(flat_column(&column, kind, required)),
            Shape::Object(nested) => describe_columns(nested, &column, required, columns, children),
            Shape::Array(child) => children.push(child),
        }
    }
}

fn flat_column(name: &str, kind: &ColumnType, required: bool) -> FlatColumn {
    FlatColumn {
        name: name.to_string(),
        types: kind.types.clone(),
        format: kind.format.clone(),
        required,
    }
}

fn type_value(types: &[String]) -> Option<Value> {
    match types {
        [] => None,
        [single] => Some(Value::String(single.clone())),
        many => Some(json!(many)),
    }
}

/// Per-entity parent and column descriptions
///
/// Columns without a declared type carry no `type` key.
pub fn flat_metadata(plan: &FlattenPlan) -> Value {
    let mut entities = Map::new();
    for entity in plan.describe() {
        let mut fields = Map::new();
        for column in entity.columns {
            let mut field = Map::new();
            if let Some(kind) = type_value(&column.types) {
                field.insert("type".to_string(), kind);
            }
            if let Some(format) = column.format {
                field.insert("format".to_string(), Value::String(format));
            }
            field.insert("required".to_string(), Value::Bool(column.required));
            fields.insert(column.name, Value::Object(field));
        }
        entities.insert(
            entity.name,
            json!({
                "parent": entity.parent,
                "fields": fields,
            }),
        );
    }
    Value::Object(entities)
}

/// JSON Schema describing the flat rows of every entity
///
/// The document is an object keyed by entity name whose values are arrays of
/// rows. Optional columns accept `null`.
pub fn flat_json_schema(plan: &FlattenPlan) -> Value {
    let mut properties = Map::new();
    for entity in plan.describe() {
        let mut columns = Map::new();
        let mut required = Vec::new();
        for column in entity.columns {
            let mut types = column.types;
            if !column.required && !types.is_empty() && !types.iter().any(|t| t == "null") {
                types.push("null".to_string());
            }
            let mut node = Map::new();
            if let Some(kind) = type_value(&types) {
                node.insert("type".to_string(), kind);
            }
            if let Some(format) = column.format {
                node.insert("format".to_string(), Value::String(format));
            }
            if column.required {
                required.push(column.name.clone());
            }
            columns.insert(column.name, Value::Object(node));
        }
        properties.insert(
            entity.name,
            json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": columns,
                    "required": required,
                    "additionalProperties": false,
                },
            }),
        );
    }
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": properties,
    })
}
