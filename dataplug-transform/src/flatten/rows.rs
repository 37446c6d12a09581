//! Record to flat rows

use super::plan::{join_column, EntityPlan, FlattenPlan, Property, Shape};
use crate::error::TransformError;
use crate::schema::value_type;
use crate::transform::{Emitted, Transform};
use dataplug_format::constants::SCALAR_ITEM_COLUMN;
use dataplug_format::{Record, StageKind};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Transform stage expanding each nested record into flat entity rows
#[derive(Debug, Clone)]
pub struct Flattener {
    plan: Arc<FlattenPlan>,
    metadata: bool,
}

type Row = Map<String, Value>;

/// Child array waiting to be expanded after its parent row
struct Pending<'a> {
    entity: &'a EntityPlan,
    items: &'a [Value],
    path: String,
}

impl Flattener {
    /// Create a flattener; with `metadata` every row is wrapped with its
    /// entity name and array positions
    pub fn new(plan: Arc<FlattenPlan>, metadata: bool) -> Self {
        Self { plan, metadata }
    }

    /// Plan driving this stage
    pub fn plan(&self) -> &FlattenPlan {
        &self.plan
    }

    /// Flatten one record into rows, entity row first then children pre-order
    pub fn flatten(&self, record: &Record) -> Result<Emitted, TransformError> {
        let mut out = Emitted::new();
        let mut index = Vec::new();
        self.entity(self.plan.root(), record, &mut index, String::new(), &mut out)?;
        Ok(out)
    }

    fn entity(
        &self,
        entity: &EntityPlan,
        value: &Value,
        index: &mut Vec<usize>,
        path: String,
        out: &mut Emitted,
    ) -> Result<(), TransformError> {
        let mut row = Row::new();
        let mut children = Vec::new();

        match &entity.shape {
            Shape::Object(properties) => {
                let Value::Object(map) = value else {
                    return Err(mismatch(&path, "object", value));
                };
                columns(properties, Some(map), "", &path, &mut row, &mut children)?;
            }
            _ => {
                row.insert(SCALAR_ITEM_COLUMN.to_string(), value.clone());
            }
        }

        out.push(self.wrap(&entity.name, index, row));

        for child in children {
            for (position, item) in child.items.iter().enumerate() {
                index.push(position);
                let item_path = format!("{}/{}", child.path, position);
                let result = self.entity(child.entity, item, index, item_path, out);
                index.pop();
                result?;
            }
        }
        Ok(())
    }

    fn wrap(&self, entity: &str, index: &[usize], row: Row) -> Record {
        if self.metadata {
            json!({
                "collection": entity,
                "index": index,
                "record": Value::Object(row),
            })
        } else {
            Value::Object(row)
        }
    }
}

fn columns<'a>(
    properties: &'a [Property],
    object: Option<&'a Map<String, Value>>,
    prefix: &str,
    path: &str,
    row: &mut Row,
    children: &mut Vec<Pending<'a>>,
) -> Result<(), TransformError> {
    for property in properties {
        let column = join_column(prefix, &property.name);
        let property_path = format!("{}/{}", path, property.name);

        // Columns of an absent optional object are all null.
        let value = match object {
            Some(object) => match object.get(&property.name).or(property.default.as_ref()) {
                Some(value) => Some(value),
                None if property.required => {
                    return Err(TransformError::Structure {
                        path: pointer(&property_path),
                        reason: "missing required property".to_string(),
                    });
                }
                None => None,
            },
            None => None,
        };

        match &property.shape {
            Shape::Column(_) => {
                row.insert(column, value.cloned().unwrap_or(Value::Null));
            }
            Shape::Object(nested) => match value {
                Some(Value::Object(map)) => {
                    columns(nested, Some(map), &column, &property_path, row, children)?
                }
                None | Some(Value::Null) => {
                    columns(nested, None, &column, &property_path, row, children)?
                }
                Some(other) => return Err(mismatch(&property_path, "object", other)),
            },
            Shape::Array(entity) => match value {
                Some(Value::Array(items)) => children.push(Pending {
                    entity,
                    items,
                    path: property_path,
                }),
                None | Some(Value::Null) => {}
                Some(other) => return Err(mismatch(&property_path, "array", other)),
            },
        }
    }
    Ok(())
}

fn mismatch(path: &str, expected: &str, found: &Value) -> TransformError {
    TransformError::Structure {
        path: pointer(path),
        reason: format!("expected {}, found {}", expected, value_type(found)),
    }
}

fn pointer(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

impl Transform for Flattener {
    fn kind(&self) -> StageKind {
        StageKind::Flattener
    }

    fn apply(&mut self, record: Record) -> Result<Emitted, TransformError> {
        self.flatten(&record)
    }
}
