//! Schema-declared default filling and additional-property stripping
//!
//! Mirrors what validation frameworks do as a side effect of validating:
//! missing properties that declare a `default` are inserted when filling is
//! requested, and objects whose schema sets `additionalProperties: false` lose
//! undeclared keys when stripping is requested. Unresolvable references are left alone; the
//! validator reports them.

use crate::schema::resolve_ref;
use dataplug_format::constants::MAX_SCHEMA_DEPTH;
use serde_json::Value;

/// What [`fill`] does to each object it visits
#[derive(Debug, Clone, Copy)]
pub(crate) struct Preparation {
    pub defaults: bool,
    pub strip: bool,
}

pub(crate) fn fill(root: &Value, node: &Value, value: &mut Value, how: Preparation, depth: usize) {
    if depth > MAX_SCHEMA_DEPTH || !(how.defaults || how.strip) {
        return;
    }
    let Ok(node) = resolve_ref(root, node, "#") else {
        return;
    };

    match value {
        Value::Object(map) => {
            let Some(properties) = node.get("properties").and_then(Value::as_object) else {
                return;
            };

            if how.defaults {
                for (key, property) in properties {
                    if map.contains_key(key) {
                        continue;
                    }
                    let default = resolve_ref(root, property, "#")
                        .ok()
                        .and_then(|property| property.get("default"));
                    if let Some(default) = default {
                        map.insert(key.clone(), default.clone());
                    }
                }
            }

            let closed = node.get("additionalProperties") == Some(&Value::Bool(false))
                && node.get("patternProperties").is_none();
            if how.strip && closed {
                map.retain(|key, _| properties.contains_key(key));
            }

            for (key, property) in properties {
                if let Some(child) = map.get_mut(key) {
                    fill(root, property, child, how, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            let Some(item_schema) = node.get("items").filter(|items| items.is_object()) else {
                return;
            };
            for item in items.iter_mut() {
                fill(root, item_schema, item, how, depth + 1);
            }
        }
        _ => {}
    }
}
