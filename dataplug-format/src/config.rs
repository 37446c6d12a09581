//! Configuration declarations and coercion of raw option values
//!
//! Connectors describe the options they accept with a [`ConfigDeclaration`].
//! Raw `key=value` strings coming from the command line are resolved against
//! it into a [`ResolvedConfig`] of typed JSON values.

use crate::error::{ConfigError, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// UTF-8 string, optionally with a [`StringFormat`]
    #[default]
    String,
    /// Floating point number; integral values are kept as integers
    Number,
    /// Signed 64-bit integer
    Integer,
    /// `true`/`false`
    Boolean,
    /// Repeated parameter whose items have the declared `item` type
    Array,
}

/// Format constraint for string parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringFormat {
    /// Calendar date, `YYYY-MM-DD`
    #[serde(rename = "date")]
    Date,
    /// RFC 3339 timestamp
    #[serde(rename = "date-time")]
    DateTime,
}

/// Declaration of a single parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDeclaration {
    /// Help text
    pub description: Option<String>,
    /// Value type
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Allowed values, compared after coercion
    #[serde(rename = "enum")]
    pub choices: Option<Vec<Value>>,
    /// Value used when the parameter is not supplied
    pub default: Option<Value>,
    /// Parameter must be supplied (or defaulted)
    pub required: bool,
    /// Parameters that cannot be supplied together with this one
    pub conflicts: Vec<String>,
    /// Item type of array parameters
    pub item: Option<ParameterType>,
    /// Format of string values
    pub format: Option<StringFormat>,
    /// Smallest accepted integer or number
    pub minimum: Option<i64>,
}

impl ParameterDeclaration {
    /// Declaration of the given type with no constraints
    pub fn of(kind: ParameterType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Attach help text
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Restrict to a set of values
    pub fn choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = Some(choices);
        self
    }

    /// Declare a conflicting parameter
    pub fn conflicts_with(mut self, parameter: &str) -> Self {
        self.conflicts.push(parameter.to_string());
        self
    }

    /// Set the item type of an array parameter
    pub fn items(mut self, item: ParameterType) -> Self {
        self.item = Some(item);
        self
    }

    /// Set the string format
    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Reject numeric values below `minimum`
    pub fn minimum(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }
}

/// Ordered set of parameter declarations accepted by a connector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDeclaration {
    parameters: Vec<(String, ParameterDeclaration)>,
}

impl ConfigDeclaration {
    /// Empty declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, keeping declaration order
    pub fn parameter(mut self, name: &str, declaration: ParameterDeclaration) -> Self {
        self.parameters.push((name.to_string(), declaration));
        self
    }

    /// Iterate declared parameters in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterDeclaration)> {
        self.parameters
            .iter()
            .map(|(name, declaration)| (name.as_str(), declaration))
    }

    /// True when nothing is declared
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Resolve raw `key=value` assignments into typed values
    ///
    /// Keys may use the declared spelling or its kebab-case form. A bare `key`
    /// without `=` means `true` for boolean parameters.
    pub fn resolve<I, S>(&self, assignments: I) -> Result<ResolvedConfig>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut supplied: Vec<(usize, Option<String>)> = Vec::new();
        for assignment in assignments {
            let (key, raw) = parse_assignment(assignment.as_ref())?;
            let index = self
                .position(&key)
                .ok_or_else(|| ConfigError::UnknownParameter(key.clone()))?;
            supplied.push((index, raw));
        }

        let mut values = Map::new();
        for (index, (name, declaration)) in self.parameters.iter().enumerate() {
            let raw: Vec<Option<&str>> = supplied
                .iter()
                .filter(|(position, _)| *position == index)
                .map(|(_, raw)| raw.as_deref())
                .collect();

            if raw.is_empty() {
                if let Some(default) = &declaration.default {
                    values.insert(name.clone(), default.clone());
                } else if declaration.required {
                    return Err(ConfigError::MissingRequired(name.clone()));
                }
                continue;
            }

            let value = if declaration.kind == ParameterType::Array {
                let item_kind = declaration.item.unwrap_or_default();
                let item_name = format!("{}[]", name);
                let mut items = Vec::with_capacity(raw.len());
                for raw_item in raw {
                    let item = coerce(&item_name, item_kind, declaration.format, raw_item)?;
                    check_minimum(&item_name, declaration, &item)?;
                    check_choice(name, declaration, &item)?;
                    items.push(item);
                }
                Value::Array(items)
            } else {
                if raw.len() > 1 {
                    return Err(ConfigError::Duplicate(name.clone()));
                }
                let value = coerce(name, declaration.kind, declaration.format, raw[0])?;
                check_minimum(name, declaration, &value)?;
                check_choice(name, declaration, &value)?;
                value
            };
            values.insert(name.clone(), value);
        }

        for (index, (name, declaration)) in self.parameters.iter().enumerate() {
            if !supplied.iter().any(|(position, _)| *position == index) {
                continue;
            }
            for other in &declaration.conflicts {
                let other_supplied = self
                    .position(other)
                    .map(|other_index| supplied.iter().any(|(position, _)| *position == other_index))
                    .unwrap_or(false);
                if other_supplied {
                    return Err(ConfigError::Conflict {
                        parameter: name.clone(),
                        conflicts_with: other.clone(),
                    });
                }
            }
        }

        Ok(ResolvedConfig(values))
    }

    /// Replace declared defaults with preset values, e.g. from a catalog entry
    ///
    /// Presets go through the same type, format, minimum and choice checks as
    /// assignments. Strings are coerced for non-string parameters, so a
    /// catalog may write `limit = "10"`. Assignments passed to
    /// [`resolve`](Self::resolve) still override presets.
    pub fn with_presets(mut self, presets: &Map<String, Value>) -> Result<Self> {
        for (key, value) in presets {
            let index = self
                .position(key)
                .ok_or_else(|| ConfigError::UnknownParameter(key.clone()))?;
            let (name, declaration) = &self.parameters[index];
            let value = check_preset(name, declaration, value)?;
            self.parameters[index].1.default = Some(value);
        }
        Ok(self)
    }

    fn position(&self, key: &str) -> Option<usize> {
        let wanted = to_kebab_case(key);
        self.parameters
            .iter()
            .position(|(name, _)| name == key || to_kebab_case(name) == wanted)
    }
}

/// Typed option values produced by [`ConfigDeclaration::resolve`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig(Map<String, Value>);

impl ResolvedConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON value of a parameter
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of a parameter
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Integer value of a parameter
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    /// Boolean value of a parameter
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Non-negative integer value of a parameter, such as a count or width
    pub fn get_count(&self, name: &str) -> Result<Option<usize>> {
        let Some(value) = self.0.get(name) else {
            return Ok(None);
        };
        value
            .as_u64()
            .and_then(|count| usize::try_from(count).ok())
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                parameter: name.to_string(),
                value: value.to_string(),
                expected: "non-negative integer".to_string(),
            })
    }

    /// Set a value directly
    pub fn insert(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    /// Underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Split `key=value` (or bare `key`) into its parts
pub fn parse_assignment(assignment: &str) -> Result<(String, Option<String>)> {
    let (key, value) = match assignment.split_once('=') {
        Some((key, value)) => (key, Some(value.to_string())),
        None => (assignment, None),
    };
    let key = key.trim().trim_start_matches("--");
    if key.is_empty() {
        return Err(ConfigError::Malformed(assignment.to_string()));
    }
    Ok((key.to_string(), value))
}

/// Convert `camelCase` or `snake_case` parameter names to `kebab-case`
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    out
}

fn coerce(
    parameter: &str,
    kind: ParameterType,
    format: Option<StringFormat>,
    raw: Option<&str>,
) -> Result<Value> {
    let invalid = |value: &str, expected: &str| ConfigError::InvalidValue {
        parameter: parameter.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    };

    let raw = match (kind, raw) {
        (ParameterType::Boolean, None) => return Ok(Value::Bool(true)),
        (_, None) => return Err(invalid("", expected_label(kind, format))),
        (_, Some(raw)) => raw,
    };

    match kind {
        ParameterType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(raw, "integer")),
        ParameterType::Number => {
            let parsed = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| invalid(raw, "number"))?;
            if parsed.fract() == 0.0 && parsed.abs() < 9_007_199_254_740_992.0 {
                Ok(Value::from(parsed as i64))
            } else {
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| invalid(raw, "number"))
            }
        }
        ParameterType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
            "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid(raw, "boolean")),
        },
        ParameterType::String | ParameterType::Array => {
            match format {
                Some(StringFormat::Date) => {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .map_err(|_| invalid(raw, "date string"))?;
                }
                Some(StringFormat::DateTime) => {
                    DateTime::parse_from_rfc3339(raw)
                        .map_err(|_| invalid(raw, "date-time string"))?;
                }
                None => {}
            }
            Ok(Value::String(raw.to_string()))
        }
    }
}

fn expected_label(kind: ParameterType, format: Option<StringFormat>) -> &'static str {
    match (kind, format) {
        (ParameterType::Integer, _) => "integer",
        (ParameterType::Number, _) => "number",
        (ParameterType::Boolean, _) => "boolean",
        (_, Some(StringFormat::Date)) => "date string",
        (_, Some(StringFormat::DateTime)) => "date-time string",
        _ => "string",
    }
}

fn check_preset(name: &str, declaration: &ParameterDeclaration, value: &Value) -> Result<Value> {
    let value = if declaration.kind == ParameterType::Array {
        let Value::Array(items) = value else {
            return Err(ConfigError::InvalidValue {
                parameter: name.to_string(),
                value: value.to_string(),
                expected: "array".to_string(),
            });
        };
        let item_name = format!("{}[]", name);
        let item_kind = declaration.item.unwrap_or_default();
        let mut checked = Vec::with_capacity(items.len());
        for item in items {
            let item = typed_preset(&item_name, item_kind, declaration.format, item)?;
            check_minimum(&item_name, declaration, &item)?;
            check_choice(name, declaration, &item)?;
            checked.push(item);
        }
        Value::Array(checked)
    } else {
        let value = typed_preset(name, declaration.kind, declaration.format, value)?;
        check_minimum(name, declaration, &value)?;
        check_choice(name, declaration, &value)?;
        value
    };
    Ok(value)
}

fn typed_preset(
    parameter: &str,
    kind: ParameterType,
    format: Option<StringFormat>,
    value: &Value,
) -> Result<Value> {
    let matches = match kind {
        ParameterType::Integer => value.is_i64(),
        ParameterType::Number => value.is_number(),
        ParameterType::Boolean => value.is_boolean(),
        ParameterType::String | ParameterType::Array => false,
    };
    if matches {
        return Ok(value.clone());
    }
    match value {
        Value::String(raw) => coerce(parameter, kind, format, Some(raw)),
        other => Err(ConfigError::InvalidValue {
            parameter: parameter.to_string(),
            value: other.to_string(),
            expected: expected_label(kind, format).to_string(),
        }),
    }
}

fn check_minimum(name: &str, declaration: &ParameterDeclaration, value: &Value) -> Result<()> {
    let Some(minimum) = declaration.minimum else {
        return Ok(());
    };
    let below = match value {
        Value::Number(number) => number
            .as_i64()
            .map(|n| n < minimum)
            .or_else(|| number.as_f64().map(|n| n < minimum as f64))
            .unwrap_or(false),
        _ => false,
    };
    if !below {
        return Ok(());
    }
    let kind = match declaration.kind {
        ParameterType::Array => declaration.item.unwrap_or_default(),
        kind => kind,
    };
    Err(ConfigError::InvalidValue {
        parameter: name.to_string(),
        value: value.to_string(),
        expected: format!("{} >= {}", expected_label(kind, None), minimum),
    })
}

fn check_choice(name: &str, declaration: &ParameterDeclaration, value: &Value) -> Result<()> {
    let Some(choices) = &declaration.choices else {
        return Ok(());
    };
    if choices.contains(value) {
        return Ok(());
    }
    Err(ConfigError::InvalidChoice {
        parameter: name.to_string(),
        value: value.to_string(),
        choices: choices
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declaration() -> ConfigDeclaration {
        ConfigDeclaration::new()
            .parameter(
                "path",
                ParameterDeclaration::of(ParameterType::String).required(),
            )
            .parameter(
                "limit",
                ParameterDeclaration::of(ParameterType::Integer),
            )
            .parameter(
                "ratio",
                ParameterDeclaration::of(ParameterType::Number).default_value(json!(0.5)),
            )
            .parameter(
                "sinceDate",
                ParameterDeclaration::of(ParameterType::String)
                    .format(StringFormat::Date)
                    .conflicts_with("since"),
            )
            .parameter(
                "since",
                ParameterDeclaration::of(ParameterType::String).format(StringFormat::DateTime),
            )
            .parameter(
                "mode",
                ParameterDeclaration::of(ParameterType::String)
                    .choices(vec![json!("full"), json!("delta")]),
            )
            .parameter(
                "ids",
                ParameterDeclaration::of(ParameterType::Array).items(ParameterType::Integer),
            )
            .parameter("verbose", ParameterDeclaration::of(ParameterType::Boolean))
    }

    #[test]
    fn resolves_typed_values_and_defaults() {
        let resolved = declaration()
            .resolve(["path=/tmp/a.json", "limit=10", "ids=1", "ids=2", "verbose"])
            .unwrap();
        assert_eq!(resolved.get_str("path"), Some("/tmp/a.json"));
        assert_eq!(resolved.get_i64("limit"), Some(10));
        assert_eq!(resolved.get("ratio"), Some(&json!(0.5)));
        assert_eq!(resolved.get("ids"), Some(&json!([1, 2])));
        assert_eq!(resolved.get_bool("verbose"), Some(true));
        assert!(resolved.get("mode").is_none());
    }

    #[test]
    fn integral_numbers_become_integers() {
        let resolved = declaration().resolve(["path=x", "ratio=3.0"]).unwrap();
        assert_eq!(resolved.get("ratio"), Some(&json!(3)));
        let resolved = declaration().resolve(["path=x", "ratio=2.25"]).unwrap();
        assert_eq!(resolved.get("ratio"), Some(&json!(2.25)));
    }

    #[test]
    fn rejects_unparseable_integer_with_parameter_name() {
        let err = declaration().resolve(["path=x", "limit=abc"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid \"limit\" value: failed to parse \"abc\" as integer"
        );
    }

    #[test]
    fn rejects_bad_array_items_by_item_name() {
        let err = declaration().resolve(["path=x", "ids=1", "ids=two"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref parameter, .. } if parameter == "ids[]"
        ));
    }

    #[test]
    fn validates_date_formats() {
        assert!(declaration()
            .resolve(["path=x", "since-date=2024-02-29"])
            .is_ok());
        let err = declaration()
            .resolve(["path=x", "since-date=2023-02-29"])
            .unwrap_err();
        assert!(err.to_string().contains("as date string"));

        assert!(declaration()
            .resolve(["path=x", "since=2024-01-01T10:00:00Z"])
            .is_ok());
        let err = declaration()
            .resolve(["path=x", "since=yesterday"])
            .unwrap_err();
        assert!(err.to_string().contains("as date-time string"));
    }

    #[test]
    fn reports_missing_unknown_and_duplicate() {
        assert_eq!(
            declaration().resolve(Vec::<String>::new()).unwrap_err(),
            ConfigError::MissingRequired("path".into())
        );
        assert_eq!(
            declaration().resolve(["path=x", "colour=red"]).unwrap_err(),
            ConfigError::UnknownParameter("colour".into())
        );
        assert_eq!(
            declaration()
                .resolve(["path=x", "limit=1", "limit=2"])
                .unwrap_err(),
            ConfigError::Duplicate("limit".into())
        );
    }

    #[test]
    fn enforces_choices_and_conflicts() {
        let err = declaration().resolve(["path=x", "mode=partial"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChoice { .. }));

        let err = declaration()
            .resolve([
                "path=x",
                "sinceDate=2024-01-01",
                "since=2024-01-01T00:00:00Z",
            ])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Conflict {
                parameter: "sinceDate".into(),
                conflicts_with: "since".into(),
            }
        );
    }

    #[test]
    fn kebab_case_conversion() {
        assert_eq!(to_kebab_case("sinceDate"), "since-date");
        assert_eq!(to_kebab_case("page_size"), "page-size");
        assert_eq!(to_kebab_case("path"), "path");
    }

    #[test]
    fn deserializes_declarations_from_json() {
        let declaration: ParameterDeclaration = serde_json::from_value(json!({
            "description": "Start date",
            "type": "string",
            "format": "date-time",
            "required": true
        }))
        .unwrap();
        assert_eq!(declaration.kind, ParameterType::String);
        assert_eq!(declaration.format, Some(StringFormat::DateTime));
        assert!(declaration.required);
        assert!(declaration.conflicts.is_empty());
    }

    #[test]
    fn presets_satisfy_required_and_yield_to_assignments() {
        let mut presets = Map::new();
        presets.insert("path".to_string(), json!("catalog.json"));
        presets.insert("limit".to_string(), json!(5));
        let declaration = declaration().with_presets(&presets).unwrap();

        let config = declaration.resolve(Vec::<String>::new()).unwrap();
        assert_eq!(config.get_str("path"), Some("catalog.json"));
        assert_eq!(config.get_i64("limit"), Some(5));

        let config = declaration.resolve(["limit=7"]).unwrap();
        assert_eq!(config.get_i64("limit"), Some(7));

        let mut typed = Map::new();
        typed.insert("limit".to_string(), json!("12"));
        let config = self::declaration().with_presets(&typed).unwrap().resolve(["path=x"]).unwrap();
        assert_eq!(config.get_i64("limit"), Some(12));

        let mut unknown = Map::new();
        unknown.insert("bogus".to_string(), json!(1));
        assert_eq!(
            self::declaration().with_presets(&unknown).unwrap_err(),
            ConfigError::UnknownParameter("bogus".into())
        );
    }

    fn preset(key: &str, value: Value) -> Map<String, Value> {
        let mut presets = Map::new();
        presets.insert(key.to_string(), value);
        presets
    }

    #[test]
    fn presets_are_type_checked_like_assignments() {
        let err = declaration()
            .with_presets(&preset("limit", json!("abc")))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid \"limit\" value: failed to parse \"abc\" as integer"
        );
        assert!(declaration()
            .with_presets(&preset("limit", json!(2.5)))
            .is_err());
        assert!(declaration()
            .with_presets(&preset("verbose", json!("maybe")))
            .is_err());
        assert!(matches!(
            declaration().with_presets(&preset("mode", json!("partial"))),
            Err(ConfigError::InvalidChoice { .. })
        ));
        assert!(declaration()
            .with_presets(&preset("since-date", json!("2023-02-29")))
            .unwrap_err()
            .to_string()
            .contains("as date string"));
        assert!(matches!(
            declaration().with_presets(&preset("ids", json!([1, "two"]))),
            Err(ConfigError::InvalidValue { ref parameter, .. }) if parameter == "ids[]"
        ));
    }

    #[test]
    fn minimum_applies_to_assignments_and_presets() {
        let counted = ConfigDeclaration::new().parameter(
            "limit",
            ParameterDeclaration::of(ParameterType::Integer).minimum(0),
        );
        let err = counted.resolve(["limit=-2"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid \"limit\" value: failed to parse \"-2\" as integer >= 0"
        );
        assert!(counted
            .clone()
            .with_presets(&preset("limit", json!(-1)))
            .is_err());

        let config = counted.resolve(["limit=0"]).unwrap();
        assert_eq!(config.get_count("limit"), Ok(Some(0)));
        assert_eq!(config.get_count("missing"), Ok(None));
    }

    #[test]
    fn get_count_rejects_negative_values() {
        let mut config = ResolvedConfig::new();
        config.insert("offset", json!(-3));
        assert!(matches!(
            config.get_count("offset"),
            Err(ConfigError::InvalidValue { ref parameter, .. }) if parameter == "offset"
        ));
    }
}
