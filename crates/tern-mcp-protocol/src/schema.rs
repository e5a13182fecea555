//! Schema IR and validation
//!
//! The intermediate representation shared by every authoring frontend. The
//! interface parser lowers type literals and doc tags into it, the decorator
//! collector builds it from merged runtime/parsed metadata, and the
//! functional frontend accepts it directly. Validation happens on the IR
//! itself: `validate` rejects on the first violation, naming the dotted
//! field path and the constraint that failed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The first violation found while walking a value against the IR
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{path}' {constraint}")]
pub struct SchemaViolation {
    /// Dotted path to the offending field ("" for the root)
    pub path: String,
    /// Human description of the violated constraint
    pub constraint: String,
}

impl SchemaViolation {
    fn new(path: &str, constraint: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            constraint: constraint.into(),
        }
    }
}

/// A schema IR node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    /// String type with optional constraints
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
        min_length: Option<u64>,
        #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
        max_length: Option<u64>,
        #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<String>>,
    },
    /// Floating point number
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    /// Integer-only number
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// Boolean type
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Array of a single element IR
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Box<JsonSchema>>,
        #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
        min_items: Option<u64>,
        #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
        max_items: Option<u64>,
    },
    /// Object with named fields
    Object {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        properties: Option<HashMap<String, JsonSchema>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
        #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
        additional_properties: Option<bool>,
    },
    /// Union of IRs, serialized as anyOf
    #[serde(rename = "anyOf")]
    Union { variants: Vec<JsonSchema> },
    /// Accepts everything
    Any,
}

impl JsonSchema {
    pub fn string() -> Self {
        Self::String {
            description: None,
            pattern: None,
            format: None,
            min_length: None,
            max_length: None,
            enum_values: None,
        }
    }

    pub fn string_enum(values: Vec<String>) -> Self {
        Self::String {
            description: None,
            pattern: None,
            format: None,
            min_length: None,
            max_length: None,
            enum_values: Some(values),
        }
    }

    pub fn number() -> Self {
        Self::Number {
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn integer() -> Self {
        Self::Integer {
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn boolean() -> Self {
        Self::Boolean { description: None }
    }

    pub fn array(items: JsonSchema) -> Self {
        Self::Array {
            description: None,
            items: Some(Box::new(items)),
            min_items: None,
            max_items: None,
        }
    }

    pub fn object() -> Self {
        Self::Object {
            description: None,
            properties: None,
            required: None,
            additional_properties: None,
        }
    }

    pub fn object_with(properties: HashMap<String, JsonSchema>, required: Vec<String>) -> Self {
        Self::Object {
            description: None,
            properties: Some(properties),
            required: Some(required),
            additional_properties: None,
        }
    }

    pub fn union(variants: Vec<JsonSchema>) -> Self {
        Self::Union { variants }
    }

    pub fn any() -> Self {
        Self::Any
    }

    /// Add a description to any node
    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            JsonSchema::String { description, .. }
            | JsonSchema::Number { description, .. }
            | JsonSchema::Integer { description, .. }
            | JsonSchema::Boolean { description, .. }
            | JsonSchema::Array { description, .. }
            | JsonSchema::Object { description, .. } => *description = Some(text.into()),
            JsonSchema::Union { .. } | JsonSchema::Any => {}
        }
        self
    }

    pub fn with_pattern(mut self, value: impl Into<String>) -> Self {
        if let JsonSchema::String { pattern, .. } = &mut self {
            *pattern = Some(value.into());
        }
        self
    }

    pub fn with_format(mut self, value: impl Into<String>) -> Self {
        if let JsonSchema::String { format, .. } = &mut self {
            *format = Some(value.into());
        }
        self
    }

    pub fn with_min_length(mut self, value: u64) -> Self {
        if let JsonSchema::String { min_length, .. } = &mut self {
            *min_length = Some(value);
        }
        self
    }

    pub fn with_max_length(mut self, value: u64) -> Self {
        if let JsonSchema::String { max_length, .. } = &mut self {
            *max_length = Some(value);
        }
        self
    }

    pub fn with_minimum(mut self, value: f64) -> Self {
        match &mut self {
            JsonSchema::Number { minimum, .. } => *minimum = Some(value),
            JsonSchema::Integer { minimum, .. } => *minimum = Some(value as i64),
            _ => {}
        }
        self
    }

    pub fn with_maximum(mut self, value: f64) -> Self {
        match &mut self {
            JsonSchema::Number { maximum, .. } => *maximum = Some(value),
            JsonSchema::Integer { maximum, .. } => *maximum = Some(value as i64),
            _ => {}
        }
        self
    }

    pub fn with_min_items(mut self, value: u64) -> Self {
        if let JsonSchema::Array { min_items, .. } = &mut self {
            *min_items = Some(value);
        }
        self
    }

    pub fn with_max_items(mut self, value: u64) -> Self {
        if let JsonSchema::Array { max_items, .. } = &mut self {
            *max_items = Some(value);
        }
        self
    }

    /// Check that every regex pattern in the IR compiles.
    ///
    /// Called at registration so a broken pattern fails configuration
    /// instead of every dispatch.
    pub fn check_patterns(&self) -> Result<(), SchemaViolation> {
        match self {
            JsonSchema::String {
                pattern: Some(pattern),
                ..
            } => regex::Regex::new(pattern).map(|_| ()).map_err(|e| {
                SchemaViolation::new("", format!("invalid pattern '{}': {}", pattern, e))
            }),
            JsonSchema::Array {
                items: Some(items), ..
            } => items.check_patterns(),
            JsonSchema::Object {
                properties: Some(props),
                ..
            } => {
                for schema in props.values() {
                    schema.check_patterns()?;
                }
                Ok(())
            }
            JsonSchema::Union { variants } => {
                for variant in variants {
                    variant.check_patterns()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Validate a value against this IR, rejecting on the first violation
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        match self {
            JsonSchema::String {
                pattern,
                min_length,
                max_length,
                enum_values,
                format,
                ..
            } => {
                let Some(s) = value.as_str() else {
                    return Err(SchemaViolation::new(path, "must be a string"));
                };
                let chars = s.chars().count() as u64;
                if let Some(min) = min_length {
                    if chars < *min {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be at least {} characters (minLength)", min),
                        ));
                    }
                }
                if let Some(max) = max_length {
                    if chars > *max {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be at most {} characters (maxLength)", max),
                        ));
                    }
                }
                if let Some(pattern) = pattern {
                    let re = regex::Regex::new(pattern).map_err(|e| {
                        SchemaViolation::new(path, format!("invalid pattern: {}", e))
                    })?;
                    if !re.is_match(s) {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must match pattern '{}'", pattern),
                        ));
                    }
                }
                if let Some(format) = format {
                    if !format_matches(format, s) {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be a valid {} (format)", format),
                        ));
                    }
                }
                if let Some(allowed) = enum_values {
                    if !allowed.iter().any(|v| v == s) {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be one of [{}] (enum)", allowed.join(", ")),
                        ));
                    }
                }
                Ok(())
            }
            JsonSchema::Number { minimum, maximum, .. } => {
                let Some(n) = value.as_f64() else {
                    return Err(SchemaViolation::new(path, "must be a number"));
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be >= {} (minimum)", min),
                        ));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be <= {} (maximum)", max),
                        ));
                    }
                }
                Ok(())
            }
            JsonSchema::Integer { minimum, maximum, .. } => {
                let n = match value.as_i64() {
                    Some(n) => n,
                    // Reject 1.5, accept 2.0
                    None => match value.as_f64() {
                        Some(f) if f.fract() == 0.0 => f as i64,
                        _ => return Err(SchemaViolation::new(path, "must be an integer")),
                    },
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be >= {} (minimum)", min),
                        ));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must be <= {} (maximum)", max),
                        ));
                    }
                }
                Ok(())
            }
            JsonSchema::Boolean { .. } => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(SchemaViolation::new(path, "must be a boolean"))
                }
            }
            JsonSchema::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                let Some(list) = value.as_array() else {
                    return Err(SchemaViolation::new(path, "must be an array"));
                };
                if let Some(min) = min_items {
                    if (list.len() as u64) < *min {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must have at least {} items (minItems)", min),
                        ));
                    }
                }
                if let Some(max) = max_items {
                    if (list.len() as u64) > *max {
                        return Err(SchemaViolation::new(
                            path,
                            format!("must have at most {} items (maxItems)", max),
                        ));
                    }
                }
                if let Some(item_schema) = items {
                    for (i, item) in list.iter().enumerate() {
                        item_schema.validate_at(item, &child_path(path, &i.to_string()))?;
                    }
                }
                Ok(())
            }
            JsonSchema::Object {
                properties,
                required,
                additional_properties,
                ..
            } => {
                let Some(map) = value.as_object() else {
                    return Err(SchemaViolation::new(path, "must be an object"));
                };
                let props = properties.as_ref();
                if let Some(required) = required {
                    for name in required {
                        if !map.contains_key(name) {
                            return Err(SchemaViolation::new(
                                &child_path(path, name),
                                "is required",
                            ));
                        }
                    }
                }
                // Strict by default: unknown fields rejected
                if additional_properties != &Some(true) {
                    for key in map.keys() {
                        if props.is_none_or(|p| !p.contains_key(key)) {
                            return Err(SchemaViolation::new(
                                &child_path(path, key),
                                "is not a recognized field",
                            ));
                        }
                    }
                }
                if let Some(props) = props {
                    for (name, schema) in props {
                        if let Some(field_value) = map.get(name) {
                            schema.validate_at(field_value, &child_path(path, name))?;
                        }
                    }
                }
                Ok(())
            }
            JsonSchema::Union { variants } => {
                for variant in variants {
                    if variant.validate_at(value, path).is_ok() {
                        return Ok(());
                    }
                }
                Err(SchemaViolation::new(path, "matches no variant of the union"))
            }
            JsonSchema::Any => Ok(()),
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn format_matches(format: &str, s: &str) -> bool {
    match format {
        "email" => {
            let Some((local, domain)) = s.split_once('@') else {
                return false;
            };
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        "uri" | "url" => s.contains("://"),
        "uuid" => {
            regex::Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
                .map(|re| re.is_match(s))
                .unwrap_or(false)
        }
        "date" => regex::Regex::new(r"^\d{4}-\d{2}-\d{2}$")
            .map(|re| re.is_match(s))
            .unwrap_or(false),
        "date-time" => regex::Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}")
            .map(|re| re.is_match(s))
            .unwrap_or(false),
        // Unknown formats are annotations, not constraints
        _ => true,
    }
}

/// The top-level input schema of a tool: always an object, strict by
/// default, with per-field defaults filled in during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type")]
    schema_type: ObjectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<HashMap<String, Value>>,
}

/// Marker serializing the fixed "object" tag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectType;

impl Serialize for ObjectType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("object")
    }
}

impl<'de> Deserialize<'de> for ObjectType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "object" {
            Ok(ObjectType)
        } else {
            Err(serde::de::Error::custom("input schema must be an object"))
        }
    }
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(mut self, properties: HashMap<String, JsonSchema>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }

    pub fn with_defaults(mut self, defaults: HashMap<String, Value>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn property(mut self, name: impl Into<String>, schema: JsonSchema, required: bool) -> Self {
        let name = name.into();
        self.properties
            .get_or_insert_with(HashMap::new)
            .insert(name.clone(), schema);
        if required {
            self.required.get_or_insert_with(Vec::new).push(name);
        }
        self
    }

    /// The equivalent IR node
    pub fn as_ir(&self) -> JsonSchema {
        JsonSchema::Object {
            description: None,
            properties: self.properties.clone(),
            required: self.required.clone(),
            additional_properties: self.additional_properties,
        }
    }

    pub fn check_patterns(&self) -> Result<(), SchemaViolation> {
        self.as_ir().check_patterns()
    }

    /// Validate arguments and return them with defaults filled in
    pub fn validate(&self, args: &Value) -> Result<Value, SchemaViolation> {
        let mut args = if args.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            args.clone()
        };

        if let (Some(defaults), Some(map)) = (&self.defaults, args.as_object_mut()) {
            for (name, default) in defaults {
                map.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }

        self.as_ir().validate(&args)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temperature_schema() -> ObjectSchema {
        ObjectSchema::new()
            .property("location", JsonSchema::string(), true)
            .property(
                "units",
                JsonSchema::string_enum(vec!["celsius".to_string(), "fahrenheit".to_string()]),
                false,
            )
    }

    #[test]
    fn test_enum_rejects_value_outside_set() {
        let schema = temperature_schema();
        let err = schema
            .validate(&json!({"location": "Paris", "units": "kelvin"}))
            .unwrap_err();
        assert_eq!(err.path, "units");
        assert!(err.constraint.contains("enum"));
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let schema = temperature_schema();
        assert!(schema.validate(&json!({"location": "Paris"})).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let schema = temperature_schema();
        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(err.path, "location");
        assert_eq!(err.constraint, "is required");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = temperature_schema();
        let err = schema
            .validate(&json!({"location": "Paris", "extra": 1}))
            .unwrap_err();
        assert_eq!(err.path, "extra");
    }

    #[test]
    fn test_string_length_and_pattern() {
        let schema = JsonSchema::string()
            .with_min_length(3)
            .with_pattern("^[a-z]+$");
        assert!(schema.validate(&json!("abc")).is_ok());
        assert!(schema.validate(&json!("ab")).is_err());
        assert!(schema.validate(&json!("ABC")).is_err());
        assert!(schema.validate(&json!(42)).is_err());
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let schema = JsonSchema::integer().with_minimum(0.0).with_maximum(10.0);
        assert!(schema.validate(&json!(5)).is_ok());
        assert!(schema.validate(&json!(5.0)).is_ok());
        assert!(schema.validate(&json!(5.5)).is_err());
        assert!(schema.validate(&json!(-1)).is_err());
        assert!(schema.validate(&json!(11)).is_err());
    }

    #[test]
    fn test_array_constraints_and_nested_path() {
        let schema = JsonSchema::array(JsonSchema::integer()).with_min_items(2);
        assert!(schema.validate(&json!([1])).is_err());
        let err = schema.validate(&json!([1, "two"])).unwrap_err();
        assert_eq!(err.path, "1");
    }

    #[test]
    fn test_nested_object_path() {
        let inner = JsonSchema::object_with(
            HashMap::from([("city".to_string(), JsonSchema::string())]),
            vec!["city".to_string()],
        );
        let schema = ObjectSchema::new().property("address", inner, true);
        let err = schema.validate(&json!({"address": {}})).unwrap_err();
        assert_eq!(err.path, "address.city");
    }

    #[test]
    fn test_union_and_any() {
        let schema = JsonSchema::union(vec![JsonSchema::string(), JsonSchema::integer()]);
        assert!(schema.validate(&json!("x")).is_ok());
        assert!(schema.validate(&json!(3)).is_ok());
        assert!(schema.validate(&json!(true)).is_err());
        assert!(JsonSchema::any().validate(&json!({"anything": []})).is_ok());
    }

    #[test]
    fn test_defaults_filled_in() {
        let schema = temperature_schema()
            .with_defaults(HashMap::from([("units".to_string(), json!("celsius"))]));
        let validated = schema.validate(&json!({"location": "Paris"})).unwrap();
        assert_eq!(validated["units"], "celsius");
    }

    #[test]
    fn test_format_checks() {
        let email = JsonSchema::string().with_format("email");
        assert!(email.validate(&json!("a@b.com")).is_ok());
        assert!(email.validate(&json!("nope")).is_err());

        let uuid = JsonSchema::string().with_format("uuid");
        assert!(uuid
            .validate(&json!("123e4567-e89b-12d3-a456-426614174000"))
            .is_ok());
        assert!(uuid.validate(&json!("123")).is_err());
    }

    #[test]
    fn test_bad_pattern_fails_registration_check() {
        let schema = JsonSchema::string().with_pattern("([unclosed");
        assert!(schema.check_patterns().is_err());
    }

    #[test]
    fn test_wire_shape_uses_camel_case_keys() {
        let schema = ObjectSchema::new().property(
            "name",
            JsonSchema::string().with_min_length(1),
            true,
        );
        let wire = serde_json::to_value(&schema).unwrap();
        assert_eq!(wire["type"], "object");
        assert_eq!(wire["properties"]["name"]["minLength"], 1);
        assert_eq!(wire["required"][0], "name");
    }

    #[test]
    fn test_same_ir_same_verdict() {
        let schema = temperature_schema();
        let args = json!({"location": "Paris", "units": "kelvin"});
        let first = schema.validate(&args).unwrap_err();
        let second = schema.validate(&args).unwrap_err();
        assert_eq!(first, second);
    }
}
