//! Schema - Define type schemas for resources and data sources
//!
//! Providers define schemas for each resource type,
//! enabling type validation before any API call is made.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::resource::Value;

/// Validation function for custom attribute types
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: Validator,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block with its own attribute schemas (represented as a Map value)
    Block(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // ResourceRef values resolve at apply time, so they're accepted for any type
            (_, Value::ResourceRef(_, _)) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                let variant = enum_variant(s);
                if variants.iter().any(|v| v == variant || s == v) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Enum(_), Value::UnresolvedIdent(ident, member)) => {
                let s = match member {
                    Some(m) => format!("{}.{}", ident, m),
                    None => ident.clone(),
                };
                self.validate(&Value::String(s))
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate.check(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(fields), Value::Map(map)) => {
                for field in fields {
                    match map.get(&field.name) {
                        Some(v) => field.attr_type.validate(v).map_err(|e| {
                            TypeError::MapValueError {
                                key: field.name.clone(),
                                inner: Box::new(e),
                            }
                        })?,
                        None if field.required && field.default.is_none() => {
                            return Err(TypeError::MissingRequired {
                                name: field.name.clone(),
                            });
                        }
                        None => {}
                    }
                }
                for key in map.keys() {
                    if !fields.iter().any(|f| &f.name == key) {
                        return Err(TypeError::UnknownAttribute { name: key.clone() });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Extract the variant from a namespaced enum value ("civo.loadbalancer.Algorithm.round_robin")
pub fn enum_variant(s: &str) -> &str {
    s.rsplit('.').next().unwrap_or(s)
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedOnly { name: String },

    #[error("Attributes '{name}' and '{other}' cannot be set together")]
    Conflict { name: String, other: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// An error attached to the attribute it was found on
#[derive(Debug, Clone)]
pub struct AttributeError {
    pub attribute: String,
    pub error: TypeError,
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.attribute, self.error)
    }
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
            Value::UnresolvedIdent(name, member) => match member {
                Some(m) => format!("UnresolvedIdent({}.{})", name, m),
                None => format!("UnresolvedIdent({})", name),
            },
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider from the API response
    pub computed: bool,
    /// Optional attributes that are also computed may be set by either side
    pub optional: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    /// Value is masked in plan output
    pub sensitive: bool,
    /// Sent on create or update but never returned by the API
    pub write_only: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub conflicts_with: Vec<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            optional: true,
            force_new: false,
            sensitive: false,
            write_only: false,
            default: None,
            description: None,
            conflicts_with: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Computed-only attribute: set by the provider, never by the user
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Optional attribute that the provider fills in when the user leaves it out
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.optional = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    /// True if users may not assign this attribute
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Whether a schema describes a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Resource,
    DataSource,
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub kind: SchemaKind,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            kind: SchemaKind::Resource,
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn data_source(resource_type: impl Into<String>) -> Self {
        Self {
            kind: SchemaKind::DataSource,
            ..Self::new(resource_type)
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn is_data_source(&self) -> bool {
        self.kind == SchemaKind::DataSource
    }

    /// Whether changing `name` forces replacement
    pub fn is_force_new(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    /// Whether `name` holds a sensitive value
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.sensitive)
    }

    pub fn is_write_only(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.write_only)
    }

    /// Copy write-only values from `source` into `target` where `target`
    /// has none
    pub fn carry_write_only(
        &self,
        source: &HashMap<String, Value>,
        target: &mut HashMap<String, Value>,
    ) {
        for (name, schema) in &self.attributes {
            if schema.write_only
                && !target.contains_key(name)
                && let Some(value) = source.get(name)
            {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    /// Fill in declared defaults for attributes the user left out
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default
                && !attributes.contains_key(name)
            {
                attributes.insert(name.clone(), default.clone());
            }
        }
    }

    /// Rewrite enum attributes written as identifiers or namespaced strings
    /// (`civo.loadbalancer.Algorithm.round_robin`) to their bare variant
    pub fn normalize_enums(&self, attributes: &mut HashMap<String, Value>) {
        for (name, value) in attributes.iter_mut() {
            if let Some(schema) = self.attributes.get(name) {
                normalize_enum_value(&schema.attr_type, value);
            }
        }
    }

    /// Validate resource attributes, collecting every error
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<AttributeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(AttributeError {
                    attribute: name.clone(),
                    error: TypeError::MissingRequired { name: name.clone() },
                });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            if name.starts_with('_') {
                continue;
            }
            let Some(schema) = self.attributes.get(name) else {
                errors.push(AttributeError {
                    attribute: name.clone(),
                    error: TypeError::UnknownAttribute { name: name.clone() },
                });
                continue;
            };
            if schema.is_computed_only() {
                errors.push(AttributeError {
                    attribute: name.clone(),
                    error: TypeError::ComputedOnly { name: name.clone() },
                });
                continue;
            }
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push(AttributeError {
                    attribute: name.clone(),
                    error: e,
                });
            }
            for other in &schema.conflicts_with {
                // Report each conflicting pair once
                if attributes.contains_key(other) && name < other {
                    errors.push(AttributeError {
                        attribute: name.clone(),
                        error: TypeError::Conflict {
                            name: name.clone(),
                            other: other.clone(),
                        },
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by(|a, b| a.attribute.cmp(&b.attribute));
            Err(errors)
        }
    }
}

fn normalize_enum_value(attr_type: &AttributeType, value: &mut Value) {
    if let AttributeType::Enum(variants) = attr_type {
        let variant = match value {
            Value::String(s) => enum_variant(s).to_string(),
            Value::UnresolvedIdent(ident, member) => member.clone().unwrap_or_else(|| ident.clone()),
            _ => return,
        };
        if variants.contains(&variant) {
            *value = Value::String(variant);
        }
        return;
    }
    match (attr_type, value) {
        (AttributeType::List(inner), Value::List(items)) => {
            for item in items {
                normalize_enum_value(inner, item);
            }
        }
        (AttributeType::Block(fields), Value::Map(map)) => {
            for field in fields {
                if let Some(v) = map.get_mut(&field.name) {
                    normalize_enum_value(&field.attr_type, v);
                }
            }
        }
        _ => {}
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// String that must not be empty
    pub fn non_empty_string() -> AttributeType {
        AttributeType::Custom {
            name: "NonEmptyString".to_string(),
            base: Box::new(AttributeType::String),
            validate: Validator::new(|value| match value {
                Value::String(s) if s.trim().is_empty() => {
                    Err("Value must not be empty".to_string())
                }
                _ => Ok(()),
            }),
        }
    }

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: Validator::new(|value| match value {
                Value::Int(n) if *n <= 0 => Err("Value must be positive".to_string()),
                _ => Ok(()),
            }),
        }
    }

    /// Integer with an inclusive lower bound
    pub fn int_at_least(name: &str, min: i64) -> AttributeType {
        int_between(name, min, i64::MAX)
    }

    /// Integer within an inclusive range
    pub fn int_between(name: &str, min: i64, max: i64) -> AttributeType {
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(AttributeType::Int),
            validate: Validator::new(move |value| match value {
                Value::Int(n) if *n < min || *n > max => {
                    if max == i64::MAX {
                        Err(format!("Value must be at least {}, got {}", min, n))
                    } else {
                        Err(format!("Value must be between {} and {}, got {}", min, max, n))
                    }
                }
                _ => Ok(()),
            }),
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: Validator::new(|value| match value {
                Value::String(s) => validate_cidr(s),
                _ => Ok(()),
            }),
        }
    }

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Map of strings (labels, tags)
    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// Enum from a static list of variants
    pub fn one_of(variants: &[&str]) -> AttributeType {
        AttributeType::Enum(variants.iter().map(|v| v.to_string()).collect())
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
        assert!(
            t.validate(&Value::ResourceRef("net".to_string(), "id".to_string()))
                .is_ok()
        );
    }

    #[test]
    fn validate_enum_type() {
        let t = types::one_of(&["round_robin", "least_connections"]);
        assert!(t.validate(&Value::String("round_robin".to_string())).is_ok());
        assert!(
            t.validate(&Value::String(
                "civo.loadbalancer.Algorithm.least_connections".to_string()
            ))
            .is_ok()
        );
        assert!(t.validate(&Value::String("random".to_string())).is_err());
        assert!(
            t.validate(&Value::UnresolvedIdent("round_robin".to_string(), None))
                .is_ok()
        );
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
        assert!(t.validate(&Value::String("1".to_string())).is_err());
    }

    #[test]
    fn validate_int_range() {
        let ttl = types::int_at_least("Ttl", 600);
        assert!(ttl.validate(&Value::Int(600)).is_ok());
        assert!(ttl.validate(&Value::Int(599)).is_err());

        let port = types::int_between("Port", 1, 65535);
        assert!(port.validate(&Value::Int(443)).is_ok());
        assert!(port.validate(&Value::Int(70000)).is_err());
    }

    #[test]
    fn validate_non_empty_string() {
        let t = types::non_empty_string();
        assert!(t.validate(&Value::String("web".to_string())).is_ok());
        assert!(t.validate(&Value::String("  ".to_string())).is_err());
    }

    #[test]
    fn validate_block_type() {
        let t = AttributeType::Block(vec![
            AttributeSchema::new("key", AttributeType::String).required(),
            AttributeSchema::new("values", types::string_list()).required(),
            AttributeSchema::new("all", AttributeType::Bool),
        ]);

        let mut ok = HashMap::new();
        ok.insert("key".to_string(), Value::String("name".to_string()));
        ok.insert(
            "values".to_string(),
            Value::List(vec![Value::String("g3.small".to_string())]),
        );
        assert!(t.validate(&Value::Map(ok.clone())).is_ok());

        let mut missing = ok.clone();
        missing.remove("values");
        assert!(matches!(
            t.validate(&Value::Map(missing)),
            Err(TypeError::MissingRequired { .. })
        ));

        let mut unknown = ok;
        unknown.insert("direction".to_string(), Value::String("asc".to_string()));
        assert!(matches!(
            t.validate(&Value::Map(unknown)),
            Err(TypeError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("volume")
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(AttributeSchema::new("size_gb", types::positive_int()).required())
            .attribute(AttributeSchema::new("mount_point", AttributeType::String).computed());

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("data".to_string()));
        attrs.insert("size_gb".to_string(), Value::Int(20));
        attrs.insert("_binding".to_string(), Value::String("data".to_string()));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert(
            "mount_point".to_string(),
            Value::String("/dev/vdb".to_string()),
        );
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0].error, TypeError::ComputedOnly { .. }));
    }

    #[test]
    fn missing_required_and_unknown_attributes() {
        let schema = ResourceSchema::new("ssh_key")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let mut attrs = HashMap::new();
        attrs.insert("colour".to_string(), Value::String("red".to_string()));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn conflicting_attributes() {
        let schema = ResourceSchema::data_source("network")
            .attribute(AttributeSchema::new("id", AttributeType::String).conflicts_with("label"))
            .attribute(AttributeSchema::new("label", AttributeType::String).conflicts_with("id"));

        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), Value::String("abc".to_string()));
        attrs.insert("label".to_string(), Value::String("prod".to_string()));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].error, TypeError::Conflict { .. }));
    }

    #[test]
    fn defaults_fill_missing_attributes() {
        let schema = ResourceSchema::new("instance").attribute(
            AttributeSchema::new("initial_user", AttributeType::String)
                .with_default(Value::String("civo".to_string())),
        );
        let mut attrs = HashMap::new();
        schema.apply_defaults(&mut attrs);
        assert_eq!(
            attrs.get("initial_user"),
            Some(&Value::String("civo".to_string()))
        );
    }

    #[test]
    fn carries_only_write_only_values() {
        let schema = ResourceSchema::new("instance")
            .attribute(
                AttributeSchema::new("public_ip_required", AttributeType::String).write_only(),
            )
            .attribute(AttributeSchema::new("notes", AttributeType::String));
        let mut source = HashMap::new();
        source.insert("public_ip_required".to_string(), Value::from("none"));
        source.insert("notes".to_string(), Value::from("old"));

        let mut target = HashMap::new();
        schema.carry_write_only(&source, &mut target);
        assert_eq!(target.get("public_ip_required"), Some(&Value::from("none")));
        assert!(!target.contains_key("notes"));

        target.insert("public_ip_required".to_string(), Value::from("create"));
        schema.carry_write_only(&source, &mut target);
        assert_eq!(target["public_ip_required"], Value::from("create"));
    }

    #[test]
    fn normalize_namespaced_enums() {
        let schema = ResourceSchema::new("loadbalancer").attribute(AttributeSchema::new(
            "algorithm",
            types::one_of(&["round_robin", "least_connections"]),
        ));
        let mut attrs = HashMap::new();
        attrs.insert(
            "algorithm".to_string(),
            Value::String("civo.loadbalancer.Algorithm.least_connections".to_string()),
        );
        schema.normalize_enums(&mut attrs);
        assert_eq!(
            attrs.get("algorithm"),
            Some(&Value::String("least_connections".to_string()))
        );

        attrs.insert(
            "algorithm".to_string(),
            Value::UnresolvedIdent("round_robin".to_string(), None),
        );
        schema.normalize_enums(&mut attrs);
        assert_eq!(
            attrs.get("algorithm"),
            Some(&Value::String("round_robin".to_string()))
        );
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();
        assert!(t.validate(&Value::String("10.0.0.0/16".to_string())).is_ok());
        assert!(t.validate(&Value::String("0.0.0.0/0".to_string())).is_ok());
        assert!(t.validate(&Value::String("10.0.0.0".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.0/33".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.256/16".to_string())).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }
}
