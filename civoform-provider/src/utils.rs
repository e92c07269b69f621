//! Helpers for moving values between resource attributes and API models

use std::collections::HashMap;

use civoform_core::differ::values_match;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, Value};

pub type Attributes = HashMap<String, Value>;

/// Non-empty string attribute
pub fn get_str(attrs: &Attributes, key: &str) -> Option<String> {
    match attrs.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Int(i)) => Some(i.to_string()),
        _ => None,
    }
}

pub fn get_int(attrs: &Attributes, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_int)
}

pub fn get_bool(attrs: &Attributes, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

pub fn get_string_list(attrs: &Attributes, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn get_string_map(attrs: &Attributes, key: &str) -> HashMap<String, String> {
    attrs
        .get(key)
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Nested blocks written by the user (`pools { ... }`, `backend { ... }`)
pub fn get_blocks(attrs: &Attributes, key: &str) -> Vec<Attributes> {
    match attrs.get(key) {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|v| v.as_map().cloned())
            .collect(),
        Some(Value::Map(map)) => vec![map.clone()],
        _ => Vec::new(),
    }
}

pub fn require_str(id: &ResourceId, attrs: &Attributes, key: &str) -> ProviderResult<String> {
    get_str(attrs, key).ok_or_else(|| {
        ProviderError::new(format!("Attribute '{}' is required", key)).for_resource(id.clone())
    })
}

pub fn require_int(id: &ResourceId, attrs: &Attributes, key: &str) -> ProviderResult<i64> {
    get_int(attrs, key).ok_or_else(|| {
        ProviderError::new(format!("Attribute '{}' is required", key)).for_resource(id.clone())
    })
}

/// Whether the desired value of `key` differs from the current one
pub fn changed(current: &Attributes, desired: &Attributes, key: &str) -> bool {
    match (desired.get(key), current.get(key)) {
        (Some(d), Some(c)) => !values_match(d, c),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Insert a string attribute, skipping empty API fields
pub fn set_str(attrs: &mut Attributes, key: &str, value: &str) {
    if !value.is_empty() {
        attrs.insert(key.to_string(), Value::String(value.to_string()));
    }
}

pub fn set(attrs: &mut Attributes, key: &str, value: impl Into<Value>) {
    attrs.insert(key.to_string(), value.into());
}

/// Identifier of an object, optionally qualified by its region
///
/// Objects living outside the provider's default region are recorded as
/// `REGION/ID` so a later read knows where to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: String,
    pub region: Option<String>,
}

impl ObjectRef {
    pub fn parse(identifier: &str) -> Self {
        match identifier.split_once('/') {
            Some((region, id)) if !region.is_empty() && !id.is_empty() => Self {
                id: id.to_string(),
                region: Some(region.to_string()),
            },
            _ => Self {
                id: identifier.to_string(),
                region: None,
            },
        }
    }

    /// Identifier string for an object created in `region`
    pub fn identifier(id: &str, region: &str, default_region: &str) -> String {
        if region.is_empty() || region.eq_ignore_ascii_case(default_region) {
            id.to_string()
        } else {
            format!("{}/{}", region, id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Attributes {
        let mut a = Attributes::new();
        a.insert("name".to_string(), Value::from("web"));
        a.insert("empty".to_string(), Value::from(""));
        a.insert("count".to_string(), Value::Int(3));
        a.insert(
            "tags".to_string(),
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );
        a.insert(
            "pools".to_string(),
            Value::List(vec![Value::Map(
                [("size".to_string(), Value::from("g4s.kube.small"))]
                    .into_iter()
                    .collect(),
            )]),
        );
        a
    }

    #[test]
    fn getters_skip_empty_and_mismatched() {
        let a = attrs();
        assert_eq!(get_str(&a, "name").as_deref(), Some("web"));
        assert_eq!(get_str(&a, "empty"), None);
        assert_eq!(get_str(&a, "count").as_deref(), Some("3"));
        assert_eq!(get_int(&a, "count"), Some(3));
        assert_eq!(get_bool(&a, "name"), None);
        assert_eq!(get_string_list(&a, "tags"), vec!["a", "b"]);
        assert!(get_string_list(&a, "missing").is_empty());
        assert_eq!(get_blocks(&a, "pools").len(), 1);
    }

    #[test]
    fn changed_ignores_unset_desired_values() {
        let current = attrs();
        let mut desired = Attributes::new();
        assert!(!changed(&current, &desired, "name"));
        desired.insert("name".to_string(), Value::from("web"));
        assert!(!changed(&current, &desired, "name"));
        desired.insert("count".to_string(), Value::Float(3.0));
        assert!(!changed(&current, &desired, "count"));
        desired.insert("notes".to_string(), Value::from("new"));
        assert!(changed(&current, &desired, "notes"));
    }

    #[test]
    fn require_reports_attribute_and_resource() {
        let id = ResourceId::new("instance", "web");
        let err = require_str(&id, &attrs(), "size").unwrap_err();
        assert_eq!(err.to_string(), "[instance.web] Attribute 'size' is required");
    }

    #[test]
    fn object_ref_round_trip() {
        assert_eq!(ObjectRef::identifier("abc", "LON1", "LON1"), "abc");
        assert_eq!(ObjectRef::identifier("abc", "lon1", "LON1"), "abc");
        assert_eq!(ObjectRef::identifier("abc", "NYC1", "LON1"), "NYC1/abc");

        let parsed = ObjectRef::parse("NYC1/abc");
        assert_eq!(parsed.id, "abc");
        assert_eq!(parsed.region.as_deref(), Some("NYC1"));
        assert_eq!(ObjectRef::parse("abc").region, None);
    }
}
