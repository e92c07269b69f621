//! State file structures for persisting infrastructure state

use std::collections::HashMap;

use civoform_core::resource::{ResourceId, State, Value};
use serde::{Deserialize, Serialize};

/// The state file written to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Bumped on every write
    pub serial: u64,
    /// Identifies one state history; stays fixed across writes
    pub lineage: String,
    /// civoform version that last wrote this state
    pub civoform_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            civoform_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.civoform_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    pub fn find_resource_mut(
        &mut self,
        resource_type: &str,
        name: &str,
    ) -> Option<&mut ResourceState> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Civo identifier recorded for `id`
    pub fn identifier(&self, id: &ResourceId) -> Option<&str> {
        self.find_resource(&id.resource_type, &id.name)
            .and_then(|r| r.identifier.as_deref())
    }

    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.resource_type, &resource.name) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Every recorded resource as a `State`
    pub fn states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| (r.resource_id(), r.to_state()))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    /// Binding name from the configuration
    pub name: String,
    /// Provider name (`civo`)
    pub provider: String,
    /// Civo object identifier, `REGION/ID` outside the default region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
    /// Addresses (`type.name`) this resource referenced when it was applied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Protected resources are never destroyed
    #[serde(default)]
    pub protected: bool,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
            dependencies: Vec::new(),
            protected: false,
        }
    }

    /// Record what a provider returned for a resource
    pub fn from_state(state: &State, provider: impl Into<String>) -> Self {
        let mut resource = Self::new(&state.id.resource_type, &state.id.name, provider);
        resource.identifier = state.identifier.clone();
        resource.attributes = state
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        resource
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_dependencies(mut self, mut dependencies: Vec<String>) -> Self {
        dependencies.sort();
        dependencies.dedup();
        self.dependencies = dependencies;
        self
    }

    pub fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    /// Recorded attributes as values; JSON nulls are dropped
    pub fn values(&self) -> HashMap<String, Value> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }

    pub fn to_state(&self) -> State {
        let state = State::existing(self.resource_id(), self.values());
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier.clone()),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn upsert_replaces_by_type_and_name() {
        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("network", "prod", "civo").with_attribute("label", json!("prod")),
        );
        state.upsert_resource(
            ResourceState::new("network", "prod", "civo").with_attribute("label", json!("prod-2")),
        );
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].attributes["label"], json!("prod-2"));

        assert!(state.remove_resource("network", "prod").is_some());
        assert!(state.remove_resource("network", "prod").is_none());
    }

    #[test]
    fn serial_increments() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
    }

    #[test]
    fn converts_between_provider_state_and_record() {
        let mut attrs = HashMap::new();
        attrs.insert("size_gb".to_string(), Value::Int(20));
        attrs.insert(
            "tags".to_string(),
            Value::List(vec![Value::from("db"), Value::from("prod")]),
        );
        let state = State::existing(ResourceId::new("volume", "data"), attrs)
            .with_identifier("NYC1/vol-1");

        let record = ResourceState::from_state(&state, "civo")
            .with_dependencies(vec!["network.prod".into(), "network.prod".into()]);
        assert_eq!(record.identifier.as_deref(), Some("NYC1/vol-1"));
        assert_eq!(record.attributes["size_gb"], json!(20));
        assert_eq!(record.dependencies, vec!["network.prod"]);

        let restored = record.to_state();
        assert_eq!(restored, state);
    }

    #[test]
    fn identifier_lookup_and_states() {
        let mut file = StateFile::new();
        file.upsert_resource(ResourceState::new("ssh_key", "me", "civo").with_identifier("k-1"));
        let id = ResourceId::new("ssh_key", "me");
        assert_eq!(file.identifier(&id), Some("k-1"));
        assert_eq!(file.identifier(&ResourceId::new("ssh_key", "other")), None);
        assert!(file.states()[&id].exists);
    }

    #[test]
    fn optional_fields_default_when_missing() {
        let json = r#"{
            "version": 1, "serial": 3, "lineage": "abc", "civoform_version": "0.1.0",
            "resources": [{"resource_type": "network", "name": "prod", "provider": "civo",
                           "attributes": {"label": "prod", "gone": null}}]
        }"#;
        let file: StateFile = serde_json::from_str(json).unwrap();
        let resource = &file.resources[0];
        assert!(resource.identifier.is_none());
        assert!(resource.dependencies.is_empty());
        assert!(!resource.protected);
        assert!(!resource.values().contains_key("gone"));
    }
}
