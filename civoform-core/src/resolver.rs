//! Resolver - Dependency ordering and `binding.attribute` reference resolution

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, ResourceId, State, Value};

/// binding name -> attributes visible through that binding
pub type BindingMap = HashMap<String, HashMap<String, Value>>;

fn binding_name(resource: &Resource) -> String {
    resource
        .binding()
        .map(str::to_string)
        .unwrap_or_else(|| resource.id.name.clone())
}

/// Extract binding names that a resource depends on
pub fn get_resource_dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

pub fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding_name, _) => {
            deps.insert(binding_name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Sort resources topologically based on dependencies
///
/// Independent resources keep their declaration order. Cycles are broken at
/// the first revisit rather than reported.
pub fn sort_resources_by_dependencies(resources: &[Resource]) -> Vec<Resource> {
    let binding_to_resource: HashMap<String, &Resource> = resources
        .iter()
        .map(|r| (binding_name(r), r))
        .collect();

    let mut sorted = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn visit<'a>(
        resource: &'a Resource,
        binding_to_resource: &HashMap<String, &'a Resource>,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        sorted: &mut Vec<Resource>,
    ) {
        let name = binding_name(resource);

        if visited.contains(&name) || visiting.contains(&name) {
            return;
        }

        visiting.insert(name.clone());

        // Visit dependencies first, in a deterministic order
        let mut deps: Vec<String> = get_resource_dependencies(resource).into_iter().collect();
        deps.sort();
        for dep in deps {
            if let Some(dep_resource) = binding_to_resource.get(&dep) {
                visit(dep_resource, binding_to_resource, visited, visiting, sorted);
            }
        }

        visiting.remove(&name);
        visited.insert(name);
        sorted.push(resource.clone());
    }

    for resource in resources {
        visit(
            resource,
            &binding_to_resource,
            &mut visited,
            &mut visiting,
            &mut sorted,
        );
    }

    sorted
}

/// Build a binding map from desired attributes merged with observed state.
///
/// Desired values win; state only fills attributes the configuration does not
/// set (such as `id`).
pub fn build_binding_map(
    resources: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> BindingMap {
    let mut binding_map = BindingMap::new();

    for resource in resources {
        let mut attrs = resource.attributes.clone();

        if let Some(state) = current_states.get(&resource.id)
            && state.exists
        {
            for (k, v) in &state.attributes {
                attrs.entry(k.clone()).or_insert_with(|| v.clone());
            }
            if let Some(identifier) = &state.identifier {
                attrs
                    .entry("id".to_string())
                    .or_insert_with(|| Value::String(identifier.clone()));
            }
        }

        binding_map.insert(binding_name(resource), attrs);
    }

    binding_map
}

/// Resolve ResourceRef values in all resources using known state
pub fn resolve_refs_with_state(
    resources: &mut [Resource],
    current_states: &HashMap<ResourceId, State>,
) {
    let binding_map = build_binding_map(resources, current_states);

    for resource in resources.iter_mut() {
        resolve_resource(resource, &binding_map);
    }
}

/// Resolve every attribute of one resource in place
pub fn resolve_resource(resource: &mut Resource, binding_map: &BindingMap) {
    for value in resource.attributes.values_mut() {
        *value = resolve_ref_value(value, binding_map);
    }
}

/// Resolve a value against the binding map; unknown references stay in place
pub fn resolve_ref_value(value: &Value, binding_map: &BindingMap) -> Value {
    resolve_with_depth(value, binding_map, 0)
}

// References chained through other references stop here to survive cycles
const MAX_REF_DEPTH: usize = 32;

fn resolve_with_depth(value: &Value, binding_map: &BindingMap, depth: usize) -> Value {
    match value {
        Value::ResourceRef(binding_name, attr_name) => {
            if depth < MAX_REF_DEPTH
                && let Some(attrs) = binding_map.get(binding_name)
                && let Some(attr_value) = attrs.get(attr_name)
            {
                return resolve_with_depth(attr_value, binding_map, depth + 1);
            }
            value.clone()
        }
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|v| resolve_with_depth(v, binding_map, depth))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_with_depth(v, binding_map, depth)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// References that name no known binding, as (resource, binding) pairs
pub fn undefined_references(resources: &[Resource]) -> Vec<(ResourceId, String)> {
    let known: HashSet<String> = resources.iter().map(binding_name).collect();
    let mut missing = Vec::new();
    for resource in resources {
        let mut deps: Vec<String> = get_resource_dependencies(resource)
            .into_iter()
            .filter(|d| !known.contains(d))
            .collect();
        deps.sort();
        for dep in deps {
            missing.push((resource.id.clone(), dep));
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(resource_type: &str, name: &str) -> Resource {
        Resource::new(resource_type, name).with_attribute("_binding", Value::from(name))
    }

    #[test]
    fn sort_puts_dependencies_first() {
        let resources = vec![
            bound("instance", "web")
                .with_attribute(
                    "network_id",
                    Value::ResourceRef("net".to_string(), "id".to_string()),
                )
                .with_attribute(
                    "firewall_id",
                    Value::ResourceRef("fw".to_string(), "id".to_string()),
                ),
            bound("firewall", "fw").with_attribute(
                "network_id",
                Value::ResourceRef("net".to_string(), "id".to_string()),
            ),
            bound("network", "net"),
            bound("ssh_key", "key"),
        ];

        let sorted = sort_resources_by_dependencies(&resources);
        let names: Vec<&str> = sorted.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["net", "fw", "web", "key"]);
    }

    #[test]
    fn sort_tolerates_cycles() {
        let resources = vec![
            bound("network", "a")
                .with_attribute("x", Value::ResourceRef("b".to_string(), "id".to_string())),
            bound("network", "b")
                .with_attribute("x", Value::ResourceRef("a".to_string(), "id".to_string())),
        ];
        assert_eq!(sort_resources_by_dependencies(&resources).len(), 2);
    }

    #[test]
    fn resolve_uses_state_identifier() {
        let mut resources = vec![
            bound("network", "net").with_attribute("label", Value::from("prod")),
            bound("volume", "data").with_attribute(
                "network_id",
                Value::ResourceRef("net".to_string(), "id".to_string()),
            ),
        ];
        let mut states = HashMap::new();
        states.insert(
            ResourceId::new("network", "net"),
            State::existing(ResourceId::new("network", "net"), HashMap::new())
                .with_identifier("net-123"),
        );

        resolve_refs_with_state(&mut resources, &states);
        assert_eq!(
            resources[1].attributes.get("network_id"),
            Some(&Value::String("net-123".to_string()))
        );
    }

    #[test]
    fn resolve_recurses_into_nested_values() {
        let mut binding_map = BindingMap::new();
        binding_map.insert(
            "size".to_string(),
            [("name".to_string(), Value::from("g4s.kube.medium"))]
                .into_iter()
                .collect(),
        );
        let value = Value::List(vec![Value::Map(
            [(
                "size".to_string(),
                Value::ResourceRef("size".to_string(), "name".to_string()),
            )]
            .into_iter()
            .collect(),
        )]);

        let resolved = resolve_ref_value(&value, &binding_map);
        assert!(!resolved.contains_ref());

        let unknown = Value::ResourceRef("missing".to_string(), "id".to_string());
        assert_eq!(resolve_ref_value(&unknown, &binding_map), unknown);
    }

    #[test]
    fn reports_undefined_bindings() {
        let resources = vec![bound("volume", "data").with_attribute(
            "network_id",
            Value::ResourceRef("nett".to_string(), "id".to_string()),
        )];
        let missing = undefined_references(&resources);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].1, "nett");
    }
}
