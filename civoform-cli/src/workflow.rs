//! Refresh, planning and state bookkeeping shared by the commands

use std::collections::{HashMap, HashSet};

use colored::Colorize;
use log::{debug, info};

use civoform_core::differ::create_plan;
use civoform_core::effect::Effect;
use civoform_core::interpreter::{ApplyResult, EffectOutcome};
use civoform_core::plan::Plan;
use civoform_core::provider::Provider;
use civoform_core::resolver::{
    BindingMap, build_binding_map, resolve_refs_with_state, resolve_resource,
};
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::ResourceSchema;
use civoform_state::{ResourceState, StateFile};

use crate::workspace::Workspace;

/// Provider name written to the state file
pub const PROVIDER: &str = "civo";

/// Read every declared object from the API
///
/// Managed resources are read by the identifier recorded in state; data
/// sources are evaluated once the bindings they reference are known.
pub async fn refresh<P: Provider>(
    provider: &P,
    workspace: &Workspace,
    state: &StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut states = HashMap::new();

    for resource in &workspace.resources {
        let current = if resource.is_data_source() {
            let mut resolved = resource.clone();
            resolve_resource(
                &mut resolved,
                &build_binding_map(&workspace.resources, &states),
            );
            if let Some(attr) = resolved
                .attributes
                .iter()
                .find(|(k, v)| !k.starts_with('_') && v.contains_ref())
                .map(|(k, _)| k)
            {
                return Err(format!(
                    "{}: '{}' depends on a value that is only known after apply",
                    resource.id, attr
                ));
            }
            info!("Reading data source {}", resource.id);
            provider
                .read_data_source(&resolved)
                .await
                .map_err(|e| e.to_string())?
        } else {
            let identifier = state.identifier(&resource.id);
            debug!("Refreshing {} ({:?})", resource.id, identifier);
            provider
                .read(&resource.id, identifier)
                .await
                .map_err(|e| format!("Failed to read {}: {}", resource.id, e))?
        };
        states.insert(resource.id.clone(), current);
    }

    Ok(states)
}

/// Recorded resources the configuration no longer declares, dependents first
pub fn orphans(workspace: &Workspace, state: &StateFile) -> Vec<ResourceState> {
    let orphans: Vec<ResourceState> = state
        .resources
        .iter()
        .filter(|r| !workspace.is_declared(&r.resource_id().address()))
        .cloned()
        .collect();
    destroy_order(orphans)
}

/// Order resources so each comes before everything it depends on
pub fn destroy_order(resources: Vec<ResourceState>) -> Vec<ResourceState> {
    let index: HashMap<String, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.resource_id().address(), i))
        .collect();

    fn visit(
        i: usize,
        resources: &[ResourceState],
        index: &HashMap<String, usize>,
        visited: &mut HashSet<usize>,
        order: &mut Vec<usize>,
    ) {
        if !visited.insert(i) {
            return;
        }
        for dep in &resources[i].dependencies {
            if let Some(&j) = index.get(dep) {
                visit(j, resources, index, visited, order);
            }
        }
        order.push(i);
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for i in 0..resources.len() {
        visit(i, &resources, &index, &mut visited, &mut order);
    }

    let mut slots: Vec<Option<ResourceState>> = resources.into_iter().map(Some).collect();
    order
        .into_iter()
        .rev()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Delete effects for recorded resources that still exist
///
/// Protected resources are skipped. Resources already gone are dropped from
/// `state` right away.
pub async fn delete_effects<P: Provider>(
    provider: &P,
    targets: Vec<ResourceState>,
    state: &mut StateFile,
) -> Result<Vec<Effect>, String> {
    let mut effects = Vec::new();

    for target in targets {
        let id = target.resource_id();
        if target.protected {
            println!(
                "{}",
                format!("Skipping protected resource {}", id).yellow()
            );
            continue;
        }

        let current = provider
            .read(&id, target.identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read {}: {}", id, e))?;
        match current.identifier.or(target.identifier) {
            Some(identifier) if current.exists => effects.push(Effect::Delete { id, identifier }),
            _ => {
                info!("{} no longer exists; forgetting it", id);
                state.remove_resource(&id.resource_type, &id.name);
            }
        }
    }

    Ok(effects)
}

/// A plan together with what it was computed from
pub struct Planned {
    pub plan: Plan,
    /// Binding map to seed the interpreter with
    pub bindings: BindingMap,
}

/// Refresh, then diff the configuration against what exists
///
/// `state` is brought up to date with the refresh; the caller decides whether
/// to persist it.
pub async fn plan<P: Provider>(
    provider: &P,
    workspace: &Workspace,
    state: &mut StateFile,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<Planned, String> {
    let mut refreshed = refresh(provider, workspace, state).await?;
    carry_write_only(&mut refreshed, workspace, state, schemas);

    let mut plan = Plan::new();
    let orphaned = orphans(workspace, state);
    for effect in delete_effects(provider, orphaned, state).await? {
        plan.add(effect);
    }

    let mut resources = workspace.resources.clone();
    resolve_refs_with_state(&mut resources, &refreshed);
    for effect in create_plan(&resources, &refreshed, schemas).effects() {
        if let Effect::Replace { id, changed, .. } = effect
            && is_protected(state, id)
        {
            println!(
                "{}",
                format!(
                    "Skipping replacement of protected resource {} (forced by {})",
                    id,
                    changed.join(", ")
                )
                .yellow()
            );
            continue;
        }
        plan.add(effect.clone());
    }

    sync_refreshed(state, workspace, &refreshed);

    Ok(Planned {
        plan,
        bindings: build_binding_map(&workspace.resources, &refreshed),
    })
}

fn is_protected(state: &StateFile, id: &ResourceId) -> bool {
    state
        .find_resource(&id.resource_type, &id.name)
        .is_some_and(|r| r.protected)
}

/// Keep write-only values recorded by earlier runs; reads never return them
fn carry_write_only(
    refreshed: &mut HashMap<ResourceId, State>,
    workspace: &Workspace,
    state: &StateFile,
    schemas: &HashMap<String, ResourceSchema>,
) {
    for resource in workspace.managed() {
        let id = &resource.id;
        let (Some(current), Some(schema), Some(previous)) = (
            refreshed.get_mut(id),
            schemas.get(&id.resource_type),
            state.find_resource(&id.resource_type, &id.name),
        ) else {
            continue;
        };
        if current.exists {
            schema.carry_write_only(&previous.values(), &mut current.attributes);
        }
    }
}

/// Record `current` in state, keeping the protection flag and identifier
/// already there
pub fn record(state: &mut StateFile, current: &State, dependencies: Vec<String>) {
    let previous = state.find_resource(&current.id.resource_type, &current.id.name);
    let protected = previous.is_some_and(|r| r.protected);
    let identifier = current
        .identifier
        .clone()
        .or_else(|| previous.and_then(|r| r.identifier.clone()));

    let mut resource = ResourceState::from_state(current, PROVIDER)
        .with_dependencies(dependencies)
        .with_protected(protected);
    resource.identifier = identifier;
    state.upsert_resource(resource);
}

/// Bring recorded state in line with what refresh observed
pub fn sync_refreshed(
    state: &mut StateFile,
    workspace: &Workspace,
    refreshed: &HashMap<ResourceId, State>,
) {
    for resource in workspace.managed() {
        match refreshed.get(&resource.id) {
            Some(current) if current.exists => {
                record(state, current, workspace.dependency_addresses(resource))
            }
            _ => {
                state.remove_resource(&resource.id.resource_type, &resource.id.name);
            }
        }
    }
}

/// Record what each successful effect left behind
pub fn record_outcomes(state: &mut StateFile, workspace: &Workspace, result: &ApplyResult) {
    for applied in &result.outcomes {
        let id = &applied.id;
        match &applied.result {
            Ok(EffectOutcome::Deleted) => {
                state.remove_resource(&id.resource_type, &id.name);
            }
            Ok(outcome) => {
                if let Some(current) = outcome.state() {
                    let dependencies = workspace
                        .managed()
                        .find(|r| &r.id == id)
                        .map(|r| workspace.dependency_addresses(r))
                        .unwrap_or_default();
                    record(state, current, dependencies);
                }
            }
            Err(_) => {}
        }
    }
}
