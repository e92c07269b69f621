//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolver::{BindingMap, resolve_resource};
use crate::resource::{Resource, ResourceId, State, Value};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete then create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted,
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

impl EffectOutcome {
    /// State left behind by the effect, if any
    pub fn state(&self) -> Option<&State> {
        match self {
            EffectOutcome::Created { state }
            | EffectOutcome::Updated { state }
            | EffectOutcome::Replaced { state } => Some(state),
            EffectOutcome::Deleted | EffectOutcome::Skipped { .. } => None,
        }
    }
}

/// Outcome of one Effect, tagged with the resource it touched
#[derive(Debug)]
pub struct AppliedEffect {
    pub id: ResourceId,
    pub result: Result<EffectOutcome, ProviderError>,
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<AppliedEffect>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
    bindings: BindingMap,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
            bindings: BindingMap::new(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the binding map used to resolve references while applying
    pub fn with_bindings(mut self, bindings: BindingMap) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut bindings = self.bindings.clone();
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let id = effect.resource_id().clone();
            let result = self.execute_effect(effect, &mut bindings).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(e) => {
                    warn!("{} failed: {}", effect, e);
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(AppliedEffect { id, result });
                        break;
                    }
                }
            }

            outcomes.push(AppliedEffect { id, result });
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &mut BindingMap,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Create(resource) => {
                let resource = resolved(resource, bindings)?;
                info!("Creating {}", resource.id);
                let state = self.provider.create(&resource).await?;
                record_binding(bindings, &resource, &state);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to, .. } => {
                let to = resolved(to, bindings)?;
                let identifier = require_identifier(id, from)?;
                info!("Updating {} ({})", id, identifier);
                let state = self.provider.update(id, identifier, from, &to).await?;
                record_binding(bindings, &to, &state);
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to, .. } => {
                let to = resolved(to, bindings)?;
                let identifier = require_identifier(id, from)?;
                info!("Replacing {} ({})", id, identifier);
                self.provider.delete(id, identifier).await?;
                let state = self.provider.create(&to).await?;
                record_binding(bindings, &to, &state);
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                info!("Deleting {} ({})", id, identifier);
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted)
            }
        }
    }
}

fn require_identifier<'a>(id: &ResourceId, from: &'a State) -> ProviderResult<&'a str> {
    from.identifier.as_deref().ok_or_else(|| {
        ProviderError::new("No identifier recorded for existing resource").for_resource(id.clone())
    })
}

fn resolved(resource: &Resource, bindings: &BindingMap) -> ProviderResult<Resource> {
    let mut resource = resource.clone();
    resolve_resource(&mut resource, bindings);
    if let Some((attr, _)) = resource.attributes.iter().find(|(_, v)| v.contains_ref()) {
        return Err(ProviderError::new(format!(
            "Attribute '{}' references a resource that is not available",
            attr
        ))
        .for_resource(resource.id.clone()));
    }
    Ok(resource)
}

/// Make the new state visible to later effects through the resource's binding
fn record_binding(bindings: &mut BindingMap, resource: &Resource, state: &State) {
    let name = resource
        .binding()
        .map(str::to_string)
        .unwrap_or_else(|| resource.id.name.clone());
    let mut attrs: HashMap<String, Value> = resource.attributes.clone();
    attrs.extend(state.attributes.clone());
    if let Some(identifier) = &state.identifier {
        attrs
            .entry("id".to_string())
            .or_insert_with(|| Value::String(identifier.clone()));
    }
    debug!("Binding '{}' now has {} attributes", name, attrs.len());
    bindings.insert(name, attrs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    fn bound(resource_type: &str, name: &str) -> Resource {
        Resource::new(resource_type, name).with_attribute("_binding", Value::from(name))
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(MockProvider::default());
        let plan = Plan::new();
        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_resolves_references_from_earlier_effects() {
        let interpreter = Interpreter::new(MockProvider::default());
        let mut plan = Plan::new();
        plan.add(Effect::Create(
            bound("network", "net").with_attribute("label", Value::from("prod")),
        ));
        plan.add(Effect::Create(bound("volume", "data").with_attribute(
            "network_id",
            Value::ResourceRef("net".to_string(), "id".to_string()),
        )));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        let volume = result.outcomes[1]
            .result
            .as_ref()
            .unwrap()
            .state()
            .unwrap();
        assert_eq!(
            volume.attributes.get("network_id"),
            Some(&Value::String("net-1".to_string()))
        );
    }

    #[tokio::test]
    async fn replace_deletes_before_create() {
        let interpreter = Interpreter::new(MockProvider::default());
        let id = ResourceId::new("ssh_key", "me");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id: id.clone(),
            from: State::existing(id.clone(), HashMap::new()).with_identifier("old-key"),
            to: bound("ssh_key", "me"),
            changed: vec!["public_key".to_string()],
        });

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(
            interpreter.provider().calls(),
            vec!["delete ssh_key.me", "create ssh_key.me"]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure_by_default() {
        let interpreter = Interpreter::new(MockProvider::failing_on("a"));
        let mut plan = Plan::new();
        plan.add(Effect::Create(bound("network", "a")));
        plan.add(Effect::Create(bound("network", "b")));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.outcomes[0].id, ResourceId::new("network", "a"));
    }

    #[tokio::test]
    async fn continue_on_error_runs_remaining_effects() {
        let config = InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(MockProvider::failing_on("a")).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(bound("network", "a")));
        plan.add(Effect::Create(bound("network", "b")));
        plan.add(Effect::Create(bound("volume", "c").with_attribute(
            "network_id",
            Value::ResourceRef("a".to_string(), "id".to_string()),
        )));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 2);
        assert_eq!(result.outcomes.len(), 3);
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(MockProvider::default()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("network", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0].result,
            Ok(EffectOutcome::Skipped { .. })
        ));
        assert!(interpreter.provider().calls().is_empty());
    }
}
