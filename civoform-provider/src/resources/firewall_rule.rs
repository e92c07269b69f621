//! `civo.firewall_rule` - a single rule managed outside its firewall

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::firewall::join_port_range;
use super::{Context, ResourceHandler, api_error, existing, id_attribute, region_attribute, split_pair};
use crate::client::FirewallRule;
use crate::utils::{Attributes, ObjectRef, get_str, get_string_list, require_str, set, set_str};

pub struct FirewallRuleHandler;

fn rule_attributes(firewall_id: &str, rule: &FirewallRule) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "firewall_id", firewall_id);
    set_str(&mut attrs, "protocol", &rule.protocol);
    set_str(&mut attrs, "start_port", &rule.start_port);
    set_str(&mut attrs, "end_port", &rule.end_port);
    set(&mut attrs, "cidr", rule.cidr.clone());
    set_str(&mut attrs, "direction", &rule.direction);
    set_str(&mut attrs, "action", &rule.action);
    set_str(&mut attrs, "label", &rule.label);
    attrs
}

#[async_trait]
impl ResourceHandler for FirewallRuleHandler {
    fn resource_type(&self) -> &'static str {
        "firewall_rule"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("firewall_rule")
            .with_description("A firewall rule; every change recreates it")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("firewall_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("protocol", types::one_of(&["tcp", "udp", "icmp"]))
                    .with_default(Value::from("tcp"))
                    .force_new(),
            )
            .attribute(AttributeSchema::new("start_port", AttributeType::String).force_new())
            .attribute(
                AttributeSchema::new("end_port", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("cidr", types::string_list())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("direction", types::one_of(&["ingress", "egress"]))
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("action", types::one_of(&["allow", "deny"]))
                    .with_default(Value::from("allow"))
                    .force_new(),
            )
            .attribute(AttributeSchema::new("label", AttributeType::String).force_new())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let firewall_id = require_str(id, attrs, "firewall_id")?;
        let start_port = get_str(attrs, "start_port").unwrap_or_default();
        let end_port = get_str(attrs, "end_port").unwrap_or_else(|| start_port.clone());
        let rule = FirewallRule {
            protocol: get_str(attrs, "protocol").unwrap_or_else(|| "tcp".to_string()),
            start_port,
            end_port,
            cidr: get_string_list(attrs, "cidr"),
            direction: require_str(id, attrs, "direction")?,
            action: get_str(attrs, "action").unwrap_or_else(|| "allow".to_string()),
            label: get_str(attrs, "label").unwrap_or_default(),
            ..Default::default()
        };
        info!(
            "Adding {} rule on {} to firewall {}",
            rule.direction,
            join_port_range(&rule.start_port, &rule.end_port),
            firewall_id
        );
        let created = client
            .create_firewall_rule(&firewall_id, &rule)
            .await
            .map_err(api_error(id, "create firewall rule"))?;

        let object_id = format!("{}:{}", firewall_id, created.id);
        let mut attrs = rule_attributes(&firewall_id, &rule);
        set_str(&mut attrs, "id", &created.id);
        Ok(existing(ctx, &client, id, &object_id, attrs))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let (firewall_id, rule_id) = split_pair(id, &object.id)?;
        let rules = match client.list_firewall_rules(&firewall_id).await {
            Ok(rules) => rules,
            Err(e) if e.is_not_found() => return Ok(State::not_found(id.clone())),
            Err(e) => return Err(api_error(id, "list firewall rules")(e)),
        };
        let Some(rule) = rules.into_iter().find(|r| r.id == rule_id) else {
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = rule_attributes(&firewall_id, &rule);
        set_str(&mut attrs, "id", &rule.id);
        Ok(existing(ctx, &client, id, &object.id, attrs))
    }

    async fn update(
        &self,
        _ctx: &Context,
        id: &ResourceId,
        _object: &ObjectRef,
        _from: &State,
        _attrs: &Attributes,
    ) -> ProviderResult<State> {
        Err(ProviderError::new("Firewall rules cannot be updated in place").for_resource(id.clone()))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        let (firewall_id, rule_id) = split_pair(id, &object.id)?;
        match client.delete_firewall_rule(&firewall_id, &rule_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(api_error(id, "delete firewall rule")(e)),
        }
    }
}
