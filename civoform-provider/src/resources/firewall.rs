//! `civo.firewall` - firewalls with inline ingress/egress rules

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::{debug, info};

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
};
use crate::client::{CivoClient, Firewall, FirewallConfig, FirewallRule};
use crate::utils::{
    Attributes, ObjectRef, changed, get_blocks, get_bool, get_str, get_string_list, require_str,
    set_str,
};

pub struct FirewallHandler;

const RULE_BLOCKS: [(&str, &str); 2] = [("ingress_rule", "ingress"), ("egress_rule", "egress")];

fn rule_block_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(vec![
        AttributeSchema::new("id", AttributeType::String).computed(),
        AttributeSchema::new("label", AttributeType::String),
        AttributeSchema::new("protocol", types::one_of(&["tcp", "udp", "icmp"]))
            .with_default(Value::from("tcp")),
        AttributeSchema::new("port_range", AttributeType::String)
            .with_description("Single port or range such as 8000-8080"),
        AttributeSchema::new("cidr", types::string_list()).required(),
        AttributeSchema::new("action", types::one_of(&["allow", "deny"]))
            .with_default(Value::from("allow")),
    ])))
}

/// Split `80` or `8000-8080` into start and end ports
fn split_port_range(range: &str) -> (String, String) {
    match range.split_once('-') {
        Some((start, end)) => (start.trim().to_string(), end.trim().to_string()),
        None => (range.trim().to_string(), range.trim().to_string()),
    }
}

pub(crate) fn join_port_range(start: &str, end: &str) -> String {
    if end.is_empty() || start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

/// Rules declared in the `ingress_rule`/`egress_rule` blocks, in order
fn desired_rules(attrs: &Attributes) -> Vec<FirewallRule> {
    let mut rules = Vec::new();
    for (block, direction) in RULE_BLOCKS {
        for rule in get_blocks(attrs, block) {
            let (start_port, end_port) =
                split_port_range(&get_str(&rule, "port_range").unwrap_or_default());
            rules.push(FirewallRule {
                protocol: get_str(&rule, "protocol").unwrap_or_else(|| "tcp".to_string()),
                start_port,
                end_port,
                cidr: get_string_list(&rule, "cidr"),
                direction: direction.to_string(),
                action: get_str(&rule, "action").unwrap_or_else(|| "allow".to_string()),
                label: get_str(&rule, "label").unwrap_or_default(),
                ..Default::default()
            });
        }
    }
    rules
}

fn rule_block(rule: &FirewallRule) -> Value {
    let mut block = Attributes::new();
    set_str(&mut block, "id", &rule.id);
    set_str(&mut block, "label", &rule.label);
    set_str(&mut block, "protocol", &rule.protocol);
    set_str(
        &mut block,
        "port_range",
        &join_port_range(&rule.start_port, &rule.end_port),
    );
    block.insert("cidr".to_string(), Value::from(rule.cidr.clone()));
    set_str(&mut block, "action", &rule.action);
    Value::Map(block)
}

pub(crate) fn firewall_attributes(firewall: &Firewall, rules: &[FirewallRule]) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &firewall.name);
    set_str(&mut attrs, "network_id", &firewall.network_id);
    for (block, direction) in RULE_BLOCKS {
        let blocks = rules
            .iter()
            .filter(|r| r.direction == direction)
            .map(rule_block)
            .collect();
        attrs.insert(block.to_string(), Value::List(blocks));
    }
    attrs
}

impl FirewallHandler {
    async fn create_rules(
        &self,
        client: &CivoClient,
        id: &ResourceId,
        firewall_id: &str,
        rules: &[FirewallRule],
    ) -> ProviderResult<()> {
        for rule in rules {
            debug!(
                "Adding {} rule {} {} to firewall {}",
                rule.direction, rule.protocol, rule.start_port, firewall_id
            );
            client
                .create_firewall_rule(firewall_id, rule)
                .await
                .map_err(api_error(id, "create firewall rule"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for FirewallHandler {
    fn resource_type(&self) -> &'static str {
        "firewall"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("firewall")
            .with_description("A firewall; rule blocks replace the default rules")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("network_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("create_default_rules", AttributeType::Bool)
                    .with_default(Value::Bool(true))
                    .force_new()
                    .write_only()
                    .with_description("Open the default ports when no rule blocks are given"),
            )
            .attribute(AttributeSchema::new("ingress_rule", rule_block_type()).optional_computed())
            .attribute(AttributeSchema::new("egress_rule", rule_block_type()).optional_computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let rules = desired_rules(attrs);
        let config = FirewallConfig {
            name: require_str(id, attrs, "name")?,
            region: Some(client.region().to_string()),
            network_id: get_str(attrs, "network_id").unwrap_or_default(),
            create_rules: rules.is_empty() && get_bool(attrs, "create_default_rules").unwrap_or(true),
            rules: Vec::new(),
        };
        info!("Creating firewall {}", config.name);
        let created = client
            .create_firewall(&config)
            .await
            .map_err(api_error(id, "create firewall"))?;
        self.create_rules(&client, id, &created.id, &rules).await?;

        let object = ObjectRef::parse(&ctx.identifier(&client, &created.id));
        let state = self.read(ctx, id, &object).await?;
        if !state.exists {
            return Err(ProviderError::new("Firewall not found after create").for_resource(id.clone()));
        }
        Ok(state)
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let Some(firewall) = found(id, "read firewall", client.get_firewall(&object.id).await)? else {
            return Ok(State::not_found(id.clone()));
        };
        let rules = client
            .list_firewall_rules(&firewall.id)
            .await
            .map_err(api_error(id, "list firewall rules"))?;
        Ok(existing(ctx, &client, id, &firewall.id, firewall_attributes(&firewall, &rules)))
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let current = &from.attributes;

        if changed(current, attrs, "name") {
            client
                .rename_firewall(&object.id, &require_str(id, attrs, "name")?)
                .await
                .map_err(api_error(id, "rename firewall"))?;
        }

        if RULE_BLOCKS.iter().any(|(block, _)| changed(current, attrs, block)) {
            info!("Replacing rules of firewall {}", object.id);
            let existing_rules = client
                .list_firewall_rules(&object.id)
                .await
                .map_err(api_error(id, "list firewall rules"))?;
            for rule in existing_rules {
                client
                    .delete_firewall_rule(&object.id, &rule.id)
                    .await
                    .map_err(api_error(id, "delete firewall rule"))?;
            }
            self.create_rules(&client, id, &object.id, &desired_rules(attrs))
                .await?;
        }

        self.read(ctx, id, object).await
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(id, "delete firewall", client.delete_firewall(&object.id).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn rule(protocol: &str, ports: &str, cidr: &str) -> Value {
        Value::Map(
            [
                ("protocol".to_string(), Value::from(protocol)),
                ("port_range".to_string(), Value::from(ports)),
                ("cidr".to_string(), Value::List(vec![Value::from(cidr)])),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn port_ranges() {
        assert_eq!(split_port_range("80"), ("80".to_string(), "80".to_string()));
        assert_eq!(
            split_port_range("8000-8080"),
            ("8000".to_string(), "8080".to_string())
        );
        assert_eq!(join_port_range("80", "80"), "80");
        assert_eq!(join_port_range("80", ""), "80");
        assert_eq!(join_port_range("1", "65535"), "1-65535");
    }

    #[test]
    fn desired_rules_carry_direction_and_defaults() {
        let mut attrs = Attributes::new();
        attrs.insert(
            "ingress_rule".to_string(),
            Value::List(vec![rule("tcp", "443", "0.0.0.0/0")]),
        );
        attrs.insert(
            "egress_rule".to_string(),
            Value::List(vec![rule("udp", "1-65535", "0.0.0.0/0")]),
        );
        let rules = desired_rules(&attrs);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].direction, "ingress");
        assert_eq!(rules[0].action, "allow");
        assert_eq!(rules[1].direction, "egress");
        assert_eq!(rules[1].end_port, "65535");
    }

    #[tokio::test]
    async fn create_with_rules_skips_default_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/firewalls"))
            .and(body_partial_json(json!({"name": "web", "create_rules": false})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "fw-1", "result": "success"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/firewalls/fw-1/rules"))
            .and(body_partial_json(json!({
                "protocol": "tcp", "start_port": "443", "end_port": "443",
                "direction": "ingress", "cidr": ["0.0.0.0/0"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/firewalls/fw-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "fw-1", "name": "web"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/firewalls/fw-1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "r-1", "protocol": "tcp", "start_port": "443", "end_port": "443",
                "cidr": ["0.0.0.0/0"], "direction": "ingress", "action": "allow"
            }])))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let id = ResourceId::new("firewall", "web");
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("web"));
        attrs.insert(
            "ingress_rule".to_string(),
            Value::List(vec![rule("tcp", "443", "0.0.0.0/0")]),
        );

        let state = FirewallHandler.create(&ctx, &id, &attrs).await.unwrap();
        let ingress = state.attributes["ingress_rule"].as_list().unwrap();
        assert_eq!(ingress.len(), 1);
        assert_eq!(ingress[0].as_map().unwrap()["port_range"], Value::from("443"));
        assert_eq!(state.attributes["egress_rule"], Value::List(vec![]));
    }
}
