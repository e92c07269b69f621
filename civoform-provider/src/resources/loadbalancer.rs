//! `civo.loadbalancer` - load balancers with inline backends

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, wait_until_gone, with_status,
};
use crate::client::{CivoClient, LoadBalancer, LoadBalancerBackend, LoadBalancerConfig};
use crate::utils::{Attributes, ObjectRef, get_blocks, get_int, get_str, require_str, set, set_str};

pub const ALGORITHMS: [&str; 2] = ["round_robin", "least_connections"];
pub const TRAFFIC_POLICIES: [&str; 2] = ["Cluster", "Local"];
pub const PROXY_PROTOCOLS: [&str; 3] = ["", "send-proxy", "send-proxy-v2"];

pub struct LoadBalancerHandler;

fn backend_block_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(vec![
        AttributeSchema::new("ip", types::non_empty_string()).required(),
        AttributeSchema::new("protocol", types::one_of(&["TCP", "UDP"]))
            .with_default(Value::from("TCP")),
        AttributeSchema::new("source_port", types::int_between("source_port", 1, 65535)).required(),
        AttributeSchema::new("target_port", types::int_between("target_port", 1, 65535)).required(),
        AttributeSchema::new("health_check_port", types::int_between("health_check_port", 1, 65535)),
    ])))
}

fn desired_backends(attrs: &Attributes) -> Vec<LoadBalancerBackend> {
    get_blocks(attrs, "backend")
        .iter()
        .map(|b| LoadBalancerBackend {
            ip: get_str(b, "ip").unwrap_or_default(),
            protocol: get_str(b, "protocol").unwrap_or_else(|| "TCP".to_string()),
            source_port: get_int(b, "source_port").unwrap_or_default(),
            target_port: get_int(b, "target_port").unwrap_or_default(),
            health_check_port: get_int(b, "health_check_port").unwrap_or_default(),
        })
        .collect()
}

fn backend_block(backend: &LoadBalancerBackend) -> Value {
    let mut block = Attributes::new();
    set_str(&mut block, "ip", &backend.ip);
    set_str(&mut block, "protocol", &backend.protocol);
    set(&mut block, "source_port", backend.source_port);
    set(&mut block, "target_port", backend.target_port);
    if backend.health_check_port != 0 {
        set(&mut block, "health_check_port", backend.health_check_port);
    }
    Value::Map(block)
}

fn loadbalancer_config(id: &ResourceId, client: &CivoClient, attrs: &Attributes) -> ProviderResult<LoadBalancerConfig> {
    Ok(LoadBalancerConfig {
        name: require_str(id, attrs, "name")?,
        region: Some(client.region().to_string()),
        service_name: get_str(attrs, "service_name").unwrap_or_default(),
        network_id: get_str(attrs, "network_id").unwrap_or_default(),
        algorithm: get_str(attrs, "algorithm").unwrap_or_default(),
        backends: desired_backends(attrs),
        external_traffic_policy: get_str(attrs, "external_traffic_policy").unwrap_or_default(),
        session_affinity: get_str(attrs, "session_affinity").unwrap_or_default(),
        session_affinity_config_timeout: get_int(attrs, "session_affinity_config_timeout")
            .unwrap_or_default(),
        enable_proxy_protocol: get_str(attrs, "enable_proxy_protocol").unwrap_or_default(),
        firewall_id: get_str(attrs, "firewall_id").unwrap_or_default(),
        cluster_id: get_str(attrs, "cluster_id").unwrap_or_default(),
        max_concurrent_requests: get_int(attrs, "max_concurrent_requests").unwrap_or_default(),
    })
}

pub(crate) fn loadbalancer_attributes(lb: &LoadBalancer) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &lb.name);
    set_str(&mut attrs, "service_name", &lb.service_name);
    set_str(&mut attrs, "network_id", &lb.network_id);
    set_str(&mut attrs, "algorithm", &lb.algorithm);
    set_str(&mut attrs, "external_traffic_policy", &lb.external_traffic_policy);
    set_str(&mut attrs, "session_affinity", &lb.session_affinity);
    if lb.session_affinity_config_timeout != 0 {
        set(&mut attrs, "session_affinity_config_timeout", lb.session_affinity_config_timeout);
    }
    set_str(&mut attrs, "enable_proxy_protocol", &lb.enable_proxy_protocol);
    set_str(&mut attrs, "firewall_id", &lb.firewall_id);
    set_str(&mut attrs, "cluster_id", &lb.cluster_id);
    if lb.max_concurrent_requests != 0 {
        set(&mut attrs, "max_concurrent_requests", lb.max_concurrent_requests);
    }
    attrs.insert(
        "backend".to_string(),
        Value::List(lb.backends.iter().map(backend_block).collect()),
    );
    set_str(&mut attrs, "public_ip", &lb.public_ip);
    set_str(&mut attrs, "private_ip", &lb.private_ip);
    set_str(&mut attrs, "state", &lb.state);
    attrs
}

impl LoadBalancerHandler {
    async fn wait_available(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        lb_id: &str,
    ) -> ProviderResult<LoadBalancer> {
        ctx.waits
            .conf(&["pending", "creating", "updating"], &["available"])
            .wait_for_state(move || async move {
                with_status(client.get_loadbalancer(lb_id).await, |lb| lb.state.clone())
            })
            .await
            .map_err(wait_error(id, "load balancer to become available"))
    }
}

#[async_trait]
impl ResourceHandler for LoadBalancerHandler {
    fn resource_type(&self) -> &'static str {
        "loadbalancer"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("loadbalancer")
            .with_description("A load balancer in front of instance or cluster backends")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(AttributeSchema::new("service_name", AttributeType::String))
            .attribute(
                AttributeSchema::new("network_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("algorithm", types::one_of(&ALGORITHMS))
                    .with_default(Value::from("round_robin")),
            )
            .attribute(AttributeSchema::new("session_affinity", AttributeType::String))
            .attribute(AttributeSchema::new(
                "session_affinity_config_timeout",
                types::positive_int(),
            ))
            .attribute(
                AttributeSchema::new("external_traffic_policy", types::one_of(&TRAFFIC_POLICIES))
                    .optional_computed(),
            )
            .attribute(AttributeSchema::new("enable_proxy_protocol", types::one_of(&PROXY_PROTOCOLS)))
            .attribute(
                AttributeSchema::new("firewall_id", AttributeType::String).optional_computed(),
            )
            .attribute(
                AttributeSchema::new("cluster_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("max_concurrent_requests", types::positive_int()))
            .attribute(AttributeSchema::new("backend", backend_block_type()))
            .attribute(AttributeSchema::new("public_ip", AttributeType::String).computed())
            .attribute(AttributeSchema::new("private_ip", AttributeType::String).computed())
            .attribute(AttributeSchema::new("state", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = loadbalancer_config(id, &client, attrs)?;
        info!(
            "Creating load balancer {} with {} backends",
            config.name,
            config.backends.len()
        );
        let created = client
            .create_loadbalancer(&config)
            .await
            .map_err(api_error(id, "create load balancer"))?;
        let lb = self.wait_available(ctx, &client, id, &created.id).await?;
        Ok(existing(ctx, &client, id, &lb.id, loadbalancer_attributes(&lb)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read load balancer", client.get_loadbalancer(&object.id).await)? {
                Some(lb) => existing(ctx, &client, id, &lb.id, loadbalancer_attributes(&lb)),
                None => State::not_found(id.clone()),
            },
        )
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        _from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let mut config = loadbalancer_config(id, &client, attrs)?;
        // Placement cannot change after creation
        config.region = None;
        config.network_id.clear();
        config.cluster_id.clear();

        info!("Updating load balancer {}", object.id);
        client
            .update_loadbalancer(&object.id, &config)
            .await
            .map_err(api_error(id, "update load balancer"))?;
        let lb = self.wait_available(ctx, &client, id, &object.id).await?;
        Ok(existing(ctx, &client, id, &lb.id, loadbalancer_attributes(&lb)))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        info!("Deleting load balancer {}", object.id);
        if found(id, "delete load balancer", client.delete_loadbalancer(&object.id).await)?
            .is_none()
        {
            return Ok(());
        }
        wait_until_gone(ctx, id, "load balancer", || client.get_loadbalancer(&object.id)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn backend(ip: &str, port: i64) -> Value {
        let mut block = Attributes::new();
        block.insert("ip".to_string(), Value::from(ip));
        block.insert("source_port".to_string(), Value::Int(80));
        block.insert("target_port".to_string(), Value::Int(port));
        Value::Map(block)
    }

    #[test]
    fn namespaced_algorithm_normalizes() {
        let schema = LoadBalancerHandler.schema();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("web"));
        attrs.insert(
            "algorithm".to_string(),
            Value::from("civo.loadbalancer.Algorithm.least_connections"),
        );
        assert!(schema.validate(&attrs).is_ok());
        schema.normalize_enums(&mut attrs);
        assert_eq!(attrs["algorithm"], Value::from("least_connections"));
    }

    #[test]
    fn backends_default_to_tcp() {
        let mut attrs = Attributes::new();
        attrs.insert(
            "backend".to_string(),
            Value::List(vec![backend("10.0.0.1", 8080), backend("10.0.0.2", 8080)]),
        );
        let backends = desired_backends(&attrs);
        assert_eq!(backends.len(), 2);
        assert!(backends.iter().all(|b| b.protocol == "TCP" && b.health_check_port == 0));
    }

    #[tokio::test]
    async fn create_waits_until_available() {
        let server = MockServer::start().await;
        let lb = |state: &str| {
            json!({
                "id": "lb-1", "name": "web", "algorithm": "round_robin", "state": state,
                "public_ip": "74.220.1.1",
                "backends": [{"ip": "10.0.0.1", "protocol": "TCP", "source_port": 80, "target_port": 8080}]
            })
        };
        Mock::given(method("POST"))
            .and(path("/v2/loadbalancers"))
            .and(body_partial_json(json!({
                "name": "web", "algorithm": "round_robin",
                "backends": [{"ip": "10.0.0.1", "source_port": 80, "target_port": 8080}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/loadbalancers/lb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb("pending")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/loadbalancers/lb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lb("available")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("web"));
        attrs.insert("algorithm".to_string(), Value::from("round_robin"));
        attrs.insert("backend".to_string(), Value::List(vec![backend("10.0.0.1", 8080)]));

        let state = LoadBalancerHandler
            .create(&ctx, &ResourceId::new("loadbalancer", "web"), &attrs)
            .await
            .unwrap();
        assert_eq!(state.attributes["state"], Value::from("available"));
        assert_eq!(state.attributes["public_ip"], Value::from("74.220.1.1"));
        assert_eq!(state.attributes["backend"].as_list().map(|b| b.len()), Some(1));
    }
}
