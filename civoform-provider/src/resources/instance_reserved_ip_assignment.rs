//! `civo.instance_reserved_ip_assignment` - bind a reserved IP to an instance

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, ResourceSchema, types};
use civoform_core::waiter::poll_until;
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error,
};
use crate::utils::{Attributes, ObjectRef, get_str, require_str, set_str};

pub struct InstanceReservedIpAssignmentHandler;

#[async_trait]
impl ResourceHandler for InstanceReservedIpAssignmentHandler {
    fn resource_type(&self) -> &'static str {
        "instance_reserved_ip_assignment"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("instance_reserved_ip_assignment")
            .with_description("Assigns a reserved IP to an instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("instance_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("reserved_ip_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let instance_id = require_str(id, attrs, "instance_id")?;
        let ip_id = require_str(id, attrs, "reserved_ip_id")?;

        info!("Assigning reserved IP {} to instance {}", ip_id, instance_id);
        client
            .assign_reserved_ip(&ip_id, &instance_id)
            .await
            .map_err(api_error(id, "assign reserved IP"))?;

        let (client_ref, ip_ref, instance_ref) = (&client, ip_id.as_str(), instance_id.as_str());
        poll_until(ctx.waits.timeout, ctx.waits.interval, move || async move {
            client_ref
                .get_reserved_ip(ip_ref)
                .await
                .map(|ip| ip.assigned_to.id == instance_ref)
        })
        .await
        .map_err(wait_error(id, "reserved IP to be assigned"))?;

        let mut state_attrs = Attributes::new();
        set_str(&mut state_attrs, "instance_id", &instance_id);
        set_str(&mut state_attrs, "reserved_ip_id", &ip_id);
        Ok(existing(ctx, &client, id, &ip_id, state_attrs))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let Some(ip) = found(id, "read reserved IP", client.get_reserved_ip(&object.id).await)? else {
            return Ok(State::not_found(id.clone()));
        };
        if ip.assigned_to.id.is_empty() {
            return Ok(State::not_found(id.clone()));
        }
        let mut attrs = Attributes::new();
        set_str(&mut attrs, "instance_id", &ip.assigned_to.id);
        set_str(&mut attrs, "reserved_ip_id", &ip.id);
        Ok(existing(ctx, &client, id, &ip.id, attrs))
    }

    async fn update(
        &self,
        _ctx: &Context,
        id: &ResourceId,
        _object: &ObjectRef,
        _from: &State,
        _attrs: &Attributes,
    ) -> ProviderResult<State> {
        Err(ProviderError::new("Reserved IP assignments cannot be updated in place")
            .for_resource(id.clone()))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        info!("Unassigning reserved IP {}", object.id);
        found(id, "unassign reserved IP", client.unassign_reserved_ip(&object.id).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use civoform_core::resource::Value;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    #[tokio::test]
    async fn assign_polls_until_bound() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ips/ip-1/actions"))
            .and(body_partial_json(json!({
                "action": "assign", "resource": {"id": "i-1", "type": "instance"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/ips/ip-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "ip-1", "ip": "74.220.0.9", "assigned_to": {}})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/ips/ip-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ip-1", "ip": "74.220.0.9",
                "assigned_to": {"id": "i-1", "type": "instance", "name": "web"}
            })))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let id = ResourceId::new("instance_reserved_ip_assignment", "web");
        let mut attrs = Attributes::new();
        attrs.insert("instance_id".to_string(), Value::from("i-1"));
        attrs.insert("reserved_ip_id".to_string(), Value::from("ip-1"));

        let state = InstanceReservedIpAssignmentHandler
            .create(&ctx, &id, &attrs)
            .await
            .unwrap();
        assert_eq!(state.identifier.as_deref(), Some("ip-1"));

        let read = InstanceReservedIpAssignmentHandler
            .read(&ctx, &id, &ObjectRef::parse("ip-1"))
            .await
            .unwrap();
        assert_eq!(read.attributes["instance_id"], Value::from("i-1"));
    }
}
