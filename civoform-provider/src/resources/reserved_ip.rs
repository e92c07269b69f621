//! `civo.reserved_ip` - reserved public IPv4 addresses

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
};
use crate::client::ReservedIp;
use crate::utils::{Attributes, ObjectRef, changed, get_str, require_str, set_str};

pub struct ReservedIpHandler;

pub(crate) fn reserved_ip_attributes(ip: &ReservedIp) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &ip.name);
    set_str(&mut attrs, "ip", &ip.ip);
    set_str(&mut attrs, "instance_id", &ip.assigned_to.id);
    set_str(&mut attrs, "instance_name", &ip.assigned_to.name);
    attrs
}

#[async_trait]
impl ResourceHandler for ReservedIpHandler {
    fn resource_type(&self) -> &'static str {
        "reserved_ip"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("reserved_ip")
            .with_description("A reserved public IP address")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(AttributeSchema::new("ip", AttributeType::String).computed())
            .attribute(AttributeSchema::new("instance_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("instance_name", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let name = require_str(id, attrs, "name")?;
        info!("Reserving IP {}", name);
        let ip = client
            .create_reserved_ip(&name)
            .await
            .map_err(api_error(id, "create reserved IP"))?;
        Ok(existing(ctx, &client, id, &ip.id, reserved_ip_attributes(&ip)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read reserved IP", client.get_reserved_ip(&object.id).await)? {
                Some(ip) => existing(ctx, &client, id, &ip.id, reserved_ip_attributes(&ip)),
                None => State::not_found(id.clone()),
            },
        )
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        if !changed(&from.attributes, attrs, "name") {
            return Ok(from.clone());
        }
        let client = ctx.client_for_object(object);
        let ip = client
            .rename_reserved_ip(&object.id, &require_str(id, attrs, "name")?)
            .await
            .map_err(api_error(id, "rename reserved IP"))?;
        Ok(existing(ctx, &client, id, &ip.id, reserved_ip_attributes(&ip)))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(id, "delete reserved IP", client.delete_reserved_ip(&object.id).await)?;
        Ok(())
    }
}
