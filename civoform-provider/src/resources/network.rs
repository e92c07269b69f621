//! `civo.network` - private networks

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
};
use crate::client::{Network, NetworkConfig};
use crate::utils::{Attributes, ObjectRef, changed, get_str, get_string_list, require_str, set, set_str};

pub struct NetworkHandler;

pub(crate) fn network_attributes(network: &Network) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "label", &network.label);
    set_str(&mut attrs, "name", &network.name);
    set_str(&mut attrs, "cidr_v4", &network.cidr);
    set(&mut attrs, "nameservers_v4", network.nameservers_v4.clone());
    set(&mut attrs, "default", network.default);
    attrs
}

#[async_trait]
impl ResourceHandler for NetworkHandler {
    fn resource_type(&self) -> &'static str {
        "network"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("network")
            .with_description("A private network")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("label", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("cidr_v4", types::cidr())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("nameservers_v4", types::string_list())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("name", AttributeType::String).computed())
            .attribute(AttributeSchema::new("default", AttributeType::Bool).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = NetworkConfig {
            label: require_str(id, attrs, "label")?,
            region: Some(client.region().to_string()),
            cidr_v4: get_str(attrs, "cidr_v4").unwrap_or_default(),
            nameservers_v4: get_string_list(attrs, "nameservers_v4"),
        };
        info!("Creating network {}", config.label);
        let created = client
            .create_network(&config)
            .await
            .map_err(api_error(id, "create network"))?;

        let network = client
            .get_network(&created.id)
            .await
            .map_err(api_error(id, "read network"))?;
        Ok(existing(ctx, &client, id, &network.id, network_attributes(&network)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read network", client.get_network(&object.id).await)? {
                Some(network) => existing(ctx, &client, id, &network.id, network_attributes(&network)),
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
        if changed(&from.attributes, attrs, "label") {
            let label = require_str(id, attrs, "label")?;
            ctx.client_for_object(object)
                .rename_network(&object.id, &label)
                .await
                .map_err(api_error(id, "rename network"))?;
        }
        self.read(ctx, id, object).await
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(id, "delete network", client.delete_network(&object.id).await)?;
        Ok(())
    }
}
