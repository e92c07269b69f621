//! `civo.dns_domain_name` - DNS zones (not regional)

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{Context, ResourceHandler, api_error, found, id_attribute};
use crate::client::DnsDomain;
use crate::utils::{Attributes, ObjectRef, changed, require_str, set_str};

pub struct DnsDomainNameHandler;

pub(crate) fn domain_attributes(domain: &DnsDomain) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "id", &domain.id);
    set_str(&mut attrs, "name", &domain.name);
    set_str(&mut attrs, "account_id", &domain.account_id);
    attrs
}

fn domain_state(id: &ResourceId, domain: &DnsDomain) -> State {
    State::existing(id.clone(), domain_attributes(domain)).with_identifier(domain.id.clone())
}

#[async_trait]
impl ResourceHandler for DnsDomainNameHandler {
    fn resource_type(&self) -> &'static str {
        "dns_domain_name"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("dns_domain_name")
            .with_description("A DNS domain hosted by Civo")
            .attribute(id_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(AttributeSchema::new("account_id", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let name = require_str(id, attrs, "name")?;
        info!("Creating DNS domain {}", name);
        let domain = ctx
            .client
            .create_dns_domain(&name)
            .await
            .map_err(api_error(id, "create DNS domain"))?;
        Ok(domain_state(id, &domain))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        Ok(
            match found(id, "read DNS domain", ctx.client.get_dns_domain(&object.id).await)? {
                Some(domain) => domain_state(id, &domain),
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
        let domain = ctx
            .client
            .rename_dns_domain(&object.id, &require_str(id, attrs, "name")?)
            .await
            .map_err(api_error(id, "rename DNS domain"))?;
        Ok(domain_state(id, &domain))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        found(id, "delete DNS domain", ctx.client.delete_dns_domain(&object.id).await)?;
        Ok(())
    }
}
