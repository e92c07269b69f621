//! `civo.ssh_key` - SSH public keys for instance access

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
};
use crate::client::SshKey;
use crate::utils::{Attributes, ObjectRef, changed, get_str, require_str, set_str};

pub struct SshKeyHandler;

pub(crate) fn key_attributes(key: &SshKey) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &key.name);
    set_str(&mut attrs, "public_key", &key.public_key);
    set_str(&mut attrs, "fingerprint", &key.fingerprint);
    attrs
}

#[async_trait]
impl ResourceHandler for SshKeyHandler {
    fn resource_type(&self) -> &'static str {
        "ssh_key"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("ssh_key")
            .with_description("An SSH public key")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("public_key", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("fingerprint", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let name = require_str(id, attrs, "name")?;
        info!("Uploading SSH key {}", name);
        let created = client
            .create_ssh_key(&name, &require_str(id, attrs, "public_key")?)
            .await
            .map_err(api_error(id, "create SSH key"))?;
        let key = client
            .get_ssh_key(&created.id)
            .await
            .map_err(api_error(id, "read SSH key"))?;
        Ok(existing(ctx, &client, id, &key.id, key_attributes(&key)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read SSH key", client.get_ssh_key(&object.id).await)? {
                Some(key) => existing(ctx, &client, id, &key.id, key_attributes(&key)),
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
        if changed(&from.attributes, attrs, "name") {
            let client = ctx.client_for_object(object);
            let key = client
                .rename_ssh_key(&object.id, &require_str(id, attrs, "name")?)
                .await
                .map_err(api_error(id, "rename SSH key"))?;
            return Ok(existing(ctx, &client, id, &key.id, key_attributes(&key)));
        }
        Ok(from.clone())
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(id, "delete SSH key", client.delete_ssh_key(&object.id).await)?;
        Ok(())
    }
}
