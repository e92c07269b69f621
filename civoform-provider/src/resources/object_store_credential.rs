//! `civo.object_store_credential` - access keys for object stores

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
};
use crate::client::{ObjectStoreCredential, ObjectStoreCredentialConfig};
use crate::utils::{Attributes, ObjectRef, changed, get_int, get_str, require_str, set, set_str};

pub struct ObjectStoreCredentialHandler;

pub(crate) fn credential_attributes(credential: &ObjectStoreCredential) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &credential.name);
    set_str(&mut attrs, "access_key_id", &credential.access_key_id);
    set_str(&mut attrs, "secret_access_key", &credential.secret_access_key);
    if credential.max_size_gb != 0 {
        set(&mut attrs, "max_size_gb", credential.max_size_gb);
    }
    set(&mut attrs, "suspended", credential.suspended);
    set_str(&mut attrs, "status", &credential.status);
    attrs
}

fn credential_config(
    id: &ResourceId,
    attrs: &Attributes,
    region: Option<String>,
) -> ProviderResult<ObjectStoreCredentialConfig> {
    Ok(ObjectStoreCredentialConfig {
        name: require_str(id, attrs, "name")?,
        access_key_id: get_str(attrs, "access_key_id").unwrap_or_default(),
        secret_access_key: get_str(attrs, "secret_access_key").unwrap_or_default(),
        max_size_gb: get_int(attrs, "max_size_gb"),
        region,
    })
}

#[async_trait]
impl ResourceHandler for ObjectStoreCredentialHandler {
    fn resource_type(&self) -> &'static str {
        "object_store_credential"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("object_store_credential")
            .with_description("An access key pair for object stores")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("access_key_id", AttributeType::String).optional_computed(),
            )
            .attribute(
                AttributeSchema::new("secret_access_key", AttributeType::String)
                    .optional_computed()
                    .sensitive()
                    .with_description("Generated by Civo when omitted"),
            )
            .attribute(AttributeSchema::new("max_size_gb", types::positive_int()))
            .attribute(AttributeSchema::new("suspended", AttributeType::Bool).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = credential_config(id, attrs, Some(client.region().to_string()))?;
        info!("Creating object store credential {}", config.name);
        let credential = client
            .create_object_store_credential(&config)
            .await
            .map_err(api_error(id, "create object store credential"))?;
        Ok(existing(ctx, &client, id, &credential.id, credential_attributes(&credential)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(
                id,
                "read object store credential",
                client.get_object_store_credential(&object.id).await,
            )? {
                Some(credential) => {
                    existing(ctx, &client, id, &credential.id, credential_attributes(&credential))
                }
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
        let current = &from.attributes;
        if !["name", "access_key_id", "secret_access_key", "max_size_gb"]
            .iter()
            .any(|key| changed(current, attrs, key))
        {
            return Ok(from.clone());
        }
        let client = ctx.client_for_object(object);
        let config = credential_config(id, attrs, None)?;
        info!("Updating object store credential {}", object.id);
        let credential = client
            .update_object_store_credential(&object.id, &config)
            .await
            .map_err(api_error(id, "update object store credential"))?;
        Ok(existing(ctx, &client, id, &credential.id, credential_attributes(&credential)))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(
            id,
            "delete object store credential",
            client.delete_object_store_credential(&object.id).await,
        )?;
        Ok(())
    }
}
