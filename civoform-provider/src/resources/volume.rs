//! `civo.volume` - block storage volumes

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, with_status,
};
use crate::client::{Volume, VolumeConfig};
use crate::utils::{Attributes, ObjectRef, changed, get_int, get_str, require_int, require_str, set, set_str};

pub struct VolumeHandler;

pub(crate) fn volume_attributes(volume: &Volume) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &volume.name);
    set(&mut attrs, "size_gb", volume.size_gb);
    set_str(&mut attrs, "network_id", &volume.network_id);
    set_str(&mut attrs, "mount_point", &volume.mount_point);
    set_str(&mut attrs, "status", &volume.status);
    attrs
}

#[async_trait]
impl ResourceHandler for VolumeHandler {
    fn resource_type(&self) -> &'static str {
        "volume"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("volume")
            .with_description("A block storage volume")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("size_gb", types::int_at_least("size_gb", 1))
                    .required()
                    .with_description("Size in GB; volumes can only grow"),
            )
            .attribute(
                AttributeSchema::new("network_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("mount_point", AttributeType::String).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = VolumeConfig {
            name: require_str(id, attrs, "name")?,
            size_gb: require_int(id, attrs, "size_gb")?,
            network_id: require_str(id, attrs, "network_id")?,
            region: Some(client.region().to_string()),
        };
        info!("Creating volume {} ({} GB)", config.name, config.size_gb);
        let created = client
            .create_volume(&config)
            .await
            .map_err(api_error(id, "create volume"))?;

        let volume_id = created.id.as_str();
        let client_ref = &client;
        let volume = ctx
            .waits
            .conf(&["creating", "pending"], &["available"])
            .wait_for_state(move || async move {
                with_status(client_ref.get_volume(volume_id).await, |v| v.status.clone())
            })
            .await
            .map_err(wait_error(id, "volume to become available"))?;

        Ok(existing(ctx, &client, id, &volume.id, volume_attributes(&volume)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read volume", client.get_volume(&object.id).await)? {
                Some(volume) => existing(ctx, &client, id, &volume.id, volume_attributes(&volume)),
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
        if changed(&from.attributes, attrs, "size_gb") {
            let size = require_int(id, attrs, "size_gb")?;
            let current = get_int(&from.attributes, "size_gb").unwrap_or(0);
            if size < current {
                return Err(ProviderError::new(format!(
                    "Volumes cannot shrink ({} GB -> {} GB)",
                    current, size
                ))
                .for_resource(id.clone()));
            }
            info!("Resizing volume {} to {} GB", object.id, size);
            ctx.client_for_object(object)
                .resize_volume(&object.id, size)
                .await
                .map_err(api_error(id, "resize volume"))?;
        }
        self.read(ctx, id, object).await
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        found(id, "delete volume", client.delete_volume(&object.id).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use civoform_core::resource::Value;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    #[tokio::test]
    async fn shrinking_is_rejected() {
        let server = MockServer::start().await;
        let ctx = context(&server);
        let id = ResourceId::new("volume", "data");
        let mut current = Attributes::new();
        current.insert("size_gb".to_string(), Value::Int(50));
        let from = State::existing(id.clone(), current);
        let mut attrs = Attributes::new();
        attrs.insert("size_gb".to_string(), Value::Int(20));

        let err = VolumeHandler
            .update(&ctx, &id, &ObjectRef::parse("v-1"), &from, &attrs)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot shrink"));
    }

    #[tokio::test]
    async fn create_waits_until_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/volumes"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "v-1", "result": "success"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/v-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "v-1", "name": "data", "size_gb": 20, "network_id": "net-1", "status": "creating"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/v-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "v-1", "name": "data", "size_gb": 20, "network_id": "net-1", "status": "available"
            })))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("data"));
        attrs.insert("size_gb".to_string(), Value::Int(20));
        attrs.insert("network_id".to_string(), Value::from("net-1"));

        let state = VolumeHandler
            .create(&ctx, &ResourceId::new("volume", "data"), &attrs)
            .await
            .unwrap();
        assert_eq!(state.attributes["status"], Value::from("available"));
        assert_eq!(state.attributes["size_gb"], Value::Int(20));
    }
}
