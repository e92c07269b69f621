//! `civo.volume_attachment` - attach a volume to an instance

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    split_pair, wait_error, with_status,
};
use crate::client::CivoClient;
use crate::utils::{Attributes, ObjectRef, get_bool, get_str, require_str, set, set_str};

pub struct VolumeAttachmentHandler;

impl VolumeAttachmentHandler {
    async fn wait_for_volume(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        volume_id: &str,
        pending: &[&str],
        target: &str,
    ) -> ProviderResult<()> {
        ctx.waits
            .conf(pending, &[target])
            .wait_for_state(move || async move {
                with_status(client.get_volume(volume_id).await, |v| v.status.clone())
            })
            .await
            .map(|_| ())
            .map_err(wait_error(id, &format!("volume to become {}", target)))
    }
}

#[async_trait]
impl ResourceHandler for VolumeAttachmentHandler {
    fn resource_type(&self) -> &'static str {
        "volume_attachment"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("volume_attachment")
            .with_description("Attaches a volume to an instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("instance_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("volume_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("attach_at_boot", civoform_core::schema::AttributeType::Bool)
                    .with_default(Value::Bool(false))
                    .force_new()
                    .write_only(),
            )
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let instance_id = require_str(id, attrs, "instance_id")?;
        let volume_id = require_str(id, attrs, "volume_id")?;
        let attach_at_boot = get_bool(attrs, "attach_at_boot").unwrap_or(false);

        info!("Attaching volume {} to instance {}", volume_id, instance_id);
        client
            .attach_volume(&volume_id, &instance_id, attach_at_boot)
            .await
            .map_err(api_error(id, "attach volume"))?;
        // Volumes attached at boot only show as attached after the instance restarts
        if !attach_at_boot {
            self.wait_for_volume(ctx, &client, id, &volume_id, &["available", "attaching"], "attached")
                .await?;
        }

        let mut state_attrs = Attributes::new();
        set_str(&mut state_attrs, "instance_id", &instance_id);
        set_str(&mut state_attrs, "volume_id", &volume_id);
        set(&mut state_attrs, "attach_at_boot", attach_at_boot);
        let object_id = format!("{}:{}", volume_id, instance_id);
        Ok(existing(ctx, &client, id, &object_id, state_attrs))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let (volume_id, instance_id) = split_pair(id, &object.id)?;
        let Some(volume) = found(id, "read volume", client.get_volume(&volume_id).await)? else {
            return Ok(State::not_found(id.clone()));
        };
        if volume.instance_id != instance_id {
            return Ok(State::not_found(id.clone()));
        }
        let mut attrs = Attributes::new();
        set_str(&mut attrs, "instance_id", &volume.instance_id);
        set_str(&mut attrs, "volume_id", &volume.id);
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
        Err(ProviderError::new("Volume attachments cannot be updated in place").for_resource(id.clone()))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        let (volume_id, _) = split_pair(id, &object.id)?;
        info!("Detaching volume {}", volume_id);
        if found(id, "detach volume", client.detach_volume(&volume_id).await)?.is_none() {
            return Ok(());
        }
        self.wait_for_volume(ctx, &client, id, &volume_id, &["attached", "detaching"], "available")
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn volume(status: &str, instance_id: &str) -> serde_json::Value {
        json!({"id": "v-1", "name": "data", "status": status, "instance_id": instance_id})
    }

    #[tokio::test]
    async fn attach_waits_until_attached() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/volumes/v-1/attach"))
            .and(body_partial_json(json!({"instance_id": "i-1", "attach_at_boot": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/v-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume("attaching", "i-1")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/v-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume("attached", "i-1")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let id = ResourceId::new("volume_attachment", "data");
        let mut attrs = Attributes::new();
        attrs.insert("instance_id".to_string(), Value::from("i-1"));
        attrs.insert("volume_id".to_string(), Value::from("v-1"));

        let state = VolumeAttachmentHandler.create(&ctx, &id, &attrs).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("v-1:i-1"));

        let read = VolumeAttachmentHandler
            .read(&ctx, &id, &ObjectRef::parse("v-1:i-1"))
            .await
            .unwrap();
        assert!(read.exists);
        let other = VolumeAttachmentHandler
            .read(&ctx, &id, &ObjectRef::parse("v-1:i-2"))
            .await
            .unwrap();
        assert!(!other.exists);
    }

    #[tokio::test]
    async fn detach_waits_until_available() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/volumes/v-1/detach"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/v-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume("available", "")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        VolumeAttachmentHandler
            .delete(
                &ctx,
                &ResourceId::new("volume_attachment", "data"),
                &ObjectRef::parse("v-1:i-1"),
            )
            .await
            .unwrap();
    }
}
