//! `civo.object_store` - S3-compatible buckets

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, wait_until_gone, with_status,
};
use crate::client::{CivoClient, ObjectStore, ObjectStoreConfig};
use crate::utils::{Attributes, ObjectRef, changed, get_int, get_str, require_int, require_str, set, set_str};

/// Buckets are sold in blocks of this many GB
pub const SIZE_STEP_GB: i64 = 500;

pub struct ObjectStoreHandler;

fn size_type() -> AttributeType {
    AttributeType::Custom {
        name: "ObjectStoreSize".to_string(),
        base: Box::new(AttributeType::Int),
        validate: Validator::new(|value| match value {
            Value::Int(n) if *n <= 0 || n % SIZE_STEP_GB != 0 => Err(format!(
                "Value must be a positive multiple of {}, got {}",
                SIZE_STEP_GB, n
            )),
            _ => Ok(()),
        }),
    }
}

pub(crate) fn object_store_attributes(store: &ObjectStore) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &store.name);
    set(&mut attrs, "max_size_gb", store.max_size);
    set_str(&mut attrs, "access_key_id", &store.owner_info.access_key_id);
    set_str(&mut attrs, "bucket_url", &store.endpoint);
    set_str(&mut attrs, "status", &store.status);
    attrs
}

impl ObjectStoreHandler {
    async fn wait_ready(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        store_id: &str,
    ) -> ProviderResult<ObjectStore> {
        ctx.waits
            .conf(&["pending", "creating", "resizing"], &["ready"])
            .wait_for_state(move || async move {
                with_status(client.get_object_store(store_id).await, |s| {
                    s.status.to_lowercase()
                })
            })
            .await
            .map_err(wait_error(id, "object store to become ready"))
    }
}

#[async_trait]
impl ResourceHandler for ObjectStoreHandler {
    fn resource_type(&self) -> &'static str {
        "object_store"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("object_store")
            .with_description("An S3-compatible object store")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("name", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("max_size_gb", size_type())
                    .with_default(Value::Int(SIZE_STEP_GB)),
            )
            .attribute(
                AttributeSchema::new("access_key_id", AttributeType::String)
                    .optional_computed()
                    .force_new()
                    .with_description("Access key of an existing credential; a new one is generated otherwise"),
            )
            .attribute(AttributeSchema::new("bucket_url", AttributeType::String).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let config = ObjectStoreConfig {
            name: require_str(id, attrs, "name")?,
            max_size_gb: get_int(attrs, "max_size_gb").unwrap_or(SIZE_STEP_GB),
            access_key_id: get_str(attrs, "access_key_id").unwrap_or_default(),
            region: Some(client.region().to_string()),
        };
        info!("Creating object store {} ({} GB)", config.name, config.max_size_gb);
        let created = client
            .create_object_store(&config)
            .await
            .map_err(api_error(id, "create object store"))?;
        let store = self.wait_ready(ctx, &client, id, &created.id).await?;
        Ok(existing(ctx, &client, id, &store.id, object_store_attributes(&store)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(id, "read object store", client.get_object_store(&object.id).await)? {
                Some(store) => existing(ctx, &client, id, &store.id, object_store_attributes(&store)),
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
        if !changed(&from.attributes, attrs, "max_size_gb") {
            return Ok(from.clone());
        }
        let client = ctx.client_for_object(object);
        let size = require_int(id, attrs, "max_size_gb")?;
        info!("Resizing object store {} to {} GB", object.id, size);
        client
            .resize_object_store(&object.id, size)
            .await
            .map_err(api_error(id, "resize object store"))?;
        let store = self.wait_ready(ctx, &client, id, &object.id).await?;
        Ok(existing(ctx, &client, id, &store.id, object_store_attributes(&store)))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        if found(id, "delete object store", client.delete_object_store(&object.id).await)?
            .is_none()
        {
            return Ok(());
        }
        wait_until_gone(ctx, id, "object store", || client.get_object_store(&object.id)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    #[test]
    fn size_must_be_multiple_of_step() {
        let schema = ObjectStoreHandler.schema();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("assets"));
        attrs.insert("max_size_gb".to_string(), Value::Int(750));
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(errors[0].to_string().contains("multiple of 500"));

        attrs.insert("max_size_gb".to_string(), Value::Int(1000));
        assert!(schema.validate(&attrs).is_ok());
    }

    #[tokio::test]
    async fn create_reports_bucket_url() {
        let server = MockServer::start().await;
        let store = |status: &str| {
            json!({
                "id": "os-1", "name": "assets", "max_size": 500, "status": status,
                "objectstore_endpoint": "objectstore.lon1.civo.com",
                "owner_info": {"access_key_id": "AK1", "name": "assets-key"}
            })
        };
        Mock::given(method("POST"))
            .and(path("/v2/objectstores"))
            .and(body_partial_json(json!({"name": "assets", "max_size_gb": 500})))
            .respond_with(ResponseTemplate::new(200).set_body_json(store("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/objectstores/os-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(store("ready")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("assets"));
        let state = ObjectStoreHandler
            .create(&ctx, &ResourceId::new("object_store", "assets"), &attrs)
            .await
            .unwrap();
        assert_eq!(
            state.attributes["bucket_url"],
            Value::from("objectstore.lon1.civo.com")
        );
        assert_eq!(state.attributes["access_key_id"], Value::from("AK1"));
    }
}
