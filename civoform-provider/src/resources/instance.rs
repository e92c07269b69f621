//! `civo.instance` - compute instances

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, wait_until_gone, with_status,
};
use crate::client::{CivoClient, Instance, InstanceConfig, InstanceUpdate};
use crate::utils::{
    Attributes, ObjectRef, changed, get_str, get_string_list, require_str, set, set_str,
};

const DEFAULT_DISK_IMAGE: &str = "ubuntu-jammy";
const DEFAULT_SIZE: &str = "g4s.small";

pub struct InstanceHandler;

impl InstanceHandler {
    async fn wait_active(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        instance_id: &str,
    ) -> ProviderResult<Instance> {
        ctx.waits
            .conf(&["BUILDING", "BUILD_PENDING", "REBUILDING", "RESIZING", "STARTING"], &["ACTIVE"])
            .wait_for_state(move || async move {
                with_status(client.get_instance(instance_id).await, |i| i.status.clone())
            })
            .await
            .map_err(wait_error(id, "instance to become ACTIVE"))
    }

    /// Default network of the region, used when `network_id` is not set
    async fn default_network(&self, client: &CivoClient, id: &ResourceId) -> ProviderResult<String> {
        let networks = client
            .list_networks()
            .await
            .map_err(api_error(id, "list networks"))?;
        networks
            .into_iter()
            .find(|n| n.default)
            .map(|n| n.id)
            .ok_or_else(|| {
                ProviderError::new(format!("No default network in region {}", client.region()))
                    .for_resource(id.clone())
            })
    }
}

pub(crate) fn instance_attributes(instance: &Instance) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "hostname", &instance.hostname);
    set_str(&mut attrs, "reverse_dns", &instance.reverse_dns);
    set_str(&mut attrs, "size", &instance.size);
    set_str(&mut attrs, "network_id", &instance.network_id);
    set_str(&mut attrs, "firewall_id", &instance.firewall_id);
    set_str(&mut attrs, "disk_image", &instance.source_id);
    set_str(&mut attrs, "initial_user", &instance.initial_user);
    set_str(&mut attrs, "initial_password", &instance.initial_password);
    set_str(&mut attrs, "sshkey_id", &instance.ssh_key_id);
    set_str(&mut attrs, "notes", &instance.notes);
    set_str(&mut attrs, "script", &instance.script);
    set_str(&mut attrs, "private_ip", &instance.private_ip);
    set_str(&mut attrs, "public_ip", &instance.public_ip);
    set_str(&mut attrs, "reserved_ipv4", &instance.reserved_ipv4);
    set_str(&mut attrs, "status", &instance.status);
    set_str(&mut attrs, "created_at", &instance.created_at);
    set(&mut attrs, "tags", instance.tags.clone());
    set(&mut attrs, "cpu_cores", instance.cpu_cores);
    set(&mut attrs, "ram_mb", instance.ram_mb);
    set(&mut attrs, "disk_gb", instance.disk_gb);
    attrs
}

#[async_trait]
impl ResourceHandler for InstanceHandler {
    fn resource_type(&self) -> &'static str {
        "instance"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("instance")
            .with_description("A Civo compute instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("hostname", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("size", types::non_empty_string())
                    .with_default(Value::from(DEFAULT_SIZE)),
            )
            .attribute(
                AttributeSchema::new("disk_image", types::non_empty_string())
                    .with_default(Value::from(DEFAULT_DISK_IMAGE))
                    .force_new()
                    .with_description("Disk image name or ID"),
            )
            .attribute(
                AttributeSchema::new("network_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("firewall_id", AttributeType::String).optional_computed())
            .attribute(AttributeSchema::new("sshkey_id", AttributeType::String).force_new())
            .attribute(
                AttributeSchema::new("initial_user", AttributeType::String)
                    .with_default(Value::from("civo"))
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("public_ip_required", types::one_of(&["create", "none"]))
                    .with_default(Value::from("create"))
                    .force_new()
                    .write_only(),
            )
            .attribute(AttributeSchema::new("reverse_dns", AttributeType::String))
            .attribute(AttributeSchema::new("notes", AttributeType::String))
            .attribute(AttributeSchema::new("script", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("tags", types::string_list()))
            .attribute(
                AttributeSchema::new("reserved_ipv4", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("cpu_cores", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("ram_mb", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("disk_gb", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("private_ip", AttributeType::String).computed())
            .attribute(AttributeSchema::new("public_ip", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("initial_password", AttributeType::String)
                    .computed()
                    .sensitive(),
            )
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
    }

    async fn create(
        &self,
        ctx: &Context,
        id: &ResourceId,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());

        let image_name = get_str(attrs, "disk_image").unwrap_or_else(|| DEFAULT_DISK_IMAGE.to_string());
        let image = client
            .find_disk_image(&image_name)
            .await
            .map_err(api_error(id, "list disk images"))?
            .ok_or_else(|| {
                ProviderError::new(format!("Disk image '{}' not found", image_name))
                    .for_resource(id.clone())
            })?;

        let network_id = match get_str(attrs, "network_id") {
            Some(network_id) => network_id,
            None => self.default_network(&client, id).await?,
        };

        let config = InstanceConfig {
            hostname: require_str(id, attrs, "hostname")?,
            size: get_str(attrs, "size").unwrap_or_else(|| DEFAULT_SIZE.to_string()),
            region: Some(client.region().to_string()),
            public_ip: get_str(attrs, "public_ip_required").unwrap_or_else(|| "create".to_string()),
            network_id,
            template_id: image.id,
            initial_user: get_str(attrs, "initial_user").unwrap_or_default(),
            ssh_key_id: get_str(attrs, "sshkey_id").unwrap_or_default(),
            firewall_id: get_str(attrs, "firewall_id").unwrap_or_default(),
            reverse_dns: get_str(attrs, "reverse_dns").unwrap_or_default(),
            notes: get_str(attrs, "notes").unwrap_or_default(),
            script: get_str(attrs, "script").unwrap_or_default(),
            reserved_ipv4: get_str(attrs, "reserved_ipv4").unwrap_or_default(),
            tags: get_string_list(attrs, "tags").join(" "),
        };

        info!("Creating instance {}", config.hostname);
        let created = client
            .create_instance(&config)
            .await
            .map_err(api_error(id, "create instance"))?;
        let instance = self.wait_active(ctx, &client, id, &created.id).await?;
        info!("Instance {} is ACTIVE", instance.id);

        Ok(existing(ctx, &client, id, &instance.id, instance_attributes(&instance)))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let instance = found(id, "read instance", client.get_instance(&object.id).await)?;
        Ok(match instance {
            Some(instance) => existing(ctx, &client, id, &instance.id, instance_attributes(&instance)),
            None => State::not_found(id.clone()),
        })
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let current = &from.attributes;

        if ["hostname", "notes", "reverse_dns"]
            .iter()
            .any(|key| changed(current, attrs, key))
        {
            let update = InstanceUpdate {
                hostname: require_str(id, attrs, "hostname")?,
                reverse_dns: get_str(attrs, "reverse_dns").unwrap_or_default(),
                notes: get_str(attrs, "notes").unwrap_or_default(),
            };
            client
                .update_instance(&object.id, &update)
                .await
                .map_err(api_error(id, "update instance"))?;
        }

        if changed(current, attrs, "tags") {
            client
                .set_instance_tags(&object.id, &get_string_list(attrs, "tags"))
                .await
                .map_err(api_error(id, "update instance tags"))?;
        }

        if changed(current, attrs, "firewall_id")
            && let Some(firewall_id) = get_str(attrs, "firewall_id")
        {
            client
                .set_instance_firewall(&object.id, &firewall_id)
                .await
                .map_err(api_error(id, "set instance firewall"))?;
        }

        if changed(current, attrs, "size") {
            let size = require_str(id, attrs, "size")?;
            info!("Resizing instance {} to {}", object.id, size);
            client
                .resize_instance(&object.id, &size)
                .await
                .map_err(api_error(id, "resize instance"))?;
            self.wait_active(ctx, &client, id, &object.id).await?;
        }

        let state = self.read(ctx, id, object).await?;
        if !state.exists {
            return Err(ProviderError::new("Instance disappeared during update").for_resource(id.clone()));
        }
        Ok(state)
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        if found(id, "delete instance", client.delete_instance(&object.id).await)?.is_none() {
            return Ok(());
        }
        info!("Deleting instance {}", object.id);
        wait_until_gone(ctx, id, "instance", || client.get_instance(&object.id)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn instance_json(status: &str) -> serde_json::Value {
        json!({
            "id": "i-1", "hostname": "web", "size": "g4s.small", "network_id": "net-1",
            "firewall_id": "fw-1", "source_id": "ubuntu-jammy", "initial_user": "civo",
            "initial_password": "secret", "status": status, "public_ip": "74.220.1.1",
            "private_ip": "192.168.1.2", "tags": ["web", "prod"], "cpu_cores": 1, "ram_mb": 2048, "disk_gb": 50
        })
    }

    async fn mount_catalog(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v2/disk_images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "img-1", "name": "ubuntu-jammy", "state": "available"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/networks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "net-1", "label": "default", "default": true}
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_waits_for_active() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;
        Mock::given(method("POST"))
            .and(path("/v2/instances"))
            .and(body_partial_json(json!({
                "hostname": "web", "template_id": "img-1", "network_id": "net-1",
                "tags": "web prod", "public_ip": "create", "region": "LON1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json("BUILDING")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json("BUILDING")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json("ACTIVE")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let id = ResourceId::new("instance", "web");
        let mut attrs = Attributes::new();
        attrs.insert("hostname".to_string(), Value::from("web"));
        attrs.insert(
            "tags".to_string(),
            Value::List(vec![Value::from("web"), Value::from("prod")]),
        );

        let state = InstanceHandler.create(&ctx, &id, &attrs).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("i-1"));
        assert_eq!(state.attributes["status"], Value::from("ACTIVE"));
        assert_eq!(state.attributes["public_ip"], Value::from("74.220.1.1"));
        assert_eq!(state.attributes["cpu_cores"], Value::Int(1));
    }

    #[tokio::test]
    async fn read_missing_instance_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/instances/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "database_instance_not_found", "reason": "not found"
            })))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let state = InstanceHandler
            .read(&ctx, &ResourceId::new("instance", "web"), &ObjectRef::parse("gone"))
            .await
            .unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn update_resizes_and_retags() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/instances/i-1/resize"))
            .and(body_partial_json(json!({"size": "g4s.medium"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/instances/i-1/tags"))
            .and(body_partial_json(json!({"tags": "web"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json("ACTIVE")))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let id = ResourceId::new("instance", "web");
        let object = ObjectRef::parse("i-1");
        let from = InstanceHandler.read(&ctx, &id, &object).await.unwrap();

        let mut attrs = Attributes::new();
        attrs.insert("hostname".to_string(), Value::from("web"));
        attrs.insert("size".to_string(), Value::from("g4s.medium"));
        attrs.insert("tags".to_string(), Value::List(vec![Value::from("web")]));

        let state = InstanceHandler
            .update(&ctx, &id, &object, &from, &attrs)
            .await
            .unwrap();
        assert!(state.exists);
    }
}
