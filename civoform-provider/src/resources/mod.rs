//! Resource handlers
//!
//! Each resource type pairs a schema with create/read/update/delete calls
//! against the Civo API. [`CivoProvider`](crate::CivoProvider) dispatches to
//! the handler registered for a resource's type.

mod database;
mod dns_domain_name;
mod dns_domain_record;
mod firewall;
mod firewall_rule;
mod instance;
mod instance_reserved_ip_assignment;
mod kubernetes_cluster;
mod kubernetes_node_pool;
mod loadbalancer;
mod network;
mod object_store;
mod object_store_credential;
mod reserved_ip;
mod ssh_key;
mod volume;
mod volume_attachment;

pub(crate) use database::database_attributes;
pub(crate) use dns_domain_name::domain_attributes;
pub(crate) use dns_domain_record::record_attributes;
pub(crate) use firewall::firewall_attributes;
pub(crate) use instance::instance_attributes;
pub(crate) use kubernetes_cluster::cluster_attributes;
pub(crate) use loadbalancer::loadbalancer_attributes;
pub(crate) use network::network_attributes;
pub(crate) use object_store::object_store_attributes;
pub(crate) use object_store_credential::credential_attributes;
pub(crate) use reserved_ip::reserved_ip_attributes;
pub(crate) use ssh_key::key_attributes;
pub(crate) use volume::volume_attributes;

use std::time::Duration;

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use civoform_core::waiter::{StateChangeConf, WaitError};

use crate::client::{CivoClient, ClientError, ClientResult};
use crate::utils::{Attributes, ObjectRef};

/// Polling settings shared by every waiter
#[derive(Debug, Clone)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub delay: Duration,
    pub interval: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        let defaults = StateChangeConf::default();
        Self {
            timeout: defaults.timeout,
            delay: defaults.delay,
            interval: defaults.min_timeout,
        }
    }
}

impl WaitSettings {
    pub fn conf(&self, pending: &[&str], target: &[&str]) -> StateChangeConf {
        StateChangeConf::new(pending, target)
            .with_timeout(self.timeout)
            .with_delay(self.delay)
            .with_min_timeout(self.interval)
    }
}

/// What a handler needs to talk to Civo
pub struct Context {
    pub client: CivoClient,
    pub waits: WaitSettings,
}

impl Context {
    pub fn new(client: CivoClient) -> Self {
        Self {
            client,
            waits: WaitSettings::default(),
        }
    }

    /// Client for the region named by the resource, or the default region
    pub fn client_for(&self, region: Option<&str>) -> CivoClient {
        self.client.in_region(region)
    }

    /// Client for the region recorded in an identifier
    pub fn client_for_object(&self, object: &ObjectRef) -> CivoClient {
        self.client.in_region(object.region.as_deref())
    }

    /// Identifier to record for an object created through `client`
    pub fn identifier(&self, client: &CivoClient, id: &str) -> String {
        ObjectRef::identifier(id, client.region(), self.client.region())
    }
}

#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes)
    -> ProviderResult<State>;

    /// Current state, or `State::not_found` when the object is gone
    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef)
    -> ProviderResult<State>;

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State>;

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef)
    -> ProviderResult<()>;
}

/// Every resource handler
pub fn handlers() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(instance::InstanceHandler),
        Box::new(network::NetworkHandler),
        Box::new(firewall::FirewallHandler),
        Box::new(firewall_rule::FirewallRuleHandler),
        Box::new(volume::VolumeHandler),
        Box::new(volume_attachment::VolumeAttachmentHandler),
        Box::new(dns_domain_name::DnsDomainNameHandler),
        Box::new(dns_domain_record::DnsDomainRecordHandler),
        Box::new(ssh_key::SshKeyHandler),
        Box::new(kubernetes_cluster::KubernetesClusterHandler),
        Box::new(kubernetes_node_pool::KubernetesNodePoolHandler),
        Box::new(loadbalancer::LoadBalancerHandler),
        Box::new(reserved_ip::ReservedIpHandler),
        Box::new(instance_reserved_ip_assignment::InstanceReservedIpAssignmentHandler),
        Box::new(object_store::ObjectStoreHandler),
        Box::new(object_store_credential::ObjectStoreCredentialHandler),
        Box::new(database::DatabaseHandler),
    ]
}

pub fn handler(resource_type: &str) -> Option<Box<dyn ResourceHandler>> {
    handlers()
        .into_iter()
        .find(|h| h.resource_type() == resource_type)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Convert a client error into a provider error for `id`
pub(crate) fn api_error(id: &ResourceId, action: &str) -> impl FnOnce(ClientError) -> ProviderError {
    let id = id.clone();
    let message = format!("Failed to {}", action);
    move |e| ProviderError::new(message).for_resource(id).with_cause(e)
}

pub(crate) fn wait_error(id: &ResourceId, what: &str) -> impl FnOnce(WaitError) -> ProviderError {
    let id = id.clone();
    let message = format!("Error waiting for {}", what);
    move |e| ProviderError::new(message).for_resource(id).with_cause(e)
}

/// `None` when the API reports the object as missing
pub(crate) fn found<T>(
    id: &ResourceId,
    action: &str,
    result: ClientResult<T>,
) -> ProviderResult<Option<T>> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(api_error(id, action)(e)),
    }
}

/// Adapt a lookup for [`StateChangeConf::wait_for_state`]
pub(crate) fn with_status<T>(
    result: ClientResult<T>,
    status: impl FnOnce(&T) -> String,
) -> ClientResult<Option<(T, String)>> {
    match result {
        Ok(object) => {
            let s = status(&object);
            Ok(Some((object, s)))
        }
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Wait until a lookup starts returning "not found"
pub(crate) async fn wait_until_gone<T, F, Fut>(
    ctx: &Context,
    id: &ResourceId,
    what: &str,
    mut lookup: F,
) -> ProviderResult<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ClientResult<T>>,
{
    civoform_core::waiter::poll_until(ctx.waits.timeout, ctx.waits.interval, || {
        let fut = lookup();
        async move {
            match fut.await {
                Ok(_) => Ok(false),
                Err(e) if e.is_not_found() => Ok(true),
                Err(e) => Err(e),
            }
        }
    })
    .await
    .map_err(wait_error(id, &format!("{} to be deleted", what)))
}

/// State for an object that exists, with `id` and `region` filled in
/// unless the handler already set them
pub(crate) fn existing(
    ctx: &Context,
    client: &CivoClient,
    id: &ResourceId,
    object_id: &str,
    mut attrs: Attributes,
) -> State {
    attrs
        .entry("id".to_string())
        .or_insert_with(|| Value::String(object_id.to_string()));
    attrs
        .entry("region".to_string())
        .or_insert_with(|| Value::String(client.region().to_string()));
    State::existing(id.clone(), attrs).with_identifier(ctx.identifier(client, object_id))
}

/// Split a `PARENT_ID:ID` identifier of a nested object
pub(crate) fn split_pair(id: &ResourceId, object_id: &str) -> ProviderResult<(String, String)> {
    match object_id.split_once(':') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() => {
            Ok((parent.to_string(), child.to_string()))
        }
        _ => Err(ProviderError::new(format!(
            "Invalid identifier '{}', expected PARENT_ID:ID",
            object_id
        ))
        .for_resource(id.clone())),
    }
}

/// Optional `region` attribute carried by every regional resource
pub(crate) fn region_attribute() -> AttributeSchema {
    AttributeSchema::new("region", AttributeType::String)
        .optional_computed()
        .force_new()
        .with_description("Region to create the object in; defaults to the provider region")
}

pub(crate) fn id_attribute() -> AttributeSchema {
    AttributeSchema::new("id", AttributeType::String).computed()
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_handler_has_a_unique_type_and_matching_schema() {
        let mut seen = HashSet::new();
        for handler in handlers() {
            let schema = handler.schema();
            assert_eq!(schema.resource_type, handler.resource_type());
            assert!(!schema.is_data_source());
            assert!(
                schema.attributes.get("id").is_some_and(|a| a.is_computed_only()),
                "{} lacks a computed id",
                handler.resource_type()
            );
            assert!(seen.insert(handler.resource_type()));
        }
        assert_eq!(seen.len(), 17);
    }

    #[test]
    fn identifier_is_region_qualified_outside_default() {
        let client = CivoClient::new("t", "LON1", "https://api.civo.com").unwrap();
        let ctx = Context::new(client);
        let nyc = ctx.client_for(Some("NYC1"));
        assert_eq!(ctx.identifier(&ctx.client, "abc"), "abc");
        assert_eq!(ctx.identifier(&nyc, "abc"), "NYC1/abc");

        let state = existing(&ctx, &nyc, &ResourceId::new("network", "n"), "abc", Attributes::new());
        assert_eq!(state.identifier.as_deref(), Some("NYC1/abc"));
        assert_eq!(state.attributes["region"], Value::from("NYC1"));
        assert_eq!(state.attributes["id"], Value::from("abc"));
    }
}
