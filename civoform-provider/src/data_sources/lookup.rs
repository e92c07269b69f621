//! Single-object lookups by `id` or name

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{Resource, State, Value};
use civoform_core::schema::ResourceSchema;
use log::debug;

use super::DataSourceHandler;
use crate::client::CivoClient;
use crate::resources::{
    Context, api_error, cluster_attributes, credential_attributes, database_attributes,
    domain_attributes, firewall_attributes, handler, instance_attributes, key_attributes,
    loadbalancer_attributes, network_attributes, object_store_attributes, record_attributes,
    reserved_ip_attributes, volume_attributes,
};
use crate::utils::{Attributes, get_str, require_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Instance,
    Network,
    Volume,
    Firewall,
    DnsDomainName,
    DnsDomainRecord,
    SshKey,
    KubernetesCluster,
    LoadBalancer,
    ReservedIp,
    ObjectStore,
    ObjectStoreCredential,
    Database,
}

impl Lookup {
    pub const ALL: [Lookup; 13] = [
        Lookup::Instance,
        Lookup::Network,
        Lookup::Volume,
        Lookup::Firewall,
        Lookup::DnsDomainName,
        Lookup::DnsDomainRecord,
        Lookup::SshKey,
        Lookup::KubernetesCluster,
        Lookup::LoadBalancer,
        Lookup::ReservedIp,
        Lookup::ObjectStore,
        Lookup::ObjectStoreCredential,
        Lookup::Database,
    ];

    pub fn resource_type(self) -> &'static str {
        match self {
            Lookup::Instance => "instance",
            Lookup::Network => "network",
            Lookup::Volume => "volume",
            Lookup::Firewall => "firewall",
            Lookup::DnsDomainName => "dns_domain_name",
            Lookup::DnsDomainRecord => "dns_domain_record",
            Lookup::SshKey => "ssh_key",
            Lookup::KubernetesCluster => "kubernetes_cluster",
            Lookup::LoadBalancer => "loadbalancer",
            Lookup::ReservedIp => "reserved_ip",
            Lookup::ObjectStore => "object_store",
            Lookup::ObjectStoreCredential => "object_store_credential",
            Lookup::Database => "database",
        }
    }

    /// Attribute the object can be found by besides `id`
    pub fn name_attribute(self) -> &'static str {
        match self {
            Lookup::Instance => "hostname",
            Lookup::Network => "label",
            _ => "name",
        }
    }

    /// Attributes the user may set on the lookup
    fn is_key(self, attribute: &str) -> bool {
        attribute == "id" || attribute == "region" || attribute == self.name_attribute()
    }

    /// Every object the lookup chooses from, keyed by object ID
    async fn candidates(
        self,
        client: &CivoClient,
        resource: &Resource,
    ) -> ProviderResult<Vec<(String, Attributes)>> {
        let id = &resource.id;
        let action = format!("list {} objects", self.resource_type());
        let err = || api_error(id, &action);
        let objects: Vec<(String, Attributes)> = match self {
            Lookup::Instance => client
                .list_instances()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), instance_attributes(o)))
                .collect(),
            Lookup::Network => client
                .list_networks()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), network_attributes(o)))
                .collect(),
            Lookup::Volume => client
                .list_volumes()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), volume_attributes(o)))
                .collect(),
            Lookup::Firewall => client
                .list_firewalls()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), firewall_attributes(o, &o.rules)))
                .collect(),
            Lookup::DnsDomainName => client
                .list_dns_domains()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), domain_attributes(o)))
                .collect(),
            Lookup::DnsDomainRecord => {
                let domain_id = require_str(id, &resource.attributes, "domain_id")?;
                client
                    .list_dns_records(&domain_id)
                    .await
                    .map_err(err())?
                    .iter()
                    .map(|o| (o.id.clone(), record_attributes(o)))
                    .collect()
            }
            Lookup::SshKey => client
                .list_ssh_keys()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), key_attributes(o)))
                .collect(),
            Lookup::KubernetesCluster => client
                .list_kubernetes_clusters()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), cluster_attributes(o, None)))
                .collect(),
            Lookup::LoadBalancer => client
                .list_loadbalancers()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), loadbalancer_attributes(o)))
                .collect(),
            Lookup::ReservedIp => client
                .list_reserved_ips()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), reserved_ip_attributes(o)))
                .collect(),
            Lookup::ObjectStore => client
                .list_object_stores()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), object_store_attributes(o)))
                .collect(),
            Lookup::ObjectStoreCredential => client
                .list_object_store_credentials()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), credential_attributes(o)))
                .collect(),
            Lookup::Database => client
                .list_databases()
                .await
                .map_err(err())?
                .iter()
                .map(|o| (o.id.clone(), database_attributes(o)))
                .collect(),
        };
        Ok(objects)
    }
}

/// Finds one existing object of a resource type
pub struct LookupDataSource(pub Lookup);

impl LookupDataSource {
    /// `(attribute, wanted value)` the user asked for
    fn criterion(&self, resource: &Resource) -> ProviderResult<(&'static str, String)> {
        let name_attr = self.0.name_attribute();
        match (
            get_str(&resource.attributes, "id"),
            get_str(&resource.attributes, name_attr),
        ) {
            (Some(id), None) => Ok(("id", id)),
            (None, Some(name)) => Ok((name_attr, name)),
            _ => Err(ProviderError::new(format!(
                "Exactly one of 'id' or '{}' must be set",
                name_attr
            ))
            .for_resource(resource.id.clone())),
        }
    }
}

#[async_trait]
impl DataSourceHandler for LookupDataSource {
    fn resource_type(&self) -> &'static str {
        self.0.resource_type()
    }

    /// The resource schema turned inside out: lookup keys become optional
    /// inputs, everything else is computed
    fn schema(&self) -> ResourceSchema {
        let lookup = self.0;
        let mut schema = ResourceSchema::data_source(lookup.resource_type()).with_description(
            format!(
                "Look up an existing {} by id or {}",
                lookup.resource_type(),
                lookup.name_attribute()
            ),
        );
        let attributes = handler(lookup.resource_type())
            .map(|h| h.schema().attributes)
            .unwrap_or_default();
        for (name, mut attr) in attributes {
            attr.force_new = false;
            attr.default = None;
            attr.required = false;
            if lookup == Lookup::DnsDomainRecord && name == "domain_id" {
                attr = attr.required();
            } else if lookup.is_key(&name) {
                attr = attr.optional_computed();
            } else {
                attr = attr.computed();
            }
            schema = schema.attribute(attr);
        }
        schema
    }

    async fn read(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let (key, wanted) = self.criterion(resource)?;
        let client = ctx.client_for(get_str(&resource.attributes, "region").as_deref());
        let candidates = self.0.candidates(&client, resource).await?;
        debug!(
            "{}: looking for {} = '{}' among {} objects",
            resource.id,
            key,
            wanted,
            candidates.len()
        );

        let mut matches: Vec<_> = candidates
            .into_iter()
            .filter(|(object_id, attrs)| {
                if key == "id" {
                    *object_id == wanted
                } else {
                    attrs.get(key).and_then(Value::as_str) == Some(wanted.as_str())
                }
            })
            .collect();
        let (object_id, mut attrs) = match matches.len() {
            1 => matches.remove(0),
            0 => {
                return Err(ProviderError::new(format!(
                    "No {} found with {} '{}'",
                    self.0.resource_type(),
                    key,
                    wanted
                ))
                .for_resource(resource.id.clone()));
            }
            n => {
                return Err(ProviderError::new(format!(
                    "{} {} objects have {} '{}', look it up by id instead",
                    n,
                    self.0.resource_type(),
                    key,
                    wanted
                ))
                .for_resource(resource.id.clone()));
            }
        };

        attrs.insert("id".to_string(), Value::from(object_id.as_str()));
        if self.schema().attributes.contains_key("region") {
            attrs.insert("region".to_string(), Value::from(client.region()));
        }
        Ok(State::existing(resource.id.clone(), attrs)
            .with_identifier(ctx.identifier(&client, &object_id)))
    }
}
