//! `civo.kubernetes_cluster` - managed Kubernetes clusters
//!
//! A cluster declares its default node pool inline as a single `pools`
//! block; further pools are `civo.kubernetes_node_pool` resources. The
//! pool's `label` doubles as its API id.

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::kubernetes_node_pool::wait_pool_ready;
use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    wait_error, wait_until_gone, with_status,
};
use crate::client::{
    CivoClient, KubernetesCluster, KubernetesClusterConfig, KubernetesClusterUpdate,
    KubernetesPool, KubernetesPoolConfig, Taint,
};
use crate::utils::{
    Attributes, ObjectRef, changed, get_blocks, get_bool, get_int, get_str, get_string_list,
    get_string_map, require_str, set, set_str,
};

pub const CLUSTER_TYPES: [&str; 2] = ["k3s", "talos"];
pub const CNI_PLUGINS: [&str; 2] = ["flannel", "cilium"];
pub const TAINT_EFFECTS: [&str; 3] = ["NoSchedule", "PreferNoSchedule", "NoExecute"];

pub struct KubernetesClusterHandler;

/// Schema of a `taints` block, shared with node pools
pub(crate) fn taint_block_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(vec![
        AttributeSchema::new("key", types::non_empty_string()).required(),
        AttributeSchema::new("value", AttributeType::String),
        AttributeSchema::new("effect", types::one_of(&TAINT_EFFECTS)).required(),
    ])))
}

fn pool_block_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Block(vec![
        AttributeSchema::new("label", AttributeType::String),
        AttributeSchema::new("node_count", types::positive_int()).required(),
        AttributeSchema::new("size", types::non_empty_string()).required(),
        AttributeSchema::new("labels", types::string_map()),
        AttributeSchema::new("taints", taint_block_type()),
        AttributeSchema::new("public_ip_node_pool", AttributeType::Bool),
        AttributeSchema::new("instance_names", types::string_list()).computed(),
    ])))
}

pub(crate) fn desired_taints(attrs: &Attributes) -> Vec<Taint> {
    get_blocks(attrs, "taints")
        .iter()
        .map(|t| Taint {
            key: get_str(t, "key").unwrap_or_default(),
            value: get_str(t, "value").unwrap_or_default(),
            effect: get_str(t, "effect").unwrap_or_default(),
        })
        .collect()
}

pub(crate) fn taint_blocks(taints: &[Taint]) -> Value {
    Value::List(
        taints
            .iter()
            .map(|t| {
                let mut block = Attributes::new();
                set_str(&mut block, "key", &t.key);
                set_str(&mut block, "value", &t.value);
                set_str(&mut block, "effect", &t.effect);
                Value::Map(block)
            })
            .collect(),
    )
}

/// Pool attributes shared by the inline block and `kubernetes_node_pool`
pub(crate) fn pool_config(pool_id: String, attrs: &Attributes) -> KubernetesPoolConfig {
    KubernetesPoolConfig {
        id: pool_id,
        count: get_int(attrs, "node_count").unwrap_or(1),
        size: get_str(attrs, "size").unwrap_or_default(),
        labels: get_string_map(attrs, "labels"),
        taints: desired_taints(attrs),
        public_ip_node_pool: get_bool(attrs, "public_ip_node_pool").unwrap_or(false),
    }
}

pub(crate) fn pool_attributes(pool: &KubernetesPool) -> Attributes {
    let mut attrs = Attributes::new();
    set(&mut attrs, "node_count", pool.count);
    set_str(&mut attrs, "size", &pool.size);
    if !pool.labels.is_empty() {
        set(&mut attrs, "labels", pool.labels.clone());
    }
    if !pool.taints.is_empty() {
        attrs.insert("taints".to_string(), taint_blocks(&pool.taints));
    }
    set(&mut attrs, "public_ip_node_pool", pool.public_ip_node_pool);
    set(
        &mut attrs,
        "instance_names",
        pool.instances
            .iter()
            .map(|i| i.hostname.clone())
            .collect::<Vec<_>>(),
    );
    attrs
}

/// The declared pool, or an error when there is not exactly one
fn default_pool(id: &ResourceId, cluster_name: &str, attrs: &Attributes) -> ProviderResult<KubernetesPoolConfig> {
    let mut blocks = get_blocks(attrs, "pools");
    if blocks.len() != 1 {
        return Err(ProviderError::new(
            "Exactly one pools block is required; add further pools with kubernetes_node_pool",
        )
        .for_resource(id.clone()));
    }
    let block = blocks.remove(0);
    let label = get_str(&block, "label").unwrap_or_else(|| format!("{}-default-pool", cluster_name));
    Ok(pool_config(label, &block))
}

pub(crate) fn cluster_attributes(cluster: &KubernetesCluster, pool_id: Option<&str>) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "name", &cluster.name);
    set_str(&mut attrs, "network_id", &cluster.network_id);
    set_str(&mut attrs, "firewall_id", &cluster.firewall_id);
    set_str(&mut attrs, "cluster_type", &cluster.cluster_type);
    set_str(&mut attrs, "cni", &cluster.cni_plugin);
    set_str(&mut attrs, "kubernetes_version", &cluster.kubernetes_version);
    set(&mut attrs, "tags", cluster.tags.clone());

    let pool = match pool_id {
        Some(pool_id) => cluster.pools.iter().find(|p| p.id == pool_id),
        None => cluster.pools.first(),
    };
    if let Some(pool) = pool {
        let mut block = pool_attributes(pool);
        set_str(&mut block, "label", &pool.id);
        attrs.insert("pools".to_string(), Value::List(vec![Value::Map(block)]));
    }

    set(
        &mut attrs,
        "installed_applications",
        cluster
            .installed_applications
            .iter()
            .map(|a| a.application.clone())
            .collect::<Vec<_>>(),
    );
    set_str(&mut attrs, "api_endpoint", &cluster.api_endpoint);
    set_str(&mut attrs, "kubeconfig", &cluster.kubeconfig);
    set_str(&mut attrs, "master_ip", &cluster.master_ip);
    set_str(&mut attrs, "dns_entry", &cluster.dns_entry);
    set_str(&mut attrs, "status", &cluster.status);
    set(&mut attrs, "ready", cluster.ready);
    set_str(&mut attrs, "created_at", &cluster.created_at);
    attrs
}

/// Label of the pool recorded in a previous state
fn recorded_pool(attrs: &Attributes) -> Option<String> {
    get_blocks(attrs, "pools")
        .first()
        .and_then(|p| get_str(p, "label"))
}

impl KubernetesClusterHandler {
    async fn wait_ready(
        &self,
        ctx: &Context,
        client: &CivoClient,
        id: &ResourceId,
        cluster_id: &str,
    ) -> ProviderResult<KubernetesCluster> {
        ctx.waits
            .conf(&["BUILDING", "BUILD_PENDING", "UPGRADING", "SCALING"], &["ACTIVE"])
            .wait_for_state(move || async move {
                with_status(client.get_kubernetes_cluster(cluster_id).await, |c| {
                    // ACTIVE alone does not mean the API server is up
                    if c.status == "ACTIVE" && !c.ready {
                        "BUILDING".to_string()
                    } else {
                        c.status.clone()
                    }
                })
            })
            .await
            .map_err(wait_error(id, "Kubernetes cluster to become ready"))
    }

    async fn get(
        &self,
        client: &CivoClient,
        id: &ResourceId,
        cluster_id: &str,
    ) -> ProviderResult<KubernetesCluster> {
        client
            .get_kubernetes_cluster(cluster_id)
            .await
            .map_err(api_error(id, "read Kubernetes cluster"))
    }
}

#[async_trait]
impl ResourceHandler for KubernetesClusterHandler {
    fn resource_type(&self) -> &'static str {
        "kubernetes_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("kubernetes_cluster")
            .with_description("A managed Kubernetes cluster")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("network_id", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("firewall_id", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("cluster_type", types::one_of(&CLUSTER_TYPES))
                    .with_default(Value::from("k3s"))
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("cni", types::one_of(&CNI_PLUGINS))
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("kubernetes_version", AttributeType::String)
                    .optional_computed(),
            )
            .attribute(
                AttributeSchema::new("applications", types::string_list())
                    .write_only()
                    .with_description("Marketplace applications; prefix with '-' to skip a default"),
            )
            .attribute(AttributeSchema::new("tags", types::string_list()))
            .attribute(AttributeSchema::new("pools", pool_block_type()).required())
            .attribute(AttributeSchema::new("installed_applications", types::string_list()).computed())
            .attribute(AttributeSchema::new("api_endpoint", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("kubeconfig", AttributeType::String)
                    .computed()
                    .sensitive(),
            )
            .attribute(AttributeSchema::new("master_ip", AttributeType::String).computed())
            .attribute(AttributeSchema::new("dns_entry", AttributeType::String).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .attribute(AttributeSchema::new("ready", AttributeType::Bool).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let name = require_str(id, attrs, "name")?;
        let pool = default_pool(id, &name, attrs)?;

        let network_id = match get_str(attrs, "network_id") {
            Some(network_id) => network_id,
            None => client
                .list_networks()
                .await
                .map_err(api_error(id, "list networks"))?
                .into_iter()
                .find(|n| n.default)
                .map(|n| n.id)
                .ok_or_else(|| {
                    ProviderError::new(format!("No default network in region {}", client.region()))
                        .for_resource(id.clone())
                })?,
        };

        let pool_id = pool.id.clone();
        let config = KubernetesClusterConfig {
            name: name.clone(),
            region: Some(client.region().to_string()),
            network_id,
            instance_firewall: require_str(id, attrs, "firewall_id")?,
            kubernetes_version: get_str(attrs, "kubernetes_version").unwrap_or_default(),
            cluster_type: get_str(attrs, "cluster_type").unwrap_or_default(),
            cni_plugin: get_str(attrs, "cni").unwrap_or_default(),
            applications: get_string_list(attrs, "applications").join(","),
            tags: get_string_list(attrs, "tags").join(" "),
            pools: vec![pool],
        };
        info!("Creating Kubernetes cluster {}", name);
        let created = client
            .create_kubernetes_cluster(&config)
            .await
            .map_err(api_error(id, "create Kubernetes cluster"))?;

        let cluster = self.wait_ready(ctx, &client, id, &created.id).await?;
        Ok(existing(
            ctx,
            &client,
            id,
            &cluster.id,
            cluster_attributes(&cluster, Some(&pool_id)),
        ))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        Ok(
            match found(
                id,
                "read Kubernetes cluster",
                client.get_kubernetes_cluster(&object.id).await,
            )? {
                Some(cluster) => existing(ctx, &client, id, &cluster.id, cluster_attributes(&cluster, None)),
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
        let client = ctx.client_for_object(object);
        let current = &from.attributes;

        let mut update = KubernetesClusterUpdate::default();
        if changed(current, attrs, "name") {
            update.name = get_str(attrs, "name");
        }
        if changed(current, attrs, "kubernetes_version") {
            update.kubernetes_version = get_str(attrs, "kubernetes_version");
        }
        if changed(current, attrs, "firewall_id") {
            update.firewall_id = get_str(attrs, "firewall_id");
        }
        if changed(current, attrs, "tags") {
            update.tags = Some(get_string_list(attrs, "tags").join(" "));
        }
        if changed(current, attrs, "applications") {
            update.applications = Some(get_string_list(attrs, "applications").join(","));
        }

        let any_change = update.name.is_some()
            || update.kubernetes_version.is_some()
            || update.firewall_id.is_some()
            || update.tags.is_some()
            || update.applications.is_some();
        if any_change {
            info!("Updating Kubernetes cluster {}", object.id);
            client
                .update_kubernetes_cluster(&object.id, &update)
                .await
                .map_err(api_error(id, "update Kubernetes cluster"))?;
            self.wait_ready(ctx, &client, id, &object.id).await?;
        }

        let name = get_str(attrs, "name").unwrap_or_default();
        let mut pool = default_pool(id, &name, attrs)?;
        let explicit_label = get_blocks(attrs, "pools")
            .first()
            .and_then(|p| get_str(p, "label"));
        let pool_id = recorded_pool(current).unwrap_or_else(|| pool.id.clone());
        if explicit_label.is_none() {
            pool.id = pool_id.clone();
        }
        if pool.id != pool_id {
            return Err(ProviderError::new(format!(
                "Cannot relabel pool '{}' to '{}'; the cluster must be replaced",
                pool_id, pool.id
            ))
            .for_resource(id.clone()));
        }
        if changed(current, attrs, "pools") {
            let cluster = self.get(&client, id, &object.id).await?;
            let existing_pool = cluster.pools.iter().find(|p| p.id == pool_id);
            if existing_pool.is_some_and(|p| p.size != pool.size) {
                return Err(ProviderError::new(
                    "Changing the node size of the default pool requires replacing the cluster",
                )
                .for_resource(id.clone()));
            }
            if existing_pool.is_some_and(|p| p.count != pool.count) {
                info!("Scaling pool {} to {} nodes", pool_id, pool.count);
                client
                    .scale_kubernetes_pool(&object.id, &pool_id, pool.count)
                    .await
                    .map_err(api_error(id, "scale Kubernetes pool"))?;
                wait_pool_ready(ctx, &client, id, &object.id, &pool_id, pool.count).await?;
            }
        }

        let cluster = self.get(&client, id, &object.id).await?;
        Ok(existing(
            ctx,
            &client,
            id,
            &cluster.id,
            cluster_attributes(&cluster, Some(&pool_id)),
        ))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        info!("Deleting Kubernetes cluster {}", object.id);
        if found(
            id,
            "delete Kubernetes cluster",
            client.delete_kubernetes_cluster(&object.id).await,
        )?
        .is_none()
        {
            return Ok(());
        }
        wait_until_gone(ctx, id, "Kubernetes cluster", || {
            client.get_kubernetes_cluster(&object.id)
        })
        .await
    }
}
