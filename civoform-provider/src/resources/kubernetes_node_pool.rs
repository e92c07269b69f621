//! `civo.kubernetes_node_pool` - extra node pools of a Kubernetes cluster

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{ResourceId, State};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use civoform_core::waiter::poll_until;
use log::info;

use super::kubernetes_cluster::{pool_attributes, pool_config, taint_block_type};
use super::{
    Context, ResourceHandler, api_error, existing, found, id_attribute, region_attribute,
    split_pair, wait_error, wait_until_gone,
};
use crate::client::{CivoClient, KubernetesPool};
use crate::utils::{Attributes, ObjectRef, changed, get_str, require_int, require_str, set_str};

pub struct KubernetesNodePoolHandler;

/// Poll until `count` of the pool's instances are ACTIVE
pub(crate) async fn wait_pool_ready(
    ctx: &Context,
    client: &CivoClient,
    id: &ResourceId,
    cluster_id: &str,
    pool_id: &str,
    count: i64,
) -> ProviderResult<()> {
    poll_until(ctx.waits.timeout, ctx.waits.interval, move || async move {
        client
            .get_kubernetes_pool(cluster_id, pool_id)
            .await
            .map(|pool| pool.active_instances() == count)
    })
    .await
    .map_err(wait_error(id, &format!("node pool {} to have {} active nodes", pool_id, count)))
}

fn node_pool_state(
    ctx: &Context,
    client: &CivoClient,
    id: &ResourceId,
    cluster_id: &str,
    pool: &KubernetesPool,
) -> State {
    let mut attrs = pool_attributes(pool);
    set_str(&mut attrs, "cluster_id", cluster_id);
    set_str(&mut attrs, "label", &pool.id);
    existing(ctx, client, id, &format!("{}:{}", cluster_id, pool.id), attrs)
}

#[async_trait]
impl ResourceHandler for KubernetesNodePoolHandler {
    fn resource_type(&self) -> &'static str {
        "kubernetes_node_pool"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("kubernetes_node_pool")
            .with_description("An additional node pool in a Kubernetes cluster")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeSchema::new("cluster_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("label", AttributeType::String)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("node_count", types::positive_int()).required())
            .attribute(
                AttributeSchema::new("size", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("public_ip_node_pool", AttributeType::Bool)
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("labels", types::string_map()).force_new())
            .attribute(AttributeSchema::new("taints", taint_block_type()).force_new())
            .attribute(AttributeSchema::new("instance_names", types::string_list()).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(attrs, "region").as_deref());
        let cluster_id = require_str(id, attrs, "cluster_id")?;
        let label = get_str(attrs, "label").unwrap_or_else(|| id.name.clone());
        let config = pool_config(label, attrs);

        info!(
            "Adding pool {} ({} x {}) to cluster {}",
            config.id, config.count, config.size, cluster_id
        );
        client
            .create_kubernetes_pool(&cluster_id, &config)
            .await
            .map_err(api_error(id, "create node pool"))?;
        wait_pool_ready(ctx, &client, id, &cluster_id, &config.id, config.count).await?;

        let pool = client
            .get_kubernetes_pool(&cluster_id, &config.id)
            .await
            .map_err(api_error(id, "read node pool"))?;
        Ok(node_pool_state(ctx, &client, id, &cluster_id, &pool))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let client = ctx.client_for_object(object);
        let (cluster_id, pool_id) = split_pair(id, &object.id)?;
        Ok(
            match found(
                id,
                "read node pool",
                client.get_kubernetes_pool(&cluster_id, &pool_id).await,
            )? {
                Some(pool) => node_pool_state(ctx, &client, id, &cluster_id, &pool),
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
        if !changed(&from.attributes, attrs, "node_count") {
            return Ok(from.clone());
        }
        let client = ctx.client_for_object(object);
        let (cluster_id, pool_id) = split_pair(id, &object.id)?;
        let count = require_int(id, attrs, "node_count")?;

        info!("Scaling pool {} to {} nodes", pool_id, count);
        client
            .scale_kubernetes_pool(&cluster_id, &pool_id, count)
            .await
            .map_err(api_error(id, "scale node pool"))?;
        wait_pool_ready(ctx, &client, id, &cluster_id, &pool_id, count).await?;

        let pool = client
            .get_kubernetes_pool(&cluster_id, &pool_id)
            .await
            .map_err(api_error(id, "read node pool"))?;
        Ok(node_pool_state(ctx, &client, id, &cluster_id, &pool))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let client = ctx.client_for_object(object);
        let (cluster_id, pool_id) = split_pair(id, &object.id)?;
        info!("Removing pool {} from cluster {}", pool_id, cluster_id);
        if found(
            id,
            "delete node pool",
            client.delete_kubernetes_pool(&cluster_id, &pool_id).await,
        )?
        .is_none()
        {
            return Ok(());
        }
        wait_until_gone(ctx, id, "node pool", || {
            client.get_kubernetes_pool(&cluster_id, &pool_id)
        })
        .await
    }
}
