use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KubernetesCluster {
    pub id: String,
    pub name: String,
    pub version: String,
    pub kubernetes_version: String,
    pub cluster_type: String,
    pub cni_plugin: String,
    pub status: String,
    pub ready: bool,
    pub network_id: String,
    pub firewall_id: String,
    pub master_ip: String,
    pub api_endpoint: String,
    pub dns_entry: String,
    pub kubeconfig: String,
    pub tags: Vec<String>,
    pub pools: Vec<KubernetesPool>,
    pub installed_applications: Vec<KubernetesApplication>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KubernetesPool {
    pub id: String,
    pub count: i64,
    pub size: String,
    pub labels: HashMap<String, String>,
    pub taints: Vec<Taint>,
    pub public_ip_node_pool: bool,
    pub instances: Vec<KubernetesPoolInstance>,
}

impl KubernetesPool {
    pub fn active_instances(&self) -> i64 {
        self.instances
            .iter()
            .filter(|i| i.status == "ACTIVE")
            .count() as i64
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KubernetesPoolInstance {
    pub hostname: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Taint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KubernetesApplication {
    pub application: String,
    pub version: String,
    pub installed: bool,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct KubernetesPoolConfig {
    pub id: String,
    pub count: i64,
    pub size: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
    pub public_ip_node_pool: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct KubernetesClusterConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub network_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_firewall: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cni_plugin: String,
    /// Comma separated
    #[serde(skip_serializing_if = "String::is_empty")]
    pub applications: String,
    /// Space separated
    pub tags: String,
    pub pools: Vec<KubernetesPoolConfig>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct KubernetesClusterUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KubernetesVersion {
    pub version: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub cluster_type: String,
    pub default: bool,
}

impl CivoClient {
    pub async fn list_kubernetes_clusters(&self) -> ClientResult<Vec<KubernetesCluster>> {
        self.get_all("/v2/kubernetes/clusters").await
    }

    pub async fn get_kubernetes_cluster(&self, id: &str) -> ClientResult<KubernetesCluster> {
        self.get(&format!("/v2/kubernetes/clusters/{}", id)).await
    }

    pub async fn create_kubernetes_cluster(
        &self,
        config: &KubernetesClusterConfig,
    ) -> ClientResult<KubernetesCluster> {
        self.post("/v2/kubernetes/clusters", config).await
    }

    pub async fn update_kubernetes_cluster(
        &self,
        id: &str,
        update: &KubernetesClusterUpdate,
    ) -> ClientResult<KubernetesCluster> {
        self.put(&format!("/v2/kubernetes/clusters/{}", id), update)
            .await
    }

    pub async fn delete_kubernetes_cluster(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/kubernetes/clusters/{}", id))
            .await
    }

    pub async fn list_kubernetes_pools(&self, cluster_id: &str) -> ClientResult<Vec<KubernetesPool>> {
        self.get(&format!("/v2/kubernetes/clusters/{}/pools", cluster_id))
            .await
    }

    pub async fn get_kubernetes_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
    ) -> ClientResult<KubernetesPool> {
        self.get(&format!(
            "/v2/kubernetes/clusters/{}/pools/{}",
            cluster_id, pool_id
        ))
        .await
    }

    pub async fn create_kubernetes_pool(
        &self,
        cluster_id: &str,
        pool: &KubernetesPoolConfig,
    ) -> ClientResult<SimpleResponse> {
        self.post(&format!("/v2/kubernetes/clusters/{}/pools", cluster_id), pool)
            .await
    }

    pub async fn scale_kubernetes_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
        count: i64,
    ) -> ClientResult<KubernetesPool> {
        self.put(
            &format!("/v2/kubernetes/clusters/{}/pools/{}", cluster_id, pool_id),
            &serde_json::json!({ "count": count }),
        )
        .await
    }

    pub async fn delete_kubernetes_pool(
        &self,
        cluster_id: &str,
        pool_id: &str,
    ) -> ClientResult<SimpleResponse> {
        self.delete(&format!(
            "/v2/kubernetes/clusters/{}/pools/{}",
            cluster_id, pool_id
        ))
        .await
    }

    pub async fn list_kubernetes_versions(&self) -> ClientResult<Vec<KubernetesVersion>> {
        self.get("/v2/kubernetes/versions").await
    }
}
