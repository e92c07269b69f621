use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub service_name: String,
    pub algorithm: String,
    pub backends: Vec<LoadBalancerBackend>,
    pub external_traffic_policy: String,
    pub session_affinity: String,
    pub session_affinity_config_timeout: i64,
    pub enable_proxy_protocol: String,
    pub public_ip: String,
    pub private_ip: String,
    pub firewall_id: String,
    pub cluster_id: String,
    pub network_id: String,
    pub max_concurrent_requests: i64,
    pub state: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct LoadBalancerBackend {
    pub ip: String,
    pub protocol: String,
    pub source_port: i64,
    pub target_port: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub health_check_port: i64,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LoadBalancerConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    pub backends: Vec<LoadBalancerBackend>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub external_traffic_policy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_affinity: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub session_affinity_config_timeout: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enable_proxy_protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub firewall_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub max_concurrent_requests: i64,
}

impl CivoClient {
    pub async fn list_loadbalancers(&self) -> ClientResult<Vec<LoadBalancer>> {
        self.get("/v2/loadbalancers").await
    }

    pub async fn get_loadbalancer(&self, id: &str) -> ClientResult<LoadBalancer> {
        self.get(&format!("/v2/loadbalancers/{}", id)).await
    }

    pub async fn create_loadbalancer(&self, config: &LoadBalancerConfig) -> ClientResult<LoadBalancer> {
        self.post("/v2/loadbalancers", config).await
    }

    pub async fn update_loadbalancer(
        &self,
        id: &str,
        config: &LoadBalancerConfig,
    ) -> ClientResult<LoadBalancer> {
        self.put(&format!("/v2/loadbalancers/{}", id), config).await
    }

    pub async fn delete_loadbalancer(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/loadbalancers/{}", id)).await
    }
}
