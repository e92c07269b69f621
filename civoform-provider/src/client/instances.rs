use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub hostname: String,
    pub reverse_dns: String,
    pub size: String,
    pub network_id: String,
    pub firewall_id: String,
    pub source_type: String,
    pub source_id: String,
    pub initial_user: String,
    pub initial_password: String,
    pub ssh_key_id: String,
    pub notes: String,
    pub script: String,
    pub tags: Vec<String>,
    pub status: String,
    pub private_ip: String,
    pub public_ip: String,
    pub reserved_ipv4: String,
    pub cpu_cores: i64,
    pub ram_mb: i64,
    pub disk_gb: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct InstanceConfig {
    pub hostname: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub public_ip: String,
    pub network_id: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub initial_user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssh_key_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub firewall_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reverse_dns: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reserved_ipv4: String,
    /// Space separated
    pub tags: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct InstanceUpdate {
    pub hostname: String,
    pub reverse_dns: String,
    pub notes: String,
}

impl CivoClient {
    pub async fn list_instances(&self) -> ClientResult<Vec<Instance>> {
        self.get_all("/v2/instances").await
    }

    pub async fn get_instance(&self, id: &str) -> ClientResult<Instance> {
        self.get(&format!("/v2/instances/{}", id)).await
    }

    pub async fn create_instance(&self, config: &InstanceConfig) -> ClientResult<Instance> {
        self.post("/v2/instances", config).await
    }

    pub async fn update_instance(
        &self,
        id: &str,
        update: &InstanceUpdate,
    ) -> ClientResult<SimpleResponse> {
        self.put(&format!("/v2/instances/{}", id), update).await
    }

    pub async fn set_instance_tags(&self, id: &str, tags: &[String]) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/instances/{}/tags", id),
            &serde_json::json!({ "tags": tags.join(" ") }),
        )
        .await
    }

    pub async fn resize_instance(&self, id: &str, size: &str) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/instances/{}/resize", id),
            &serde_json::json!({ "size": size }),
        )
        .await
    }

    pub async fn set_instance_firewall(
        &self,
        id: &str,
        firewall_id: &str,
    ) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/instances/{}/firewall", id),
            &serde_json::json!({ "firewall_id": firewall_id }),
        )
        .await
    }

    pub async fn delete_instance(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/instances/{}", id)).await
    }
}
