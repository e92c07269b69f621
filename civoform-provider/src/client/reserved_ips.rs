use serde::Deserialize;

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ReservedIp {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub assigned_to: AssignedTo,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AssignedTo {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
}

impl CivoClient {
    pub async fn list_reserved_ips(&self) -> ClientResult<Vec<ReservedIp>> {
        self.get_all("/v2/ips").await
    }

    pub async fn get_reserved_ip(&self, id: &str) -> ClientResult<ReservedIp> {
        self.get(&format!("/v2/ips/{}", id)).await
    }

    pub async fn create_reserved_ip(&self, name: &str) -> ClientResult<ReservedIp> {
        self.post("/v2/ips", &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn rename_reserved_ip(&self, id: &str, name: &str) -> ClientResult<ReservedIp> {
        self.put(&format!("/v2/ips/{}", id), &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn assign_reserved_ip(
        &self,
        id: &str,
        instance_id: &str,
    ) -> ClientResult<SimpleResponse> {
        self.post(
            &format!("/v2/ips/{}/actions", id),
            &serde_json::json!({
                "action": "assign",
                "resource": { "id": instance_id, "type": "instance" },
            }),
        )
        .await
    }

    pub async fn unassign_reserved_ip(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.post(
            &format!("/v2/ips/{}/actions", id),
            &serde_json::json!({ "action": "unassign" }),
        )
        .await
    }

    pub async fn delete_reserved_ip(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/ips/{}", id)).await
    }
}
