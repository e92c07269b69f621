use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Volume {
    pub id: String,
    pub name: String,
    pub instance_id: String,
    pub cluster_id: String,
    pub network_id: String,
    pub mount_point: String,
    pub size_gb: i64,
    pub bootable: bool,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct VolumeConfig {
    pub name: String,
    pub size_gb: i64,
    pub network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CivoClient {
    pub async fn list_volumes(&self) -> ClientResult<Vec<Volume>> {
        self.get("/v2/volumes").await
    }

    pub async fn get_volume(&self, id: &str) -> ClientResult<Volume> {
        self.get(&format!("/v2/volumes/{}", id)).await
    }

    pub async fn create_volume(&self, config: &VolumeConfig) -> ClientResult<SimpleResponse> {
        self.post("/v2/volumes", config).await
    }

    pub async fn resize_volume(&self, id: &str, size_gb: i64) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/volumes/{}/resize", id),
            &serde_json::json!({ "size_gb": size_gb }),
        )
        .await
    }

    pub async fn attach_volume(
        &self,
        id: &str,
        instance_id: &str,
        attach_at_boot: bool,
    ) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/volumes/{}/attach", id),
            &serde_json::json!({ "instance_id": instance_id, "attach_at_boot": attach_at_boot }),
        )
        .await
    }

    pub async fn detach_volume(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/volumes/{}/detach", id),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn delete_volume(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/volumes/{}", id)).await
    }
}
