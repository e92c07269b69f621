use serde::Deserialize;

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SshKey {
    pub id: String,
    pub name: String,
    pub public_key: String,
    pub fingerprint: String,
}

impl CivoClient {
    pub async fn list_ssh_keys(&self) -> ClientResult<Vec<SshKey>> {
        self.get("/v2/sshkeys").await
    }

    pub async fn get_ssh_key(&self, id: &str) -> ClientResult<SshKey> {
        self.get(&format!("/v2/sshkeys/{}", id)).await
    }

    pub async fn create_ssh_key(&self, name: &str, public_key: &str) -> ClientResult<SimpleResponse> {
        self.post(
            "/v2/sshkeys",
            &serde_json::json!({ "name": name, "public_key": public_key }),
        )
        .await
    }

    pub async fn rename_ssh_key(&self, id: &str, name: &str) -> ClientResult<SshKey> {
        self.put(&format!("/v2/sshkeys/{}", id), &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn delete_ssh_key(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/sshkeys/{}", id)).await
    }
}
