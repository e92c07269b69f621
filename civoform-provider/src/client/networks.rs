use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub label: String,
    pub default: bool,
    pub cidr: String,
    pub nameservers_v4: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NetworkConfig {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cidr_v4: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nameservers_v4: Vec<String>,
}

impl CivoClient {
    pub async fn list_networks(&self) -> ClientResult<Vec<Network>> {
        self.get("/v2/networks").await
    }

    pub async fn get_network(&self, id: &str) -> ClientResult<Network> {
        self.get(&format!("/v2/networks/{}", id)).await
    }

    pub async fn create_network(&self, config: &NetworkConfig) -> ClientResult<SimpleResponse> {
        self.post("/v2/networks", config).await
    }

    pub async fn rename_network(&self, id: &str, label: &str) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/networks/{}", id),
            &serde_json::json!({ "label": label }),
        )
        .await
    }

    pub async fn delete_network(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/networks/{}", id)).await
    }
}
