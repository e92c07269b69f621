use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObjectStore {
    pub id: String,
    pub name: String,
    pub max_size: i64,
    pub owner_info: ObjectStoreOwner,
    #[serde(rename = "objectstore_endpoint")]
    pub endpoint: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObjectStoreOwner {
    pub access_key_id: String,
    pub name: String,
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ObjectStoreConfig {
    pub name: String,
    pub max_size_gb: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObjectStoreCredential {
    pub id: String,
    pub name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub max_size_gb: i64,
    pub suspended: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ObjectStoreCredentialConfig {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CivoClient {
    pub async fn list_object_stores(&self) -> ClientResult<Vec<ObjectStore>> {
        self.get_all("/v2/objectstores").await
    }

    pub async fn get_object_store(&self, id: &str) -> ClientResult<ObjectStore> {
        self.get(&format!("/v2/objectstores/{}", id)).await
    }

    pub async fn create_object_store(&self, config: &ObjectStoreConfig) -> ClientResult<ObjectStore> {
        self.post("/v2/objectstores", config).await
    }

    pub async fn resize_object_store(&self, id: &str, max_size_gb: i64) -> ClientResult<ObjectStore> {
        self.put(
            &format!("/v2/objectstores/{}", id),
            &serde_json::json!({ "max_size_gb": max_size_gb }),
        )
        .await
    }

    pub async fn delete_object_store(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/objectstores/{}", id)).await
    }

    pub async fn list_object_store_credentials(&self) -> ClientResult<Vec<ObjectStoreCredential>> {
        self.get_all("/v2/objectstore/credentials").await
    }

    pub async fn get_object_store_credential(&self, id: &str) -> ClientResult<ObjectStoreCredential> {
        self.get(&format!("/v2/objectstore/credentials/{}", id))
            .await
    }

    pub async fn create_object_store_credential(
        &self,
        config: &ObjectStoreCredentialConfig,
    ) -> ClientResult<ObjectStoreCredential> {
        self.post("/v2/objectstore/credentials", config).await
    }

    pub async fn update_object_store_credential(
        &self,
        id: &str,
        config: &ObjectStoreCredentialConfig,
    ) -> ClientResult<ObjectStoreCredential> {
        self.put(&format!("/v2/objectstore/credentials/{}", id), config)
            .await
    }

    pub async fn delete_object_store_credential(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/objectstore/credentials/{}", id))
            .await
    }
}
