use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Database {
    pub id: String,
    pub name: String,
    pub size: String,
    pub nodes: i64,
    pub software: String,
    pub software_version: String,
    pub network_id: String,
    pub firewall_id: String,
    pub public_ipv4: String,
    pub private_ipv4: String,
    pub port: i64,
    pub username: String,
    pub password: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DatabaseConfig {
    pub name: String,
    pub size: String,
    pub nodes: i64,
    pub software: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub software_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub firewall_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DatabaseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseVersion {
    #[serde(rename = "SoftwareVersion", default)]
    pub software_version: String,
    #[serde(rename = "Default", default)]
    pub default: bool,
}

impl CivoClient {
    pub async fn list_databases(&self) -> ClientResult<Vec<Database>> {
        self.get_all("/v2/databases").await
    }

    pub async fn get_database(&self, id: &str) -> ClientResult<Database> {
        self.get(&format!("/v2/databases/{}", id)).await
    }

    pub async fn create_database(&self, config: &DatabaseConfig) -> ClientResult<Database> {
        self.post("/v2/databases", config).await
    }

    pub async fn update_database(&self, id: &str, update: &DatabaseUpdate) -> ClientResult<Database> {
        self.put(&format!("/v2/databases/{}", id), update).await
    }

    pub async fn delete_database(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/databases/{}", id)).await
    }

    /// Available versions keyed by engine name
    pub async fn list_database_versions(&self) -> ClientResult<HashMap<String, Vec<DatabaseVersion>>> {
        self.get("/v2/databases/versions").await
    }
}
