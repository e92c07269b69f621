use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Firewall {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct FirewallRule {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing)]
    pub firewall_id: String,
    pub protocol: String,
    pub start_port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub end_port: String,
    pub cidr: Vec<String>,
    pub direction: String,
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct FirewallConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_id: String,
    pub create_rules: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<FirewallRule>,
}

impl CivoClient {
    pub async fn list_firewalls(&self) -> ClientResult<Vec<Firewall>> {
        self.get("/v2/firewalls").await
    }

    pub async fn get_firewall(&self, id: &str) -> ClientResult<Firewall> {
        self.get(&format!("/v2/firewalls/{}", id)).await
    }

    pub async fn create_firewall(&self, config: &FirewallConfig) -> ClientResult<SimpleResponse> {
        self.post("/v2/firewalls", config).await
    }

    pub async fn rename_firewall(&self, id: &str, name: &str) -> ClientResult<SimpleResponse> {
        self.put(
            &format!("/v2/firewalls/{}", id),
            &serde_json::json!({ "name": name }),
        )
        .await
    }

    pub async fn delete_firewall(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/firewalls/{}", id)).await
    }

    pub async fn list_firewall_rules(&self, firewall_id: &str) -> ClientResult<Vec<FirewallRule>> {
        self.get(&format!("/v2/firewalls/{}/rules", firewall_id))
            .await
    }

    pub async fn create_firewall_rule(
        &self,
        firewall_id: &str,
        rule: &FirewallRule,
    ) -> ClientResult<FirewallRule> {
        self.post(&format!("/v2/firewalls/{}/rules", firewall_id), rule)
            .await
    }

    pub async fn delete_firewall_rule(
        &self,
        firewall_id: &str,
        rule_id: &str,
    ) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/firewalls/{}/rules/{}", firewall_id, rule_id))
            .await
    }
}
