use serde::{Deserialize, Serialize};

use super::{CivoClient, ClientResult, SimpleResponse};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DnsDomain {
    pub id: String,
    pub account_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DnsRecord {
    pub id: String,
    pub account_id: String,
    pub domain_id: String,
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub priority: i64,
    pub ttl: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DnsRecordConfig {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
    pub priority: i64,
    pub ttl: i64,
}

impl CivoClient {
    pub async fn list_dns_domains(&self) -> ClientResult<Vec<DnsDomain>> {
        self.get("/v2/dns").await
    }

    pub async fn get_dns_domain(&self, id: &str) -> ClientResult<DnsDomain> {
        self.get(&format!("/v2/dns/{}", id)).await
    }

    pub async fn create_dns_domain(&self, name: &str) -> ClientResult<DnsDomain> {
        self.post("/v2/dns", &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn rename_dns_domain(&self, id: &str, name: &str) -> ClientResult<DnsDomain> {
        self.put(&format!("/v2/dns/{}", id), &serde_json::json!({ "name": name }))
            .await
    }

    pub async fn delete_dns_domain(&self, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/dns/{}", id)).await
    }

    pub async fn list_dns_records(&self, domain_id: &str) -> ClientResult<Vec<DnsRecord>> {
        self.get(&format!("/v2/dns/{}/records", domain_id)).await
    }

    pub async fn get_dns_record(&self, domain_id: &str, id: &str) -> ClientResult<DnsRecord> {
        self.get(&format!("/v2/dns/{}/records/{}", domain_id, id))
            .await
    }

    pub async fn create_dns_record(
        &self,
        domain_id: &str,
        config: &DnsRecordConfig,
    ) -> ClientResult<DnsRecord> {
        self.post(&format!("/v2/dns/{}/records", domain_id), config)
            .await
    }

    pub async fn update_dns_record(
        &self,
        domain_id: &str,
        id: &str,
        config: &DnsRecordConfig,
    ) -> ClientResult<DnsRecord> {
        self.put(&format!("/v2/dns/{}/records/{}", domain_id, id), config)
            .await
    }

    pub async fn delete_dns_record(&self, domain_id: &str, id: &str) -> ClientResult<SimpleResponse> {
        self.delete(&format!("/v2/dns/{}/records/{}", domain_id, id))
            .await
    }
}
