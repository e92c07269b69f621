//! `civo.dns_domain_record` - records inside a DNS domain

use async_trait::async_trait;
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{ResourceId, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::{Context, ResourceHandler, api_error, found, id_attribute, split_pair};
use crate::client::{DnsRecord, DnsRecordConfig};
use crate::utils::{Attributes, ObjectRef, get_int, require_str, set, set_str};

pub const RECORD_TYPES: [&str; 6] = ["A", "CNAME", "MX", "SRV", "TXT", "NS"];
const MIN_TTL: i64 = 600;

pub struct DnsDomainRecordHandler;

pub(crate) fn record_attributes(record: &DnsRecord) -> Attributes {
    let mut attrs = Attributes::new();
    set_str(&mut attrs, "id", &record.id);
    set_str(&mut attrs, "domain_id", &record.domain_id);
    set_str(&mut attrs, "account_id", &record.account_id);
    set_str(&mut attrs, "type", &record.record_type);
    set_str(&mut attrs, "name", &record.name);
    set_str(&mut attrs, "value", &record.value);
    set(&mut attrs, "priority", record.priority);
    set(&mut attrs, "ttl", record.ttl);
    set_str(&mut attrs, "created_at", &record.created_at);
    set_str(&mut attrs, "updated_at", &record.updated_at);
    attrs
}

fn record_state(id: &ResourceId, domain_id: &str, record: &DnsRecord) -> State {
    let mut attrs = record_attributes(record);
    set_str(&mut attrs, "domain_id", domain_id);
    State::existing(id.clone(), attrs).with_identifier(format!("{}:{}", domain_id, record.id))
}

fn record_config(id: &ResourceId, attrs: &Attributes) -> ProviderResult<DnsRecordConfig> {
    let record_type = require_str(id, attrs, "type")?;
    let priority = get_int(attrs, "priority").unwrap_or(0);
    if matches!(record_type.as_str(), "MX" | "SRV") && get_int(attrs, "priority").is_none() {
        return Err(ProviderError::new(format!("{} records need a priority", record_type))
            .for_resource(id.clone()));
    }
    Ok(DnsRecordConfig {
        record_type,
        name: require_str(id, attrs, "name")?,
        value: require_str(id, attrs, "value")?,
        priority,
        ttl: get_int(attrs, "ttl").unwrap_or(MIN_TTL),
    })
}

#[async_trait]
impl ResourceHandler for DnsDomainRecordHandler {
    fn resource_type(&self) -> &'static str {
        "dns_domain_record"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("dns_domain_record")
            .with_description("A record in a DNS domain")
            .attribute(id_attribute())
            .attribute(
                AttributeSchema::new("domain_id", types::non_empty_string())
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("type", types::one_of(&RECORD_TYPES)).required())
            .attribute(AttributeSchema::new("name", types::non_empty_string()).required())
            .attribute(AttributeSchema::new("value", types::non_empty_string()).required())
            .attribute(
                AttributeSchema::new("priority", AttributeType::Int)
                    .with_description("Required for MX and SRV records"),
            )
            .attribute(
                AttributeSchema::new("ttl", types::int_at_least("ttl", MIN_TTL))
                    .with_default(Value::Int(MIN_TTL)),
            )
            .attribute(AttributeSchema::new("account_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
            .attribute(AttributeSchema::new("updated_at", AttributeType::String).computed())
    }

    async fn create(&self, ctx: &Context, id: &ResourceId, attrs: &Attributes) -> ProviderResult<State> {
        let domain_id = require_str(id, attrs, "domain_id")?;
        let config = record_config(id, attrs)?;
        info!(
            "Creating {} record {} in domain {}",
            config.record_type, config.name, domain_id
        );
        let record = ctx
            .client
            .create_dns_record(&domain_id, &config)
            .await
            .map_err(api_error(id, "create DNS record"))?;
        Ok(record_state(id, &domain_id, &record))
    }

    async fn read(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<State> {
        let (domain_id, record_id) = split_pair(id, &object.id)?;
        Ok(
            match found(
                id,
                "read DNS record",
                ctx.client.get_dns_record(&domain_id, &record_id).await,
            )? {
                Some(record) => record_state(id, &domain_id, &record),
                None => State::not_found(id.clone()),
            },
        )
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &ResourceId,
        object: &ObjectRef,
        _from: &State,
        attrs: &Attributes,
    ) -> ProviderResult<State> {
        let (domain_id, record_id) = split_pair(id, &object.id)?;
        let config = record_config(id, attrs)?;
        let record = ctx
            .client
            .update_dns_record(&domain_id, &record_id, &config)
            .await
            .map_err(api_error(id, "update DNS record"))?;
        Ok(record_state(id, &domain_id, &record))
    }

    async fn delete(&self, ctx: &Context, id: &ResourceId, object: &ObjectRef) -> ProviderResult<()> {
        let (domain_id, record_id) = split_pair(id, &object.id)?;
        found(
            id,
            "delete DNS record",
            ctx.client.delete_dns_record(&domain_id, &record_id).await,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn attrs(record_type: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("domain_id".to_string(), Value::from("d-1"));
        attrs.insert("type".to_string(), Value::from(record_type));
        attrs.insert("name".to_string(), Value::from("www"));
        attrs.insert("value".to_string(), Value::from("10.0.0.1"));
        attrs
    }

    #[test]
    fn mx_requires_priority() {
        let id = ResourceId::new("dns_domain_record", "mail");
        assert!(record_config(&id, &attrs("MX")).is_err());
        let config = record_config(&id, &attrs("A")).unwrap();
        assert_eq!(config.ttl, MIN_TTL);
    }

    #[test]
    fn ttl_below_minimum_fails_validation() {
        let schema = DnsDomainRecordHandler.schema();
        let mut a = attrs("A");
        a.insert("ttl".to_string(), Value::Int(60));
        assert!(schema.validate(&a).is_err());
        a.insert("ttl".to_string(), Value::Int(3600));
        assert!(schema.validate(&a).is_ok());
    }

    #[tokio::test]
    async fn create_records_domain_in_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/dns/d-1/records"))
            .and(body_partial_json(json!({"type": "A", "name": "www", "ttl": 600})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "r-1", "domain_id": "d-1", "type": "A", "name": "www",
                "value": "10.0.0.1", "ttl": 600, "priority": 0
            })))
            .mount(&server)
            .await;

        let ctx = context(&server);
        let state = DnsDomainRecordHandler
            .create(&ctx, &ResourceId::new("dns_domain_record", "www"), &attrs("A"))
            .await
            .unwrap();
        assert_eq!(state.identifier.as_deref(), Some("d-1:r-1"));
        assert_eq!(state.attributes["type"], Value::from("A"));
    }
}
