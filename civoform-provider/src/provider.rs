//! Civo provider implementation
//!
//! Owns the API client and routes each operation to the resource handler or
//! data source registered for the resource type.

use std::collections::HashMap;

use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{Resource, ResourceId, State, Value};
use civoform_core::schema::ResourceSchema;
use log::debug;

use crate::client::CivoClient;
use crate::config::ProviderSettings;
use crate::data_sources::{DataSourceHandler, data_sources};
use crate::resources::{Context, ResourceHandler, WaitSettings, handlers};
use crate::utils::{Attributes, ObjectRef};

/// Every resource and data source schema, resources first, each group by type
///
/// Needs no credentials, so configurations can be validated offline.
pub fn all_schemas() -> Vec<ResourceSchema> {
    let schemas = handlers().into_iter().map(|h| h.schema());
    sorted_schemas(schemas.chain(data_sources().into_iter().map(|d| d.schema())))
}

fn sorted_schemas(schemas: impl Iterator<Item = ResourceSchema>) -> Vec<ResourceSchema> {
    let mut schemas: Vec<_> = schemas.collect();
    schemas.sort_by(|a, b| {
        (a.is_data_source(), &a.resource_type).cmp(&(b.is_data_source(), &b.resource_type))
    });
    schemas
}

/// Record the write-only values that were sent, since reads never return them
fn with_write_only(handler: &dyn ResourceHandler, sent: &Attributes, mut state: State) -> State {
    if state.exists {
        handler
            .schema()
            .carry_write_only(sent, &mut state.attributes);
    }
    state
}

/// Civo Provider
pub struct CivoProvider {
    ctx: Context,
    handlers: HashMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl CivoProvider {
    pub fn new(settings: &ProviderSettings) -> ProviderResult<Self> {
        let client = CivoClient::new(&settings.token, &settings.region, &settings.api_endpoint)
            .map_err(|e| ProviderError::new("Failed to create Civo API client").with_cause(e))?;
        Ok(Self::with_client(client))
    }

    /// Build from the attributes of a `provider civo { ... }` block
    pub fn from_config(attributes: &HashMap<String, Value>) -> ProviderResult<Self> {
        let settings = ProviderSettings::resolve(attributes)
            .map_err(|e| ProviderError::new("Invalid provider configuration").with_cause(e))?;
        debug!(
            "Civo provider: region {}, endpoint {}",
            settings.region, settings.api_endpoint
        );
        Self::new(&settings)
    }

    pub fn with_client(client: CivoClient) -> Self {
        Self {
            ctx: Context::new(client),
            handlers: handlers()
                .into_iter()
                .map(|h| (h.resource_type(), h))
                .collect(),
            data_sources: data_sources()
                .into_iter()
                .map(|d| (d.resource_type(), d))
                .collect(),
        }
    }

    pub fn with_wait_settings(mut self, waits: WaitSettings) -> Self {
        self.ctx.waits = waits;
        self
    }

    /// Default region of the provider
    pub fn region(&self) -> &str {
        self.ctx.client.region()
    }

    pub fn resource_schemas(&self) -> Vec<ResourceSchema> {
        let schemas = self.handlers.values().map(|h| h.schema());
        sorted_schemas(schemas.chain(self.data_sources.values().map(|d| d.schema())))
    }

    fn handler(&self, id: &ResourceId) -> ProviderResult<&dyn ResourceHandler> {
        self.handlers
            .get(id.resource_type.as_str())
            .map(|h| h.as_ref())
            .ok_or_else(|| {
                ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                    .for_resource(id.clone())
            })
    }

    /// Desired attributes with schema defaults filled in and enum values
    /// stripped of their namespace
    fn desired_attributes(&self, handler: &dyn ResourceHandler, resource: &Resource) -> Attributes {
        let schema = handler.schema();
        let mut attrs = resource.user_attributes();
        schema.apply_defaults(&mut attrs);
        schema.normalize_enums(&mut attrs);
        attrs
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let handler = self.handler(id)?;
        let identifier = match identifier {
            Some(identifier) if !identifier.is_empty() => identifier,
            _ => return Ok(State::not_found(id.clone())),
        };
        handler
            .read(&self.ctx, id, &ObjectRef::parse(identifier))
            .await
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let handler = self.handler(&resource.id)?;
        let attrs = self.desired_attributes(handler, resource);
        debug!("Create {} with {} attributes", resource.id, attrs.len());
        let state = handler.create(&self.ctx, &resource.id, &attrs).await?;
        Ok(with_write_only(handler, &attrs, state))
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let handler = self.handler(id)?;
        let attrs = self.desired_attributes(handler, to);
        debug!("Update {} ({})", id, identifier);
        let state = handler
            .update(&self.ctx, id, &ObjectRef::parse(identifier), from, &attrs)
            .await?;
        Ok(with_write_only(handler, &attrs, state))
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let handler = self.handler(id)?;
        debug!("Delete {} ({})", id, identifier);
        handler
            .delete(&self.ctx, id, &ObjectRef::parse(identifier))
            .await
    }

    pub async fn lookup_data_source(&self, resource: &Resource) -> ProviderResult<State> {
        let source = self
            .data_sources
            .get(resource.id.resource_type.as_str())
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Unknown data source: {}",
                    resource.id.resource_type
                ))
                .for_resource(resource.id.clone())
            })?;
        let schema = source.schema();
        let mut attrs = resource.user_attributes();
        schema.apply_defaults(&mut attrs);
        schema.normalize_enums(&mut attrs);
        let resource = Resource {
            attributes: attrs,
            ..resource.clone()
        };
        source.read(&self.ctx, &resource).await
    }
}
