//! Civoform Civo Provider
//!
//! Civo cloud provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - Typed Civo REST API client
//! - `config` - Provider block, environment and credentials file settings
//! - `resources` - Resource handlers (schema plus CRUD per resource type)
//! - `data_sources` - Catalog lists and single-object lookups
//! - `provider` - CivoProvider implementation
//! - `utils` - Attribute conversion helpers

pub mod client;
pub mod config;
pub mod data_sources;
pub mod provider;
pub mod resources;
pub mod utils;

// Re-export main types
pub use config::{ProviderSettings, provider_schema};
pub use provider::{CivoProvider, all_schemas};

use civoform_core::provider::{BoxFuture, Provider, ProviderResult};
use civoform_core::resource::{Resource, ResourceId, State};
use civoform_core::schema::ResourceSchema;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for CivoProvider {
    fn name(&self) -> &'static str {
        "civo"
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        self.resource_schemas()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.lookup_data_source(&resource).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
