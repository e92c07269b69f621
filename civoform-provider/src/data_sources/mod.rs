//! Data sources
//!
//! Read-only lookups against the Civo API. Catalog lists (`size`, `region`,
//! `instances`, ...) go through the generic filter/sort helper in
//! [`civoform_core::datalist`]; single-object lookups find one existing object
//! by `id` or by name.

mod catalog;
mod lookup;

use async_trait::async_trait;
use civoform_core::provider::ProviderResult;
use civoform_core::resource::{Resource, State};
use civoform_core::schema::ResourceSchema;

use crate::resources::Context;

pub use catalog::CatalogDataSource;
pub use lookup::LookupDataSource;

#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    fn resource_type(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    async fn read(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State>;
}

/// Every data source
pub fn data_sources() -> Vec<Box<dyn DataSourceHandler>> {
    let mut sources: Vec<Box<dyn DataSourceHandler>> = Vec::new();
    sources.extend(
        catalog::Catalog::ALL
            .into_iter()
            .map(|c| Box::new(CatalogDataSource(c)) as Box<dyn DataSourceHandler>),
    );
    sources.extend(
        lookup::Lookup::ALL
            .into_iter()
            .map(|l| Box::new(LookupDataSource(l)) as Box<dyn DataSourceHandler>),
    );
    sources
}
