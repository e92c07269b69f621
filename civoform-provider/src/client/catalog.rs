//! Read-only catalog endpoints: sizes, regions and disk images

use serde::Deserialize;

use super::{CivoClient, ClientResult};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InstanceSize {
    pub name: String,
    pub nice_name: String,
    #[serde(rename = "type")]
    pub size_type: String,
    pub cpu_cores: i64,
    pub gpu_count: i64,
    pub gpu_type: String,
    pub ram_mb: i64,
    pub disk_gb: i64,
    pub description: String,
    pub selectable: bool,
    pub price_monthly: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Region {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub region_type: String,
    pub country: String,
    pub country_name: String,
    pub default: bool,
    pub out_of_capacity: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DiskImage {
    pub id: String,
    pub name: String,
    pub version: String,
    pub label: String,
    pub distribution: String,
    pub state: String,
}

impl CivoClient {
    pub async fn list_sizes(&self) -> ClientResult<Vec<InstanceSize>> {
        self.get("/v2/sizes").await
    }

    pub async fn list_regions(&self) -> ClientResult<Vec<Region>> {
        self.get("/v2/regions").await
    }

    pub async fn list_disk_images(&self) -> ClientResult<Vec<DiskImage>> {
        self.get("/v2/disk_images").await
    }

    /// Resolve a disk image by ID or name
    pub async fn find_disk_image(&self, search: &str) -> ClientResult<Option<DiskImage>> {
        let images = self.list_disk_images().await?;
        Ok(images
            .into_iter()
            .find(|i| i.id == search || i.name == search))
    }
}
