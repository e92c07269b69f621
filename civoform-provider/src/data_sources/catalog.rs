//! Filterable list data sources backed by the datalist helper

use async_trait::async_trait;
use civoform_core::datalist::{DataList, DataListConfig, Record};
use civoform_core::provider::{ProviderError, ProviderResult};
use civoform_core::resource::{Resource, State, Value};
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::debug;

use super::DataSourceHandler;
use crate::client::CivoClient;
use crate::resources::{Context, api_error, instance_attributes};
use crate::utils::get_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Size,
    Region,
    DiskImage,
    KubernetesVersion,
    DatabaseVersion,
    Instances,
}

impl Catalog {
    pub const ALL: [Catalog; 6] = [
        Catalog::Size,
        Catalog::Region,
        Catalog::DiskImage,
        Catalog::KubernetesVersion,
        Catalog::DatabaseVersion,
        Catalog::Instances,
    ];

    pub fn resource_type(self) -> &'static str {
        match self {
            Catalog::Size => "size",
            Catalog::Region => "region",
            Catalog::DiskImage => "disk_image",
            Catalog::KubernetesVersion => "kubernetes_version",
            Catalog::DatabaseVersion => "database_version",
            Catalog::Instances => "instances",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Catalog::Size => "Instance, Kubernetes and database sizes",
            Catalog::Region => "Civo regions",
            Catalog::DiskImage => "Disk images available for instances",
            Catalog::KubernetesVersion => "Kubernetes versions available for clusters",
            Catalog::DatabaseVersion => "Database engines and their versions",
            Catalog::Instances => "Instances in a region",
        }
    }

    pub fn config(self) -> DataListConfig {
        let string = |name: &str| AttributeSchema::new(name, AttributeType::String);
        let int = |name: &str| AttributeSchema::new(name, AttributeType::Int);
        let boolean = |name: &str| AttributeSchema::new(name, AttributeType::Bool);
        match self {
            Catalog::Size => DataListConfig::new(
                "sizes",
                vec![
                    string("name"),
                    string("nice_name"),
                    string("type"),
                    int("cpu_cores"),
                    int("gpu_count"),
                    string("gpu_type"),
                    int("ram_mb"),
                    int("disk_gb"),
                    string("description"),
                    boolean("selectable"),
                    AttributeSchema::new("price_monthly", AttributeType::Float),
                ],
            ),
            Catalog::Region => DataListConfig::new(
                "regions",
                vec![
                    string("code"),
                    string("name"),
                    string("type"),
                    string("country"),
                    string("country_name"),
                    boolean("default"),
                    boolean("out_of_capacity"),
                ],
            ),
            Catalog::DiskImage => DataListConfig::new(
                "diskimages",
                vec![
                    string("id"),
                    string("name"),
                    string("version"),
                    string("label"),
                    string("distribution"),
                    string("state"),
                ],
            ),
            Catalog::KubernetesVersion => DataListConfig::new(
                "versions",
                vec![
                    string("version"),
                    string("type"),
                    string("cluster_type"),
                    boolean("default"),
                ],
            ),
            Catalog::DatabaseVersion => DataListConfig::new(
                "versions",
                vec![string("engine"), string("version"), boolean("default")],
            ),
            Catalog::Instances => DataListConfig::new(
                "instances",
                vec![
                    string("id"),
                    string("hostname"),
                    string("region"),
                    string("size"),
                    string("disk_image"),
                    string("network_id"),
                    string("firewall_id"),
                    string("sshkey_id"),
                    string("initial_user"),
                    string("notes"),
                    string("reverse_dns"),
                    string("private_ip"),
                    string("public_ip"),
                    string("status"),
                    string("created_at"),
                    AttributeSchema::new("tags", types::string_list()),
                    int("cpu_cores"),
                    int("ram_mb"),
                    int("disk_gb"),
                ],
            ),
        }
    }

    async fn records(self, client: &CivoClient, resource: &Resource) -> ProviderResult<Vec<Record>> {
        let id = &resource.id;
        let records: Vec<Record> = match self {
            Catalog::Size => client
                .list_sizes()
                .await
                .map_err(api_error(id, "list sizes"))?
                .into_iter()
                .map(|s| {
                    record([
                        ("name", Value::from(s.name)),
                        ("nice_name", Value::from(s.nice_name)),
                        ("type", Value::from(s.size_type)),
                        ("cpu_cores", Value::Int(s.cpu_cores)),
                        ("gpu_count", Value::Int(s.gpu_count)),
                        ("gpu_type", Value::from(s.gpu_type)),
                        ("ram_mb", Value::Int(s.ram_mb)),
                        ("disk_gb", Value::Int(s.disk_gb)),
                        ("description", Value::from(s.description)),
                        ("selectable", Value::Bool(s.selectable)),
                        ("price_monthly", Value::Float(s.price_monthly)),
                    ])
                })
                .collect(),
            Catalog::Region => client
                .list_regions()
                .await
                .map_err(api_error(id, "list regions"))?
                .into_iter()
                .map(|r| {
                    record([
                        ("code", Value::from(r.code)),
                        ("name", Value::from(r.name)),
                        ("type", Value::from(r.region_type)),
                        ("country", Value::from(r.country)),
                        ("country_name", Value::from(r.country_name)),
                        ("default", Value::Bool(r.default)),
                        ("out_of_capacity", Value::Bool(r.out_of_capacity)),
                    ])
                })
                .collect(),
            Catalog::DiskImage => client
                .list_disk_images()
                .await
                .map_err(api_error(id, "list disk images"))?
                .into_iter()
                .map(|i| {
                    record([
                        ("id", Value::from(i.id)),
                        ("name", Value::from(i.name)),
                        ("version", Value::from(i.version)),
                        ("label", Value::from(i.label)),
                        ("distribution", Value::from(i.distribution)),
                        ("state", Value::from(i.state)),
                    ])
                })
                .collect(),
            Catalog::KubernetesVersion => client
                .list_kubernetes_versions()
                .await
                .map_err(api_error(id, "list Kubernetes versions"))?
                .into_iter()
                .map(|v| {
                    record([
                        ("version", Value::from(v.version)),
                        ("type", Value::from(v.version_type)),
                        ("cluster_type", Value::from(v.cluster_type)),
                        ("default", Value::Bool(v.default)),
                    ])
                })
                .collect(),
            Catalog::DatabaseVersion => {
                let mut engines: Vec<_> = client
                    .list_database_versions()
                    .await
                    .map_err(api_error(id, "list database versions"))?
                    .into_iter()
                    .collect();
                // API order is a JSON object; keep results deterministic
                engines.sort_by(|a, b| a.0.cmp(&b.0));
                engines
                    .into_iter()
                    .flat_map(|(engine, versions)| {
                        versions.into_iter().map(move |v| {
                            record([
                                ("engine", Value::from(engine.as_str())),
                                ("version", Value::from(v.software_version)),
                                ("default", Value::Bool(v.default)),
                            ])
                        })
                    })
                    .collect()
            }
            Catalog::Instances => {
                let fields: Vec<String> = self
                    .config()
                    .record_schema
                    .into_iter()
                    .map(|f| f.name)
                    .collect();
                client
                    .list_instances()
                    .await
                    .map_err(api_error(id, "list instances"))?
                    .into_iter()
                    .map(|instance| {
                        let mut attrs = instance_attributes(&instance);
                        attrs.insert("id".to_string(), Value::from(instance.id.as_str()));
                        attrs.insert("region".to_string(), Value::from(client.region()));
                        attrs.retain(|k, _| fields.contains(k));
                        attrs
                    })
                    .collect()
            }
        };
        Ok(records)
    }
}

fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// A list data source evaluated with `filter` and `sort` blocks
pub struct CatalogDataSource(pub Catalog);

#[async_trait]
impl DataSourceHandler for CatalogDataSource {
    fn resource_type(&self) -> &'static str {
        self.0.resource_type()
    }

    fn schema(&self) -> ResourceSchema {
        let schema = self
            .0
            .config()
            .schema(self.0.resource_type())
            .with_description(self.0.description());
        match self.0 {
            Catalog::Instances => schema.attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .optional_computed()
                    .with_description("Region to list; defaults to the provider region"),
            ),
            _ => schema,
        }
    }

    async fn read(&self, ctx: &Context, resource: &Resource) -> ProviderResult<State> {
        let client = ctx.client_for(get_str(&resource.attributes, "region").as_deref());
        let records = self.0.records(&client, resource).await?;
        debug!("{}: fetched {} records", resource.id, records.len());

        let config = self.0.config();
        let mut state = DataList::new(&config).read(resource, records).map_err(|e| {
            ProviderError::new(format!("Invalid {} query", self.0.resource_type()))
                .for_resource(resource.id.clone())
                .with_cause(e)
        })?;
        if self.0 == Catalog::Instances {
            state
                .attributes
                .insert("region".to_string(), Value::from(client.region()));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resources::testing::context;

    fn block(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn names(state: &State, attribute: &str, field: &str) -> Vec<String> {
        state.attributes[attribute]
            .as_list()
            .unwrap()
            .iter()
            .map(|r| r.as_map().unwrap()[field].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn sizes_are_filtered_and_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/sizes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "g3.small", "type": "instance", "cpu_cores": 1, "ram_mb": 2048, "selectable": true},
                {"name": "g3.large", "type": "instance", "cpu_cores": 4, "ram_mb": 8192, "selectable": true},
                {"name": "g4s.kube.small", "type": "kubernetes", "cpu_cores": 1, "ram_mb": 2048, "selectable": true},
                {"name": "g3.medium", "type": "instance", "cpu_cores": 2, "ram_mb": 4096, "selectable": true}
            ])))
            .mount(&server)
            .await;

        let resource = Resource::new("size", "small")
            .with_read_only(true)
            .with_attribute(
                "filter",
                Value::List(vec![
                    block(&[
                        ("key", Value::from("type")),
                        ("values", Value::List(vec![Value::from("instance")])),
                    ]),
                    block(&[
                        ("key", Value::from("cpu_cores")),
                        ("values", Value::List(vec![Value::from("1"), Value::from("2")])),
                    ]),
                ]),
            )
            .with_attribute(
                "sort",
                Value::List(vec![block(&[
                    ("key", Value::from("ram_mb")),
                    ("direction", Value::from("desc")),
                ])]),
            );

        let ctx = context(&server);
        let state = CatalogDataSource(Catalog::Size)
            .read(&ctx, &resource)
            .await
            .unwrap();
        assert_eq!(names(&state, "sizes", "name"), vec!["g3.medium", "g3.small"]);
        assert!(state.identifier.is_some());
    }

    #[tokio::test]
    async fn database_versions_are_flattened_by_engine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/databases/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "postgresql": [{"SoftwareVersion": "14", "Default": true}, {"SoftwareVersion": "13"}],
                "mysql": [{"SoftwareVersion": "8.0", "Default": true}]
            })))
            .mount(&server)
            .await;

        let resource = Resource::new("database_version", "all").with_read_only(true);
        let ctx = context(&server);
        let state = CatalogDataSource(Catalog::DatabaseVersion)
            .read(&ctx, &resource)
            .await
            .unwrap();
        assert_eq!(
            names(&state, "versions", "engine"),
            vec!["mysql", "postgresql", "postgresql"]
        );
        assert_eq!(names(&state, "versions", "version"), vec!["8.0", "14", "13"]);
    }

    #[tokio::test]
    async fn instances_hide_secrets_and_use_requested_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/instances"))
            .and(query_param("region", "NYC1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 1, "per_page": 100, "pages": 1,
                "items": [{
                    "id": "i-1", "hostname": "web-1", "size": "g3.small", "status": "ACTIVE",
                    "initial_password": "hunter2", "tags": ["web"]
                }]
            })))
            .mount(&server)
            .await;

        let resource = Resource::new("instances", "web")
            .with_read_only(true)
            .with_attribute("region", Value::from("NYC1"));
        let ctx = context(&server);
        let state = CatalogDataSource(Catalog::Instances)
            .read(&ctx, &resource)
            .await
            .unwrap();

        let instances = state.attributes["instances"].as_list().unwrap();
        let first = instances[0].as_map().unwrap();
        assert_eq!(first["id"], Value::from("i-1"));
        assert_eq!(first["region"], Value::from("NYC1"));
        assert!(!first.contains_key("initial_password"));
        assert_eq!(state.attributes["region"], Value::from("NYC1"));
    }

    #[tokio::test]
    async fn unknown_filter_key_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"code": "LON1"}])))
            .mount(&server)
            .await;

        let resource = Resource::new("region", "r").with_read_only(true).with_attribute(
            "filter",
            Value::List(vec![block(&[
                ("key", Value::from("capacity")),
                ("values", Value::List(vec![Value::from("x")])),
            ])]),
        );
        let ctx = context(&server);
        let err = CatalogDataSource(Catalog::Region)
            .read(&ctx, &resource)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
