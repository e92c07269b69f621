//! Loading and checking a configuration file

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use civoform_core::parser::{self, ParsedFile};
use civoform_core::resolver::{get_resource_dependencies, sort_resources_by_dependencies};
use civoform_core::resource::{Resource, Value};
use civoform_core::schema::ResourceSchema;
use civoform_provider::{CivoProvider, provider_schema};
use civoform_state::{BackendConfig, StateBackend, create_backend};

/// A parsed configuration file
pub struct Workspace {
    pub parsed: ParsedFile,
    /// Resources and data sources in dependency order
    pub resources: Vec<Resource>,
}

impl Workspace {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_source(&content)
    }

    pub fn from_source(content: &str) -> Result<Self, String> {
        let parsed =
            parser::parse_and_resolve(content).map_err(|e| format!("Parse error: {}", e))?;

        if let Some(other) = parsed.providers.iter().find(|p| p.name != "civo") {
            return Err(format!("Unsupported provider: {}", other.name));
        }
        for resource in &parsed.resources {
            if let Some(provider) = resource.attributes.get("_provider").and_then(Value::as_str)
                && provider != "civo"
            {
                return Err(format!(
                    "{}: unsupported provider '{}'",
                    resource.id, provider
                ));
            }
        }

        let resources = sort_resources_by_dependencies(&parsed.resources);
        Ok(Self { parsed, resources })
    }

    /// Check the provider block and every resource against its schema,
    /// reporting all problems at once
    pub fn validate(&self, schemas: &[ResourceSchema]) -> Result<(), String> {
        let mut errors = Vec::new();

        if let Some(provider) = self.parsed.provider("civo")
            && let Err(errs) = provider_schema().validate(&provider.attributes)
        {
            errors.extend(errs.iter().map(|e| format!("provider civo: {}", e)));
        }

        let mut seen = HashSet::new();
        for resource in &self.resources {
            if !seen.insert((&resource.id, resource.is_data_source())) {
                errors.push(format!("{}: declared more than once", resource.id));
                continue;
            }
            match find_schema(schemas, resource) {
                Some(schema) => {
                    if let Err(errs) = schema.validate(&resource.attributes) {
                        errors.extend(errs.iter().map(|e| format!("{}: {}", resource.id, e)));
                    }
                }
                None if resource.is_data_source() => errors.push(format!(
                    "{}: unknown data source '{}'",
                    resource.id, resource.id.resource_type
                )),
                None => errors.push(format!(
                    "{}: unknown resource type '{}'",
                    resource.id, resource.id.resource_type
                )),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Managed resources, in dependency order
    pub fn managed(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| !r.is_data_source())
    }

    pub fn is_declared(&self, address: &str) -> bool {
        self.managed().any(|r| r.id.address() == address)
    }

    /// State addresses of the managed resources `resource` references
    pub fn dependency_addresses(&self, resource: &Resource) -> Vec<String> {
        let bindings = get_resource_dependencies(resource);
        self.managed()
            .filter(|r| r.binding().is_some_and(|b| bindings.contains(b)))
            .map(|r| r.id.address())
            .collect()
    }

    pub fn provider(&self) -> Result<CivoProvider, String> {
        let attributes = self
            .parsed
            .provider("civo")
            .map(|p| p.attributes.clone())
            .unwrap_or_default();
        CivoProvider::from_config(&attributes).map_err(|e| e.to_string())
    }

    /// Backend block, or the local file backend when none is declared
    pub fn backend_config(&self) -> BackendConfig {
        match &self.parsed.backend {
            Some(backend) => BackendConfig {
                backend_type: backend.backend_type.clone(),
                attributes: backend.attributes.clone(),
            },
            None => BackendConfig::local(),
        }
    }

    pub async fn backend(&self) -> Result<Box<dyn StateBackend>, String> {
        create_backend(&self.backend_config())
            .await
            .map_err(|e| e.to_string())
    }
}

fn find_schema<'a>(schemas: &'a [ResourceSchema], resource: &Resource) -> Option<&'a ResourceSchema> {
    schemas.iter().find(|s| {
        s.resource_type == resource.id.resource_type
            && s.is_data_source() == resource.is_data_source()
    })
}

/// Managed resource schemas keyed by type, as the differ wants them
pub fn resource_schema_map(schemas: &[ResourceSchema]) -> HashMap<String, ResourceSchema> {
    schemas
        .iter()
        .filter(|s| !s.is_data_source())
        .map(|s| (s.resource_type.clone(), s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use civoform_provider::all_schemas;

    use super::*;

    const CONFIG: &str = r#"
        provider civo {
            region = "NYC1"
        }

        backend local {
            path = "prod.state.json"
        }

        let net = civo.network {
            label = "prod"
        }

        let fw = civo.firewall {
            name = "web"
            network_id = net.id
        }

        let small = read civo.size {
            filter {
                key = "name"
                values = ["g3.small"]
            }
        }
    "#;

    #[test]
    fn loads_in_dependency_order() {
        let workspace = Workspace::from_source(CONFIG).unwrap();
        let order: Vec<_> = workspace.managed().map(|r| r.id.address()).collect();
        assert_eq!(order, vec!["network.net", "firewall.fw"]);
        assert!(workspace.is_declared("firewall.fw"));
        assert!(!workspace.is_declared("size.small"));

        let fw = workspace
            .resources
            .iter()
            .find(|r| r.id.name == "fw")
            .unwrap();
        assert_eq!(workspace.dependency_addresses(fw), vec!["network.net"]);
    }

    #[test]
    fn valid_configuration_passes() {
        let workspace = Workspace::from_source(CONFIG).unwrap();
        workspace.validate(&all_schemas()).unwrap();

        let backend = workspace.backend_config();
        assert_eq!(backend.backend_type, "local");
        assert_eq!(backend.get_string("path"), Some("prod.state.json"));
    }

    #[test]
    fn reports_every_problem() {
        let workspace = Workspace::from_source(
            r#"
            let net = civo.network {
                label = "prod"
                colour = "blue"
            }
            let b = civo.bucket {
                name = "x"
            }
            let v = civo.volume {
                name = "data"
            }
        "#,
        )
        .unwrap();

        let errors = workspace.validate(&all_schemas()).unwrap_err();
        assert!(errors.contains("network.net: colour"));
        assert!(errors.contains("unknown resource type 'bucket'"));
        assert!(errors.contains("volume.v: size_gb"));
    }

    #[test]
    fn rejects_other_providers() {
        let err = Workspace::from_source(r#"provider aws { region = "us-east-1" }"#)
            .err()
            .unwrap();
        assert!(err.contains("Unsupported provider: aws"));
    }

    #[test]
    fn defaults_to_local_backend() {
        let workspace = Workspace::from_source("").unwrap();
        assert_eq!(workspace.backend_config().backend_type, "local");
    }
}
