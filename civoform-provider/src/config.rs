//! Provider configuration
//!
//! Settings come from the `provider civo { ... }` block, then the
//! environment, then the Civo CLI credentials file (`~/.civo.json`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use civoform_core::resource::Value;
use civoform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::client::DEFAULT_API_URL;

pub const DEFAULT_REGION: &str = "LON1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "No Civo API token found: set `token` in the provider block, CIVO_TOKEN, or log in with the Civo CLI"
    )]
    MissingToken,

    #[error("Failed to read credentials file {path}: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid credentials file {path}: {source}")]
    ParseCredentials {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Provider attribute '{0}' must be a string")]
    InvalidAttribute(String),
}

/// Civo CLI credentials file
#[derive(Debug, Deserialize, Default)]
pub struct CredentialsFile {
    #[serde(default)]
    pub apikeys: HashMap<String, String>,
    #[serde(default)]
    pub meta: CredentialsMeta,
}

#[derive(Debug, Deserialize, Default)]
pub struct CredentialsMeta {
    #[serde(default)]
    pub current_apikey: String,
    #[serde(default)]
    pub default_region: String,
    #[serde(default)]
    pub url: String,
}

impl CredentialsFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadCredentials {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::ParseCredentials {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Token of the currently selected API key
    pub fn token(&self) -> Option<&str> {
        self.apikeys
            .get(&self.meta.current_apikey)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Fully resolved provider settings
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub token: String,
    pub region: String,
    pub api_endpoint: String,
}

impl ProviderSettings {
    /// Resolve against the process environment and the user's home directory
    pub fn resolve(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        Self::resolve_with(
            attributes,
            |key| std::env::var(key).ok(),
            dirs::home_dir().map(|h| h.join(".civo.json")),
        )
    }

    /// Resolve with an explicit environment lookup and default credentials path
    pub fn resolve_with(
        attributes: &HashMap<String, Value>,
        lookup: impl Fn(&str) -> Option<String>,
        default_credentials: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let attr = |key: &str| -> Result<Option<String>, ConfigError> {
            match attributes.get(key) {
                None => Ok(None),
                Some(Value::String(s)) if s.is_empty() => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(ConfigError::InvalidAttribute(key.to_string())),
            }
        };
        let env = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let token = attr("token")?.or_else(|| env("CIVO_TOKEN"));
        let region = attr("region")?.or_else(|| env("CIVO_REGION"));
        let api_endpoint = attr("api_endpoint")?.or_else(|| env("CIVO_API_URL"));

        // An explicit credentials_file must exist; the default one is only read
        // when something is still unset
        let credentials = match attr("credentials_file")? {
            Some(path) => CredentialsFile::load(Path::new(&path))?,
            None if token.is_some() && region.is_some() && api_endpoint.is_some() => {
                CredentialsFile::default()
            }
            None => match default_credentials {
                Some(path) if path.exists() => {
                    debug!("Loading Civo credentials from {}", path.display());
                    CredentialsFile::load(&path)?
                }
                _ => CredentialsFile::default(),
            },
        };
        let from_file = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());

        let token = token
            .or_else(|| credentials.token().map(str::to_string))
            .ok_or(ConfigError::MissingToken)?;
        let region = region
            .or_else(|| from_file(&credentials.meta.default_region))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let api_endpoint = api_endpoint
            .or_else(|| from_file(&credentials.meta.url))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            token,
            region,
            api_endpoint,
        })
    }
}

/// Schema of the `provider civo { ... }` block
pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("provider")
        .with_description("Civo provider configuration")
        .attribute(
            AttributeSchema::new("token", types::non_empty_string())
                .sensitive()
                .with_description("API token; falls back to CIVO_TOKEN and the CLI credentials"),
        )
        .attribute(
            AttributeSchema::new("region", AttributeType::String)
                .with_description("Default region for every resource"),
        )
        .attribute(AttributeSchema::new("api_endpoint", AttributeType::String))
        .attribute(AttributeSchema::new("credentials_file", AttributeType::String))
}
