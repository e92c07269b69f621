//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific cloud.
//! It is responsible for converting Effects into actual API calls.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}] {}", id, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "civo")
    fn name(&self) -> &'static str;

    /// Schemas for every resource type and data source this Provider handles
    fn schemas(&self) -> Vec<ResourceSchema>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the object is gone or no identifier is known.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Evaluate a data source against the live API
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the Civo object ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Look up the schema for one resource type or data source
    fn schema(&self, resource_type: &str, data_source: bool) -> Option<ResourceSchema> {
        self.schemas()
            .into_iter()
            .find(|s| s.resource_type == resource_type && s.is_data_source() == data_source)
    }
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        (**self).schemas()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::resource::Value;

    /// In-memory provider that records every call
    #[derive(Default)]
    pub struct MockProvider {
        pub calls: Mutex<Vec<String>>,
        pub fail_on: Option<String>,
        objects: Mutex<HashMap<String, HashMap<String, Value>>>,
        counter: Mutex<u32>,
    }

    impl MockProvider {
        pub fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn schemas(&self) -> Vec<ResourceSchema> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let found = identifier.and_then(|i| {
                self.objects
                    .lock()
                    .unwrap()
                    .get(i)
                    .cloned()
                    .map(|attrs| (i.to_string(), attrs))
            });
            Box::pin(async move {
                Ok(match found {
                    Some((identifier, attrs)) => {
                        State::existing(id, attrs).with_identifier(identifier)
                    }
                    None => State::not_found(id),
                })
            })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.user_attributes();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("data")) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("create {}", resource.id));
            let id = resource.id.clone();
            if self.fail_on.as_deref() == Some(id.name.as_str()) {
                return Box::pin(async move {
                    Err(ProviderError::new("create failed").for_resource(id))
                });
            }
            let identifier = {
                let mut counter = self.counter.lock().unwrap();
                *counter += 1;
                format!("{}-{}", id.name, counter)
            };
            let mut attrs = resource.user_attributes();
            attrs.insert("id".to_string(), Value::String(identifier.clone()));
            self.objects
                .lock()
                .unwrap()
                .insert(identifier.clone(), attrs.clone());
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier(identifier)) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            self.record(format!("update {}", id));
            let id = id.clone();
            let identifier = identifier.to_string();
            let mut attrs = to.user_attributes();
            attrs.insert("id".to_string(), Value::String(identifier.clone()));
            self.objects
                .lock()
                .unwrap()
                .insert(identifier.clone(), attrs.clone());
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier(identifier)) })
        }

        fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.record(format!("delete {}", id));
            self.objects.lock().unwrap().remove(identifier);
            Box::pin(async { Ok(()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProvider;
    use super::*;

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider = MockProvider::default();
        let id = ResourceId::new("network", "prod");
        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_then_read() {
        let provider = MockProvider::default();
        let resource = Resource::new("network", "prod");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("prod-1".to_string()));

        let read = provider
            .read(&resource.id, state.identifier.as_deref())
            .await
            .unwrap();
        assert!(read.exists);
    }

    #[test]
    fn error_display_includes_resource_and_cause() {
        let err = ProviderError::new("Failed to create")
            .for_resource(ResourceId::new("volume", "data"))
            .with_cause(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "[volume.data] Failed to create: boom");
    }
}
