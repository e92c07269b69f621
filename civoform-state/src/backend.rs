//! State backend trait and error types

use std::collections::HashMap;

use async_trait::async_trait;
use civoform_core::resource::Value;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation}, expires {expires})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
        expires: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Failed to create bucket: {0}")]
    BucketCreationFailed(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// A newer civoform wrote this state
    #[error("State file version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("I/O error: {0}")]
    Io(String),

    /// Error from the S3-compatible Object Store
    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
            expires: lock.expires.to_rfc3339(),
        }
    }

    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state; `None` on first use
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state; callers bump the serial first
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock for `operation`
    ///
    /// Fails while another unexpired lock is held. An expired lock is taken over.
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a lock previously returned by `acquire_lock`
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove the lock with `lock_id` regardless of who holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;

    /// Prepare the backend for first use
    async fn init(&self) -> BackendResult<()>;

    async fn bucket_exists(&self) -> BackendResult<bool>;

    async fn create_bucket(&self) -> BackendResult<()>;
}

/// `backend <type> { ... }` block from the configuration file
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// `local` or `s3`
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    /// Local backend with the default path
    pub fn local() -> Self {
        Self {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        }
    }

    /// Non-empty string attribute
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.attributes.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn require_string(&self, key: &str) -> BackendResult<&str> {
        self.get_string(key).ok_or_else(|| {
            BackendError::configuration(format!("Missing required attribute: {}", key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_names_the_holder() {
        let lock = LockInfo::new("apply");
        let error = BackendError::locked(&lock);
        let message = error.to_string();
        assert!(message.contains(&lock.id));
        assert!(message.contains(&lock.who));
        assert!(message.contains("apply"));
    }

    #[test]
    fn config_accessors() {
        let mut config = BackendConfig::local();
        config
            .attributes
            .insert("path".to_string(), Value::from("state.json"));
        config.attributes.insert("key".to_string(), Value::from(""));
        config
            .attributes
            .insert("auto_create".to_string(), Value::Bool(false));

        assert_eq!(config.get_string("path"), Some("state.json"));
        assert_eq!(config.get_string("key"), None);
        assert!(!config.get_bool_or("auto_create", true));
        assert!(config.get_bool_or("missing", true));
        assert!(matches!(
            config.require_string("bucket"),
            Err(BackendError::Configuration(_))
        ));
    }
}
