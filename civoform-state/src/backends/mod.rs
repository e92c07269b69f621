//! Backend implementations for state storage

mod local;
mod s3;

pub use local::LocalBackend;
pub use s3::{S3Backend, S3Settings};

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::state::StateFile;

/// Create a backend from configuration
pub async fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" => Ok(Box::new(LocalBackend::from_config(config)?)),
        "s3" => {
            let backend = S3Backend::from_config(config).await?;
            Ok(Box::new(backend))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}

/// Parse a stored state file, refusing versions this build cannot read
pub(crate) fn parse_state(bytes: &[u8]) -> BackendResult<StateFile> {
    let state: StateFile = serde_json::from_slice(bytes)
        .map_err(|e| BackendError::InvalidState(format!("Failed to parse state file: {}", e)))?;
    if state.version > StateFile::CURRENT_VERSION {
        return Err(BackendError::UnsupportedVersion {
            found: state.version,
            supported: StateFile::CURRENT_VERSION,
        });
    }
    Ok(state)
}

pub(crate) fn serialize_state(state: &StateFile) -> BackendResult<Vec<u8>> {
    serde_json::to_vec_pretty(state)
        .map_err(|e| BackendError::Serialization(format!("Failed to serialize state: {}", e)))
}
