//! Civoform State Management
//!
//! Persists what civoform has created so later runs can read, update and
//! destroy it. State lives in a local JSON file or in a bucket on the Civo
//! Object Store, guarded by a lock object.
//!
//! # Overview
//!
//! - **StateFile**: every managed resource with its Civo identifier
//! - **StateBackend**: storage for the state file and its lock
//! - **LockInfo**: who holds the lock, and until when
//!
//! # Example
//!
//! ```ignore
//! use civoform_state::{create_backend, BackendConfig};
//!
//! let config = BackendConfig {
//!     backend_type: "s3".to_string(),
//!     attributes: [
//!         ("bucket".to_string(), Value::from("civoform-state")),
//!         ("key".to_string(), Value::from("prod/civoform.state.json")),
//!         ("region".to_string(), Value::from("LON1")),
//!     ].into_iter().collect(),
//! };
//!
//! let backend = create_backend(&config).await?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply changes ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, S3Backend, S3Settings, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
