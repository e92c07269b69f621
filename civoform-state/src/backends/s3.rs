//! Civo Object Store backend
//!
//! The Object Store speaks the S3 protocol, so the state file and its lock are
//! plain objects in a bucket reached through `aws-sdk-s3` with a Civo endpoint.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;

use super::{parse_state, serialize_state};
use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

const DEFAULT_REGION: &str = "LON1";

/// Connection settings parsed from a `backend s3 { ... }` block
#[derive(Debug, Clone, PartialEq)]
pub struct S3Settings {
    pub bucket: String,
    pub key: String,
    /// Civo region code (`LON1`)
    pub region: String,
    pub endpoint: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Create the bucket on `init` when missing (default: true)
    pub auto_create: bool,
}

impl S3Settings {
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let bucket = config.require_string("bucket")?.to_string();
        let key = config.require_string("key")?.to_string();
        let region = config
            .get_string("region")
            .map(region_code)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = config
            .get_string("endpoint")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_endpoint(&region));

        let access_key = config.get_string("access_key").map(str::to_string);
        let secret_key = config.get_string("secret_key").map(str::to_string);
        if access_key.is_some() != secret_key.is_some() {
            return Err(BackendError::configuration(
                "access_key and secret_key must be set together",
            ));
        }

        Ok(Self {
            bucket,
            key,
            region,
            endpoint,
            access_key,
            secret_key,
            auto_create: config.get_bool_or("auto_create", true),
        })
    }

    pub fn lock_key(&self) -> String {
        format!("{}.lock", self.key)
    }
}

/// State stored in a Civo Object Store bucket
pub struct S3Backend {
    client: Client,
    settings: S3Settings,
}

impl S3Backend {
    pub async fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let settings = S3Settings::from_config(config)?;

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.to_lowercase()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(&settings.endpoint)
            .force_path_style(true);
        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            builder = builder.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "civoform-backend",
            ));
        }

        log::debug!(
            "Using object store {} bucket {} key {}",
            settings.endpoint,
            settings.bucket,
            settings.key
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            settings,
        })
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    async fn get_object(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| BackendError::Io(e.to_string()))?;
                Ok(Some(body.into_bytes().to_vec()))
            }
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(BackendError::ObjectStore(err.to_string())),
        }
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| BackendError::ObjectStore(e.to_string()))?;
        Ok(())
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        match self.get_object(&self.settings.lock_key()).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| BackendError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn delete_lock(&self) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(&self.settings.bucket)
            .key(self.settings.lock_key())
            .send()
            .await
            .map_err(|e| BackendError::ObjectStore(e.to_string()))?;
        Ok(())
    }

    async fn check_lock_id(&self, lock_id: &str) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock_id.to_string()))?;
        if existing.id != lock_id {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StateBackend for S3Backend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        match self.get_object(&self.settings.key).await? {
            Some(bytes) => parse_state(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let body = serialize_state(state)?;
        self.put_object(&self.settings.key, body).await
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            log::warn!(
                "Taking over expired lock {} held by {}",
                existing.id,
                existing.who
            );
            self.delete_lock().await?;
        }

        let lock = LockInfo::new(operation);
        let body = serde_json::to_vec_pretty(&lock)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        self.put_object(&self.settings.lock_key(), body).await?;

        // Another writer may have raced us; the object that stuck wins
        match self.read_lock().await? {
            Some(written) if written.id != lock.id => Err(BackendError::locked(&written)),
            _ => Ok(lock),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        self.check_lock_id(&lock.id).await?;
        self.delete_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        self.check_lock_id(lock_id).await?;
        self.delete_lock().await
    }

    async fn init(&self) -> BackendResult<()> {
        if !self.bucket_exists().await? {
            if self.settings.auto_create {
                self.create_bucket().await?;
            } else {
                return Err(BackendError::BucketNotFound(self.settings.bucket.clone()));
            }
        }

        if self.read_state().await?.is_none() {
            self.write_state(&StateFile::new()).await?;
        }
        Ok(())
    }

    async fn bucket_exists(&self) -> BackendResult<bool> {
        match self
            .client
            .head_bucket()
            .bucket(&self.settings.bucket)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some() || is_not_found(&err) => Ok(false),
            Err(err) => Err(BackendError::ObjectStore(err.to_string())),
        }
    }

    async fn create_bucket(&self) -> BackendResult<()> {
        log::info!("Creating state bucket {}", self.settings.bucket);
        self.client
            .create_bucket()
            .bucket(&self.settings.bucket)
            .send()
            .await
            .map_err(|e| BackendError::BucketCreationFailed(e.to_string()))?;
        Ok(())
    }
}

/// `civo.Region.LON1` and `lon1` both become `LON1`
fn region_code(value: &str) -> String {
    value.rsplit('.').next().unwrap_or(value).to_uppercase()
}

fn default_endpoint(region: &str) -> String {
    format!("https://objectstore.{}.civo.com", region.to_lowercase())
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|raw| raw.status().as_u16() == 404)
}
