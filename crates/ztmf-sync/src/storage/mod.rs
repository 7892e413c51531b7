//! Object storage access for CFACTS drop files.

use crate::error::SyncError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    Client,
};
use tracing::{debug, info, instrument};

pub mod archive;
pub mod config;

pub use archive::{archive_key, Archiver};
pub use config::StorageConfig;

/// The object operations the sync needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> crate::error::Result<Vec<u8>>;

    async fn copy(&self, bucket: &str, source_key: &str, dest_key: &str) -> crate::error::Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> crate::error::Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
}

/// Percent-encodes an object key for use in a copy source, keeping `/`.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

impl Storage {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "ztmf-sync",
                )),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(region = %config.region, "Storage client initialized");

        Ok(Self { client })
    }

    #[instrument(skip(self))]
    pub async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(e)))
            .with_context(|| format!("Failed to download s3://{bucket}/{key}"))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        info!(bytes = data.len(), "Downloaded s3://{}/{}", bucket, key);
        Ok(data)
    }

    #[instrument(skip(self))]
    pub async fn copy_object(&self, bucket: &str, source_key: &str, dest_key: &str) -> Result<()> {
        let copy_source = format!("{}/{}", bucket, encode_key(source_key));

        self.client
            .copy_object()
            .copy_source(&copy_source)
            .bucket(bucket)
            .key(dest_key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(e)))
            .with_context(|| format!("Failed to copy s3://{bucket}/{source_key} to {dest_key}"))?;

        info!("Copied s3://{}/{} to {}", bucket, source_key, dest_key);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(e)))
            .with_context(|| format!("Failed to delete s3://{bucket}/{key}"))?;

        info!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}

fn storage_error(err: anyhow::Error) -> SyncError {
    SyncError::Storage(format!("{err:#}"))
}

#[async_trait]
impl ObjectStore for Storage {
    async fn get(&self, bucket: &str, key: &str) -> crate::error::Result<Vec<u8>> {
        self.download(bucket, key).await.map_err(storage_error)
    }

    async fn copy(&self, bucket: &str, source_key: &str, dest_key: &str) -> crate::error::Result<()> {
        self.copy_object(bucket, source_key, dest_key)
            .await
            .map_err(storage_error)
    }

    async fn delete(&self, bucket: &str, key: &str) -> crate::error::Result<()> {
        self.delete_object(bucket, key).await.map_err(storage_error)
    }
}
