use anyhow::{Context, Result};
use async_trait::async_trait;
use google_cloud_storage::{
    client::{google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig},
    http::{
        objects::{
            download::Range,
            get::GetObjectRequest,
            upload::{Media, UploadObjectRequest, UploadType},
        },
        Error as GcsError,
    },
};
use std::path::Path;
use tracing::{debug, info};

use super::ObjectStore;

/// Google Cloud Storage, authenticated once from a service-account key file.
pub struct GcsObjectStore {
    client: Client,
}

impl GcsObjectStore {
    pub async fn from_service_account(key_file: &Path) -> Result<Self> {
        let cred = CredentialsFile::new_from_file(key_file.display().to_string())
            .await
            .with_context(|| format!("reading service account key {}", key_file.display()))?;
        let config = ClientConfig::default()
            .with_credentials(cred)
            .await
            .context("authenticating to GCS")?;
        info!(key_file = %key_file.display(), "GCS client ready");
        Ok(Self {
            client: Client::new(config),
        })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let len = data.len() as u64;

        let mut media = Media::new(key.to_string());
        media.content_length = Some(len);
        let request = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        self.client
            .upload_object(&request, data, &UploadType::Simple(media))
            .await
            .with_context(|| format!("uploading {} to GCS bucket {}", key, bucket))?;
        debug!(object = %key, bytes = len, "uploaded to GCS");
        Ok(len)
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let request = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };
        self.client
            .download_object(&request, &Range::default())
            .await
            .with_context(|| format!("downloading gs://{}/{}", bucket, key))
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let request = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };
        match self.client.get_object(&request).await {
            Ok(_) => Ok(true),
            Err(GcsError::Response(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(e).with_context(|| format!("looking up gs://{}/{}", bucket, key)),
        }
    }
}
