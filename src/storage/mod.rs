// src/storage/mod.rs

mod local;
#[cfg(feature = "gcp")]
mod gcs;

pub use local::LocalObjectStore;
#[cfg(feature = "gcp")]
pub use gcs::GcsObjectStore;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::{fmt, path::Path, sync::Arc};

use crate::config::{Backend, PipelineConfig};

/// Bucket/key object storage, the only thing the upload stages talk to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the bytes of the local file at `path` to `bucket/key`,
    /// replacing any object already there. Returns the number of bytes sent.
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64>;

    /// Fetch the full contents of `bucket/key`.
    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;
}

/// A `gs://bucket/key` locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Accepts `gs://bucket/key` and the bare `bucket/key` shorthand.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let rest = match s.split_once("://") {
            Some(("gs", rest)) => rest,
            Some((scheme, _)) => bail!("unsupported scheme `{}`", scheme),
            None => s,
        };
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| anyhow!("missing object key after bucket"))?;
        if bucket.is_empty() {
            bail!("empty bucket name");
        }
        if key.is_empty() || key.ends_with('/') {
            bail!("object key must name a file");
        }
        Ok(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.key)
    }
}

/// Build the single store instance a run shares across all of its files.
pub async fn connect(cfg: &PipelineConfig) -> Result<Arc<dyn ObjectStore>> {
    match cfg.backend {
        Backend::Local => Ok(Arc::new(LocalObjectStore::new(
            cfg.local_root.join("objects"),
        ))),
        #[cfg(feature = "gcp")]
        Backend::Gcp => Ok(Arc::new(
            GcsObjectStore::from_service_account(&cfg.credentials_path()).await?,
        )),
        #[cfg(not(feature = "gcp"))]
        Backend::Gcp => bail!("backend `gcp` requires building with `--features gcp`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri_forms() {
        let a = ObjectUri::parse("gs://caps-bucket/AGENCYMaster_clean.csv").unwrap();
        let b = ObjectUri::parse("caps-bucket/AGENCYMaster_clean.csv").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.bucket, "caps-bucket");
        assert_eq!(a.key, "AGENCYMaster_clean.csv");
        assert_eq!(a.to_string(), "gs://caps-bucket/AGENCYMaster_clean.csv");

        let nested = ObjectUri::parse("gs://b/Raw_Data/x.csv").unwrap();
        assert_eq!(nested.key, "Raw_Data/x.csv");
    }

    #[test]
    fn test_parse_uri_rejects() {
        assert!(ObjectUri::parse("s3://b/x.csv").is_err());
        assert!(ObjectUri::parse("gs://bucket-only").is_err());
        assert!(ObjectUri::parse("gs:///x.csv").is_err());
        assert!(ObjectUri::parse("gs://b/folder/").is_err());
    }

    #[tokio::test]
    async fn test_connect_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig {
            local_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let store = connect(&cfg).await.unwrap();
        assert!(!store.exists("caps-bucket", "nothing.csv").await.unwrap());
    }
}
