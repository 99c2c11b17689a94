use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::ObjectStore;

/// Object store backed by a directory tree: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk location of `bucket/key`. Keys may contain `/` but never
    /// step outside the bucket directory.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("object key `{}` is not a plain relative path", key);
        }
        if bucket.is_empty() || bucket.contains('/') {
            bail!("invalid bucket `{}`", bucket);
        }
        Ok(self.root.join(bucket).join(rel))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<u64> {
        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        // copy under a temp name, then rename into place
        let tmp = dest.with_extension("upload.tmp");
        let bytes = fs::copy(path, &tmp)
            .await
            .with_context(|| format!("copying {} to {}", path.display(), tmp.display()))?;
        fs::rename(&tmp, &dest)
            .await
            .with_context(|| format!("renaming {} to {}", tmp.display(), dest.display()))?;

        debug!(object = %dest.display(), bytes, "stored object");
        Ok(bytes)
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path)
            .await
            .with_context(|| format!("object gs://{}/{} not found", bucket, key))
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path(bucket, key)?;
        Ok(fs::try_exists(&path).await? && path.is_file())
    }
}
