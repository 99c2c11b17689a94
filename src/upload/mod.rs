// src/upload/mod.rs

use anyhow::{bail, Context, Result};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{error, info, instrument};

use crate::config::{ErrorPolicy, UploadStage, UploadTask};
use crate::storage::{ObjectStore, ObjectUri};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { bytes: u64 },
    /// The local file did not exist, nothing was sent.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub name: String,
    pub source: PathBuf,
    pub object: ObjectUri,
    pub outcome: UploadOutcome,
}

/// Per-file outcomes of one stage run, in task order.
#[derive(Debug, Default, Clone)]
pub struct UploadReport {
    pub results: Vec<FileResult>,
}

impl UploadReport {
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Uploaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Failed { .. }))
    }

    pub fn total_bytes(&self) -> u64 {
        self.results
            .iter()
            .map(|r| match r.outcome {
                UploadOutcome::Uploaded { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Pushes a stage's files into one bucket through a single shared store.
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
        }
    }

    /// Upload every task of `stage` in order, one at a time.
    ///
    /// Under [`ErrorPolicy::IsolateAndContinue`] a missing file or failed
    /// upload is logged and recorded, and the remaining files are still
    /// attempted; the call itself only returns `Ok`. Under
    /// [`ErrorPolicy::FailFast`] the first such failure is returned.
    pub async fn run(&self, label: &str, stage: &UploadStage) -> Result<UploadReport> {
        let start = Instant::now();
        let mut report = UploadReport::default();
        info!(
            stage = label,
            bucket = %self.bucket,
            files = stage.tasks.len(),
            policy = stage.policy.as_str(),
            "starting uploads"
        );

        for task in &stage.tasks {
            let key = stage.destination_key(task);
            let object = ObjectUri::new(&self.bucket, &key);

            let outcome = if !task.source.exists() {
                error!(file = %task.source.display(), "File {} does not exist.", task.source.display());
                if stage.policy == ErrorPolicy::FailFast {
                    bail!("{} stage: file {} does not exist", label, task.source.display());
                }
                UploadOutcome::Skipped
            } else {
                match self.upload_one(task, &key).await {
                    Ok(bytes) => {
                        info!(
                            blob = %key,
                            bucket = %self.bucket,
                            bytes,
                            "Successfully uploaded {} to bucket {}", key, self.bucket
                        );
                        UploadOutcome::Uploaded { bytes }
                    }
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        error!(
                            blob = %key,
                            bucket = %self.bucket,
                            error = %reason,
                            "Error uploading {} to bucket {}", key, self.bucket
                        );
                        if stage.policy == ErrorPolicy::FailFast {
                            return Err(e).with_context(|| format!("{} stage aborted", label));
                        }
                        UploadOutcome::Failed { reason }
                    }
                }
            };

            report.results.push(FileResult {
                name: task.name.clone(),
                source: task.source.clone(),
                object,
                outcome,
            });
        }

        info!(
            stage = label,
            uploaded = report.uploaded(),
            skipped = report.skipped(),
            failed = report.failed(),
            bytes = report.total_bytes(),
            elapsed = ?start.elapsed(),
            "uploads finished"
        );
        Ok(report)
    }

    #[instrument(level = "debug", skip(self, task), fields(name = %task.name))]
    async fn upload_one(&self, task: &UploadTask, key: &str) -> Result<u64> {
        self.store
            .upload_file(&self.bucket, key, Path::new(&task.source))
            .await
    }
}
