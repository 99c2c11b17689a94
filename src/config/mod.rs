// src/config/mod.rs

pub mod defaults;
pub mod types;

pub use types::{
    Backend, ErrorPolicy, LoadStage, LoadTask, PayrollConfig, TargetTable, UploadStage,
    UploadTask,
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::storage::ObjectUri;

static BUCKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{1,220}[a-z0-9]$").expect("bucket regex"));
static DATASET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,1024}$").expect("dataset regex"));

/// Problems found while checking a config, before any file or network I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{stage} stage has no tasks")]
    EmptyStage { stage: String },

    #[error("{stage} stage: {field} must not be empty")]
    EmptyField { stage: String, field: String },

    #[error("{stage} stage: `{first}` and `{second}` both write object key `{key}`")]
    DuplicateDestination {
        stage: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("invalid bucket name `{0}`")]
    InvalidBucket(String),

    #[error("invalid dataset id `{0}`")]
    InvalidDataset(String),

    #[error("invalid source uri `{uri}`: {reason}")]
    InvalidSourceUri { uri: String, reason: String },
}

/// Everything the three stages and the daily run need, injected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub backend: Backend,
    /// Root for the local backend's object store and warehouse.
    pub local_root: PathBuf,
    /// Service-account key file; see [`PipelineConfig::credentials_path`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathBuf>,
    pub bucket: String,
    pub raw: UploadStage,
    pub clean: UploadStage,
    pub load: LoadStage,
    pub payroll: PayrollConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            local_root: PathBuf::from(defaults::DEFAULT_LOCAL_ROOT),
            credentials: None,
            bucket: defaults::DEFAULT_BUCKET.to_string(),
            raw: defaults::raw_stage(),
            clean: defaults::clean_stage(),
            load: defaults::load_stage(),
            payroll: defaults::payroll(),
        }
    }
}

impl PipelineConfig {
    /// Read a YAML config file. Missing sections fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text).context("deserializing YAML")?;
        Ok(cfg)
    }

    /// `load(path)` when a path is given, the built-in file lists otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Explicit `credentials`, else `$SERVICE_ACCOUNT_KEY_PATH`, else
    /// `service_account_key.json` in the working directory.
    pub fn credentials_path(&self) -> PathBuf {
        if let Some(p) = &self.credentials {
            return p.clone();
        }
        std::env::var(defaults::CREDENTIALS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::DEFAULT_CREDENTIALS_FILE))
    }

    /// Check every stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_upload_stage("raw", &self.raw)?;
        self.validate_upload_stage("clean", &self.clean)?;
        self.validate_load_stage()?;
        Ok(())
    }

    pub fn validate_upload_stage(&self, label: &str, stage: &UploadStage) -> Result<(), ConfigError> {
        if !BUCKET_RE.is_match(&self.bucket) {
            return Err(ConfigError::InvalidBucket(self.bucket.clone()));
        }
        if stage.tasks.is_empty() {
            return Err(ConfigError::EmptyStage {
                stage: label.to_string(),
            });
        }

        // key -> logical name that claimed it
        let mut claimed: HashMap<String, &str> = HashMap::new();
        for task in &stage.tasks {
            if task.name.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    stage: label.to_string(),
                    field: "name".to_string(),
                });
            }
            if task.source.as_os_str().is_empty() {
                return Err(ConfigError::EmptyField {
                    stage: label.to_string(),
                    field: format!("source of `{}`", task.name),
                });
            }
            let key = stage.destination_key(task);
            if key.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    stage: label.to_string(),
                    field: format!("destination of `{}`", task.name),
                });
            }
            if let Some(first) = claimed.insert(key.clone(), &task.name) {
                return Err(ConfigError::DuplicateDestination {
                    stage: label.to_string(),
                    key,
                    first: first.to_string(),
                    second: task.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn validate_load_stage(&self) -> Result<(), ConfigError> {
        let stage = &self.load;
        if !DATASET_RE.is_match(&stage.dataset) {
            return Err(ConfigError::InvalidDataset(stage.dataset.clone()));
        }
        if stage.tasks.is_empty() {
            return Err(ConfigError::EmptyStage {
                stage: "load".to_string(),
            });
        }
        for task in &stage.tasks {
            ObjectUri::parse(&task.source_uri).map_err(|e| ConfigError::InvalidSourceUri {
                uri: task.source_uri.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
