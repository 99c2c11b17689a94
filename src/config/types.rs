// src/config/types.rs

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// What a stage does when one of its files fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Log the failure and move on to the next file.
    IsolateAndContinue,
    /// Stop the stage at the first failure and hand the error to the caller.
    FailFast,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorPolicy::IsolateAndContinue => "isolate_and_continue",
            ErrorPolicy::FailFast => "fail_fast",
        }
    }
}

/// Storage + warehouse implementation used by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Filesystem object store and parquet warehouse under `local_root`.
    #[default]
    Local,
    /// Google Cloud Storage + BigQuery (needs the `gcp` feature).
    Gcp,
}

/// One local file to push into the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    /// Logical file name, e.g. `Raw_AgencyMaster.csv`.
    pub name: String,
    /// Local path read at execution time.
    pub source: PathBuf,
    /// Explicit object key. When absent the key is `<stage prefix>/<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl UploadTask {
    pub fn new(name: &str, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            source: source.into(),
            destination: None,
        }
    }
}

/// Warehouse tables the loader is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetTable {
    #[serde(rename = "agency")]
    Agency,
    #[serde(rename = "employee")]
    Employee,
    #[serde(rename = "payroll_2020")]
    Payroll2020,
    #[serde(rename = "payroll_2021")]
    Payroll2021,
    #[serde(rename = "title")]
    Title,
}

impl TargetTable {
    pub const ALL: [TargetTable; 5] = [
        TargetTable::Agency,
        TargetTable::Employee,
        TargetTable::Payroll2020,
        TargetTable::Payroll2021,
        TargetTable::Title,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetTable::Agency => "agency",
            TargetTable::Employee => "employee",
            TargetTable::Payroll2020 => "payroll_2020",
            TargetTable::Payroll2021 => "payroll_2021",
            TargetTable::Title => "title",
        }
    }
}

impl std::str::FromStr for TargetTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown target table `{}`", s))
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object to bulk-load into a warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTask {
    /// `gs://bucket/key`, or the bare `bucket/key` form.
    pub source_uri: String,
    pub table: TargetTable,
}

impl LoadTask {
    pub fn new(source_uri: &str, table: TargetTable) -> Self {
        Self {
            source_uri: source_uri.to_string(),
            table,
        }
    }
}

fn isolate() -> ErrorPolicy {
    ErrorPolicy::IsolateAndContinue
}

fn fail_fast() -> ErrorPolicy {
    ErrorPolicy::FailFast
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStage {
    #[serde(default = "isolate")]
    pub policy: ErrorPolicy,
    /// Folder-style prefix joined in front of each task's logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub tasks: Vec<UploadTask>,
}

impl UploadStage {
    /// Object key for `task`: the explicit destination if given, otherwise
    /// `<prefix>/<name>`. Always the same key for the same logical name.
    pub fn destination_key(&self, task: &UploadTask) -> String {
        if let Some(dest) = &task.destination {
            return dest.clone();
        }
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("{}/{}", p, task.name),
            _ => task.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStage {
    #[serde(default = "fail_fast")]
    pub policy: ErrorPolicy,
    pub dataset: String,
    /// Warehouse job location (e.g. `US`); vendor default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub tasks: Vec<LoadTask>,
}

/// Inputs and outputs of the daily payroll run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollConfig {
    pub source: PathBuf,
    pub output_dir: PathBuf,
}
