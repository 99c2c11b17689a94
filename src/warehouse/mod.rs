// src/warehouse/mod.rs

mod local;
#[cfg(feature = "gcp")]
mod bigquery;

pub use local::LocalWarehouse;
#[cfg(feature = "gcp")]
pub use bigquery::BigQueryWarehouse;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{fmt, sync::Arc, time::Instant};
use tracing::{error, info, instrument};

use crate::config::{Backend, ErrorPolicy, LoadStage, LoadTask, PipelineConfig, TargetTable};
use crate::storage::{LocalObjectStore, ObjectUri};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Comma-delimited text.
    Csv,
}

/// Options every load job runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub format: SourceFormat,
    pub skip_leading_rows: u32,
    pub autodetect: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: SourceFormat::Csv,
            skip_leading_rows: 1,
            autodetect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobSpec {
    pub source: ObjectUri,
    pub dataset: String,
    pub table: TargetTable,
    pub location: Option<String>,
    pub options: LoadOptions,
}

/// Handle to a submitted load job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    pub id: String,
    pub location: Option<String>,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Row count of a table after its load job finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobResult {
    pub table_id: String,
    pub row_count: u64,
}

#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub loaded: Vec<LoadJobResult>,
    /// Only populated under [`ErrorPolicy::IsolateAndContinue`].
    pub failed: Vec<(TargetTable, String)>,
}

/// A tabular warehouse that can bulk-load objects from storage.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn submit_load(&self, spec: &LoadJobSpec) -> Result<JobId>;

    /// Block until `job` reaches a terminal state. A failed job is an `Err`.
    /// There is no timeout.
    async fn wait(&self, job: &JobId) -> Result<()>;

    /// Current number of rows in `dataset.table`.
    async fn row_count(&self, dataset: &str, table: &str) -> Result<u64>;
}

/// Runs a [`LoadStage`] against a warehouse, one table at a time.
pub struct WarehouseLoader {
    warehouse: Arc<dyn Warehouse>,
}

impl WarehouseLoader {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Load every task in order. With the default [`ErrorPolicy::FailFast`]
    /// the first failing job ends the run and its error is returned; later
    /// tables are not touched.
    pub async fn run(&self, stage: &LoadStage) -> Result<LoadReport> {
        let start = Instant::now();
        let mut report = LoadReport::default();
        info!(
            dataset = %stage.dataset,
            tables = stage.tasks.len(),
            policy = stage.policy.as_str(),
            "starting warehouse loads"
        );

        for task in &stage.tasks {
            match self.load_one(stage, task).await {
                Ok(result) => report.loaded.push(result),
                Err(e) if stage.policy == ErrorPolicy::IsolateAndContinue => {
                    let reason = format!("{:#}", e);
                    error!(table = %task.table, source = %task.source_uri, error = %reason, "load failed");
                    report.failed.push((task.table, reason));
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("loading {} into {}.{}", task.source_uri, stage.dataset, task.table)
                    })
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            elapsed = ?start.elapsed(),
            "warehouse loads finished"
        );
        Ok(report)
    }

    #[instrument(level = "info", skip(self, stage, task), fields(table = %task.table))]
    async fn load_one(&self, stage: &LoadStage, task: &LoadTask) -> Result<LoadJobResult> {
        let spec = LoadJobSpec {
            source: ObjectUri::parse(&task.source_uri)?,
            dataset: stage.dataset.clone(),
            table: task.table,
            location: stage.location.clone(),
            options: LoadOptions::default(),
        };

        let job = self.warehouse.submit_load(&spec).await?;
        info!(job = %job, source = %spec.source, "load job submitted");
        self.warehouse.wait(&job).await?;

        let row_count = self
            .warehouse
            .row_count(&spec.dataset, spec.table.as_str())
            .await?;
        info!("Loaded {} rows into {}", row_count, spec.table);

        Ok(LoadJobResult {
            table_id: spec.table.as_str().to_string(),
            row_count,
        })
    }
}

/// Build the warehouse a load run uses, once.
pub async fn connect(cfg: &PipelineConfig) -> Result<Arc<dyn Warehouse>> {
    match cfg.backend {
        Backend::Local => Ok(Arc::new(LocalWarehouse::new(
            cfg.local_root.join("warehouse"),
            LocalObjectStore::new(cfg.local_root.join("objects")),
        ))),
        #[cfg(feature = "gcp")]
        Backend::Gcp => Ok(Arc::new(
            BigQueryWarehouse::from_service_account(&cfg.credentials_path()).await?,
        )),
        #[cfg(not(feature = "gcp"))]
        Backend::Gcp => anyhow::bail!("backend `gcp` requires building with `--features gcp`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStore;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init();
    }

    async fn put(dir: &TempDir, objects: &LocalObjectStore, key: &str, body: &str) {
        let src = dir.path().join("upload.tmp.csv");
        fs::write(&src, body).unwrap();
        objects.upload_file("caps-bucket", key, &src).await.unwrap();
    }

    fn setup(dir: &TempDir) -> (LocalObjectStore, WarehouseLoader, Arc<LocalWarehouse>) {
        let objects = LocalObjectStore::new(dir.path().join("objects"));
        let wh = Arc::new(LocalWarehouse::new(dir.path().join("warehouse"), objects.clone()));
        (objects, WarehouseLoader::new(wh.clone()), wh)
    }

    fn stage(policy: ErrorPolicy, tasks: &[(&str, TargetTable)]) -> LoadStage {
        LoadStage {
            policy,
            dataset: "caps_staging".to_string(),
            location: None,
            tasks: tasks.iter().map(|(u, t)| LoadTask::new(u, *t)).collect(),
        }
    }

    #[tokio::test]
    async fn test_reported_rows_match_data_rows() {
        init_test_logging();
        let dir = tempdir().unwrap();
        let (objects, loader, _) = setup(&dir);
        put(&dir, &objects, "AGENCYMaster_clean.csv", "AgencyID,AgencyName\n1,POLICE\n2,FIRE\n3,PARKS\n").await;

        let report = loader
            .run(&stage(
                ErrorPolicy::FailFast,
                &[("gs://caps-bucket/AGENCYMaster_clean.csv", TargetTable::Agency)],
            ))
            .await
            .unwrap();
        assert_eq!(
            report.loaded,
            vec![LoadJobResult {
                table_id: "agency".to_string(),
                row_count: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_stops_after_bad_file() {
        init_test_logging();
        let dir = tempdir().unwrap();
        let (objects, loader, wh) = setup(&dir);
        put(&dir, &objects, "a.csv", "id,name\n1,a\n").await;
        put(&dir, &objects, "bad.csv", "id,name\n1,a,extra,fields\n2\n").await;
        put(&dir, &objects, "t.csv", "id,title\n1,CLERK\n").await;

        let err = loader
            .run(&stage(
                ErrorPolicy::FailFast,
                &[
                    ("caps-bucket/a.csv", TargetTable::Agency),
                    ("caps-bucket/bad.csv", TargetTable::Employee),
                    ("caps-bucket/t.csv", TargetTable::Title),
                ],
            ))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("employee"));

        assert_eq!(wh.row_count("caps_staging", "agency").await.unwrap(), 1);
        assert!(wh.row_count("caps_staging", "employee").await.is_err());
        assert!(wh.row_count("caps_staging", "title").await.is_err());
    }

    #[tokio::test]
    async fn test_isolate_policy_keeps_loading() {
        let dir = tempdir().unwrap();
        let (objects, loader, _) = setup(&dir);
        put(&dir, &objects, "t.csv", "id,title\n1,CLERK\n2,ANALYST\n").await;

        let report = loader
            .run(&stage(
                ErrorPolicy::IsolateAndContinue,
                &[
                    ("caps-bucket/missing.csv", TargetTable::Employee),
                    ("caps-bucket/t.csv", TargetTable::Title),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, TargetTable::Employee);
        assert_eq!(report.loaded[0].row_count, 2);
    }
}
