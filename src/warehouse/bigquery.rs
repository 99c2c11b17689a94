use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use google_cloud_bigquery::{
    client::{google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig},
    http::{
        job::{
            get::GetJobRequest, Job, JobConfiguration, JobConfigurationLoad, JobReference,
            JobState, JobType,
        },
        table::{SourceFormat as BqSourceFormat, TableReference},
    },
};
use std::{path::Path, time::Duration};
use tracing::{debug, info};

use super::{JobId, LoadJobSpec, SourceFormat, Warehouse};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// BigQuery load jobs, with the project taken from the service-account key.
pub struct BigQueryWarehouse {
    client: Client,
    project_id: String,
}

impl BigQueryWarehouse {
    pub async fn from_service_account(key_file: &Path) -> Result<Self> {
        let cred = CredentialsFile::new_from_file(key_file.display().to_string())
            .await
            .with_context(|| format!("reading service account key {}", key_file.display()))?;
        let (config, project) = ClientConfig::new_with_credentials(cred)
            .await
            .context("authenticating BigQuery client")?;
        let project_id = project
            .ok_or_else(|| anyhow!("no project_id in {}", key_file.display()))?;
        let client = Client::new(config)
            .await
            .context("creating BigQuery client")?;
        info!(project = %project_id, "BigQuery client ready");
        Ok(Self { client, project_id })
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn submit_load(&self, spec: &LoadJobSpec) -> Result<JobId> {
        let source_format = match spec.options.format {
            SourceFormat::Csv => BqSourceFormat::Csv,
        };
        let job_id = format!(
            "payroll_etl_load_{}_{}",
            spec.table,
            Utc::now().timestamp_millis()
        );

        let job = Job {
            job_reference: JobReference {
                project_id: self.project_id.clone(),
                job_id: job_id.clone(),
                location: spec.location.clone(),
            },
            configuration: JobConfiguration {
                job: JobType::Load(JobConfigurationLoad {
                    source_uris: vec![spec.source.to_string()],
                    destination_table: TableReference {
                        project_id: self.project_id.clone(),
                        dataset_id: spec.dataset.clone(),
                        table_id: spec.table.as_str().to_string(),
                    },
                    source_format: Some(source_format),
                    skip_leading_rows: Some(spec.options.skip_leading_rows as i64),
                    autodetect: Some(spec.options.autodetect),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let created = self
            .client
            .job()
            .create(&job)
            .await
            .with_context(|| format!("creating load job {}", job_id))?;

        Ok(JobId {
            id: created.job_reference.job_id,
            location: created.job_reference.location,
        })
    }

    async fn wait(&self, job: &JobId) -> Result<()> {
        let request = GetJobRequest {
            location: job.location.clone(),
        };
        loop {
            let current = self
                .client
                .job()
                .get(&self.project_id, &job.id, &request)
                .await
                .with_context(|| format!("polling load job {}", job.id))?;

            if matches!(current.status.state, JobState::Done) {
                if let Some(err) = current.status.error_result {
                    bail!("load job {} failed: {:?}", job.id, err);
                }
                return Ok(());
            }
            debug!(job = %job, state = ?current.status.state, "waiting for load job");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn row_count(&self, dataset: &str, table: &str) -> Result<u64> {
        let meta = self
            .client
            .table()
            .get(&self.project_id, dataset, table)
            .await
            .with_context(|| format!("fetching table {}.{}", dataset, table))?;
        Ok(meta.num_rows.map(|n| n as u64).unwrap_or(0))
    }
}
