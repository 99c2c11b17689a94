// src/pipeline/mod.rs

use anyhow::{Context, Result};
use std::{
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span};

use crate::config::PayrollConfig;
use crate::payroll::{
    aggregate_by_department, check_quality, commit_parquet, payroll_batch, read_payroll_csv,
    schema::{PAYROLL_TABLE, SUMMARY_TABLE},
    stage_parquet, summary_batch, transform,
};

pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// The three steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Extract,
    Transform,
    Load,
}

impl Step {
    pub const ORDER: [Step; 3] = [Step::Extract, Step::Transform, Step::Load];

    pub fn as_str(&self) -> &str {
        match self {
            Step::Extract => "extract",
            Step::Transform => "transform",
            Step::Load => "load",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows: usize,
    pub departments: usize,
    pub payroll_path: PathBuf,
    pub summary_path: PathBuf,
    pub steps: Vec<Step>,
}

/// Scheduled payroll run: CSV in, quality-gated fact + summary tables out.
#[derive(Debug, Clone)]
pub struct PayrollPipeline {
    cfg: PayrollConfig,
    period: Duration,
}

impl PayrollPipeline {
    pub fn new(cfg: PayrollConfig) -> Self {
        Self { cfg, period: DAILY }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// One extract → transform → load pass. A batch that fails the quality
    /// gate is rejected whole and nothing is written.
    pub fn run_once(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut steps = Vec::with_capacity(Step::ORDER.len());

        let raw = {
            let _g = info_span!("step", name = Step::Extract.as_str()).entered();
            let rows = read_payroll_csv(&self.cfg.source)?;
            info!(rows = rows.len(), source = %self.cfg.source.display(), "extracted");
            steps.push(Step::Extract);
            rows
        };

        let (records, summaries) = {
            let _g = info_span!("step", name = Step::Transform.as_str()).entered();
            let records = transform(raw)?;
            check_quality(&records).context("rejecting payroll batch")?;
            let summaries = aggregate_by_department(&records);
            info!(
                rows = records.len(),
                departments = summaries.len(),
                "transformed"
            );
            steps.push(Step::Transform);
            (records, summaries)
        };

        let _g = info_span!("step", name = Step::Load.as_str()).entered();
        let payroll_path = self.cfg.output_dir.join(format!("{}.parquet", PAYROLL_TABLE));
        let summary_path = self.cfg.output_dir.join(format!("{}.parquet", SUMMARY_TABLE));
        let payroll = payroll_batch(&records)?;
        let summary = summary_batch(&summaries)?;

        // both tables staged before either replaces the previous run's output
        let payroll_tmp = stage_parquet(&payroll_path, &payroll)?;
        let summary_tmp = match stage_parquet(&summary_path, &summary) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&payroll_tmp);
                return Err(e);
            }
        };
        commit_parquet(&payroll_tmp, &payroll_path)?;
        commit_parquet(&summary_tmp, &summary_path)?;
        steps.push(Step::Load);
        info!(
            payroll = %payroll_path.display(),
            summary = %summary_path.display(),
            elapsed = ?start.elapsed(),
            "loaded"
        );

        Ok(RunSummary {
            rows: records.len(),
            departments: summaries.len(),
            payroll_path,
            summary_path,
            steps,
        })
    }

    /// Run once per period, starting immediately. A failed run is logged and
    /// the schedule carries on. Stops after `max_runs` runs when given.
    /// Returns how many runs succeeded.
    pub async fn run_scheduled(&self, max_runs: Option<usize>) -> usize {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut runs = 0usize;
        let mut ok = 0usize;
        while max_runs.map_or(true, |m| runs < m) {
            ticker.tick().await;
            runs += 1;

            let this = self.clone();
            match tokio::task::spawn_blocking(move || this.run_once()).await {
                Ok(Ok(summary)) => {
                    ok += 1;
                    info!(run = runs, rows = summary.rows, "payroll run finished");
                }
                Ok(Err(e)) => {
                    let reason = format!("{:#}", e);
                    error!(run = runs, error = %reason, "payroll run failed");
                }
                Err(e) => error!(run = runs, error = %e, "payroll run panicked"),
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payroll::QualityError;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;
    use tempfile::{tempdir, TempDir};

    fn pipeline(dir: &TempDir, csv: &str) -> PayrollPipeline {
        let source = dir.path().join("payroll_data.csv");
        fs::write(&source, csv).unwrap();
        PayrollPipeline::new(PayrollConfig {
            source,
            output_dir: dir.path().join("out"),
        })
    }

    const HEADER: &str = "employee_id,name,department,job_title,salary,payment_date\n";

    #[test]
    fn test_run_once_writes_both_tables() {
        let dir = tempdir().unwrap();
        let p = pipeline(
            &dir,
            &format!(
                "{}E1,Ann,A,CLERK,10,2021-01-15\nE2,Bob,A,CLERK,20,2021-01-15\nE3,Cy,B,CHIEF,5,2021-01-15\n",
                HEADER
            ),
        );

        let summary = p.run_once().unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.departments, 2);
        assert_eq!(summary.steps, Step::ORDER.to_vec());
        assert!(summary.payroll_path.ends_with("payroll.parquet"));
        assert!(summary.payroll_path.exists());
        assert!(summary.summary_path.exists());
    }

    #[test]
    fn test_rejected_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let p = pipeline(
            &dir,
            &format!("{}E1,Ann,A,CLERK,10,2021-01-15\nE2,Bob,B,CLERK,-1,2021-01-15\n", HEADER),
        );

        let err = p.run_once().unwrap_err();
        assert_eq!(
            err.downcast_ref::<QualityError>(),
            Some(&QualityError::NegativeSalary(1))
        );
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_nan_salary_rejects_batch() {
        let dir = tempdir().unwrap();
        let p = pipeline(
            &dir,
            &format!("{}E1,Ann,A,CLERK,10,2021-01-15\nE2,Bob,A,CLERK,NaN,2021-01-15\n", HEADER),
        );

        let err = p.run_once().unwrap_err();
        assert_eq!(
            err.downcast_ref::<QualityError>(),
            Some(&QualityError::NullValues(1))
        );
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_failed_summary_write_keeps_previous_output() {
        let dir = tempdir().unwrap();
        let p = pipeline(&dir, &format!("{}E1,Ann,A,CLERK,10,2021-01-15\n", HEADER));
        let first = p.run_once().unwrap();

        fs::write(
            dir.path().join("payroll_data.csv"),
            format!("{}E1,Ann,A,CLERK,10,\nE2,Bob,B,CLERK,20,\n", HEADER),
        )
        .unwrap();
        // a directory squatting on the summary's temp name makes its write fail
        fs::create_dir_all(first.summary_path.with_extension("parquet.tmp")).unwrap();
        assert!(p.run_once().is_err());

        let reader =
            ParquetRecordBatchReaderBuilder::try_new(File::open(&first.payroll_path).unwrap())
                .unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 1);
        assert!(!first.payroll_path.with_extension("parquet.tmp").exists());
    }

    #[test]
    fn test_missing_source_fails_extract() {
        let dir = tempdir().unwrap();
        let p = PayrollPipeline::new(PayrollConfig {
            source: dir.path().join("absent.csv"),
            output_dir: dir.path().join("out"),
        });
        assert!(p.run_once().is_err());
    }

    #[tokio::test]
    async fn test_schedule_survives_failed_runs() {
        let dir = tempdir().unwrap();
        let p = pipeline(&dir, &format!("{},Ann,A,CLERK,10,\n", HEADER))
            .with_period(Duration::from_millis(5));
        assert_eq!(p.run_scheduled(Some(2)).await, 0);

        fs::write(
            dir.path().join("payroll_data.csv"),
            format!("{}E1,Ann,A,CLERK,10,\n", HEADER),
        )
        .unwrap();
        assert_eq!(p.run_scheduled(Some(3)).await, 3);
    }
}
