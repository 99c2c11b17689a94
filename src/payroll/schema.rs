// src/payroll/schema.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{aggregate::DepartmentPayrollSummary, record::PayrollRecord};

pub const PAYROLL_TABLE: &str = "payroll";
pub const SUMMARY_TABLE: &str = "department_payroll_summary";

/// DDL for the fact and summary tables, each keyed by an identity column.
pub fn create_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {payroll} (\n    \
             id SERIAL PRIMARY KEY,\n    \
             employee_id VARCHAR,\n    \
             name VARCHAR,\n    \
             department VARCHAR,\n    \
             job_title VARCHAR,\n    \
             salary DOUBLE PRECISION,\n    \
             payment_date DATE\n\
         );\n\
         CREATE TABLE IF NOT EXISTS {summary} (\n    \
             id SERIAL PRIMARY KEY,\n    \
             department VARCHAR,\n    \
             total_salary DOUBLE PRECISION\n\
         );\n",
        payroll = PAYROLL_TABLE,
        summary = SUMMARY_TABLE,
    )
}

pub fn payroll_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("employee_id", DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
        Field::new("department", DataType::Utf8, true),
        Field::new("job_title", DataType::Utf8, true),
        Field::new("salary", DataType::Float64, true),
        Field::new("payment_date", DataType::Date32, true),
    ])
}

pub fn summary_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("department", DataType::Utf8, true),
        Field::new("total_salary", DataType::Float64, false),
    ])
}

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

fn days_since_epoch(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn payroll_batch(records: &[PayrollRecord]) -> Result<RecordBatch> {
    let strings = |f: fn(&PayrollRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.id))),
        strings(|r| r.employee_id.as_deref()),
        strings(|r| r.name.as_deref()),
        strings(|r| r.department.as_deref()),
        strings(|r| r.job_title.as_deref()),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.salary).collect::<Vec<_>>(),
        )),
        Arc::new(Date32Array::from(
            records
                .iter()
                .map(|r| r.payment_date.map(days_since_epoch))
                .collect::<Vec<_>>(),
        )),
    ];

    RecordBatch::try_new(Arc::new(payroll_schema()), columns).context("building payroll batch")
}

pub fn summary_batch(rows: &[DepartmentPayrollSummary]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.id))),
        Arc::new(StringArray::from(
            rows.iter()
                .map(|r| r.department.as_deref())
                .collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|r| r.total_salary),
        )),
    ];
    RecordBatch::try_new(Arc::new(summary_schema()), columns).context("building summary batch")
}

/// Write `batch` to the `.tmp` sibling of `path` and return that temp path.
/// Nothing at `path` changes until [`commit_parquet`].
pub fn stage_parquet(path: &Path, batch: &RecordBatch) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("parquet.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("could not create `{}`", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let written = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .context("creating ArrowWriter")
        .and_then(|mut writer| {
            writer.write(batch).context("writing batch to parquet")?;
            writer.close().context("closing ArrowWriter")
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(tmp_path)
}

pub fn commit_parquet(tmp_path: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp_path, path).with_context(|| {
        format!("renaming `{}` to `{}`", tmp_path.display(), path.display())
    })
}

/// Write `batch` to `path` via a `.tmp` sibling, replacing any previous file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let tmp_path = stage_parquet(path, batch)?;
    commit_parquet(&tmp_path, path)
}
