use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use async_trait::async_trait;
use glob::glob;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{JobId, LoadJobSpec, LoadOptions, SourceFormat, Warehouse};
use crate::storage::LocalObjectStore;

const BATCH_SIZE: usize = 8192;

/// Parquet-backed warehouse: `<root>/<dataset>/<table>/part-NNNNN.parquet`.
///
/// Objects are read from a [`LocalObjectStore`]; each load job runs on the
/// blocking pool and appends one part file to its table.
pub struct LocalWarehouse {
    root: PathBuf,
    objects: LocalObjectStore,
    jobs: Mutex<HashMap<String, JoinHandle<Result<u64>>>>,
    next_job: AtomicU64,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>, objects: LocalObjectStore) -> Self {
        Self {
            root: root.into(),
            objects,
            jobs: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(1),
        }
    }

    pub fn table_dir(&self, dataset: &str, table: &str) -> PathBuf {
        self.root.join(dataset).join(table)
    }
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn submit_load(&self, spec: &LoadJobSpec) -> Result<JobId> {
        let source = self
            .objects
            .object_path(&spec.source.bucket, &spec.source.key)?;
        let table_dir = self.table_dir(&spec.dataset, spec.table.as_str());
        let options = spec.options.clone();

        let id = format!(
            "local_load_{}_{}",
            spec.table,
            self.next_job.fetch_add(1, Ordering::SeqCst)
        );
        let handle =
            tokio::task::spawn_blocking(move || load_csv_into_table(&source, &table_dir, &options));
        self.jobs
            .lock()
            .map_err(|_| anyhow!("job table poisoned"))?
            .insert(id.clone(), handle);

        Ok(JobId { id, location: None })
    }

    async fn wait(&self, job: &JobId) -> Result<()> {
        let handle = self
            .jobs
            .lock()
            .map_err(|_| anyhow!("job table poisoned"))?
            .remove(&job.id)
            .ok_or_else(|| anyhow!("unknown load job {}", job.id))?;

        let rows = handle
            .await
            .with_context(|| format!("load job {} did not finish", job.id))?
            .with_context(|| format!("load job {} failed", job.id))?;
        debug!(job = %job, rows, "load job done");
        Ok(())
    }

    async fn row_count(&self, dataset: &str, table: &str) -> Result<u64> {
        let parts = part_files(&self.table_dir(dataset, table))?;
        if parts.is_empty() {
            bail!("table {}.{} not found", dataset, table);
        }
        let mut total = 0u64;
        for part in parts {
            let file = File::open(&part).with_context(|| format!("opening {}", part.display()))?;
            let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading parquet footer of {}", part.display()))?;
            total += builder.metadata().file_metadata().num_rows() as u64;
        }
        Ok(total)
    }
}

fn part_files(table_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/part-*.parquet", table_dir.display());
    let mut parts: Vec<PathBuf> = glob(&pattern)
        .context("invalid glob pattern for table parts")?
        .filter_map(Result::ok)
        .collect();
    parts.sort();
    Ok(parts)
}

/// Column names and types, ignoring nullability and metadata.
fn shape(schema: &Schema) -> Vec<(String, DataType)> {
    schema
        .fields()
        .iter()
        .map(|f| (f.name().clone(), f.data_type().clone()))
        .collect()
}

/// Schema of the first part holding rows. Parts written from header-only
/// files don't pin the table's columns.
fn existing_schema(parts: &[PathBuf]) -> Result<Option<SchemaRef>> {
    for part in parts {
        let file = File::open(part).with_context(|| format!("opening {}", part.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("reading parquet schema of {}", part.display()))?;
        if builder.metadata().file_metadata().num_rows() > 0 {
            return Ok(Some(builder.schema().clone()));
        }
    }
    Ok(None)
}

/// Columns with no values infer as `Null`; store them as strings.
fn widen_null_columns(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match f.data_type() {
            DataType::Null => Field::new(f.name(), DataType::Utf8, true),
            _ => f.as_ref().clone(),
        })
        .collect();
    Schema::new(fields)
}

/// The body of one load job: parse `source` as CSV and append it to the
/// table as a new part file. Returns the number of rows written.
fn load_csv_into_table(source: &Path, table_dir: &Path, options: &LoadOptions) -> Result<u64> {
    match options.format {
        SourceFormat::Csv => {}
    }

    let mut file =
        File::open(source).with_context(|| format!("source object {} not found", source.display()))?;
    let parts = part_files(table_dir)?;
    let current = existing_schema(&parts)?;

    let has_header = options.skip_leading_rows > 0;
    let extra_skip = options.skip_leading_rows.saturating_sub(1) as usize;

    let schema: SchemaRef = if options.autodetect {
        let (inferred, records) = Format::default()
            .with_header(has_header)
            .infer_schema(&mut file, None)
            .with_context(|| format!("detecting schema of {}", source.display()))?;
        if inferred.fields().is_empty() {
            bail!("{} has no columns", source.display());
        }
        debug!(records, fields = inferred.fields().len(), "schema detected");
        match &current {
            // header only: append zero rows under the table's own schema
            Some(current) if records == 0 => current.clone(),
            Some(current) => {
                let inferred = widen_null_columns(&inferred);
                if shape(current) != shape(&inferred) {
                    bail!(
                        "schema of {} does not match table {}: table has {:?}, file has {:?}",
                        source.display(),
                        table_dir.display(),
                        shape(current),
                        shape(&inferred)
                    );
                }
                Arc::new(inferred)
            }
            None => Arc::new(widen_null_columns(&inferred)),
        }
    } else {
        current.ok_or_else(|| {
            anyhow!(
                "table {} does not exist and schema autodetection is off",
                table_dir.display()
            )
        })?
    };

    file.seek(SeekFrom::Start(0))?;
    let mut builder = ReaderBuilder::new(schema.clone())
        .with_header(has_header)
        .with_batch_size(BATCH_SIZE);
    if extra_skip > 0 {
        builder = builder.with_bounds(extra_skip, usize::MAX);
    }
    let reader = builder.build(file).context("creating CSV reader")?;

    fs::create_dir_all(table_dir)
        .with_context(|| format!("creating table dir {}", table_dir.display()))?;
    let part_name = format!("part-{:05}.parquet", parts.len());
    let final_path = table_dir.join(&part_name);
    let tmp_path = table_dir.join(format!("{}.tmp", part_name));

    let written = write_part(reader, schema, &tmp_path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        e
    })?;

    fs::rename(&tmp_path, &final_path).with_context(|| {
        format!(
            "renaming `{}` to `{}`",
            tmp_path.display(),
            final_path.display()
        )
    })?;

    info!(part = %final_path.display(), rows = written, "appended part");
    Ok(written)
}

fn write_part(
    reader: impl Iterator<Item = std::result::Result<arrow::record_batch::RecordBatch, arrow::error::ArrowError>>,
    schema: SchemaRef,
    tmp_path: &Path,
) -> Result<u64> {
    let tmp_file = File::create(tmp_path)
        .with_context(|| format!("could not create `{}`", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), schema, Some(props))
        .context("creating ArrowWriter for table part")?;

    let mut written = 0u64;
    for batch in reader {
        let batch = batch.context("parsing CSV rows")?;
        written += batch.num_rows() as u64;
        writer.write(&batch).context("writing batch to parquet")?;
    }
    writer.close().context("closing ArrowWriter for table part")?;
    Ok(written)
}
