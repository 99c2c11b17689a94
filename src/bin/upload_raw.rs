use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use payroll_etl::{config::PipelineConfig, logging, storage, upload::Uploader};

/// Upload the raw source files to the bucket, one object per file.
#[derive(Parser, Debug)]
struct Args {
    /// YAML pipeline config; built-in file lists when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let cfg = PipelineConfig::load_or_default(args.config.as_deref())?;
    cfg.validate_upload_stage("raw", &cfg.raw)?;

    let store = storage::connect(&cfg).await?;
    let report = Uploader::new(store, &cfg.bucket).run("raw", &cfg.raw).await?;

    info!(
        uploaded = report.uploaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "raw stage done"
    );
    Ok(())
}
