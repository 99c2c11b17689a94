use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use payroll_etl::{config::PipelineConfig, logging, storage, upload::Uploader};

/// Upload the cleaned CSV extracts to the bucket.
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
    cfg.validate_upload_stage("clean", &cfg.clean)?;

    let store = storage::connect(&cfg).await?;
    let report = Uploader::new(store, &cfg.bucket).run("clean", &cfg.clean).await?;

    info!(
        uploaded = report.uploaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "clean stage done"
    );
    Ok(())
}
