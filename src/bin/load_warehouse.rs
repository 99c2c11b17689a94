use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use payroll_etl::{config::PipelineConfig, logging, warehouse};

/// Load the cleaned objects into the staging dataset, one table per file.
#[derive(Parser, Debug)]
struct Args {
    /// YAML pipeline config; built-in load list when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let cfg = PipelineConfig::load_or_default(args.config.as_deref())?;
    cfg.validate_load_stage()?;

    let wh = warehouse::connect(&cfg).await?;
    let report = warehouse::WarehouseLoader::new(wh).run(&cfg.load).await?;

    for (table, reason) in &report.failed {
        warn!(table = %table, error = %reason, "table not loaded");
    }
    info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "load stage done"
    );
    Ok(())
}
