use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use payroll_etl::{
    config::PipelineConfig,
    logging,
    payroll::{create_table_sql, AccessGrant},
    pipeline::PayrollPipeline,
};

const PASSWORD_ENV: &str = "READONLY_USER_PASSWORD";

/// Daily payroll run: extract, transform, quality-check, load.
#[derive(Parser, Debug)]
struct Args {
    /// YAML pipeline config; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Print the table DDL and the read-only grant script, then exit
    #[arg(long)]
    print_sql: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    let cfg = PipelineConfig::load_or_default(args.config.as_deref())?;

    if args.print_sql {
        let password = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{} must be set to render the grant script", PASSWORD_ENV))?;
        print!("{}", create_table_sql());
        print!("{}", AccessGrant::default().to_sql(&password)?);
        return Ok(());
    }

    let pipeline = PayrollPipeline::new(cfg.payroll);

    if args.once {
        let summary = tokio::task::spawn_blocking(move || pipeline.run_once()).await??;
        info!(
            rows = summary.rows,
            departments = summary.departments,
            "payroll run finished"
        );
        return Ok(());
    }

    info!("starting daily payroll schedule");
    tokio::select! {
        ok = pipeline.run_scheduled(None) => {
            error!(succeeded = ok, "schedule ended unexpectedly");
        }
        res = tokio::signal::ctrl_c() => {
            res.context("listening for ctrl-c")?;
            info!("shutdown requested");
        }
    }
    Ok(())
}
