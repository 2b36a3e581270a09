//! # Media Connection Benchmark - Main Entry Point
//!
//! Resolves the command line, runs one source -> destination pipeline for
//! the requested window and prints the frame statistics.
//!
//! ## Exit Status
//!
//! Success after a completed run or after printing help. Any configuration
//! error or framework failure is logged and ends the process with a
//! failure status; components created before a failure are released on
//! the way out.

use anyhow::Result;
use media_conn_bench::{
    config::ConfigError, logging, PipelineHarness, ResolvedConfig, RunReport, SimFramework,
};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let invocation = match ResolvedConfig::resolve(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(ConfigError::HelpRequested(usage)) => {
            print!("{}", usage);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for line in invocation.config.to_string().lines() {
        info!("{}", line);
    }

    let mut harness = PipelineHarness::new(SimFramework::new(), invocation.config.clone());
    let summary = harness.run().await?;

    for report in &summary.reports {
        report.log();
    }

    if let Some(path) = &invocation.report {
        RunReport::new(&invocation.config, &summary).write_to(path)?;
    }

    Ok(())
}
