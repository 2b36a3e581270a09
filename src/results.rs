use crate::{config::ResolvedConfig, harness::RunSummary, stats::StatsReport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Complete record of one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub config: ResolvedConfig,
    /// Measured run window in milliseconds
    pub elapsed_ms: f64,
    pub stats: Vec<StatsReport>,
}

/// Provenance of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl RunReport {
    pub fn new(config: &ResolvedConfig, summary: &RunSummary) -> Self {
        Self {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
            },
            config: config.clone(),
            elapsed_ms: summary.elapsed.as_secs_f64() * 1000.0,
            stats: summary.reports.clone(),
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        info!("Run report written to {:?}", path);
        Ok(())
    }

    /// Read a report previously written with [`RunReport::write_to`]
    pub fn read_from(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open report file {:?}", path))?;
        Ok(serde_json::from_reader(file)?)
    }
}
