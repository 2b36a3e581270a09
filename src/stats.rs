use crate::framework::PortStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Port counters of one pipeline end, with rates over the run window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Which end of the pipeline the counters come from ("source" or "dest")
    pub name: String,
    pub statistics: PortStatistics,
    pub elapsed_secs: f64,
    pub frames_per_second: f64,
    pub bytes_per_second: f64,
}

impl StatsReport {
    /// Derive rates from raw counters gathered over `elapsed`
    pub fn new(name: impl Into<String>, statistics: PortStatistics, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let per_second = |count: f64| {
            if elapsed_secs > 0.0 {
                count / elapsed_secs
            } else {
                0.0
            }
        };

        Self {
            name: name.into(),
            statistics,
            elapsed_secs,
            frames_per_second: per_second(f64::from(statistics.frame_count)),
            bytes_per_second: per_second(statistics.total_bytes as f64),
        }
    }

    /// Report lines, each prefixed with the end's name
    pub fn lines(&self) -> Vec<String> {
        let s = &self.statistics;
        vec![
            format!("{}: buffer_count: {}", self.name, s.buffer_count),
            format!("{}: frame_count: {}", self.name, s.frame_count),
            format!("{}: frames_skipped: {}", self.name, s.frames_skipped),
            format!("{}: frames_discarded: {}", self.name, s.frames_discarded),
            format!("{}: total_bytes: {}", self.name, s.total_bytes),
            format!("{}: {:.6} [frame/s]", self.name, self.frames_per_second),
            format!("{}: {:e} [B/s]", self.name, self.bytes_per_second),
        ]
    }

    /// Emit the report through the diagnostic log
    pub fn log(&self) {
        for line in self.lines() {
            info!("{}", line);
        }
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}
