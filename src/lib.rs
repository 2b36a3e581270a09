//! # Media Connection Benchmark Library
//!
//! Measures how fast a media framework moves frames from one component to
//! another. A source (pattern generator or camera) is connected to a
//! destination (discard sink or display sink), the connection runs for a
//! fixed wall-clock window, and the frame counters of both ends are turned
//! into frame and byte rates.
//!
//! ## Architecture Overview
//!
//! - `vocabulary`: abbreviation-tolerant matching of enumerated option values
//! - `cli`: command-line definition
//! - `config`: validation of the command line into a `ResolvedConfig`
//! - `framework`: the capability interface to the media framework, plus an
//!   in-process simulation of it
//! - `harness`: the component/port/connection lifecycle of one run
//! - `stats`: frame and byte rates from port counters
//! - `results`: JSON run reports
//! - `logging`: diagnostic line formatting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use media_conn_bench::{PipelineHarness, ResolvedConfig, SimFramework};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let invocation = ResolvedConfig::resolve(["conn-bench", "-d", "render", "-t", "500"])?;
//!     let mut harness = PipelineHarness::new(SimFramework::new(), invocation.config);
//!     let summary = harness.run().await?;
//!
//!     for report in &summary.reports {
//!         println!("{}", report);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;

/// Run configuration and its validation
///
/// Resolves abbreviated option values, applies defaults and rejects
/// combinations the pipeline cannot run.
pub mod config;

/// Media framework capability interface
///
/// The `MediaFramework` trait is everything the harness may ask of the
/// framework. `SimFramework` implements it in-process.
pub mod framework;

/// Pipeline lifecycle state machine
pub mod harness;

pub mod logging;

pub mod results;

pub mod stats;

pub mod vocabulary;

pub use cli::Args;
pub use config::{ConfigError, Invocation, ResolvedConfig};
pub use framework::{FrameworkError, MediaFramework, SimFramework};
pub use harness::{HarnessError, PipelineHarness, PipelinePhase, RunSummary};
pub use results::RunReport;
pub use stats::StatsReport;
pub use vocabulary::{match_index, MatchError, Vocabulary};

/// The current version of the benchmark, recorded in run reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default option values
pub mod defaults {
    /// Default frame width in pixels
    pub const WIDTH: u32 = 1920;

    /// Default frame height in pixels
    pub const HEIGHT: u32 = 1080;

    /// Default run window in milliseconds
    pub const DURATION_MS: u64 = 1000;

    /// Default source output port
    ///
    /// Port 0 is the only output of the pattern source and the preview
    /// output of the camera.
    pub const OUTPUT_PORT: u32 = 0;
}
