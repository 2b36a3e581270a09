//! # Pipeline Lifecycle
//!
//! [`PipelineHarness`] drives one source -> destination run through a
//! fixed sequence of phases:
//!
//! ```text
//! Uninitialized -> SourceCreated -> SourceConfigured -> SourceEnabled
//!   -> DestCreated -> DestConfigured -> DestEnabled -> Connected
//!   -> Running -> Stopped -> TornDown
//! ```
//!
//! Each operation performs exactly one transition and refuses to run from
//! any other phase. Framework failures propagate to the caller untouched;
//! whatever was built before the failure is released when the harness is
//! dropped, connection first, then destination, then source.
//!
//! Notification sinks installed here only log. Control buffers are handed
//! straight back to the framework.

use crate::{
    config::{DestKind, ResolvedConfig, SourceKind},
    framework::{
        ComponentHandle, ConnectionHandle, ConnectionNotice, ConnectionSink, ControlBuffer,
        ControlSink, FrameworkError, MediaFramework, Parameter, PortRef, PortType,
        VideoFormat,
    },
    stats::StatsReport,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Phase of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelinePhase {
    Uninitialized,
    SourceCreated,
    SourceConfigured,
    SourceEnabled,
    DestCreated,
    DestConfigured,
    DestEnabled,
    Connected,
    Running,
    Stopped,
    TornDown,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Uninitialized => "uninitialized",
            PipelinePhase::SourceCreated => "source created",
            PipelinePhase::SourceConfigured => "source configured",
            PipelinePhase::SourceEnabled => "source enabled",
            PipelinePhase::DestCreated => "destination created",
            PipelinePhase::DestConfigured => "destination configured",
            PipelinePhase::DestEnabled => "destination enabled",
            PipelinePhase::Connected => "connected",
            PipelinePhase::Running => "running",
            PipelinePhase::Stopped => "stopped",
            PipelinePhase::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    #[error("cannot {operation} while the pipeline is {phase}")]
    OutOfOrder {
        operation: &'static str,
        phase: PipelinePhase,
    },

    #[error("a {width}x{height} frame cannot be padded to the framework's alignment")]
    Unalignable { width: u32, height: u32 },
}

/// Framework objects held by one run
#[derive(Debug)]
pub struct PipelineState {
    phase: PipelinePhase,
    source: Option<ComponentHandle>,
    source_output: Option<PortRef>,
    dest: Option<ComponentHandle>,
    dest_input: Option<PortRef>,
    connection: Option<ConnectionHandle>,
    connection_enabled: bool,
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            phase: PipelinePhase::Uninitialized,
            source: None,
            source_output: None,
            dest: None,
            dest_input: None,
            connection: None,
            connection_enabled: false,
            started: None,
            elapsed: None,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn source(&self) -> Option<ComponentHandle> {
        self.source
    }

    pub fn source_output(&self) -> Option<PortRef> {
        self.source_output
    }

    pub fn dest(&self) -> Option<ComponentHandle> {
        self.dest
    }

    pub fn dest_input(&self) -> Option<PortRef> {
        self.dest_input
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    /// Wall-clock time between capture start and connection disable
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    fn holds_resources(&self) -> bool {
        self.source.is_some() || self.dest.is_some() || self.connection.is_some()
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub reports: Vec<StatsReport>,
}

/// Owner of one source -> destination run
pub struct PipelineHarness<F: MediaFramework> {
    framework: F,
    config: ResolvedConfig,
    state: PipelineState,
}

impl<F: MediaFramework> PipelineHarness<F> {
    pub fn new(framework: F, config: ResolvedConfig) -> Self {
        Self {
            framework,
            config,
            state: PipelineState::new(),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.state.phase
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn framework(&self) -> &F {
        &self.framework
    }

    /// Drive the whole lifecycle and return the collected statistics
    pub async fn run(&mut self) -> Result<RunSummary, HarnessError> {
        self.create_source()?;
        self.configure_source()?;
        self.enable_source()?;
        self.create_dest()?;
        self.configure_dest()?;
        self.enable_dest()?;
        self.connect()?;
        self.start()?;
        let elapsed = self.stop().await?;
        let reports = self.collect_stats()?;
        self.teardown()?;
        Ok(RunSummary { elapsed, reports })
    }

    pub fn create_source(&mut self) -> Result<(), HarnessError> {
        self.expect_phase(PipelinePhase::Uninitialized, "create the source")?;
        let name = self.config.source.component_name();
        let source = self.framework.component_create(name)?;
        debug!("Created source component {}", name);
        self.state.source = Some(source);
        self.state.phase = PipelinePhase::SourceCreated;
        Ok(())
    }

    pub fn configure_source(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "configure the source";
        self.expect_phase(PipelinePhase::SourceCreated, OPERATION)?;
        let source = self.held(self.state.source, OPERATION)?;

        let control = self.framework.port(source, PortType::Control, 0)?;
        self.framework.port_enable(control, control_sink())?;

        let output = self
            .framework
            .port(source, PortType::Output, self.config.output_port)?;
        match self.config.source {
            SourceKind::Pattern => {
                let selector = self.config.pattern.selector();
                self.framework
                    .port_parameter_set(output, Parameter::VideoSourcePattern(selector))?;
            }
            SourceKind::Camera => {
                if let Some(num) = self.config.camera_num {
                    info!("Setting camera_num to {}", num);
                    self.framework
                        .port_parameter_set(control, Parameter::CameraNum(num))?;
                }
            }
        }
        self.commit_format(output)?;

        self.state.source_output = Some(output);
        self.state.phase = PipelinePhase::SourceConfigured;
        Ok(())
    }

    pub fn enable_source(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "enable the source";
        self.expect_phase(PipelinePhase::SourceConfigured, OPERATION)?;
        let source = self.held(self.state.source, OPERATION)?;
        self.framework.component_enable(source)?;
        self.state.phase = PipelinePhase::SourceEnabled;
        Ok(())
    }

    pub fn create_dest(&mut self) -> Result<(), HarnessError> {
        self.expect_phase(PipelinePhase::SourceEnabled, "create the destination")?;
        let name = self.config.dest.component_name();
        let dest = self.framework.component_create(name)?;
        debug!("Created destination component {}", name);
        self.state.dest = Some(dest);
        self.state.phase = PipelinePhase::DestCreated;
        Ok(())
    }

    pub fn configure_dest(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "configure the destination";
        self.expect_phase(PipelinePhase::DestCreated, OPERATION)?;
        let dest = self.held(self.state.dest, OPERATION)?;

        let control = self.framework.port(dest, PortType::Control, 0)?;
        self.framework.port_enable(control, control_sink())?;

        let input = self.framework.port(dest, PortType::Input, 0)?;
        self.commit_format(input)?;

        self.state.dest_input = Some(input);
        self.state.phase = PipelinePhase::DestConfigured;
        Ok(())
    }

    pub fn enable_dest(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "enable the destination";
        self.expect_phase(PipelinePhase::DestConfigured, OPERATION)?;
        let dest = self.held(self.state.dest, OPERATION)?;
        self.framework.component_enable(dest)?;
        self.state.phase = PipelinePhase::DestEnabled;
        Ok(())
    }

    pub fn connect(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "connect";
        self.expect_phase(PipelinePhase::DestEnabled, OPERATION)?;
        let output = self.held(self.state.source_output, OPERATION)?;
        let input = self.held(self.state.dest_input, OPERATION)?;

        let connection = self.framework.connection_create(
            output,
            input,
            self.config.connection,
            connection_sink(),
        )?;
        self.state.connection = Some(connection);
        self.framework.connection_enable(connection)?;
        self.state.connection_enabled = true;

        self.state.phase = PipelinePhase::Connected;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), HarnessError> {
        const OPERATION: &str = "start";
        self.expect_phase(PipelinePhase::Connected, OPERATION)?;
        if self.config.needs_capture_start() {
            let output = self.held(self.state.source_output, OPERATION)?;
            info!("Setting capture to true");
            self.framework
                .port_parameter_set(output, Parameter::Capture(true))?;
        }
        self.state.started = Some(Instant::now());
        self.state.phase = PipelinePhase::Running;
        Ok(())
    }

    /// Let frames flow for the configured duration, then disable the
    /// connection. Returns the measured run window.
    pub async fn stop(&mut self) -> Result<Duration, HarnessError> {
        const OPERATION: &str = "stop";
        self.expect_phase(PipelinePhase::Running, OPERATION)?;
        let started = self.held(self.state.started, OPERATION)?;
        let connection = self.held(self.state.connection, OPERATION)?;

        info!(
            "Sleeping for {} milliseconds",
            self.config.duration.as_millis()
        );
        sleep(self.config.duration).await;

        match self.framework.connection_disable(connection) {
            Ok(()) => self.state.connection_enabled = false,
            Err(e) => error!("Disabling the connection failed: {}", e),
        }
        let elapsed = started.elapsed();

        self.state.elapsed = Some(elapsed);
        self.state.phase = PipelinePhase::Stopped;
        Ok(elapsed)
    }

    /// Query the ends that keep accounting statistics: the pattern
    /// source's output and the display sink's input.
    pub fn collect_stats(&self) -> Result<Vec<StatsReport>, HarnessError> {
        const OPERATION: &str = "collect statistics";
        self.expect_phase(PipelinePhase::Stopped, OPERATION)?;
        let elapsed = self.held(self.state.elapsed, OPERATION)?;

        let mut ends = Vec::new();
        if self.config.source == SourceKind::Pattern {
            ends.push(("source", self.state.source_output));
        }
        if self.config.dest == DestKind::Render {
            ends.push(("dest", self.state.dest_input));
        }

        let mut reports = Vec::new();
        for (name, port) in ends {
            let Some(port) = port else { continue };
            match self.framework.port_statistics(port) {
                Ok(statistics) => reports.push(StatsReport::new(name, statistics, elapsed)),
                Err(e) => warn!("No statistics for {}: {}", name, e),
            }
        }
        Ok(reports)
    }

    /// Release the connection, then the destination, then the source.
    ///
    /// A handle is forgotten only once the framework has destroyed it, so a
    /// failed step leaves the rest for the release on drop.
    pub fn teardown(&mut self) -> Result<(), HarnessError> {
        self.expect_phase(PipelinePhase::Stopped, "tear down")?;
        if let Some(connection) = self.state.connection {
            self.framework.connection_destroy(connection)?;
            self.state.connection = None;
            self.state.connection_enabled = false;
        }
        if let Some(dest) = self.state.dest {
            self.framework.component_destroy(dest)?;
            self.state.dest = None;
        }
        if let Some(source) = self.state.source {
            self.framework.component_destroy(source)?;
            self.state.source = None;
        }
        self.state.phase = PipelinePhase::TornDown;
        Ok(())
    }

    fn expect_phase(
        &self,
        expected: PipelinePhase,
        operation: &'static str,
    ) -> Result<(), HarnessError> {
        if self.state.phase == expected {
            Ok(())
        } else {
            Err(HarnessError::OutOfOrder {
                operation,
                phase: self.state.phase,
            })
        }
    }

    fn held<T>(&self, value: Option<T>, operation: &'static str) -> Result<T, HarnessError> {
        value.ok_or(HarnessError::OutOfOrder {
            operation,
            phase: self.state.phase,
        })
    }

    fn commit_format(&mut self, port: PortRef) -> Result<(), HarnessError> {
        let (width, height) = (self.config.width, self.config.height);
        let format = VideoFormat::aligned(self.config.encoding.fourcc(), width, height)
            .ok_or(HarnessError::Unalignable { width, height })?;
        self.framework.port_format_commit(port, &format)?;
        Ok(())
    }

    /// Best-effort release of whatever a failed run left behind
    fn release_partial(&mut self) {
        if !self.state.holds_resources() {
            return;
        }
        warn!(
            "Releasing pipeline abandoned while {}",
            self.state.phase
        );

        if let Some(connection) = self.state.connection.take() {
            if self.state.connection_enabled {
                if let Err(e) = self.framework.connection_disable(connection) {
                    warn!("Disabling the connection failed: {}", e);
                }
                self.state.connection_enabled = false;
            }
            if let Err(e) = self.framework.connection_destroy(connection) {
                warn!("Destroying the connection failed: {}", e);
            }
        }
        if let Some(dest) = self.state.dest.take() {
            if let Err(e) = self.framework.component_destroy(dest) {
                warn!("Destroying the destination failed: {}", e);
            }
        }
        if let Some(source) = self.state.source.take() {
            if let Err(e) = self.framework.component_destroy(source) {
                warn!("Destroying the source failed: {}", e);
            }
        }
    }
}

impl<F: MediaFramework> Drop for PipelineHarness<F> {
    fn drop(&mut self) {
        self.release_partial();
    }
}

fn control_sink() -> ControlSink {
    Arc::new(|buffer: ControlBuffer| {
        info!("Called by {} ({:?})", buffer.port(), buffer.event());
        buffer.release();
    })
}

fn connection_sink() -> ConnectionSink {
    Arc::new(|notice: &ConnectionNotice| debug!("Called by {}", notice.name))
}
