use media_conn_bench::framework::{
    ComponentHandle, ConnectionHandle, ConnectionMode, ConnectionSink, ControlSink,
    FrameworkError, FrameworkResult, MediaFramework, Parameter, PortRef, PortStatistics, PortType,
    SimFramework, Status, VideoFormat,
};
use media_conn_bench::{HarnessError, PipelineHarness, PipelinePhase, ResolvedConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A framework call as seen by the recording wrapper
#[derive(Debug, Clone, PartialEq)]
enum Call {
    ComponentCreate(String),
    PortEnable(PortType),
    ParameterSet(Parameter),
    FormatCommit(PortType, u32, u32),
    Statistics(PortType),
    ComponentEnable(u32),
    ComponentDestroy(u32),
    ConnectionCreate(ConnectionMode),
    ConnectionEnable,
    ConnectionDisable,
    ConnectionDestroy,
}

/// Wraps the simulated framework, recording every mutating call. Calls
/// named `fail_on` fail `failures` times once `passes` of them have gone
/// through.
struct RecordingFramework {
    inner: SimFramework,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_on: Option<&'static str>,
    passes: Mutex<usize>,
    failures: Mutex<usize>,
}

impl RecordingFramework {
    fn new(inner: SimFramework) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let framework = Self {
            inner,
            calls: calls.clone(),
            fail_on: None,
            passes: Mutex::new(0),
            failures: Mutex::new(0),
        };
        (framework, calls)
    }

    fn failing_on(self, operation: &'static str) -> Self {
        self.failing_after(operation, 0)
    }

    fn failing_after(mut self, operation: &'static str, passes: usize) -> Self {
        self.fail_on = Some(operation);
        self.passes = Mutex::new(passes);
        self.failures = Mutex::new(usize::MAX);
        self
    }

    fn failing_once(self, operation: &'static str) -> Self {
        let framework = self.failing_after(operation, 0);
        *framework.failures.lock() = 1;
        framework
    }

    fn record(&self, operation: &'static str, call: Call) -> FrameworkResult<()> {
        self.calls.lock().push(call);
        if self.fail_on != Some(operation) {
            return Ok(());
        }
        let mut passes = self.passes.lock();
        if *passes > 0 {
            *passes -= 1;
            return Ok(());
        }
        let mut failures = self.failures.lock();
        if *failures == 0 {
            return Ok(());
        }
        *failures -= 1;
        Err(FrameworkError::new(operation, Status::NoMemory))
    }
}

impl MediaFramework for RecordingFramework {
    fn component_create(&mut self, name: &str) -> FrameworkResult<ComponentHandle> {
        self.record("component_create", Call::ComponentCreate(name.to_string()))?;
        self.inner.component_create(name)
    }

    fn port(
        &self,
        component: ComponentHandle,
        port_type: PortType,
        index: u32,
    ) -> FrameworkResult<PortRef> {
        self.inner.port(component, port_type, index)
    }

    fn port_enable(&mut self, port: PortRef, sink: ControlSink) -> FrameworkResult<()> {
        self.record("port_enable", Call::PortEnable(port.port_type))?;
        self.inner.port_enable(port, sink)
    }

    fn port_parameter_set(&mut self, port: PortRef, parameter: Parameter) -> FrameworkResult<()> {
        self.record("port_parameter_set", Call::ParameterSet(parameter))?;
        self.inner.port_parameter_set(port, parameter)
    }

    fn port_format_commit(&mut self, port: PortRef, format: &VideoFormat) -> FrameworkResult<()> {
        self.record(
            "port_format_commit",
            Call::FormatCommit(port.port_type, format.width, format.height),
        )?;
        self.inner.port_format_commit(port, format)
    }

    fn port_statistics(&self, port: PortRef) -> FrameworkResult<PortStatistics> {
        self.record("port_statistics", Call::Statistics(port.port_type))?;
        self.inner.port_statistics(port)
    }

    fn component_enable(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        self.record("component_enable", Call::ComponentEnable(component.0))?;
        self.inner.component_enable(component)
    }

    fn component_disable(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        self.inner.component_disable(component)
    }

    fn component_destroy(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        self.record("component_destroy", Call::ComponentDestroy(component.0))?;
        self.inner.component_destroy(component)
    }

    fn connection_create(
        &mut self,
        output: PortRef,
        input: PortRef,
        mode: ConnectionMode,
        sink: ConnectionSink,
    ) -> FrameworkResult<ConnectionHandle> {
        self.record("connection_create", Call::ConnectionCreate(mode))?;
        self.inner.connection_create(output, input, mode, sink)
    }

    fn connection_enable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        self.record("connection_enable", Call::ConnectionEnable)?;
        self.inner.connection_enable(connection)
    }

    fn connection_disable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        self.record("connection_disable", Call::ConnectionDisable)?;
        self.inner.connection_disable(connection)
    }

    fn connection_destroy(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        self.record("connection_destroy", Call::ConnectionDestroy)?;
        self.inner.connection_destroy(connection)
    }
}

fn resolve(args: &[&str]) -> ResolvedConfig {
    let argv = std::iter::once("conn-bench").chain(args.iter().copied());
    ResolvedConfig::resolve(argv).unwrap().config
}

fn destroys(calls: &[Call]) -> Vec<Call> {
    calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                Call::ConnectionDestroy | Call::ComponentDestroy(_) | Call::ConnectionDisable
            )
        })
        .cloned()
        .collect()
}

/// Pattern source into the null sink: every step in order, one report.
#[tokio::test(start_paused = true)]
async fn pattern_to_null_runs_every_step_in_order() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let config = resolve(&["-w", "640", "-h", "480", "-t", "200"]);
    let mut harness = PipelineHarness::new(framework, config);

    let summary = harness.run().await.unwrap();
    assert_eq!(harness.phase(), PipelinePhase::TornDown);
    assert_eq!(summary.elapsed, Duration::from_millis(200));
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].name, "source");
    assert_eq!(harness.framework().inner.live_components(), 0);
    assert_eq!(harness.framework().inner.live_connections(), 0);

    let calls = calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            Call::ComponentCreate("vc.ril.source".into()),
            Call::PortEnable(PortType::Control),
            Call::ParameterSet(Parameter::VideoSourcePattern(0)),
            Call::FormatCommit(PortType::Output, 640, 480),
            Call::ComponentEnable(1),
            Call::ComponentCreate("vc.null_sink".into()),
            Call::PortEnable(PortType::Control),
            Call::FormatCommit(PortType::Input, 640, 480),
            Call::ComponentEnable(2),
            Call::ConnectionCreate(ConnectionMode::Tunnel),
            Call::ConnectionEnable,
            Call::ConnectionDisable,
            Call::Statistics(PortType::Output),
            Call::ConnectionDestroy,
            Call::ComponentDestroy(2),
            Call::ComponentDestroy(1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn formats_are_committed_aligned() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let mut harness = PipelineHarness::new(framework, resolve(&["-w", "1000", "-t", "10"]));
    harness.run().await.unwrap();

    let calls = calls.lock().clone();
    assert!(calls.contains(&Call::FormatCommit(PortType::Output, 1024, 1088)));
    assert!(calls.contains(&Call::FormatCommit(PortType::Input, 1024, 1088)));
}

/// Camera video port into the display sink: the camera number and the
/// capture request reach the framework, and only the display sink reports.
#[tokio::test]
async fn camera_to_render_reports_frames_without_bytes() {
    let sim = SimFramework::with_frame_interval(Duration::from_millis(1));
    let (framework, calls) = RecordingFramework::new(sim);
    let config = resolve(&["-s", "cam", "-o", "1", "-n", "0", "-d", "render", "-t", "100"]);
    let mut harness = PipelineHarness::new(framework, config);

    let summary = harness.run().await.unwrap();
    assert_eq!(summary.reports.len(), 1);
    let report = &summary.reports[0];
    assert_eq!(report.name, "dest");
    assert!(report.statistics.frame_count > 0);
    assert_eq!(report.statistics.total_bytes, 0);
    assert_eq!(report.bytes_per_second, 0.0);

    let calls = calls.lock().clone();
    assert!(calls.contains(&Call::ParameterSet(Parameter::CameraNum(0))));
    assert!(calls.contains(&Call::ParameterSet(Parameter::Capture(true))));
    assert!(!calls.contains(&Call::Statistics(PortType::Output)));
    assert_eq!(harness.framework().inner.outstanding_control_buffers(), 0);
}

/// Camera video port into the default null sink: camera number and capture
/// reach the framework, and neither end reports statistics.
#[tokio::test(start_paused = true)]
async fn camera_video_to_null_requests_capture_without_reports() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let mut harness = PipelineHarness::new(framework, resolve(&["-s", "camera", "-o", "1", "-n", "0"]));

    let summary = harness.run().await.unwrap();
    assert!(summary.reports.is_empty());
    assert_eq!(harness.phase(), PipelinePhase::TornDown);

    let calls = calls.lock().clone();
    assert!(calls.contains(&Call::ComponentCreate("vc.null_sink".into())));
    assert!(calls.contains(&Call::ParameterSet(Parameter::CameraNum(0))));
    assert!(calls.contains(&Call::ParameterSet(Parameter::Capture(true))));
    assert!(!calls.iter().any(|c| matches!(c, Call::Statistics(_))));
}

#[tokio::test(start_paused = true)]
async fn camera_preview_to_null_reports_nothing() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let mut harness = PipelineHarness::new(framework, resolve(&["-s", "camera", "-t", "50"]));

    let summary = harness.run().await.unwrap();
    assert!(summary.reports.is_empty());

    let calls = calls.lock().clone();
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::ParameterSet(Parameter::Capture(_)))));
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::ParameterSet(Parameter::CameraNum(_)))));
}

#[tokio::test(start_paused = true)]
async fn connection_mode_reaches_framework() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let mut harness = PipelineHarness::new(framework, resolve(&["-c", "q", "-t", "10"]));
    harness.run().await.unwrap();

    assert!(calls
        .lock()
        .contains(&Call::ConnectionCreate(ConnectionMode::Queue)));
}

#[tokio::test(start_paused = true)]
async fn failed_statistics_query_is_skipped() {
    let (framework, _calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_on("port_statistics");
    let mut harness = PipelineHarness::new(framework, resolve(&["-d", "render", "-t", "10"]));

    let summary = harness.run().await.unwrap();
    assert!(summary.reports.is_empty());
    assert_eq!(harness.phase(), PipelinePhase::TornDown);
}

#[tokio::test(start_paused = true)]
async fn failed_disable_still_completes_run() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_on("connection_disable");
    let mut harness = PipelineHarness::new(framework, resolve(&["-t", "10"]));

    let summary = harness.run().await.unwrap();
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(harness.framework().inner.live_connections(), 0);
    assert!(calls.lock().contains(&Call::ConnectionDestroy));
}

#[test]
fn failure_after_connect_releases_in_reverse_order() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_on("connection_enable");
    let mut harness = PipelineHarness::new(framework, resolve(&["-w", "64", "-h", "64"]));

    harness.create_source().unwrap();
    harness.configure_source().unwrap();
    harness.enable_source().unwrap();
    harness.create_dest().unwrap();
    harness.configure_dest().unwrap();
    harness.enable_dest().unwrap();

    let err = harness.connect().unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Framework(FrameworkError {
            operation: "connection_enable",
            status: Status::NoMemory,
        })
    ));
    assert_eq!(harness.phase(), PipelinePhase::DestEnabled);

    drop(harness);
    assert_eq!(
        destroys(&calls.lock()),
        vec![
            Call::ConnectionDestroy,
            Call::ComponentDestroy(2),
            Call::ComponentDestroy(1),
        ]
    );
}

#[test]
fn failed_destination_create_releases_source() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_after("component_create", 1);
    let mut harness = PipelineHarness::new(framework, resolve(&["-w", "64", "-h", "64"]));
    harness.create_source().unwrap();
    harness.configure_source().unwrap();
    harness.enable_source().unwrap();

    assert!(harness.create_dest().is_err());
    assert_eq!(harness.phase(), PipelinePhase::SourceEnabled);
    assert!(harness.state().dest().is_none());

    drop(harness);
    assert_eq!(destroys(&calls.lock()), vec![Call::ComponentDestroy(1)]);
}

#[test]
fn unknown_component_status_is_reported() {
    let mut sim = SimFramework::new();
    let err = sim.component_create("vc.ril.nonexistent").unwrap_err();
    assert_eq!(err.status, Status::NoEntry);
    assert_eq!(
        err.to_string(),
        "component_create failed: no such entry (0x00000005)"
    );
}

#[tokio::test(start_paused = true)]
async fn failed_teardown_is_retried_on_drop() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_once("connection_destroy");
    let mut harness = PipelineHarness::new(framework, resolve(&["-w", "64", "-h", "64", "-t", "10"]));

    let err = harness.run().await.unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Framework(FrameworkError {
            operation: "connection_destroy",
            ..
        })
    ));
    assert_eq!(harness.phase(), PipelinePhase::Stopped);
    assert!(harness.state().connection().is_some());
    assert!(harness.state().source().is_some());

    drop(harness);
    assert_eq!(
        destroys(&calls.lock()),
        vec![
            Call::ConnectionDisable,
            Call::ConnectionDestroy,
            Call::ConnectionDestroy,
            Call::ComponentDestroy(2),
            Call::ComponentDestroy(1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_component_destroy_keeps_remaining_handles() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let framework = framework.failing_once("component_destroy");
    let mut harness = PipelineHarness::new(framework, resolve(&["-w", "64", "-h", "64", "-t", "10"]));

    assert!(harness.run().await.is_err());
    assert!(harness.state().connection().is_none());
    assert!(harness.state().dest().is_some());
    assert!(harness.state().source().is_some());

    drop(harness);
    assert_eq!(
        destroys(&calls.lock()),
        vec![
            Call::ConnectionDisable,
            Call::ConnectionDestroy,
            Call::ComponentDestroy(2),
            Call::ComponentDestroy(2),
            Call::ComponentDestroy(1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn oversized_frames_are_refused_not_overflowed() {
    let (framework, calls) = RecordingFramework::new(SimFramework::new());
    let config = resolve(&["-e", "rgba", "-w", "3000000000", "-h", "3000000000", "-t", "10"]);
    let mut harness = PipelineHarness::new(framework, config);

    let err = harness.run().await.unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Framework(FrameworkError {
            operation: "port_format_commit",
            status: Status::InvalidArgument,
        })
    ));
    assert_eq!(harness.phase(), PipelinePhase::SourceCreated);

    drop(harness);
    assert_eq!(destroys(&calls.lock()), vec![Call::ComponentDestroy(1)]);
}
