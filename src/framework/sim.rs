//! # Simulated Media Framework
//!
//! An in-process implementation of [`MediaFramework`] modelling four
//! components:
//!
//! - `vc.ril.source`: pattern generator with one output port
//! - `vc.ril.camera`: camera with preview, video and capture outputs
//! - `vc.null_sink`: discards everything it receives on its input
//! - `vc.ril.video_render`: display sink with one input
//!
//! Each enabled connection runs a producer thread that moves one frame per
//! tick and updates the accounting counters of both ends. Only the pattern
//! source's output and the display sink's input answer statistics queries,
//! and the display sink never counts bytes.
//!
//! Camera video and capture ports stay idle until capture is requested;
//! the preview port flows as soon as the connection is enabled.

use super::{
    ComponentHandle, ConnectionHandle, ConnectionMode, ConnectionNotice, ConnectionSink,
    ControlBuffer, ControlEvent, ControlSink, FourCc, FrameworkError, FrameworkResult,
    MediaFramework, Parameter, PortRef, PortStatistics, PortType, Status, VideoFormat,
};
use crossbeam::channel::{self, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Time between two frames on an enabled connection
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(5);

/// Number of patterns the pattern source can generate
const PATTERN_COUNT: u32 = 8;

/// Size of an opaque buffer handle
const OPAQUE_FRAME_BYTES: u64 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentKind {
    PatternSource,
    Camera,
    NullSink,
    VideoRender,
}

impl ComponentKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "vc.ril.source" => Some(ComponentKind::PatternSource),
            "vc.ril.camera" => Some(ComponentKind::Camera),
            "vc.null_sink" => Some(ComponentKind::NullSink),
            "vc.ril.video_render" => Some(ComponentKind::VideoRender),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ComponentKind::PatternSource => "vc.ril.source",
            ComponentKind::Camera => "vc.ril.camera",
            ComponentKind::NullSink => "vc.null_sink",
            ComponentKind::VideoRender => "vc.ril.video_render",
        }
    }

    /// (inputs, outputs)
    fn port_counts(self) -> (u32, u32) {
        match self {
            ComponentKind::PatternSource => (0, 1),
            ComponentKind::Camera => (0, 3),
            ComponentKind::NullSink | ComponentKind::VideoRender => (1, 0),
        }
    }

    fn answers_statistics(self, port_type: PortType) -> bool {
        matches!(
            (self, port_type),
            (ComponentKind::PatternSource, PortType::Output)
                | (ComponentKind::VideoRender, PortType::Input)
        )
    }

    fn counts_bytes(self) -> bool {
        self != ComponentKind::VideoRender
    }
}

struct SimPort {
    name: String,
    enabled: bool,
    sink: Option<ControlSink>,
    format: Option<VideoFormat>,
    capture: Arc<AtomicBool>,
    stats: Arc<Mutex<PortStatistics>>,
    connection: Option<ConnectionHandle>,
}

impl SimPort {
    fn new(component: &str, port_type: PortType, index: u32) -> Self {
        Self {
            name: format!("{}:{}:{}", component, port_type.short_name(), index),
            enabled: false,
            sink: None,
            format: None,
            capture: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(PortStatistics::default())),
            connection: None,
        }
    }
}

struct SimComponent {
    kind: ComponentKind,
    enabled: bool,
    control: SimPort,
    inputs: Vec<SimPort>,
    outputs: Vec<SimPort>,
    pattern: Option<u32>,
    camera_num: Option<i32>,
}

impl SimComponent {
    fn new(kind: ComponentKind) -> Self {
        let name = kind.name();
        let (inputs, outputs) = kind.port_counts();
        Self {
            kind,
            enabled: false,
            control: SimPort::new(name, PortType::Control, 0),
            inputs: (0..inputs)
                .map(|i| SimPort::new(name, PortType::Input, i))
                .collect(),
            outputs: (0..outputs)
                .map(|i| SimPort::new(name, PortType::Output, i))
                .collect(),
            pattern: None,
            camera_num: None,
        }
    }

    fn port(&self, port_type: PortType, index: u32) -> Option<&SimPort> {
        match port_type {
            PortType::Control if index == 0 => Some(&self.control),
            PortType::Control => None,
            PortType::Input => self.inputs.get(index as usize),
            PortType::Output => self.outputs.get(index as usize),
        }
    }

    fn port_mut(&mut self, port_type: PortType, index: u32) -> Option<&mut SimPort> {
        match port_type {
            PortType::Control if index == 0 => Some(&mut self.control),
            PortType::Control => None,
            PortType::Input => self.inputs.get_mut(index as usize),
            PortType::Output => self.outputs.get_mut(index as usize),
        }
    }

    fn is_connected(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|port| port.connection.is_some())
    }
}

/// Everything a producer thread needs to move frames across one connection
struct FrameFlow {
    notice: ConnectionNotice,
    mode: ConnectionMode,
    sink: ConnectionSink,
    frame_bytes: u64,
    /// Closed until capture is requested, for camera video/capture ports
    gate: Option<Arc<AtomicBool>>,
    output_stats: Arc<Mutex<PortStatistics>>,
    output_counts_bytes: bool,
    input_stats: Arc<Mutex<PortStatistics>>,
    input_counts_bytes: bool,
}

impl FrameFlow {
    fn deliver_frame(&self) {
        if let Some(gate) = &self.gate {
            if !gate.load(Ordering::Acquire) {
                return;
            }
        }

        Self::account(&self.output_stats, self.output_counts_bytes, self.frame_bytes);
        Self::account(&self.input_stats, self.input_counts_bytes, self.frame_bytes);

        if !self.mode.tunnelling() {
            (self.sink)(&self.notice);
        }
    }

    fn account(stats: &Mutex<PortStatistics>, counts_bytes: bool, frame_bytes: u64) {
        let mut stats = stats.lock();
        stats.buffer_count = stats.buffer_count.wrapping_add(1);
        stats.frame_count = stats.frame_count.wrapping_add(1);
        if counts_bytes {
            stats.total_bytes = stats.total_bytes.saturating_add(frame_bytes);
        }
    }
}

struct Producer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Producer {
    fn spawn(name: &str, flow: FrameFlow, interval: Duration) -> FrameworkResult<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);
        let handle = thread::Builder::new()
            .name(format!("sim {}", name))
            .spawn(move || loop {
                select! {
                    recv(stopped) -> _ => break,
                    recv(ticker) -> _ => flow.deliver_frame(),
                }
            })
            .map_err(|_| FrameworkError::new("connection_enable", Status::NoSpace))?;
        Ok(Self { stop, handle })
    }

    fn stop(self) -> FrameworkResult<()> {
        // A closed channel wakes the thread just as well as a message.
        let _ = self.stop.send(());
        self.handle
            .join()
            .map_err(|_| FrameworkError::new("connection_disable", Status::Io))
    }
}

struct SimConnection {
    name: String,
    output: PortRef,
    input: PortRef,
    mode: ConnectionMode,
    sink: ConnectionSink,
    producer: Option<Producer>,
}

/// In-process media framework
pub struct SimFramework {
    components: HashMap<ComponentHandle, SimComponent>,
    connections: HashMap<ConnectionHandle, SimConnection>,
    next_handle: u32,
    frame_interval: Duration,
    control_buffers: Arc<AtomicUsize>,
}

impl Default for SimFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFramework {
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    /// Framework whose connections move one frame every `frame_interval`
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            components: HashMap::new(),
            connections: HashMap::new(),
            next_handle: 1,
            frame_interval,
            control_buffers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of components created and not yet destroyed
    pub fn live_components(&self) -> usize {
        self.components.len()
    }

    /// Number of connections created and not yet destroyed
    pub fn live_connections(&self) -> usize {
        self.connections.len()
    }

    /// Control buffers lent to sinks and not yet released
    pub fn outstanding_control_buffers(&self) -> usize {
        self.control_buffers.load(Ordering::SeqCst)
    }

    /// Whether capture is currently requested on a port
    pub fn capture_requested(&self, port: PortRef) -> bool {
        self.components
            .get(&port.component)
            .and_then(|c| c.port(port.port_type, port.index))
            .map_or(false, |p| p.capture.load(Ordering::Acquire))
    }

    /// Camera number configured on a camera component
    pub fn camera_num(&self, component: ComponentHandle) -> Option<i32> {
        self.components.get(&component).and_then(|c| c.camera_num)
    }

    /// Pattern selected on a pattern source
    pub fn pattern(&self, component: ComponentHandle) -> Option<u32> {
        self.components.get(&component).and_then(|c| c.pattern)
    }

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn component(&self, handle: ComponentHandle, operation: &'static str) -> FrameworkResult<&SimComponent> {
        self.components
            .get(&handle)
            .ok_or_else(|| FrameworkError::new(operation, Status::Fault))
    }

    fn component_mut(
        &mut self,
        handle: ComponentHandle,
        operation: &'static str,
    ) -> FrameworkResult<&mut SimComponent> {
        self.components
            .get_mut(&handle)
            .ok_or_else(|| FrameworkError::new(operation, Status::Fault))
    }

    fn sim_port(&self, port: PortRef, operation: &'static str) -> FrameworkResult<&SimPort> {
        self.component(port.component, operation)?
            .port(port.port_type, port.index)
            .ok_or_else(|| FrameworkError::new(operation, Status::InvalidArgument))
    }

    fn sim_port_mut(&mut self, port: PortRef, operation: &'static str) -> FrameworkResult<&mut SimPort> {
        self.component_mut(port.component, operation)?
            .port_mut(port.port_type, port.index)
            .ok_or_else(|| FrameworkError::new(operation, Status::InvalidArgument))
    }

    fn connection_mut(
        &mut self,
        handle: ConnectionHandle,
        operation: &'static str,
    ) -> FrameworkResult<&mut SimConnection> {
        self.connections
            .get_mut(&handle)
            .ok_or_else(|| FrameworkError::new(operation, Status::Fault))
    }

    /// Raise a control event on a component's control port from a
    /// framework-owned thread.
    fn notify_control(&self, component: ComponentHandle, event: ControlEvent) {
        let Some(control) = self.components.get(&component).map(|c| &c.control) else {
            return;
        };
        let Some(sink) = control.sink.clone().filter(|_| control.enabled) else {
            return;
        };
        let buffer = ControlBuffer::lend(control.name.clone(), event, self.control_buffers.clone());
        let spawned = thread::Builder::new()
            .name(format!("sim {} events", control.name))
            .spawn(move || sink(buffer));
        if let Err(e) = spawned {
            warn!("Dropping control event for {}: {}", control.name, e);
        }
    }
}

/// Bytes in one frame, `None` when the size does not fit in 64 bits
fn frame_bytes(format: &VideoFormat) -> Option<u64> {
    let pixels = u64::from(format.width).checked_mul(u64::from(format.height))?;
    match format.encoding.to_bytes() {
        [b'I', b'4', b'2', b'0'] => pixels.checked_mul(3).map(|bytes| bytes / 2),
        [b'R', b'G', b'B', b'A'] => pixels.checked_mul(4),
        _ => Some(OPAQUE_FRAME_BYTES),
    }
}

fn supported_encoding(encoding: FourCc) -> bool {
    matches!(&encoding.to_bytes(), b"I420" | b"RGBA" | b"OPQV")
}

impl MediaFramework for SimFramework {
    fn component_create(&mut self, name: &str) -> FrameworkResult<ComponentHandle> {
        let kind = ComponentKind::from_name(name)
            .ok_or_else(|| FrameworkError::new("component_create", Status::NoEntry))?;
        let handle = ComponentHandle(self.allocate_handle());
        self.components.insert(handle, SimComponent::new(kind));
        debug!("Created {} as component {}", name, handle.0);
        Ok(handle)
    }

    fn port(
        &self,
        component: ComponentHandle,
        port_type: PortType,
        index: u32,
    ) -> FrameworkResult<PortRef> {
        let port = PortRef {
            component,
            port_type,
            index,
        };
        self.sim_port(port, "port_lookup")?;
        Ok(port)
    }

    fn port_enable(&mut self, port: PortRef, sink: ControlSink) -> FrameworkResult<()> {
        let sim_port = self.sim_port_mut(port, "port_enable")?;
        if sim_port.enabled {
            return Err(FrameworkError::new("port_enable", Status::InvalidArgument));
        }
        sim_port.enabled = true;
        sim_port.sink = Some(sink);
        Ok(())
    }

    fn port_parameter_set(&mut self, port: PortRef, parameter: Parameter) -> FrameworkResult<()> {
        const OP: &str = "port_parameter_set";
        let kind = self.component(port.component, OP)?.kind;
        self.sim_port(port, OP)?;

        match (parameter, kind, port.port_type) {
            (Parameter::VideoSourcePattern(pattern), ComponentKind::PatternSource, PortType::Output) => {
                if pattern >= PATTERN_COUNT {
                    return Err(FrameworkError::new(OP, Status::InvalidArgument));
                }
                self.component_mut(port.component, OP)?.pattern = Some(pattern);
            }
            (Parameter::CameraNum(num), ComponentKind::Camera, PortType::Control) => {
                if num < 0 {
                    return Err(FrameworkError::new(OP, Status::InvalidArgument));
                }
                self.component_mut(port.component, OP)?.camera_num = Some(num);
            }
            (Parameter::Capture(on), ComponentKind::Camera, PortType::Output) => {
                self.sim_port(port, OP)?.capture.store(on, Ordering::Release);
                if on {
                    self.notify_control(port.component, ControlEvent::ParameterChanged);
                }
            }
            _ => return Err(FrameworkError::new(OP, Status::NotImplemented)),
        }
        Ok(())
    }

    fn port_format_commit(&mut self, port: PortRef, format: &VideoFormat) -> FrameworkResult<()> {
        const OP: &str = "port_format_commit";
        if port.port_type == PortType::Control {
            return Err(FrameworkError::new(OP, Status::InvalidArgument));
        }
        if !supported_encoding(format.encoding) {
            return Err(FrameworkError::new(OP, Status::NotImplemented));
        }
        let crop = format.crop;
        let geometry_ok = format.width > 0
            && format.height > 0
            && format.width % VideoFormat::WIDTH_ALIGN == 0
            && format.height % VideoFormat::HEIGHT_ALIGN == 0
            && crop.x.saturating_add(crop.width) <= format.width
            && crop.y.saturating_add(crop.height) <= format.height
            && frame_bytes(format).is_some();
        if !geometry_ok {
            return Err(FrameworkError::new(OP, Status::InvalidArgument));
        }

        let sim_port = self.sim_port_mut(port, OP)?;
        if sim_port.connection.is_some() {
            return Err(FrameworkError::new(OP, Status::AlreadyConnected));
        }
        sim_port.format = Some(*format);
        Ok(())
    }

    fn port_statistics(&self, port: PortRef) -> FrameworkResult<PortStatistics> {
        const OP: &str = "port_statistics";
        let kind = self.component(port.component, OP)?.kind;
        let sim_port = self.sim_port(port, OP)?;
        if !kind.answers_statistics(port.port_type) {
            return Err(FrameworkError::new(OP, Status::NotImplemented));
        }
        let stats = *sim_port.stats.lock();
        Ok(stats)
    }

    fn component_enable(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        self.component_mut(component, "component_enable")?.enabled = true;
        Ok(())
    }

    fn component_disable(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        self.component_mut(component, "component_disable")?.enabled = false;
        Ok(())
    }

    fn component_destroy(&mut self, component: ComponentHandle) -> FrameworkResult<()> {
        if self.component(component, "component_destroy")?.is_connected() {
            return Err(FrameworkError::new("component_destroy", Status::AlreadyConnected));
        }
        self.components.remove(&component);
        debug!("Destroyed component {}", component.0);
        Ok(())
    }

    fn connection_create(
        &mut self,
        output: PortRef,
        input: PortRef,
        mode: ConnectionMode,
        sink: ConnectionSink,
    ) -> FrameworkResult<ConnectionHandle> {
        const OP: &str = "connection_create";
        if output.port_type != PortType::Output || input.port_type != PortType::Input {
            return Err(FrameworkError::new(OP, Status::InvalidArgument));
        }

        let (out_name, out_format) = {
            let port = self.sim_port(output, OP)?;
            if port.connection.is_some() {
                return Err(FrameworkError::new(OP, Status::AlreadyConnected));
            }
            (port.name.clone(), port.format)
        };
        let (in_name, in_format) = {
            let port = self.sim_port(input, OP)?;
            if port.connection.is_some() {
                return Err(FrameworkError::new(OP, Status::AlreadyConnected));
            }
            (port.name.clone(), port.format)
        };

        match (out_format, in_format) {
            (Some(out), Some(inp)) if out.encoding == inp.encoding => {}
            (Some(_), Some(_)) => return Err(FrameworkError::new(OP, Status::InvalidArgument)),
            _ => return Err(FrameworkError::new(OP, Status::NotConfigured)),
        }

        let handle = ConnectionHandle(self.allocate_handle());
        self.sim_port_mut(output, OP)?.connection = Some(handle);
        self.sim_port_mut(input, OP)?.connection = Some(handle);
        let name = format!("{}/{}", out_name, in_name);
        debug!("Created connection {} ({:?})", name, mode);
        self.connections.insert(
            handle,
            SimConnection {
                name,
                output,
                input,
                mode,
                sink,
                producer: None,
            },
        );
        Ok(handle)
    }

    fn connection_enable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        const OP: &str = "connection_enable";
        let (name, output, input, mode, sink) = {
            let conn = self.connection_mut(connection, OP)?;
            if conn.producer.is_some() {
                return Ok(());
            }
            (conn.name.clone(), conn.output, conn.input, conn.mode, conn.sink.clone())
        };

        let out_component = self.component(output.component, OP)?;
        let in_component = self.component(input.component, OP)?;
        if !out_component.enabled || !in_component.enabled {
            return Err(FrameworkError::new(OP, Status::NotReady));
        }
        let out_port = self.sim_port(output, OP)?;
        let in_port = self.sim_port(input, OP)?;
        let format = out_port
            .format
            .ok_or_else(|| FrameworkError::new(OP, Status::NotConfigured))?;

        let gated = out_component.kind == ComponentKind::Camera && output.index > 0;
        let flow = FrameFlow {
            notice: ConnectionNotice { name: name.clone() },
            mode,
            sink,
            frame_bytes: frame_bytes(&format)
                .ok_or_else(|| FrameworkError::new(OP, Status::InvalidArgument))?,
            gate: gated.then(|| out_port.capture.clone()),
            output_stats: out_port.stats.clone(),
            output_counts_bytes: out_component.kind.counts_bytes(),
            input_stats: in_port.stats.clone(),
            input_counts_bytes: in_component.kind.counts_bytes(),
        };

        let producer = Producer::spawn(&name, flow, self.frame_interval)?;
        self.connection_mut(connection, OP)?.producer = Some(producer);
        Ok(())
    }

    fn connection_disable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        match self.connection_mut(connection, "connection_disable")?.producer.take() {
            Some(producer) => producer.stop(),
            None => Ok(()),
        }
    }

    fn connection_destroy(&mut self, connection: ConnectionHandle) -> FrameworkResult<()> {
        self.connection_disable(connection)?;
        let conn = self
            .connections
            .remove(&connection)
            .ok_or_else(|| FrameworkError::new("connection_destroy", Status::Fault))?;
        for port in [conn.output, conn.input] {
            if let Ok(sim_port) = self.sim_port_mut(port, "connection_destroy") {
                sim_port.connection = None;
            }
        }
        debug!("Destroyed connection {}", conn.name);
        Ok(())
    }
}

impl Drop for SimFramework {
    fn drop(&mut self) {
        for (_, conn) in self.connections.drain() {
            if let Some(producer) = conn.producer {
                let _ = producer.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_control() -> ControlSink {
        Arc::new(|buffer: ControlBuffer| buffer.release())
    }

    fn noop_connection() -> ConnectionSink {
        Arc::new(|_: &ConnectionNotice| {})
    }

    fn i420(width: u32, height: u32) -> VideoFormat {
        VideoFormat::aligned(FourCc::from_bytes(*b"I420"), width, height).unwrap()
    }

    /// Build an enabled, connected `source` -> `sink` pair.
    fn connect(
        framework: &mut SimFramework,
        source: &str,
        output_index: u32,
        sink: &str,
        mode: ConnectionMode,
    ) -> (ComponentHandle, ComponentHandle, ConnectionHandle) {
        let src = framework.component_create(source).unwrap();
        let dst = framework.component_create(sink).unwrap();
        let out = framework.port(src, PortType::Output, output_index).unwrap();
        let inp = framework.port(dst, PortType::Input, 0).unwrap();
        framework.port_format_commit(out, &i420(640, 480)).unwrap();
        framework.port_format_commit(inp, &i420(640, 480)).unwrap();
        framework.component_enable(src).unwrap();
        framework.component_enable(dst).unwrap();
        let conn = framework
            .connection_create(out, inp, mode, noop_connection())
            .unwrap();
        (src, dst, conn)
    }

    #[test]
    fn test_unknown_component_is_rejected() {
        let mut framework = SimFramework::new();
        let err = framework.component_create("vc.ril.teleporter").unwrap_err();
        assert_eq!(err.status, Status::NoEntry);
    }

    #[test]
    fn test_port_lookup_bounds() {
        let mut framework = SimFramework::new();
        let source = framework.component_create("vc.ril.source").unwrap();
        let camera = framework.component_create("vc.ril.camera").unwrap();

        assert!(framework.port(source, PortType::Output, 0).is_ok());
        assert_eq!(
            framework.port(source, PortType::Output, 1).unwrap_err().status,
            Status::InvalidArgument
        );
        assert!(framework.port(camera, PortType::Output, 2).is_ok());
        assert!(framework.port(camera, PortType::Input, 0).is_err());
        assert!(framework.port(camera, PortType::Control, 1).is_err());
    }

    #[test]
    fn test_parameters_are_checked_against_component() {
        let mut framework = SimFramework::new();
        let source = framework.component_create("vc.ril.source").unwrap();
        let camera = framework.component_create("vc.ril.camera").unwrap();
        let source_out = framework.port(source, PortType::Output, 0).unwrap();
        let camera_ctr = framework.port(camera, PortType::Control, 0).unwrap();

        framework
            .port_parameter_set(source_out, Parameter::VideoSourcePattern(7))
            .unwrap();
        assert_eq!(framework.pattern(source), Some(7));
        assert!(framework
            .port_parameter_set(source_out, Parameter::VideoSourcePattern(8))
            .is_err());

        framework
            .port_parameter_set(camera_ctr, Parameter::CameraNum(1))
            .unwrap();
        assert_eq!(framework.camera_num(camera), Some(1));

        let err = framework
            .port_parameter_set(source_out, Parameter::Capture(true))
            .unwrap_err();
        assert_eq!(err.status, Status::NotImplemented);
    }

    #[test]
    fn test_format_commit_requires_aligned_geometry() {
        let mut framework = SimFramework::new();
        let sink = framework.component_create("vc.null_sink").unwrap();
        let input = framework.port(sink, PortType::Input, 0).unwrap();

        assert!(framework.port_format_commit(input, &i420(1000, 1080)).is_ok());

        let mut unaligned = i420(640, 480);
        unaligned.width = 641;
        assert!(framework.port_format_commit(input, &unaligned).is_err());

        let control = framework.port(sink, PortType::Control, 0).unwrap();
        assert!(framework.port_format_commit(control, &i420(640, 480)).is_err());
    }

    #[test]
    fn test_format_commit_rejects_unaddressable_frames() {
        let mut framework = SimFramework::new();
        let sink = framework.component_create("vc.null_sink").unwrap();
        let input = framework.port(sink, PortType::Input, 0).unwrap();
        let huge = |code: &[u8; 4]| {
            VideoFormat::aligned(FourCc::from_bytes(*code), 3_000_000_000, 3_000_000_000).unwrap()
        };

        for code in [b"RGBA", b"I420"] {
            let err = framework.port_format_commit(input, &huge(code)).unwrap_err();
            assert_eq!(err.status, Status::InvalidArgument);
        }
        // Opaque frames are handles, so their size does not grow with the picture.
        assert!(framework.port_format_commit(input, &huge(b"OPQV")).is_ok());
    }

    #[test]
    fn test_connection_requires_matching_formats() {
        let mut framework = SimFramework::new();
        let source = framework.component_create("vc.ril.source").unwrap();
        let sink = framework.component_create("vc.null_sink").unwrap();
        let out = framework.port(source, PortType::Output, 0).unwrap();
        let inp = framework.port(sink, PortType::Input, 0).unwrap();

        let err = framework
            .connection_create(out, inp, ConnectionMode::Tunnel, noop_connection())
            .unwrap_err();
        assert_eq!(err.status, Status::NotConfigured);

        framework.port_format_commit(out, &i420(640, 480)).unwrap();
        let rgba = VideoFormat::aligned(FourCc::from_bytes(*b"RGBA"), 640, 480).unwrap();
        framework.port_format_commit(inp, &rgba).unwrap();
        let err = framework
            .connection_create(out, inp, ConnectionMode::Tunnel, noop_connection())
            .unwrap_err();
        assert_eq!(err.status, Status::InvalidArgument);
    }

    #[test]
    fn test_connected_component_cannot_be_destroyed() {
        let mut framework = SimFramework::new();
        let (src, dst, conn) = connect(
            &mut framework,
            "vc.ril.source",
            0,
            "vc.null_sink",
            ConnectionMode::Tunnel,
        );

        assert_eq!(
            framework.component_destroy(src).unwrap_err().status,
            Status::AlreadyConnected
        );

        framework.connection_destroy(conn).unwrap();
        framework.component_destroy(dst).unwrap();
        framework.component_destroy(src).unwrap();
        assert_eq!(framework.live_components(), 0);
        assert_eq!(framework.live_connections(), 0);
    }

    #[test]
    fn test_enabled_connection_moves_frames() {
        let mut framework = SimFramework::with_frame_interval(Duration::from_millis(1));
        let (src, dst, conn) = connect(
            &mut framework,
            "vc.ril.source",
            0,
            "vc.ril.video_render",
            ConnectionMode::Tunnel,
        );

        framework.connection_enable(conn).unwrap();
        thread::sleep(Duration::from_millis(50));
        framework.connection_disable(conn).unwrap();

        let out = framework.port(src, PortType::Output, 0).unwrap();
        let inp = framework.port(dst, PortType::Input, 0).unwrap();
        let produced = framework.port_statistics(out).unwrap();
        let rendered = framework.port_statistics(inp).unwrap();

        assert!(produced.frame_count > 0);
        assert_eq!(produced.total_bytes, u64::from(produced.frame_count) * 640 * 480 * 3 / 2);
        assert_eq!(rendered.frame_count, produced.frame_count);
        assert_eq!(rendered.total_bytes, 0);
    }

    #[test]
    fn test_connection_enable_requires_enabled_components() {
        let mut framework = SimFramework::new();
        let (src, _, conn) = connect(
            &mut framework,
            "vc.ril.source",
            0,
            "vc.null_sink",
            ConnectionMode::Queue,
        );
        framework.component_disable(src).unwrap();
        assert_eq!(
            framework.connection_enable(conn).unwrap_err().status,
            Status::NotReady
        );
    }

    #[test]
    fn test_statistics_only_on_supported_ports() {
        let mut framework = SimFramework::new();
        let camera = framework.component_create("vc.ril.camera").unwrap();
        let sink = framework.component_create("vc.null_sink").unwrap();
        let camera_out = framework.port(camera, PortType::Output, 1).unwrap();
        let sink_in = framework.port(sink, PortType::Input, 0).unwrap();

        assert_eq!(
            framework.port_statistics(camera_out).unwrap_err().status,
            Status::NotImplemented
        );
        assert_eq!(
            framework.port_statistics(sink_in).unwrap_err().status,
            Status::NotImplemented
        );
    }

    #[test]
    fn test_camera_capture_port_waits_for_capture() {
        let mut framework = SimFramework::with_frame_interval(Duration::from_millis(1));
        let (camera, render, conn) = connect(
            &mut framework,
            "vc.ril.camera",
            2,
            "vc.ril.video_render",
            ConnectionMode::Callback,
        );
        let control = framework.port(camera, PortType::Control, 0).unwrap();
        framework.port_enable(control, noop_control()).unwrap();
        let out = framework.port(camera, PortType::Output, 2).unwrap();
        let rendered = framework.port(render, PortType::Input, 0).unwrap();

        framework.connection_enable(conn).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!framework.capture_requested(out));
        assert_eq!(framework.port_statistics(rendered).unwrap().frame_count, 0);

        framework
            .port_parameter_set(out, Parameter::Capture(true))
            .unwrap();
        assert!(framework.capture_requested(out));
        thread::sleep(Duration::from_millis(30));
        framework.connection_disable(conn).unwrap();
        assert!(framework.port_statistics(rendered).unwrap().frame_count > 0);
    }

    #[test]
    fn test_port_enable_twice_fails() {
        let mut framework = SimFramework::new();
        let source = framework.component_create("vc.ril.source").unwrap();
        let control = framework.port(source, PortType::Control, 0).unwrap();
        framework.port_enable(control, noop_control()).unwrap();
        assert!(framework.port_enable(control, noop_control()).is_err());
    }
}
