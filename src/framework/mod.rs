//! # Media Framework Capability Interface
//!
//! The benchmark never produces or moves frames itself. Component creation,
//! format negotiation, buffer hand-off and statistics accounting all belong
//! to the media framework, reached only through the [`MediaFramework`]
//! trait defined here.
//!
//! Notifications raised by the framework arrive on threads the framework
//! owns. Sinks handed to it are observers: they may log and release the
//! buffer they were given, nothing more.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub mod sim;

pub use sim::SimFramework;

/// Status codes returned by failing framework calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Out of memory
    NoMemory = 1,
    /// Out of resources other than memory
    NoSpace,
    /// Argument is invalid
    InvalidArgument,
    /// Function not implemented
    NotImplemented,
    /// No such file or directory
    NoEntry,
    /// No such device or address
    NoDevice,
    /// I/O error
    Io,
    /// Illegal seek
    IllegalSeek,
    /// Data is corrupt
    Corrupt,
    /// Component is not ready
    NotReady,
    /// Component is not configured
    NotConfigured,
    /// Port is already connected
    AlreadyConnected,
    /// Port is disconnected
    NotConnected,
    /// Resource temporarily unavailable
    Again,
    /// Bad address
    Fault,
}

impl Status {
    /// Human readable description of the status
    pub fn description(self) -> &'static str {
        match self {
            Status::NoMemory => "out of memory",
            Status::NoSpace => "out of resources",
            Status::InvalidArgument => "invalid argument",
            Status::NotImplemented => "not implemented",
            Status::NoEntry => "no such entry",
            Status::NoDevice => "no such device",
            Status::Io => "I/O error",
            Status::IllegalSeek => "illegal seek",
            Status::Corrupt => "data is corrupt",
            Status::NotReady => "component not ready",
            Status::NotConfigured => "component not configured",
            Status::AlreadyConnected => "port already connected",
            Status::NotConnected => "port not connected",
            Status::Again => "resource temporarily unavailable",
            Status::Fault => "bad address",
        }
    }

    /// Numeric value of the status
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A framework call that returned something other than success
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {status} (0x{:08x})", .status.code())]
pub struct FrameworkError {
    /// Framework operation that failed
    pub operation: &'static str,
    pub status: Status,
}

impl FrameworkError {
    pub fn new(operation: &'static str, status: Status) -> Self {
        Self { operation, status }
    }
}

pub type FrameworkResult<T> = Result<T, FrameworkError>;

/// Opaque handle to a created component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle(pub u32);

/// Opaque handle to a created connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u32);

/// Kind of endpoint on a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Control,
    Input,
    Output,
}

impl PortType {
    /// Abbreviation used in port names
    pub fn short_name(self) -> &'static str {
        match self {
            PortType::Control => "ctr",
            PortType::Input => "in",
            PortType::Output => "out",
        }
    }
}

/// A port located by component, type and index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub component: ComponentHandle,
    pub port_type: PortType,
    pub index: u32,
}

/// Four character code identifying a frame encoding
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCc(pub u32);

impl FourCc {
    pub const fn from_bytes(code: [u8; 4]) -> Self {
        FourCc(u32::from_le_bytes(code))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

/// Crop rectangle within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Video frame format negotiated on a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub encoding: FourCc,
    /// Buffer width, a multiple of [`VideoFormat::WIDTH_ALIGN`]
    pub width: u32,
    /// Buffer height, a multiple of [`VideoFormat::HEIGHT_ALIGN`]
    pub height: u32,
    pub crop: Rect,
}

impl VideoFormat {
    pub const WIDTH_ALIGN: u32 = 32;
    pub const HEIGHT_ALIGN: u32 = 16;

    /// Format for a `width` x `height` picture: buffer dimensions padded to
    /// the framework's alignment, crop covering exactly the picture.
    ///
    /// `None` when a padded dimension does not fit in 32 bits.
    pub fn aligned(encoding: FourCc, width: u32, height: u32) -> Option<Self> {
        Some(Self {
            encoding,
            width: align_up(width, Self::WIDTH_ALIGN)?,
            height: align_up(height, Self::HEIGHT_ALIGN)?,
            crop: Rect {
                x: 0,
                y: 0,
                width,
                height,
            },
        })
    }
}

/// Round `value` up to the next multiple of `align` (a power of two)
pub fn align_up(value: u32, align: u32) -> Option<u32> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Typed parameters the benchmark sets on ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    /// Pattern generated by a pattern source (enum)
    VideoSourcePattern(u32),
    /// Camera number to open (int32)
    CameraNum(i32),
    /// Start or stop capture on a camera port (bool)
    Capture(bool),
}

/// Buffer hand-off strategy requested for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionMode {
    /// Buffers move between the ports inside the framework
    Tunnel,
    /// Buffers are handed over through the connection notification
    Callback,
    /// Buffers are handed over through the connection queue
    Queue,
}

impl ConnectionMode {
    /// Whether the framework is asked to tunnel the connection
    pub fn tunnelling(self) -> bool {
        matches!(self, ConnectionMode::Tunnel)
    }
}

/// Accounting counters kept by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatistics {
    pub buffer_count: u32,
    pub frame_count: u32,
    pub frames_skipped: u32,
    pub frames_discarded: u32,
    pub total_bytes: u64,
}

/// Events the framework reports on a control port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Error,
    EndOfStream,
    FormatChanged,
    ParameterChanged,
}

/// A control-port buffer lent to a notification sink
///
/// The buffer belongs to the framework's pool until [`ControlBuffer::release`]
/// hands it back.
#[derive(Debug)]
pub struct ControlBuffer {
    port: String,
    event: ControlEvent,
    outstanding: Arc<AtomicUsize>,
}

impl ControlBuffer {
    /// Lend a buffer out of a pool whose outstanding count is `outstanding`
    pub fn lend(port: impl Into<String>, event: ControlEvent, outstanding: Arc<AtomicUsize>) -> Self {
        outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            port: port.into(),
            event,
            outstanding,
        }
    }

    /// Name of the port that raised the event
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn event(&self) -> ControlEvent {
        self.event
    }

    /// Give the buffer back to the framework
    pub fn release(self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A notification raised by a connection
#[derive(Debug, Clone)]
pub struct ConnectionNotice {
    pub name: String,
}

/// Observer invoked for control-port events
pub type ControlSink = Arc<dyn Fn(ControlBuffer) + Send + Sync>;

/// Observer invoked for connection events
pub type ConnectionSink = Arc<dyn Fn(&ConnectionNotice) + Send + Sync>;

/// Everything the benchmark needs from a media framework
pub trait MediaFramework {
    /// Instantiate a component by its framework name
    fn component_create(&mut self, name: &str) -> FrameworkResult<ComponentHandle>;

    /// Locate a port on a component
    fn port(
        &self,
        component: ComponentHandle,
        port_type: PortType,
        index: u32,
    ) -> FrameworkResult<PortRef>;

    /// Enable a port, routing its notifications to `sink`
    fn port_enable(&mut self, port: PortRef, sink: ControlSink) -> FrameworkResult<()>;

    /// Set a typed parameter on a port
    fn port_parameter_set(&mut self, port: PortRef, parameter: Parameter) -> FrameworkResult<()>;

    /// Commit a frame format on a port
    fn port_format_commit(&mut self, port: PortRef, format: &VideoFormat) -> FrameworkResult<()>;

    /// Query a port's accounting statistics
    fn port_statistics(&self, port: PortRef) -> FrameworkResult<PortStatistics>;

    fn component_enable(&mut self, component: ComponentHandle) -> FrameworkResult<()>;

    fn component_disable(&mut self, component: ComponentHandle) -> FrameworkResult<()>;

    fn component_destroy(&mut self, component: ComponentHandle) -> FrameworkResult<()>;

    /// Link an output port to an input port
    fn connection_create(
        &mut self,
        output: PortRef,
        input: PortRef,
        mode: ConnectionMode,
        sink: ConnectionSink,
    ) -> FrameworkResult<ConnectionHandle>;

    fn connection_enable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()>;

    fn connection_disable(&mut self, connection: ConnectionHandle) -> FrameworkResult<()>;

    fn connection_destroy(&mut self, connection: ConnectionHandle) -> FrameworkResult<()>;
}
