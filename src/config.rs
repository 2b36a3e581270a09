//! # Run Configuration
//!
//! Turns the raw command-line values into a [`ResolvedConfig`]: every
//! enumerated switch is resolved through the abbreviation matcher in
//! [`crate::vocabulary`], numeric switches are taken as parsed, and the
//! cross-field rule (a pattern source only has output port 0) is enforced
//! before any component exists.
//!
//! Each enumerated kind maps its variants to the names the framework
//! knows them by with a `match`, so a variant can never be paired with the
//! wrong framework name.

use crate::{
    cli::Args,
    framework::{ConnectionMode, FourCc},
    vocabulary::{MatchError, Vocabulary},
};
use clap::{error::ErrorKind, Parser};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Frame encoding requested on both ends of the connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    I420,
    Rgba,
    Opaque,
}

impl Encoding {
    pub fn fourcc(self) -> FourCc {
        match self {
            Encoding::I420 => FourCc::from_bytes(*b"I420"),
            Encoding::Rgba => FourCc::from_bytes(*b"RGBA"),
            Encoding::Opaque => FourCc::from_bytes(*b"OPQV"),
        }
    }
}

impl Vocabulary for Encoding {
    const ALL: &'static [Self] = &[Encoding::I420, Encoding::Rgba, Encoding::Opaque];

    fn name(self) -> &'static str {
        match self {
            Encoding::I420 => "i420",
            Encoding::Rgba => "rgba",
            Encoding::Opaque => "opaque",
        }
    }
}

/// Component producing frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Test pattern generator
    Pattern,
    Camera,
}

impl SourceKind {
    pub fn component_name(self) -> &'static str {
        match self {
            SourceKind::Pattern => "vc.ril.source",
            SourceKind::Camera => "vc.ril.camera",
        }
    }
}

impl Vocabulary for SourceKind {
    const ALL: &'static [Self] = &[SourceKind::Pattern, SourceKind::Camera];

    fn name(self) -> &'static str {
        match self {
            SourceKind::Pattern => "source",
            SourceKind::Camera => "camera",
        }
    }
}

/// Picture generated by the pattern source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    White,
    Black,
    Diagonal,
    Noise,
    Random,
    Colour,
    Blocks,
    Swirly,
}

impl Pattern {
    /// Pattern selector understood by the pattern source
    pub fn selector(self) -> u32 {
        match self {
            Pattern::White => 0,
            Pattern::Black => 1,
            Pattern::Diagonal => 2,
            Pattern::Noise => 3,
            Pattern::Random => 4,
            Pattern::Colour => 5,
            Pattern::Blocks => 6,
            Pattern::Swirly => 7,
        }
    }
}

impl Vocabulary for Pattern {
    const ALL: &'static [Self] = &[
        Pattern::White,
        Pattern::Black,
        Pattern::Diagonal,
        Pattern::Noise,
        Pattern::Random,
        Pattern::Colour,
        Pattern::Blocks,
        Pattern::Swirly,
    ];

    fn name(self) -> &'static str {
        match self {
            Pattern::White => "white",
            Pattern::Black => "black",
            Pattern::Diagonal => "diagonal",
            Pattern::Noise => "noise",
            Pattern::Random => "random",
            Pattern::Colour => "colour",
            Pattern::Blocks => "blocks",
            Pattern::Swirly => "swirly",
        }
    }
}

/// Component consuming frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestKind {
    /// Discards every frame
    Null,
    /// Displays every frame
    Render,
}

impl DestKind {
    pub fn component_name(self) -> &'static str {
        match self {
            DestKind::Null => "vc.null_sink",
            DestKind::Render => "vc.ril.video_render",
        }
    }
}

impl Vocabulary for DestKind {
    const ALL: &'static [Self] = &[DestKind::Null, DestKind::Render];

    fn name(self) -> &'static str {
        match self {
            DestKind::Null => "null",
            DestKind::Render => "render",
        }
    }
}

impl Vocabulary for ConnectionMode {
    const ALL: &'static [Self] = &[
        ConnectionMode::Tunnel,
        ConnectionMode::Callback,
        ConnectionMode::Queue,
    ];

    fn name(self) -> &'static str {
        match self {
            ConnectionMode::Tunnel => "tunnel",
            ConnectionMode::Callback => "callback",
            ConnectionMode::Queue => "queue",
        }
    }
}

/// Why the command line could not be turned into a run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Ambiguous {switch}: {value}")]
    Ambiguous { switch: &'static str, value: String },

    #[error("Unknown {switch}: {value}")]
    Unknown { switch: &'static str, value: String },

    #[error("Extra argument(s) after options: {}", .0.join(" "))]
    ExtraArguments(Vec<String>),

    #[error("Output port must be 0 for source source (got {0})")]
    OutputPortNotZero(u32),

    #[error("Camera number out of range: {0}")]
    CameraNumOutOfRange(u32),

    /// Usage text to print before exiting successfully
    #[error("help requested")]
    HelpRequested(String),

    #[error(transparent)]
    Cli(clap::Error),
}

impl ConfigError {
    /// Whether the process should still exit successfully
    pub fn is_help(&self) -> bool {
        matches!(self, ConfigError::HelpRequested(_))
    }
}

/// Validated parameters of one benchmark run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub encoding: Encoding,
    /// Frame width in pixels, before alignment
    pub width: u32,
    /// Frame height in pixels, before alignment
    pub height: u32,
    /// How long the connection runs
    pub duration: Duration,
    pub source: SourceKind,
    /// Only used by the pattern source
    pub pattern: Pattern,
    /// Only used by the camera
    pub camera_num: Option<i32>,
    pub output_port: u32,
    pub dest: DestKind,
    pub connection: ConnectionMode,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::ALL[0],
            width: crate::defaults::WIDTH,
            height: crate::defaults::HEIGHT,
            duration: Duration::from_millis(crate::defaults::DURATION_MS),
            source: SourceKind::Pattern,
            pattern: Pattern::White,
            camera_num: None,
            output_port: crate::defaults::OUTPUT_PORT,
            dest: DestKind::Null,
            connection: ConnectionMode::Tunnel,
        }
    }
}

/// Outcome of resolving a full argument vector
#[derive(Clone, Debug)]
pub struct Invocation {
    pub config: ResolvedConfig,
    /// Where to write the JSON run report, if anywhere
    pub report: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Resolve a complete argument vector, program name first.
    ///
    /// The program name is used in the usage text carried by
    /// [`ConfigError::HelpRequested`].
    pub fn resolve<I, T>(argv: I) -> Result<Invocation, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(argv).map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                ConfigError::HelpRequested(e.render().to_string())
            }
            _ => ConfigError::Cli(e),
        })?;
        let config = Self::from_args(&args)?;
        Ok(Invocation {
            config,
            report: args.report,
        })
    }

    /// Validate already parsed arguments
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if !args.extra.is_empty() {
            return Err(ConfigError::ExtraArguments(args.extra.clone()));
        }

        let defaults = Self::default();
        let config = Self {
            encoding: resolve_switch("encoding", args.encoding.as_deref(), defaults.encoding)?,
            width: args.width,
            height: args.height,
            duration: Duration::from_millis(args.msec),
            source: resolve_switch("source", args.source.as_deref(), defaults.source)?,
            pattern: resolve_switch("pattern", args.pattern.as_deref(), defaults.pattern)?,
            camera_num: args
                .camera_num
                .map(|num| i32::try_from(num).map_err(|_| ConfigError::CameraNumOutOfRange(num)))
                .transpose()?,
            output_port: args.output_port,
            dest: resolve_switch("dest", args.dest.as_deref(), defaults.dest)?,
            connection: resolve_switch("conn", args.conn.as_deref(), defaults.connection)?,
        };

        if config.source == SourceKind::Pattern && config.output_port != 0 {
            return Err(ConfigError::OutputPortNotZero(config.output_port));
        }

        Ok(config)
    }

    /// Whether the chosen source port only produces frames once capture
    /// has been requested
    pub fn needs_capture_start(&self) -> bool {
        self.source == SourceKind::Camera && matches!(self.output_port, 1 | 2)
    }
}

fn resolve_switch<V: Vocabulary>(
    switch: &'static str,
    value: Option<&str>,
    default: V,
) -> Result<V, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    V::lookup(value).map_err(|e| match e {
        MatchError::Ambiguous => ConfigError::Ambiguous {
            switch,
            value: value.to_string(),
        },
        MatchError::NotFound => ConfigError::Unknown {
            switch,
            value: value.to_string(),
        },
    })
}

/// A variant shown as `name (framework name)`
struct Described<'a>(pub &'a str, pub &'a str);

impl fmt::Display for Described<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.1)
    }
}

impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "encoding: {}",
            Described(self.encoding.name(), &self.encoding.fourcc().to_string())
        )?;
        writeln!(f, "width: {}", self.width)?;
        writeln!(f, "height: {}", self.height)?;
        writeln!(f, "msec: {}", self.duration.as_millis())?;
        writeln!(
            f,
            "source: {}",
            Described(self.source.name(), self.source.component_name())
        )?;
        writeln!(f, "pattern: {}", self.pattern.name())?;
        match self.camera_num {
            Some(num) => writeln!(f, "camera_num: {}", num)?,
            None => writeln!(f, "camera_num: not set")?,
        }
        writeln!(f, "source_output_port: {}", self.output_port)?;
        writeln!(
            f,
            "dest: {}",
            Described(self.dest.name(), self.dest.component_name())
        )?;
        write!(f, "conn: {}", self.connection.name())
    }
}
