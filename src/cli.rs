use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Media connection benchmark - runs a source -> destination pipeline for a
/// fixed time and reports frame throughput
///
/// Enumerated values (ENC, SOURCE, PATTERN, DEST, CONN) accept any
/// unambiguous prefix, in any letter case.
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about, long_about = None, disable_help_flag = true)]
pub struct Args {
    /// Print this help
    #[clap(short = '?', action = ArgAction::Help)]
    pub help: Option<bool>,

    /// Encoding of a frame [i420, rgba, opaque]
    #[clap(short = 'e', value_name = "ENC", help_heading = "General image options")]
    pub encoding: Option<String>,

    /// Width of a frame to produce
    #[clap(short = 'w', value_name = "WIDTH", default_value_t = crate::defaults::WIDTH, help_heading = "General image options")]
    pub width: u32,

    /// Height of a frame to produce
    #[clap(short = 'h', value_name = "HEIGHT", default_value_t = crate::defaults::HEIGHT, help_heading = "General image options")]
    pub height: u32,

    /// Run the connection for MSEC milliseconds
    #[clap(short = 't', value_name = "MSEC", default_value_t = crate::defaults::DURATION_MS, help_heading = "General image options")]
    pub msec: u64,

    /// Source component to use [source, camera]
    #[clap(short = 's', value_name = "SOURCE", help_heading = "Component options")]
    pub source: Option<String>,

    /// Source pattern to produce [white, black, diagonal, noise, random, colour, blocks, swirly]
    #[clap(short = 'p', value_name = "PATTERN", help_heading = "Component options")]
    pub pattern: Option<String>,

    /// Camera number to use (default: not set)
    #[clap(short = 'n', value_name = "CAMERA", help_heading = "Component options")]
    pub camera_num: Option<u32>,

    /// Source output port to use (camera: 0 preview, 1 video, 2 capture)
    #[clap(short = 'o', value_name = "PORT", default_value_t = crate::defaults::OUTPUT_PORT, help_heading = "Component options")]
    pub output_port: u32,

    /// Destination component to use [null, render]
    #[clap(short = 'd', value_name = "DEST", help_heading = "Component options")]
    pub dest: Option<String>,

    /// Connection method to use [tunnel, callback, queue]
    #[clap(short = 'c', value_name = "CONN", help_heading = "Component options")]
    pub conn: Option<String>,

    /// Write a JSON report of the run to FILE
    #[clap(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Arguments left over after the options
    #[clap(hide = true)]
    pub extra: Vec<String>,
}
