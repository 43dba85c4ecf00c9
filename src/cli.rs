//! CLI argument parsing for Stackscope

use clap::Parser;
use std::num::NonZeroUsize;

#[derive(Parser, Debug)]
#[command(name = "stackscope")]
#[command(version)]
#[command(about = "Byte-accurate diagrams of a live process's stack frames", long_about = None)]
pub struct Cli {
    /// Attach to running process by PID
    #[arg(short = 'p', long = "pid", value_name = "PID")]
    pub pid: libc::pid_t,

    /// Number of frames to render, innermost first (default: all walkable)
    #[arg(
        value_name = "FRAMES",
        value_parser = parse_frame_limit,
        allow_negative_numbers = true
    )]
    pub frames: Option<NonZeroUsize>,

    /// Width of the address/offset label column (default: 26)
    #[arg(long = "label-width", value_name = "COLS", default_value = "26")]
    pub label_width: usize,

    /// Interior width of the stack box column (default: 20)
    #[arg(long = "box-width", value_name = "COLS", default_value = "20")]
    pub box_width: usize,

    /// Log walker diagnostics to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

/// Validate a frame-count argument before any process work happens.
///
/// Rejects non-numeric input and anything not strictly positive; the walk
/// itself never sees a bad limit.
pub fn parse_frame_limit(raw: &str) -> Result<NonZeroUsize, String> {
    let trimmed = raw.trim();
    let count: i64 = trimmed
        .parse()
        .map_err(|_| format!("invalid frame count '{trimmed}'"))?;
    if count <= 0 {
        return Err("frame count must be a positive integer".to_string());
    }
    NonZeroUsize::new(count as usize)
        .ok_or_else(|| "frame count must be a positive integer".to_string())
}
