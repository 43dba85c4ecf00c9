//! Capability interface onto the inspected process
//!
//! The walking and layout passes never touch ptrace directly; they consume
//! this narrow trait instead, so tests can drive them with an in-memory
//! fake and the live implementation stays in one place.

use anyhow::Result;

/// One entry of the stopped thread's frame list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Program counter: the instruction pointer for the innermost frame,
    /// the return address for every caller frame.
    pub pc: u64,
    /// Base-pointer address anchoring the frame.
    pub base: u64,
    /// Stack-pointer value at this level; only the innermost frame's is
    /// ever consulted.
    pub stack: u64,
}

/// A variable descriptor as the target reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariable {
    /// Source-level identifier.
    pub name: String,
    /// Load address, if the variable occupies stack memory at all.
    pub address: Option<u64>,
    /// Declared type size in bytes; 0 when the type is incomplete.
    pub size: u64,
    /// Live display value, if one could be read.
    pub value: Option<String>,
}

/// Read access to a stopped process.
///
/// Pointer reads may fail on unmapped addresses; callers treat a failed
/// linkage read as the end of the walkable chain, not as a user-facing
/// error.
pub trait MemoryContext {
    /// Read one pointer-sized word at `address`.
    fn read_pointer(&self, address: u64) -> Result<u64>;

    /// The current thread's frames, innermost first.
    fn thread_frames(&self) -> Result<Vec<FrameInfo>>;

    /// Resolve a code address to a function name.
    fn resolve_symbol(&self, address: u64) -> Option<String>;

    /// In-scope arguments and locals of one frame. Missing or degraded
    /// debug info yields an empty list, never an error.
    fn frame_variables(&self, frame: &FrameInfo) -> Vec<RawVariable>;
}
