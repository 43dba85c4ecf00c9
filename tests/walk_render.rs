//! End-to-end walk and render over an in-memory target
//!
//! Drives the walker and renderer with a fake process image and pins the
//! output byte for byte: addresses, offsets, padding runs, the stack
//! pointer annotation, and the extra row that 8-byte cells span.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use anyhow::{anyhow, Result};
use stackscope::context::{FrameInfo, MemoryContext, RawVariable};
use stackscope::frame::Frame;
use stackscope::render::{render_frame, RenderConfig};
use stackscope::walker::FrameWalker;

const BASE0: u64 = 0x7ffe_0000_0100;
const BASE1: u64 = 0x7ffe_0000_0200;

/// In-memory stand-in for a stopped process.
#[derive(Default)]
struct FakeTarget {
    memory: HashMap<u64, u64>,
    frames: Vec<FrameInfo>,
    symbols: HashMap<u64, String>,
    variables: HashMap<u64, Vec<RawVariable>>,
}

impl MemoryContext for FakeTarget {
    fn read_pointer(&self, address: u64) -> Result<u64> {
        self.memory
            .get(&address)
            .copied()
            .ok_or_else(|| anyhow!("unmapped address {address:#x}"))
    }

    fn thread_frames(&self) -> Result<Vec<FrameInfo>> {
        Ok(self.frames.clone())
    }

    fn resolve_symbol(&self, address: u64) -> Option<String> {
        self.symbols.get(&address).cloned()
    }

    fn frame_variables(&self, frame: &FrameInfo) -> Vec<RawVariable> {
        self.variables.get(&frame.base).cloned().unwrap_or_default()
    }
}

/// `compute` (with two locals) called from `main`; the chain ends at a
/// zero saved base pointer in `main`'s frame.
fn two_frame_target() -> FakeTarget {
    let mut target = FakeTarget::default();
    target.memory.insert(BASE0, BASE1);
    target.memory.insert(BASE0 + 8, 0x401130);
    target.memory.insert(BASE1, 0);
    target.memory.insert(BASE1 + 8, 0x401190);
    target.frames = vec![
        FrameInfo {
            pc: 0x401120,
            base: BASE0,
            stack: BASE0 - 24,
        },
        FrameInfo {
            pc: 0x401130,
            base: BASE1,
            stack: BASE0 + 16,
        },
    ];
    target.symbols.insert(0x401120, "compute".to_string());
    target.symbols.insert(0x401130, "main".to_string());
    target.variables.insert(
        BASE0,
        vec![
            RawVariable {
                name: "buf".to_string(),
                address: Some(BASE0 - 16),
                size: 8,
                value: Some("0x00007ffe00000200".to_string()),
            },
            RawVariable {
                name: "count".to_string(),
                address: Some(BASE0 - 4),
                size: 4,
                value: Some("7".to_string()),
            },
        ],
    );
    target
}

fn walk(target: &FakeTarget, limit: Option<NonZeroUsize>) -> Vec<Frame> {
    let frames = target.thread_frames().unwrap();
    FrameWalker::new(target, frames, limit)
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

fn golden_frame_0() -> String {
    let wall = format!("|{}|", " ".repeat(20));
    let solid = format!("├{}┤", "─".repeat(20));
    let dashed = format!("├{}┤", "┄".repeat(20));
    let double = format!("╞{}╡", "═".repeat(20));
    let lines = [
        format!("Frame#0: {:<16} ┌{}┐", "compute", " ".repeat(20)),
        format!("{:<26}{wall}", "    ┌──────────────────┐"),
        format!("{:<26}{wall}", "rbp:│0x00007ffe00000100│"),
        format!("{:<26}{wall}", "    └──────────────────┘"),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{double} ← Stack Pointer", " 0x00007ffe000000e8 <-24>"),
        format!("{:<26}| padding...         |", ""),
        format!("{:<26}{solid}", " 0x00007ffe000000ec <-20>"),
        format!("{:<26}| padding...         |", ""),
        format!("{:<26}{solid}", " 0x00007ffe000000f0 <-16>"),
        format!("{:<26}| 0x00007ffe00000200 | buf", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{solid}", " 0x00007ffe000000f8 <-8>"),
        format!("{:<26}| padding...         |", ""),
        format!("{:<26}{solid}", " 0x00007ffe000000fc <-4>"),
        format!("{:<26}| 7                  | count", ""),
        format!("{:<26}{dashed}", " 0x00007ffe00000100 <+0>"),
        format!("{:<26}| 0x00007ffe00000200 | prev_rbp", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{solid}", " 0x00007ffe00000108 <+8>"),
        format!("{:<26}| 0x0000000000401130 | ret_addr", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{double}", " 0x00007ffe00000110 <+16>"),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}└{}┘", "", " ".repeat(20)),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn golden_frame_1() -> String {
    let wall = format!("|{}|", " ".repeat(20));
    let solid = format!("├{}┤", "─".repeat(20));
    let double = format!("╞{}╡", "═".repeat(20));
    let lines = [
        format!("Frame#1: {:<16} ┌{}┐", "main", " ".repeat(20)),
        format!("{:<26}{wall}", "    ┌──────────────────┐"),
        format!("{:<26}{wall}", "rbp:│0x00007ffe00000200│"),
        format!("{:<26}{wall}", "    └──────────────────┘"),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{double}", " 0x00007ffe00000200 <+0>"),
        format!("{:<26}| 0x0000000000000000 | prev_rbp", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{solid}", " 0x00007ffe00000208 <+8>"),
        format!("{:<26}| 0x0000000000401190 | ret_addr", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{double}", " 0x00007ffe00000210 <+16>"),
        format!("{:<26}{wall}", ""),
        format!("{:<26}{wall}", ""),
        format!("{:<26}└{}┘", "", " ".repeat(20)),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[test]
fn test_walk_produces_two_frames() {
    let target = two_frame_target();
    let frames = walk(&target, None);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].name, "compute");
    assert_eq!(frames[1].name, "main");
}

#[test]
fn test_innermost_frame_renders_byte_exact() {
    let target = two_frame_target();
    let frames = walk(&target, None);
    let rendered = render_frame(&frames[0], &RenderConfig::default());
    assert_eq!(rendered, golden_frame_0());
}

#[test]
fn test_caller_frame_renders_byte_exact() {
    let target = two_frame_target();
    let frames = walk(&target, None);
    let rendered = render_frame(&frames[1], &RenderConfig::default());
    assert_eq!(rendered, golden_frame_1());
}

#[test]
fn test_frame_limit_stops_after_innermost() {
    let target = two_frame_target();
    let frames = walk(&target, NonZeroUsize::new(1));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].index, 0);
}

#[test]
fn test_walk_and_render_are_deterministic() {
    let target = two_frame_target();
    let config = RenderConfig::default();
    let first: Vec<String> = walk(&target, None)
        .iter()
        .map(|frame| render_frame(frame, &config))
        .collect();
    let second: Vec<String> = walk(&target, None)
        .iter()
        .map(|frame| render_frame(frame, &config))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_unreadable_chain_truncates_cleanly() {
    // main links onward to a frame whose linkage is unmapped; the walk
    // must end after the frames it could read, with no error.
    let mut target = two_frame_target();
    target.memory.insert(BASE1, 0x7ffe_0000_0300);
    target.frames.push(FrameInfo {
        pc: 0x401190,
        base: 0x7ffe_0000_0300,
        stack: BASE1 + 16,
    });
    let frames = walk(&target, None);
    assert_eq!(frames.len(), 2);
}
