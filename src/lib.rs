//! Stackscope - byte-accurate stack frame diagrams for live processes
//!
//! This library walks the frame-pointer chain of a stopped process and
//! renders each activation record as an ASCII memory map: saved base
//! pointer, return address, in-scope variables, stack-pointer position,
//! and the padding in between, every byte accounted for.

pub mod cli;
pub mod context;
pub mod dwarf;
pub mod frame;
pub mod layout;
pub mod process;
pub mod render;
pub mod variables;
pub mod walker;
