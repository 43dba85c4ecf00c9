//! Frame-chain walking over the saved-base-pointer linkage
//!
//! Starting from the innermost frame's base pointer, each step reads the
//! saved base pointer and return address at the current base, assembles
//! the frame's cell run, then follows the saved pointer one level up the
//! stack.
//!
//! # Note
//!
//! This relies on the x86_64 frame-pointer convention: a frame's base
//! holds the caller's base pointer, with the return address in the word
//! above. Binaries compiled with `-fomit-frame-pointer` will produce a
//! very short or empty chain.

use std::num::NonZeroUsize;

use anyhow::Result;
use tracing::debug;

use crate::context::{FrameInfo, MemoryContext};
use crate::frame::{Frame, UNKNOWN_FUNCTION};
use crate::layout::build_layout;
use crate::variables::variable_cells;

/// Iterator over walkable frames, innermost first.
///
/// A zero saved base pointer ends the chain, as does the frame bound. An
/// unreadable linkage word also ends it: the chain beyond an unmapped
/// address cannot be trusted, so the walk stops at the last frame it could
/// fully read and only a debug event records why.
pub struct FrameWalker<'a> {
    context: &'a dyn MemoryContext,
    frames: Vec<FrameInfo>,
    base: u64,
    index: usize,
    bound: usize,
}

impl<'a> FrameWalker<'a> {
    /// Start a walk over `frames`, the context's frame list.
    ///
    /// `limit` caps how many frames are produced; fewer appear when the
    /// chain ends early.
    pub fn new(
        context: &'a dyn MemoryContext,
        frames: Vec<FrameInfo>,
        limit: Option<NonZeroUsize>,
    ) -> Self {
        let bound = match limit {
            Some(limit) => frames.len().min(limit.get()),
            None => frames.len(),
        };
        let base = frames.first().map(|frame| frame.base).unwrap_or(0);
        Self {
            context,
            frames,
            base,
            index: 0,
            bound,
        }
    }

    fn read_linkage(&self, address: u64) -> Option<u64> {
        match self.context.read_pointer(address) {
            Ok(word) => Some(word),
            Err(err) => {
                debug!(
                    "ending walk at frame {}: linkage at {address:#x} unreadable: {err}",
                    self.index
                );
                None
            }
        }
    }
}

impl Iterator for FrameWalker<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.base == 0 || self.index >= self.bound {
            return None;
        }
        let saved_base = self.read_linkage(self.base)?;
        let return_address = self.read_linkage(self.base + 8)?;

        let info = self.frames[self.index];
        let name = self
            .context
            .resolve_symbol(info.pc)
            .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());
        let variables = variable_cells(self.context.frame_variables(&info));
        let stack_pointer = (self.index == 0).then_some(info.stack);

        let cells = match build_layout(
            variables,
            self.base,
            saved_base,
            return_address,
            stack_pointer,
        ) {
            Ok(cells) => cells,
            Err(err) => {
                // Defective cell data poisons the rest of the chain too.
                self.bound = self.index;
                return Some(Err(err.into()));
            }
        };

        let frame = Frame {
            index: self.index,
            name,
            base: self.base,
            cells,
        };
        self.base = saved_base;
        self.index += 1;
        Some(Ok(frame))
    }
}
