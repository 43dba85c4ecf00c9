//! Frame and memory-cell data model
//!
//! A `Frame` is one activation record of the inspected thread, identified by
//! its base pointer. Its cells are produced by the layout pass and are final
//! by the time a renderer sees them: sorted, contiguous, and carrying
//! display-ready strings.

/// Name shown when an address resolves to no known function.
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Value shown when a variable's live value could not be read.
pub const UNAVAILABLE_VALUE: &str = "<optimized out>";

/// Display name of the saved-base-pointer linkage cell.
pub const SAVED_BASE_NAME: &str = "prev_rbp";

/// Display name of the return-address linkage cell.
pub const RETURN_ADDRESS_NAME: &str = "ret_addr";

/// Display name of a synthesized stack-pointer cell.
pub const STACK_POINTER_NAME: &str = "rsp";

/// Display name of synthesized padding cells.
pub const PADDING_NAME: &str = "padding";

/// Granularity of synthesized padding cells, in bytes.
pub const PADDING_SIZE: u64 = 4;

/// What occupies one address range inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// An in-scope argument or local variable.
    Variable,
    /// The caller's saved base pointer, at offset 0 from the frame base.
    SavedBase,
    /// The return address, at offset +8 from the frame base.
    ReturnAddress,
    /// The cell holding the innermost frame's stack-pointer position.
    StackPointer,
    /// Synthesized filler for bytes no variable accounts for.
    Padding,
}

/// One address range of a frame's memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCell {
    /// Absolute address of the first byte.
    pub address: u64,
    /// Width in bytes: 8 for linkage cells, 4 for padding, the type size
    /// for variables.
    pub size: u64,
    /// Role of this range within the frame.
    pub kind: CellKind,
    /// Identifier shown next to the value.
    pub name: String,
    /// Display value; empty for padding.
    pub value: String,
}

impl MemoryCell {
    /// Cell for an argument or local with a resolved stack address.
    pub fn variable(address: u64, size: u64, name: String, value: String) -> Self {
        Self {
            address,
            size,
            kind: CellKind::Variable,
            name,
            value,
        }
    }

    /// Four-byte filler cell for bytes no variable accounts for.
    pub fn padding(address: u64) -> Self {
        Self {
            address,
            size: PADDING_SIZE,
            kind: CellKind::Padding,
            name: PADDING_NAME.to_string(),
            value: String::new(),
        }
    }

    /// Signed offset of this cell relative to a frame base.
    ///
    /// Locals sit below the base and come out negative; the linkage pair
    /// comes out at 0 and +8.
    pub fn offset(&self, base: u64) -> i64 {
        self.address.wrapping_sub(base) as i64
    }

    /// Address one past the last byte of this cell.
    pub fn end(&self) -> u64 {
        self.address + self.size
    }
}

/// One call-stack level, innermost at index 0.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the walk: 0 is the frame executing when the target
    /// stopped.
    pub index: usize,
    /// Resolved function name, or [`UNKNOWN_FUNCTION`].
    pub name: String,
    /// Base-pointer address anchoring this frame.
    pub base: u64,
    /// Final cell run: ascending by address, no gaps, no overlaps.
    pub cells: Vec<MemoryCell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_negative_below_base() {
        let cell = MemoryCell::variable(0x7fff_0000_0ff0, 8, "x".to_string(), "1".to_string());
        assert_eq!(cell.offset(0x7fff_0000_1000), -16);
    }

    #[test]
    fn test_offset_is_positive_above_base() {
        let cell = MemoryCell::variable(0x7fff_0000_1008, 8, "r".to_string(), "1".to_string());
        assert_eq!(cell.offset(0x7fff_0000_1000), 8);
    }

    #[test]
    fn test_offset_at_base_is_zero() {
        let cell = MemoryCell::variable(0x1000, 8, "b".to_string(), "1".to_string());
        assert_eq!(cell.offset(0x1000), 0);
    }

    #[test]
    fn test_end_is_exclusive() {
        let cell = MemoryCell::variable(0x1000, 4, "n".to_string(), "7".to_string());
        assert_eq!(cell.end(), 0x1004);
    }

    #[test]
    fn test_padding_cell_shape() {
        let cell = MemoryCell::padding(0x2000);
        assert_eq!(cell.size, PADDING_SIZE);
        assert_eq!(cell.kind, CellKind::Padding);
        assert_eq!(cell.name, PADDING_NAME);
        assert!(cell.value.is_empty());
    }
}
