//! Layout inference: from unordered cells to a gap-free memory map
//!
//! The walker hands this pass an unordered pile of variable cells plus the
//! linkage words it read at the frame base. The pass sorts by address,
//! tiles every hole with 4-byte padding cells, then resolves the
//! stack-pointer position for the innermost frame against the finished
//! run, so the renderer can draw one unbroken column of boxes.
//!
//! Overlapping or duplicated input is a contract breach by the debug-info
//! layer, not an expected runtime condition, and is reported as an error
//! rather than absorbed.

use thiserror::Error;
use tracing::warn;

use crate::frame::{
    CellKind, MemoryCell, PADDING_SIZE, RETURN_ADDRESS_NAME, SAVED_BASE_NAME, STACK_POINTER_NAME,
};

/// Errors for layout construction
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// Two inputs claim the same starting address.
    #[error("Cells '{first}' and '{second}' both start at {address:#x}")]
    DuplicateAddress {
        first: String,
        second: String,
        address: u64,
    },

    /// A cell begins inside the byte range of its predecessor.
    #[error("Cell '{name}' at {address:#x} overlaps the previous cell ending at {end:#x}")]
    Overlap {
        name: String,
        address: u64,
        end: u64,
    },

    /// A hole between cells cannot be tiled with 4-byte padding.
    #[error("Gap of {gap} bytes below {address:#x} is not a multiple of 4")]
    UnalignedGap { address: u64, gap: u64 },
}

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Build the final cell run for one frame.
///
/// `variables` come unordered from the collector; `saved_base` and
/// `return_address` are the words read at `base` and `base + 8`;
/// `stack_pointer` is supplied for the innermost frame only.
///
/// # Algorithm
///
/// 1. Append the two linkage cells and sort everything by address
/// 2. Walk the run low-to-high, filling each hole with 4-byte padding and
///    rejecting overlaps, duplicates, and holes that 4-byte cells cannot
///    tile
/// 3. Resolve the stack-pointer position (innermost frame only) against
///    the filled run: retag an exact match, real or padding, or prepend
///    padding down to the SP when it sits below every cell
pub fn build_layout(
    variables: Vec<MemoryCell>,
    base: u64,
    saved_base: u64,
    return_address: u64,
    stack_pointer: Option<u64>,
) -> Result<Vec<MemoryCell>> {
    let mut cells = variables;
    cells.push(MemoryCell {
        address: base,
        size: 8,
        kind: CellKind::SavedBase,
        name: SAVED_BASE_NAME.to_string(),
        value: format!("{saved_base:#018x}"),
    });
    cells.push(MemoryCell {
        address: base + 8,
        size: 8,
        kind: CellKind::ReturnAddress,
        name: RETURN_ADDRESS_NAME.to_string(),
        value: format!("{return_address:#018x}"),
    });
    cells.sort_by_key(|cell| cell.address);

    let mut run = fill_gaps(cells)?;
    if let Some(sp) = stack_pointer {
        resolve_stack_pointer(&mut run, sp)?;
    }

    debug_assert!(run.windows(2).all(|pair| pair[0].end() == pair[1].address));
    Ok(run)
}

/// Mark the stack pointer's position within the gap-free cell run.
///
/// An exact address match, which may be a padding cell synthesized by the
/// fill pass, keeps the cell's name and value and only changes its kind.
/// An SP below the lowest cell extends the frame downward with padding,
/// the lowest cell of which is tagged as the SP. An SP that falls inside
/// the run without landing on a cell boundary cannot be drawn in whole
/// cells and is left unmarked.
fn resolve_stack_pointer(cells: &mut Vec<MemoryCell>, sp: u64) -> Result<()> {
    if let Some(cell) = cells.iter_mut().find(|cell| cell.address == sp) {
        cell.kind = CellKind::StackPointer;
        return Ok(());
    }
    let Some(lowest) = cells.first().map(|cell| cell.address) else {
        return Ok(());
    };
    if sp > lowest {
        warn!("stack pointer {sp:#x} falls inside the frame without matching a cell; not marking it");
        return Ok(());
    }
    let gap = lowest - sp;
    if gap % PADDING_SIZE != 0 {
        return Err(LayoutError::UnalignedGap {
            address: lowest,
            gap,
        });
    }
    let mut lead: Vec<MemoryCell> = (0..gap / PADDING_SIZE)
        .map(|i| MemoryCell::padding(sp + i * PADDING_SIZE))
        .collect();
    if let Some(first) = lead.first_mut() {
        first.kind = CellKind::StackPointer;
        first.name = STACK_POINTER_NAME.to_string();
    }
    cells.splice(0..0, lead);
    Ok(())
}

/// Walk sorted cells low-to-high, tiling each hole with padding.
fn fill_gaps(cells: Vec<MemoryCell>) -> Result<Vec<MemoryCell>> {
    let mut run: Vec<MemoryCell> = Vec::with_capacity(cells.len());
    for cell in cells {
        if let Some(prev) = run.last() {
            if cell.address == prev.address {
                return Err(LayoutError::DuplicateAddress {
                    first: prev.name.clone(),
                    second: cell.name,
                    address: cell.address,
                });
            }
            let expected = prev.end();
            if cell.address < expected {
                return Err(LayoutError::Overlap {
                    name: cell.name,
                    address: cell.address,
                    end: expected,
                });
            }
            let gap = cell.address - expected;
            if gap % PADDING_SIZE != 0 {
                return Err(LayoutError::UnalignedGap {
                    address: cell.address,
                    gap,
                });
            }
            for i in 0..gap / PADDING_SIZE {
                run.push(MemoryCell::padding(expected + i * PADDING_SIZE));
            }
        }
        run.push(cell);
    }
    Ok(run)
}
