//! Normalization of raw variable descriptors into memory cells
//!
//! Sits between the debug-info layer and the layout pass: descriptors that
//! cannot occupy frame memory are dropped here, and missing values get
//! their display placeholder.

use tracing::debug;

use crate::context::RawVariable;
use crate::frame::{MemoryCell, UNAVAILABLE_VALUE};

/// Convert the target's variable descriptors into variable cells.
///
/// Descriptors without a load address live in registers or were optimized
/// away, and zero-sized ones have incomplete types; neither can be drawn,
/// so both are skipped. Order is not meaningful here, the layout pass
/// sorts.
pub fn variable_cells(raw: Vec<RawVariable>) -> Vec<MemoryCell> {
    let mut cells = Vec::with_capacity(raw.len());
    for var in raw {
        let Some(address) = var.address else {
            debug!("skipping '{}': no stack address", var.name);
            continue;
        };
        if var.size == 0 {
            debug!("skipping '{}': zero-sized type", var.name);
            continue;
        }
        let value = var.value.unwrap_or_else(|| UNAVAILABLE_VALUE.to_string());
        cells.push(MemoryCell::variable(address, var.size, var.name, value));
    }
    cells
}
