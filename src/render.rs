//! ASCII rendering of finalized frames
//!
//! Pure string construction: the same frame always renders to the same
//! bytes, and nothing here touches stdout. The diagram is a fixed
//! two-column layout, a label column carrying addresses and signed offsets
//! on the left and the frame's cell boxes on the right, drawn
//! lowest-address first so the top of the stack sits at the top of the
//! picture.

use crate::frame::{CellKind, Frame, MemoryCell};

/// Placeholder shown inside padding rows.
const PADDING_PLACEHOLDER: &str = "padding...";

/// Annotation appended to the stack-pointer separator row.
const STACK_POINTER_ANNOTATION: &str = " ← Stack Pointer";

/// Renderer geometry.
///
/// Passed explicitly rather than read from globals, so one process can
/// render for different widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Width of the label column holding addresses and offsets.
    pub label_width: usize,
    /// Interior width of the box column.
    pub box_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            label_width: 26,
            box_width: 20,
        }
    }
}

/// Render one frame as its two-column diagram.
///
/// The returned string ends in a newline; the caller decides what, if
/// anything, separates consecutive frames.
pub fn render_frame(frame: &Frame, config: &RenderConfig) -> String {
    let mut out = String::new();
    header(&mut out, frame, config);
    body(&mut out, frame, config);
    footer(&mut out, config);
    out
}

/// Append one line: the label padded to the label column, then `rest`.
fn labeled(out: &mut String, label: &str, rest: &str, config: &RenderConfig) {
    let width = config.label_width;
    out.push_str(&format!("{label:<width$}"));
    out.push_str(rest);
    out.push('\n');
}

/// An empty box row: two walls around interior space.
fn wall(config: &RenderConfig) -> String {
    format!("|{:width$}|", "", width = config.box_width)
}

/// A horizontal rule spanning the box interior.
fn rule(open: char, fill: char, close: char, config: &RenderConfig) -> String {
    let mut s = String::with_capacity(4 * (config.box_width + 2));
    s.push(open);
    for _ in 0..config.box_width {
        s.push(fill);
    }
    s.push(close);
    s
}

/// Frame title, the small base-pointer box, and the open top of the stack
/// column.
fn header(out: &mut String, frame: &Frame, config: &RenderConfig) {
    out.push_str(&format!("Frame#{}: {:<16} ", frame.index, frame.name));
    out.push_str(&rule('┌', ' ', '┐', config));
    out.push('\n');
    labeled(out, "    ┌──────────────────┐", &wall(config), config);
    labeled(
        out,
        &format!("rbp:│{:#018x}│", frame.base),
        &wall(config),
        config,
    );
    labeled(out, "    └──────────────────┘", &wall(config), config);
    labeled(out, "", &wall(config), config);
    labeled(out, "", &wall(config), config);
}

/// One separator row and one value row per cell, plus the closing
/// boundary after the last cell.
fn body(out: &mut String, frame: &Frame, config: &RenderConfig) {
    let last = frame.cells.len().saturating_sub(1);
    for (idx, cell) in frame.cells.iter().enumerate() {
        let separator = if idx == 0 {
            rule('╞', '═', '╡', config)
        } else if cell.kind == CellKind::SavedBase {
            rule('├', '┄', '┤', config)
        } else {
            rule('├', '─', '┤', config)
        };
        let annotation = if cell.kind == CellKind::StackPointer {
            STACK_POINTER_ANNOTATION
        } else {
            ""
        };
        let label = format!(" {:#018x} <{:+}>", cell.address, cell.offset(frame.base));
        labeled(out, &label, &format!("{separator}{annotation}"), config);

        labeled(out, "", &value_row(cell, config), config);

        // Pointer-sized cells span two visual rows.
        if cell.size == 8 {
            labeled(out, "", &wall(config), config);
        }

        if idx == last {
            let boundary = cell.end();
            let offset = boundary.wrapping_sub(frame.base) as i64;
            let label = format!(" {boundary:#018x} <{offset:+}>");
            labeled(out, &label, &rule('╞', '═', '╡', config), config);
        }
    }
}

/// The row carrying a cell's value, with its name hanging outside the box.
fn value_row(cell: &MemoryCell, config: &RenderConfig) -> String {
    let width = config.box_width.saturating_sub(2);
    let unnamed = cell.kind == CellKind::Padding
        || (cell.kind == CellKind::StackPointer && cell.value.is_empty());
    if unnamed {
        format!("| {PADDING_PLACEHOLDER:<width$} |")
    } else {
        format!("| {:<width$} | {}", cell.value, cell.name)
    }
}

/// Two trailing box rows and the open bottom of the stack column.
fn footer(out: &mut String, config: &RenderConfig) {
    labeled(out, "", &wall(config), config);
    labeled(out, "", &wall(config), config);
    labeled(out, "", &rule('└', ' ', '┘', config), config);
}
