//! DWARF debug info: function names and variable stack locations
//!
//! Uses the addr2line crate for name lookups and walks the DWARF tree
//! directly for variable locations. Only variables with a frame-relative
//! location (`DW_OP_fbreg`) get an address; everything living in registers
//! or described by runtime location lists is reported without one and the
//! caller decides what to do with it.

use anyhow::{Context, Result};
use gimli::Reader as _;
use object::{Object, ObjectSection};
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

type Reader = gimli::EndianRcSlice<gimli::RunTimeEndian>;

/// Maximum typedef/qualifier hops when chasing a type's byte size.
const MAX_TYPE_DEPTH: usize = 8;

/// A variable's place in its frame, as DWARF describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSite {
    /// Source-level identifier.
    pub name: String,
    /// Absolute stack address once the frame base is applied, or `None`
    /// when the variable has no fixed stack slot.
    pub address: Option<u64>,
    /// Byte size of the variable's type; 0 when no size could be found.
    pub size: u64,
}

/// Debug information for one executable.
pub struct DebugInfo {
    /// addr2line context for function-name lookups
    context: addr2line::Context<Reader>,
    /// The same sections again, for walking variable DIEs
    dwarf: Arc<gimli::Dwarf<Reader>>,
    /// ELF symbols sorted by address, the fallback when DWARF has no name
    symbols: Vec<(u64, String)>,
    /// Whether addresses need the load bias removed before lookups
    position_independent: bool,
}

impl DebugInfo {
    /// Load DWARF debug info and the symbol table from an ELF binary.
    pub fn load(binary_path: &Path) -> Result<Self> {
        if !binary_path.exists() {
            anyhow::bail!("Binary does not exist: {}", binary_path.display());
        }

        let file = File::open(binary_path)
            .with_context(|| format!("Failed to open binary: {}", binary_path.display()))?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("Failed to memory-map binary")?;

        let object = object::File::parse(&*mmap).context("Failed to parse ELF binary")?;

        let endian = if object.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // Helper to load a DWARF section
        let load_section = |id: gimli::SectionId| -> Result<Reader> {
            let data = object
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[]));
            // Convert Cow<[u8]> to Rc<[u8]> by converting to owned Vec first
            let bytes: Rc<[u8]> = Rc::from(data.into_owned());
            Ok(gimli::EndianRcSlice::new(bytes, endian))
        };

        let dwarf = Arc::new(
            gimli::Dwarf::load(&load_section)
                .context("Failed to load DWARF sections - binary may not have debug symbols. Compile with -g flag.")?,
        );

        // addr2line consumes a Dwarf for name lookups; the clone shares the
        // Rc-backed sections with the copy kept for walking variable DIEs.
        let context = addr2line::Context::from_arc_dwarf(Arc::clone(&dwarf))
            .context("Failed to create DWARF context")?;

        // Copy symbol names out before the mmap goes away.
        let mut symbols: Vec<(u64, String)> = object
            .symbol_map()
            .symbols()
            .iter()
            .map(|symbol| (symbol.address(), symbol.name().to_string()))
            .collect();
        symbols.sort_by(|a, b| a.0.cmp(&b.0));

        let position_independent = matches!(object.kind(), object::ObjectKind::Dynamic);

        Ok(Self {
            context,
            dwarf,
            symbols,
            position_independent,
        })
    }

    /// Whether lookups need the module's load bias removed first.
    pub fn is_position_independent(&self) -> bool {
        self.position_independent
    }

    /// Resolve a link-time address to a function name.
    ///
    /// Prefers the DWARF answer, demangled; falls back to the nearest
    /// preceding ELF symbol when the address has no line info.
    pub fn function_name(&self, pc: u64) -> Option<String> {
        if let Ok(mut frames) = self.context.find_frames(pc).skip_all_loads() {
            while let Ok(Some(frame)) = frames.next() {
                if let Some(function) = frame.function {
                    let language = function.language;
                    if let Ok(name) = function.raw_name() {
                        return Some(addr2line::demangle_auto(name, language).into_owned());
                    }
                }
            }
        }
        self.nearest_symbol(pc)
    }

    fn nearest_symbol(&self, pc: u64) -> Option<String> {
        let after = self.symbols.partition_point(|&(address, _)| address <= pc);
        after.checked_sub(1).map(|i| self.symbols[i].1.clone())
    }

    /// Enumerate the in-scope parameters and locals of the function
    /// covering `pc`, with stack addresses resolved against `frame_base`
    /// (the frame's base-pointer value).
    pub fn variables_at(&self, pc: u64, frame_base: u64) -> Result<Vec<VariableSite>> {
        let mut units = self.dwarf.units();
        while let Some(header) = units.next()? {
            let unit = self.dwarf.unit(header)?;
            if let Some(sites) = self.unit_variables(&unit, pc, frame_base)? {
                return Ok(sites);
            }
        }
        Ok(Vec::new())
    }

    /// Search one compilation unit for the subprogram covering `pc` and
    /// collect its variable subtree. `None` means the unit does not cover
    /// the address at all.
    fn unit_variables(
        &self,
        unit: &gimli::Unit<Reader>,
        pc: u64,
        frame_base: u64,
    ) -> Result<Option<Vec<VariableSite>>> {
        let mut entries = unit.entries();

        let mut resolved_base = None;
        let mut found = false;
        while let Some((_, entry)) = entries.next_dfs()? {
            if entry.tag() == gimli::DW_TAG_subprogram && self.covers(unit, entry, pc)? {
                resolved_base = self.frame_base_address(unit, entry, frame_base)?;
                found = true;
                break;
            }
        }
        if !found {
            return Ok(None);
        }
        let Some(base) = resolved_base else {
            debug!("unsupported frame base expression for pc {pc:#x}");
            return Ok(Some(Vec::new()));
        };

        // The cursor sits on the subprogram; walk its subtree, skipping
        // lexical blocks that do not cover pc and any nested functions.
        let mut sites = Vec::new();
        let mut depth: isize = 0;
        let mut skip_below: Option<isize> = None;
        while let Some((delta, entry)) = entries.next_dfs()? {
            depth += delta;
            if depth <= 0 {
                break;
            }
            if let Some(limit) = skip_below {
                if depth > limit {
                    continue;
                }
                skip_below = None;
            }
            match entry.tag() {
                gimli::DW_TAG_lexical_block => {
                    if !self.block_covers(unit, entry, pc)? {
                        skip_below = Some(depth);
                    }
                }
                gimli::DW_TAG_subprogram | gimli::DW_TAG_inlined_subroutine => {
                    skip_below = Some(depth);
                }
                gimli::DW_TAG_formal_parameter | gimli::DW_TAG_variable => {
                    if let Some(site) = self.variable_site(unit, entry, base)? {
                        sites.push(site);
                    }
                }
                _ => {}
            }
        }
        Ok(Some(sites))
    }

    /// Whether the entry's address ranges contain `pc`. Entries without
    /// ranges do not match.
    fn covers(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        pc: u64,
    ) -> Result<bool> {
        let mut ranges = self.dwarf.die_ranges(unit, entry)?;
        while let Some(range) = ranges.next()? {
            if range.begin <= pc && pc < range.end {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Like [`Self::covers`], but a block without ranges inherits the
    /// enclosing scope and counts as covering.
    fn block_covers(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        pc: u64,
    ) -> Result<bool> {
        let mut ranges = self.dwarf.die_ranges(unit, entry)?;
        let mut any = false;
        while let Some(range) = ranges.next()? {
            any = true;
            if range.begin <= pc && pc < range.end {
                return Ok(true);
            }
        }
        Ok(!any)
    }

    /// Resolve the subprogram's `DW_AT_frame_base` to a concrete address.
    ///
    /// Three shapes appear in frame-pointer-based code: `DW_OP_reg6` (the
    /// frame base is rbp itself), `DW_OP_breg6` with an offset, and
    /// `DW_OP_call_frame_cfa`. With the rbp chain intact the CFA sits just
    /// above the saved-rbp/return-address pair, at rbp + 16. Anything else
    /// is unsupported.
    fn frame_base_address(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        rbp: u64,
    ) -> Result<Option<u64>> {
        let Some(gimli::AttributeValue::Exprloc(expression)) =
            entry.attr_value(gimli::DW_AT_frame_base)?
        else {
            return Ok(None);
        };
        let mut ops = expression.operations(unit.encoding());
        match ops.next()? {
            Some(gimli::Operation::Register { register }) if register == gimli::X86_64::RBP => {
                Ok(Some(rbp))
            }
            Some(gimli::Operation::RegisterOffset {
                register, offset, ..
            }) if register == gimli::X86_64::RBP => Ok(Some(rbp.wrapping_add_signed(offset))),
            Some(gimli::Operation::CallFrameCFA) => Ok(Some(rbp + 16)),
            _ => Ok(None),
        }
    }

    /// Extract one variable's name, size, and stack address.
    ///
    /// Compiler-generated temporaries without a name are dropped here;
    /// everything else is reported, even without an address, so callers
    /// can log what they skip.
    fn variable_site(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        frame_base: u64,
    ) -> Result<Option<VariableSite>> {
        let Some(name) = self.entry_name(unit, entry)? else {
            return Ok(None);
        };
        let size = self.type_size(unit, entry)?.unwrap_or(0);
        let address = Self::stack_address(unit, entry, frame_base)?;
        Ok(Some(VariableSite {
            name,
            address,
            size,
        }))
    }

    fn entry_name(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<Option<String>> {
        let Some(value) = entry.attr_value(gimli::DW_AT_name)? else {
            return Ok(None);
        };
        let name = self.dwarf.attr_string(unit, value)?;
        Ok(Some(name.to_string_lossy()?.into_owned()))
    }

    /// Byte size of the entry's type, chasing typedef and qualifier
    /// chains until a sized type appears.
    fn type_size(
        &self,
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
    ) -> Result<Option<u64>> {
        let mut type_ref = entry.attr_value(gimli::DW_AT_type)?;
        for _ in 0..MAX_TYPE_DEPTH {
            let Some(gimli::AttributeValue::UnitRef(offset)) = type_ref else {
                break;
            };
            let type_entry = unit.entry(offset)?;
            if let Some(size) = type_entry
                .attr(gimli::DW_AT_byte_size)?
                .and_then(|attr| attr.udata_value())
            {
                return Ok(Some(size));
            }
            type_ref = type_entry.attr_value(gimli::DW_AT_type)?;
        }
        Ok(None)
    }

    /// The variable's stack address, if its location is a plain
    /// frame-base offset.
    fn stack_address(
        unit: &gimli::Unit<Reader>,
        entry: &gimli::DebuggingInformationEntry<Reader>,
        frame_base: u64,
    ) -> Result<Option<u64>> {
        let Some(gimli::AttributeValue::Exprloc(expression)) =
            entry.attr_value(gimli::DW_AT_location)?
        else {
            return Ok(None);
        };
        let mut ops = expression.operations(unit.encoding());
        match ops.next()? {
            Some(gimli::Operation::FrameOffset { offset }) => {
                Ok(Some(frame_base.wrapping_add_signed(offset)))
            }
            _ => Ok(None),
        }
    }
}
