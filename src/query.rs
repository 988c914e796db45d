//! The Query Surface (§4 item 6, §6 "Exposed"): read-only accessors the
//! symbol module and object-file writer pull from the engine. Nothing
//! here mutates state; it all derives from the registry and the live
//! cursor context.

use crate::{
    cursor,
    engine::CursorContext,
    registry::{SectionId, SectionRegistry},
};

/// The section new labels are currently owned by: the `LOAD` overlay if
/// one is active, else the plain active section.
pub fn owning_section(cursor: &CursorContext) -> Option<SectionId> {
    cursor.current_load_section.or(cursor.current_section)
}

/// Where a label defined right now would point, relative to its owning
/// section (`symbolOffset`, §3 glossary).
pub fn symbol_relative_offset(cursor: &CursorContext) -> u32 {
    cursor.symbol_offset
}

/// Where bytes emitted right now actually land in the parent section's
/// data buffer (`symbolOffset + loadOffset`, §3 glossary).
pub fn output_file_offset(cursor: &CursorContext) -> u32 {
    cursor.output_offset()
}

/// The bank of the section currently owning new labels, if any.
pub fn current_bank(registry: &SectionRegistry, cursor: &CursorContext) -> Option<u32> {
    owning_section(cursor).and_then(|id| registry.get(id).bank)
}

/// Padding bytes needed to satisfy `(align, align_offset)` at the
/// current output offset (§4.3 `getAlignBytes`). A section already
/// bound to a fixed address is treated as satisfying any alignment
/// exactly, so only the requested constraint applies; otherwise the
/// tighter (larger exponent) of the requested and the section's own
/// alignment is used.
pub fn align_padding(registry: &SectionRegistry, cursor: &CursorContext, align: u8, align_offset: u16) -> u32 {
    let section = owning_section(cursor).map(|id| registry.get(id));
    let has_fixed_org = section.map(|s| s.org.is_some()).unwrap_or(false);
    let section_align = section.map(|s| s.align).unwrap_or(0);
    let effective_align = if has_fixed_org { align } else { align.max(section_align) };
    cursor::get_align_bytes(output_file_offset(cursor), effective_align, align_offset)
}
