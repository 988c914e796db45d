//! The Overlay & Nesting Controller (§4.5): `SECTION` switches, `LOAD`
//! overlays, the `UNION` stack, the `PUSHS`/`POPS`/`ENDS` section stack,
//! and fragment-literal injection. Every function here takes the engine
//! plus whatever directive-specific arguments it needs and returns
//! `Result<_, ()>` — the error case means a diagnostic was already
//! raised and the caller should treat the directive as a no-op.

use crate::{
    cursor,
    diag::{DiagnosticMessage, Diagnostics, WarningKind},
    engine::{SectionEngine, UnionFrame},
    expr::{Expression, SymbolId},
    fstack::SrcLocation,
    merge, query,
    section::{PatchKind, Section, SectionKind, SectionModifier},
    symbols::SymbolTable,
};

/// `SECTION` (§4.5.1): switch to (creating if needed) the named
/// section, terminating any active `LOAD` first.
#[allow(clippy::too_many_arguments)]
pub fn new_section(
    engine: &mut SectionEngine,
    name: &str,
    kind: SectionKind,
    modifier: SectionModifier,
    org: Option<i64>,
    bank: Option<i64>,
    align: u8,
    align_offset: i64,
    symtab: &mut dyn SymbolTable,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<(), ()> {
    if let Some(existing) = engine.registry.find(name) {
        if engine.section_stack.iter().any(|ctx| ctx.current_section == Some(existing)) {
            diag.fatal(loc, DiagnosticMessage::SectionOnStack { name: name.to_string() });
            return Err(());
        }
    }

    if !engine.cursor.union_stack.is_empty() {
        diag.fatal(loc, DiagnosticMessage::SectionInsideUnion);
        return Err(());
    }

    if engine.cursor.current_load_section.is_some() {
        end_load_section(engine, Some("SECTION"), loc, diag);
    }

    let id = merge::declare_section(&mut engine.registry, name, kind, modifier, org, bank, align, align_offset, loc, diag)?;

    engine.cursor.current_section = Some(id);
    symtab.reset_current_label_scope();
    engine.cursor.label_scope = symtab.current_label_scope();
    engine.cursor.symbol_offset = if modifier == SectionModifier::Union { 0 } else { engine.registry.get(id).size };
    engine.cursor.load_offset = 0;
    Ok(())
}

/// `LOAD` (§4.5.2): open an overlay section inside the active has-data
/// parent.
#[allow(clippy::too_many_arguments)]
pub fn set_load_section(
    engine: &mut SectionEngine,
    name: &str,
    kind: SectionKind,
    modifier: SectionModifier,
    org: Option<i64>,
    bank: Option<i64>,
    align: u8,
    align_offset: i64,
    symtab: &mut dyn SymbolTable,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<(), ()> {
    let parent_has_data = engine
        .cursor
        .current_section
        .map(|id| engine.registry.get(id).kind.has_data())
        .unwrap_or(false);
    if !parent_has_data {
        diag.error(loc, DiagnosticMessage::LoadRequiresDataSection);
        return Err(());
    }
    if kind.has_data() {
        diag.error(loc, DiagnosticMessage::LoadRom { kind: kind.name() });
        return Err(());
    }

    if engine.cursor.current_load_section.is_some() {
        end_load_section(engine, Some("LOAD"), loc, diag);
    }

    let id = merge::declare_section(&mut engine.registry, name, kind, modifier, org, bank, align, align_offset, loc, diag)?;

    engine.load_saved_label_scope = Some(engine.cursor.label_scope);
    symtab.set_current_label_scope(crate::symbols::LabelScope::default());
    engine.cursor.label_scope = symtab.current_label_scope();

    let overlay_size = i64::from(engine.registry.get(id).size);
    let base = if modifier == SectionModifier::Union { 0 } else { overlay_size };
    let load_offset = i64::from(engine.cursor.symbol_offset) - base;
    engine.cursor.load_offset = load_offset;
    engine.cursor.symbol_offset = (i64::from(engine.cursor.symbol_offset) - load_offset) as u32;
    engine.cursor.current_load_section = Some(id);
    Ok(())
}

/// `ENDL` (§4.5.2): close the active `LOAD` overlay, restoring the
/// cursor to the parent section. `cause`, if given, names the directive
/// that forced an implicit close, and is reported as a warning.
pub fn end_load_section(engine: &mut SectionEngine, cause: Option<&'static str>, loc: SrcLocation, diag: &mut dyn Diagnostics) {
    if engine.cursor.current_load_section.is_none() {
        diag.error(loc, DiagnosticMessage::NoActiveLoad);
        return;
    }

    engine.cursor.symbol_offset = (i64::from(engine.cursor.symbol_offset) + engine.cursor.load_offset) as u32;
    engine.cursor.load_offset = 0;
    engine.cursor.current_load_section = None;
    if let Some(saved) = engine.load_saved_label_scope.take() {
        engine.cursor.label_scope = saved;
    }

    if let Some(directive) = cause {
        diag.warning(loc, WarningKind::UnterminatedLoad, directive);
    }
}

/// `UNION` (§4.5.3): open a union frame on the active section.
pub fn start_union(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let Some(id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::UnionOutsideSection);
        return Err(());
    };
    if engine.registry.get(id).kind.has_data() {
        diag.error(loc, DiagnosticMessage::RomUnion { kind: engine.registry.get(id).kind.name() });
        return Err(());
    }

    engine
        .cursor
        .union_stack
        .push(UnionFrame { start_offset: engine.cursor.symbol_offset, max_member_size: 0 });
    Ok(())
}

/// `NEXTU` (§4.5.3): end the current member and rewind to the union's
/// start, ready for the next one.
pub fn next_union_member(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let Some(top) = engine.cursor.union_stack.last_mut() else {
        diag.error(loc, DiagnosticMessage::NoActiveUnion);
        return Err(());
    };
    let member_size = engine.cursor.symbol_offset - top.start_offset;
    top.max_member_size = top.max_member_size.max(member_size);
    engine.cursor.symbol_offset = top.start_offset;
    Ok(())
}

/// `ENDU` (§4.5.3): end the final member and advance the cursor past
/// the union's max member size.
pub fn end_union(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let Some(top) = engine.cursor.union_stack.last_mut() else {
        diag.error(loc, DiagnosticMessage::NoActiveUnion);
        return Err(());
    };
    let member_size = engine.cursor.symbol_offset - top.start_offset;
    top.max_member_size = top.max_member_size.max(member_size);
    engine.cursor.symbol_offset = top.start_offset + top.max_member_size;
    engine.cursor.union_stack.pop();
    Ok(())
}

/// `PUSHS` (§4.5.4): snapshot the cursor and clear to "nothing active".
/// Rejects nesting deeper than `options.max_recursion_depth` (SPEC_FULL
/// §A.2), the same guard fragment-literal injection uses, since both
/// grow the same section stack.
pub fn push_section(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    check_recursion_depth(engine, loc, diag)?;
    engine.section_stack.push(std::mem::take(&mut engine.cursor));
    Ok(())
}

/// Shared depth guard for anything that grows `section_stack`: `PUSHS`
/// and fragment-literal injection.
fn check_recursion_depth(engine: &SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let limit = engine.options.max_recursion_depth;
    if engine.section_stack.len() >= limit as usize {
        diag.fatal(loc, DiagnosticMessage::RecursionLimitExceeded { limit });
        return Err(());
    }
    Ok(())
}

/// `POPS` (§4.5.4): restore the most recently pushed cursor.
pub fn pop_section(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    if engine.section_stack.is_empty() {
        diag.fatal(loc, DiagnosticMessage::EmptySectionStack);
        return Err(());
    }
    if engine.cursor.current_load_section.is_some() {
        end_load_section(engine, Some("POPS"), loc, diag);
    }
    let Some(restored) = engine.section_stack.pop() else {
        diag.fatal(loc, DiagnosticMessage::EmptySectionStack);
        return Err(());
    };
    engine.cursor = restored;
    Ok(())
}

/// `ENDS` (§4.5.4): leave the active section without restoring from the
/// stack.
pub fn end_section(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    if engine.cursor.current_section.is_none() {
        diag.fatal(loc, DiagnosticMessage::EndsOutsideSection);
        return Err(());
    }
    if !engine.cursor.union_stack.is_empty() {
        diag.fatal(loc, DiagnosticMessage::EndsInsideUnion);
        return Err(());
    }
    if engine.cursor.current_load_section.is_some() {
        end_load_section(engine, Some("ENDS"), loc, diag);
    }
    engine.cursor.current_section = None;
    Ok(())
}

/// Fragment-literal injection (§4.5.5): open an anonymous sibling of
/// the active section and make it the active section, coercing the
/// parent to `FRAGMENT` in the process. Returns a generated symbol id
/// the caller uses as the fragment's address label.
pub fn inject_fragment_literal(engine: &mut SectionEngine, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<SymbolId, ()> {
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    if engine.cursor.current_load_section.is_some() {
        diag.error(loc, DiagnosticMessage::FragmentInsideLoad);
        return Err(());
    }
    let parent = engine.registry.get(parent_id);
    if !parent.kind.has_data() {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    }
    if parent.modifier == SectionModifier::Union {
        diag.error(loc, DiagnosticMessage::FragmentInsideUnion);
        return Err(());
    }
    check_recursion_depth(engine, loc, diag)?;

    let sibling_bank = match parent.bank {
        Some(0) => None,
        other => other,
    };
    let sibling = {
        let mut s = Section::new(parent.name.clone(), parent.kind, SectionModifier::Fragment, loc);
        s.bank = sibling_bank;
        s
    };

    engine.registry.get_mut(parent_id).modifier = SectionModifier::Fragment;
    let sibling_id = engine.registry.insert_sibling(parent_id, sibling);

    let parent_context = engine.cursor.clone();
    engine.section_stack.push(parent_context);
    engine.cursor.current_section = Some(sibling_id);
    engine.cursor.symbol_offset = 0;
    engine.cursor.union_stack = Vec::new();

    let tag = engine.next_fragment_tag;
    engine.next_fragment_tag += 1;
    Ok(SymbolId(tag))
}

/// Advance the live cursor by `n` bytes (§4.3 `Grow`), after the bytes
/// (if any) have already been written into the parent section. Raises
/// the active `LOAD` overlay's own `size` to the new symbol offset —
/// labels inside the `LOAD` see it grow even though the bytes physically
/// land in the parent's data buffer.
fn advance_cursor(engine: &mut SectionEngine, n: u32, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let new_symbol_offset = match engine.cursor.symbol_offset.checked_add(n) {
        Some(v) => v,
        None => {
            diag.fatal(loc, DiagnosticMessage::OffsetOverflow);
            return Err(());
        }
    };
    engine.cursor.symbol_offset = new_symbol_offset;
    if let Some(load_id) = engine.cursor.current_load_section {
        engine.registry.get_mut(load_id).bump_size(new_symbol_offset);
    }
    Ok(())
}

/// `DB`/`DW`/`DL` of already-known bytes (§4.3 "Byte/Word/Long write"):
/// requires an active has-data parent section, writes at the current
/// output offset, then grows the cursor.
pub fn emit_bytes(engine: &mut SectionEngine, bytes: &[u8], loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let offset = engine.cursor.output_offset();
    cursor::write_bytes(engine.registry.get_mut(parent_id), offset, bytes, loc, diag)?;
    advance_cursor(engine, bytes.len() as u32, loc, diag)
}

/// `DB`/`DW`/`DL`/`JR` of a possibly-unresolved expression (§4.3
/// "Relative emission" + §4.4 Relocation Hook): emits the literal value
/// if known, else a zero placeholder plus a recorded [`crate::section::Patch`].
pub fn emit_value(
    engine: &mut SectionEngine,
    kind: PatchKind,
    expr: Box<dyn Expression>,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<(), ()> {
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let offset = engine.cursor.output_offset();
    let width = kind.width() as u32;
    cursor::emit(engine.registry.get_mut(parent_id), offset, kind, expr, loc, diag)?;
    advance_cursor(engine, width, loc, diag)
}

/// `JR`'s dedicated emission path (§4.3): a PC-relative displacement,
/// shortcut-emitted directly when it's a known constant difference from
/// the program counter, else recorded as a `Jr`-kind patch.
pub fn emit_jr(
    engine: &mut SectionEngine,
    pc: SymbolId,
    expr: Box<dyn Expression>,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<(), ()> {
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let offset = engine.cursor.output_offset();
    cursor::emit_jr(engine.registry.get_mut(parent_id), offset, pc, expr, loc, diag)?;
    advance_cursor(engine, PatchKind::Jr.width() as u32, loc, diag)
}

/// `DS n[, fill]` (§4.3 `Skip`): reserves `n` bytes, writing `fill` into
/// a has-data section or just growing a no-data one. `ds_flag` is
/// `false` for a bare `DS n` with no explicit fill value.
pub fn ds(engine: &mut SectionEngine, n: u32, fill: u8, ds_flag: bool, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let offset = engine.cursor.output_offset();
    cursor::skip(engine.registry.get_mut(parent_id), offset, n, fill, ds_flag, loc, diag)?;
    advance_cursor(engine, n, loc, diag)
}

/// `ALIGN` (§4.3 `alignPC`): enforces or tightens the owning section's
/// (the `LOAD` overlay if active, else the active section) address
/// constraint at the current symbol offset, then pads the parent with
/// `fill` bytes until the residue is satisfied. `align >= 16` pins the
/// owning section to a fixed `org` the same way a `SECTION` declaration
/// does (§3: "16 means 'pinned' and is expressed via `org`").
pub fn align_pc(engine: &mut SectionEngine, align: u8, align_offset: u16, fill: u8, loc: SrcLocation, diag: &mut dyn Diagnostics) -> Result<(), ()> {
    if align > 16 {
        diag.error(loc, DiagnosticMessage::AlignOutOfRange { align: align as i64 });
        return Err(());
    }
    let Some(owning_id) = query::owning_section(&engine.cursor) else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let symbol_offset = engine.cursor.symbol_offset;
    let modulus = 1u32 << align;
    let target_residue = u32::from(align_offset) % modulus;

    // Already pinned to a fixed address: the padding needed has to be
    // measured from that same address, not from the bare symbol offset,
    // or an already-satisfied residue gets padded again.
    let fixed_org = engine.registry.get(owning_id).org;

    let padding = if let Some(org) = fixed_org {
        let residue = u32::from(org).wrapping_add(symbol_offset) % modulus;
        if residue != target_residue {
            let name = engine.registry.get(owning_id).name.clone();
            diag.error(loc, DiagnosticMessage::AddressAlignMismatch { name, addr: org });
            return Err(());
        }
        0
    } else {
        let section = engine.registry.get_mut(owning_id);
        if align > section.align {
            if align >= 16 {
                section.org = Some((i64::from(align_offset) - i64::from(symbol_offset)) as u16);
                section.align = 0;
                section.align_offset = 0;
            } else {
                // Same position-adjustment FRAGMENT merging does for its
                // effective alignment offset: the constraint is on the
                // section's own base address, which sits `symbol_offset`
                // bytes behind the cursor right now.
                let adjusted = (u32::from(align_offset).wrapping_sub(symbol_offset)) % modulus;
                section.align = align;
                section.align_offset = adjusted as u16;
            }
        }
        cursor::get_align_bytes(symbol_offset, align, align_offset)
    };

    if padding == 0 {
        return Ok(());
    }
    let Some(parent_id) = engine.cursor.current_section else {
        diag.error(loc, DiagnosticMessage::NoActiveSection);
        return Err(());
    };
    let offset = engine.cursor.output_offset();
    cursor::skip(engine.registry.get_mut(parent_id), offset, padding, fill, true, loc, diag)?;
    advance_cursor(engine, padding, loc, diag)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fstack::SrcLocationRecord,
        options::EngineOptions,
        section::SectionKind,
        symbols::LabelScope,
    };

    struct FakeSymbolTable {
        scope: LabelScope,
    }

    impl SymbolTable for FakeSymbolTable {
        fn current_label_scope(&self) -> LabelScope {
            self.scope
        }
        fn set_current_label_scope(&mut self, scope: LabelScope) {
            self.scope = scope;
        }
        fn reset_current_label_scope(&mut self) {
            self.scope = LabelScope::default();
        }
        fn program_counter_symbol(&self) -> SymbolId {
            SymbolId(0)
        }
    }

    #[derive(Default)]
    struct Recorder {
        errors: Vec<DiagnosticMessage>,
        warnings: Vec<(WarningKind, String)>,
        fatals: Vec<DiagnosticMessage>,
    }

    impl Diagnostics for Recorder {
        fn error(&mut self, _location: SrcLocation, message: DiagnosticMessage) {
            self.errors.push(message);
        }
        fn warning(&mut self, _location: SrcLocation, kind: WarningKind, detail: &str) {
            self.warnings.push((kind, detail.to_string()));
        }
        fn fatal(&mut self, _location: SrcLocation, message: DiagnosticMessage) {
            self.fatals.push(message);
        }
    }

    fn loc(engine: &mut SectionEngine) -> SrcLocation {
        engine.locations.push(SrcLocationRecord::File { name: "t.asm".into(), line: 1, parent: None })
    }

    #[test]
    fn union_round_trip_advances_by_max_member() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "V", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        start_union(&mut engine, l, &mut diag).unwrap();
        engine.cursor.symbol_offset = 4;
        next_union_member(&mut engine, l, &mut diag).unwrap();
        engine.cursor.symbol_offset = 7;
        next_union_member(&mut engine, l, &mut diag).unwrap();
        engine.cursor.symbol_offset = 2;
        end_union(&mut engine, l, &mut diag).unwrap();

        assert_eq!(engine.cursor.symbol_offset, 7);
        assert!(engine.cursor.union_stack.is_empty());
        assert!(diag.errors.is_empty());
    }

    #[test]
    fn push_pop_round_trip_restores_cursor() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "A", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        start_union(&mut engine, l, &mut diag).unwrap();
        engine.cursor.symbol_offset = 3;
        next_union_member(&mut engine, l, &mut diag).unwrap();

        push_section(&mut engine, l, &mut diag).unwrap();
        new_section(&mut engine, "B", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        engine.cursor.symbol_offset = 5;
        pop_section(&mut engine, l, &mut diag).unwrap();

        assert_eq!(engine.registry.find("A"), engine.cursor.current_section);
        assert_eq!(engine.cursor.union_stack.len(), 1);
        assert_eq!(engine.cursor.union_stack[0].max_member_size, 3);

        engine.cursor.symbol_offset = 1;
        end_union(&mut engine, l, &mut diag).unwrap();
        assert_eq!(engine.cursor.symbol_offset, 3);
        assert!(diag.errors.is_empty());
    }

    #[test]
    fn load_round_trip_restores_symbol_offset_and_scope() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        engine.cursor.symbol_offset = 1;

        set_load_section(&mut engine, "Buf", SectionKind::Hram, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        assert_eq!(engine.cursor.symbol_offset, 0);

        engine.cursor.symbol_offset = 2;
        end_load_section(&mut engine, None, l, &mut diag);

        assert!(engine.cursor.current_load_section.is_none());
        assert_eq!(engine.cursor.symbol_offset, 3);
        assert!(diag.errors.is_empty());
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn fragment_literal_coerces_parent_to_fragment() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        let parent_id = engine.cursor.current_section.unwrap();

        inject_fragment_literal(&mut engine, l, &mut diag).unwrap();

        assert_eq!(engine.registry.get(parent_id).modifier, SectionModifier::Fragment);
        assert_ne!(engine.cursor.current_section, Some(parent_id));
        assert_eq!(engine.cursor.symbol_offset, 0);
    }

    #[test]
    fn section_switch_while_union_open_on_stack_is_fine_but_active_union_blocks_ends() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "A", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        start_union(&mut engine, l, &mut diag).unwrap();

        let result = end_section(&mut engine, l, &mut diag);
        assert!(result.is_err());
        assert_eq!(diag.fatals.len(), 1);
        assert!(matches!(diag.fatals[0], DiagnosticMessage::EndsInsideUnion));
    }

    #[test]
    fn section_switch_while_union_open_is_fatal() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "A", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        start_union(&mut engine, l, &mut diag).unwrap();

        let result =
            new_section(&mut engine, "B", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag);
        assert!(result.is_err());
        assert_eq!(diag.fatals.len(), 1);
        assert!(matches!(diag.fatals[0], DiagnosticMessage::SectionInsideUnion));
        assert_eq!(engine.registry.find("A"), engine.cursor.current_section);
    }

    #[test]
    fn emit_bytes_grows_both_parent_and_active_load_section() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        set_load_section(&mut engine, "Buf", SectionKind::Hram, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();

        emit_bytes(&mut engine, &[0xAA, 0xBB], l, &mut diag).unwrap();

        let code_id = engine.registry.find("Code").unwrap();
        let buf_id = engine.registry.find("Buf").unwrap();
        assert_eq!(&engine.registry.get(code_id).data[0..2], &[0xAA, 0xBB]);
        assert_eq!(engine.registry.get(buf_id).size, 2);
        assert_eq!(engine.cursor.symbol_offset, 2);
        assert!(diag.errors.is_empty());
    }

    #[test]
    fn emit_bytes_without_active_section_is_an_error() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        let result = emit_bytes(&mut engine, &[0x01], l, &mut diag);
        assert!(result.is_err());
        assert!(matches!(diag.errors[0], DiagnosticMessage::NoActiveSection));
    }

    #[test]
    fn ds_without_fill_value_warns_in_a_data_section() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        ds(&mut engine, 3, 0, false, l, &mut diag).unwrap();

        assert_eq!(engine.cursor.symbol_offset, 3);
        assert_eq!(diag.warnings.len(), 1);
        assert_eq!(diag.warnings[0].0, WarningKind::EmptyDataDirective);
    }

    #[test]
    fn ds_in_a_no_data_section_only_grows_size() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "V", SectionKind::Wram0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        ds(&mut engine, 4, 0, false, l, &mut diag).unwrap();

        let id = engine.registry.find("V").unwrap();
        assert_eq!(engine.registry.get(id).size, 4);
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn align_pc_tightens_unset_section_alignment() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        emit_bytes(&mut engine, &[0x01], l, &mut diag).unwrap();
        align_pc(&mut engine, 4, 0, 0xFF, l, &mut diag).unwrap();

        let id = engine.registry.find("Code").unwrap();
        let section = engine.registry.get(id);
        assert_eq!(section.align, 4);
        assert_eq!(engine.cursor.symbol_offset, 16);
        assert_eq!(&section.data[1..16], &[0xFF; 15]);
        assert!(diag.errors.is_empty());
    }

    #[test]
    fn align_pc_at_16_pins_a_fixed_org() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        align_pc(&mut engine, 16, 0x0150, 0, l, &mut diag).unwrap();

        let id = engine.registry.find("Code").unwrap();
        let section = engine.registry.get(id);
        assert_eq!(section.org, Some(0x0150));
        assert_eq!(section.align, 0);
    }

    #[test]
    fn align_pc_rejects_mismatched_fixed_address() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(
            &mut engine,
            "Code",
            SectionKind::Rom0,
            SectionModifier::Normal,
            Some(0x0101),
            None,
            0,
            0,
            &mut symtab,
            l,
            &mut diag,
        )
        .unwrap();

        let result = align_pc(&mut engine, 4, 0, 0, l, &mut diag);
        assert!(result.is_err());
        assert!(matches!(diag.errors[0], DiagnosticMessage::AddressAlignMismatch { .. }));
    }

    #[test]
    fn align_pc_with_fixed_org_already_aligned_pads_nothing() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(
            &mut engine,
            "Code",
            SectionKind::Rom0,
            SectionModifier::Normal,
            Some(0x0004),
            None,
            0,
            0,
            &mut symtab,
            l,
            &mut diag,
        )
        .unwrap();
        emit_bytes(&mut engine, &[0; 12], l, &mut diag).unwrap();

        align_pc(&mut engine, 4, 0, 0xFF, l, &mut diag).unwrap();

        assert!(diag.errors.is_empty());
        assert_eq!(engine.cursor.symbol_offset, 12);
        let id = engine.registry.find("Code").unwrap();
        assert_eq!(engine.registry.get(id).size, 12);
    }

    #[test]
    fn align_pc_tighten_adjusts_offset_for_symbol_offset() {
        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        emit_bytes(&mut engine, &[0; 3], l, &mut diag).unwrap();
        align_pc(&mut engine, 4, 5, 0, l, &mut diag).unwrap();

        let id = engine.registry.find("Code").unwrap();
        let section = engine.registry.get(id);
        assert_eq!(section.align, 4);
        assert_eq!(section.align_offset, 2);
    }

    #[test]
    fn emit_value_records_patch_and_advances_cursor() {
        use crate::expr::SymbolId as Sym;

        #[derive(Debug)]
        struct Unresolved;
        impl Expression for Unresolved {
            fn is_known(&self) -> bool {
                false
            }
            fn value(&self) -> i32 {
                unreachable!()
            }
            fn symbol_of(&self) -> Option<Sym> {
                Some(Sym(7))
            }
            fn is_diff_constant(&self, _pc: Sym) -> Option<i32> {
                None
            }
        }

        let mut engine = SectionEngine::new(EngineOptions::default());
        let mut symtab = FakeSymbolTable { scope: LabelScope::default() };
        let mut diag = Recorder::default();
        let l = loc(&mut engine);

        new_section(&mut engine, "Code", SectionKind::Rom0, SectionModifier::Normal, None, None, 0, 0, &mut symtab, l, &mut diag)
            .unwrap();
        emit_value(&mut engine, PatchKind::Word, Box::new(Unresolved), l, &mut diag).unwrap();

        let id = engine.registry.find("Code").unwrap();
        assert_eq!(engine.registry.get(id).patches.len(), 1);
        assert_eq!(engine.cursor.symbol_offset, 2);
    }
}
