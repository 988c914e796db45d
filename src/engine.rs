//! The top-level `SectionEngine`: owns the registry, the live cursor,
//! the section stack, the source-location arena, and the options — one
//! instantiable object standing in for what would otherwise be
//! process-wide mutable state.

use crate::{
    diag::{DiagnosticMessage, Diagnostics},
    fstack::SrcLocationArena,
    options::EngineOptions,
    registry::{SectionId, SectionRegistry},
    symbols::LabelScope,
};

/// One member of a section's `UNION` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnionFrame {
    /// The symbol offset every member starts back at.
    pub start_offset: u32,
    /// The largest member size seen so far.
    pub max_member_size: u32,
}

/// The value object saved and restored whole by `PUSHS`/`POPS`.
#[derive(Debug, Clone, Default)]
pub struct CursorContext {
    /// The section directives are currently writing into, if any.
    pub current_section: Option<SectionId>,
    /// The active `LOAD` overlay section, if any.
    pub current_load_section: Option<SectionId>,
    /// Label scope in effect for new labels.
    pub label_scope: LabelScope,
    /// Offset the symbol module sees for new labels.
    pub symbol_offset: u32,
    /// Added to `symbol_offset` to get the parent section's real write
    /// offset while a `LOAD` overlay is active; zero otherwise.
    pub load_offset: i64,
    /// Nested `UNION` frames for the active section.
    pub union_stack: Vec<UnionFrame>,
}

impl CursorContext {
    /// The offset bytes actually land at in the currently-emitting
    /// section's data buffer: the symbol offset plus the load offset.
    pub fn output_offset(&self) -> u32 {
        (i64::from(self.symbol_offset) + self.load_offset) as u32
    }
}

/// Owns every piece of section-engine state for one assembly run.
pub struct SectionEngine {
    pub(crate) registry: SectionRegistry,
    pub(crate) cursor: CursorContext,
    pub(crate) section_stack: Vec<CursorContext>,
    pub(crate) load_saved_label_scope: Option<LabelScope>,
    pub(crate) next_fragment_tag: u32,
    /// Source-location records for every `srcLocation` the engine has
    /// been handed.
    pub locations: SrcLocationArena,
    /// The options this engine was constructed with.
    pub options: EngineOptions,
}

impl SectionEngine {
    /// A fresh engine: no sections, no active context, default options.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            registry: SectionRegistry::new(),
            cursor: CursorContext::default(),
            section_stack: Vec::new(),
            load_saved_label_scope: None,
            next_fragment_tag: 0,
            locations: SrcLocationArena::new(),
            options,
        }
    }

    /// Read-only access to every declared section.
    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    /// The live cursor context (current section, offsets, union stack).
    pub fn cursor(&self) -> &CursorContext {
        &self.cursor
    }

    /// How deep the `PUSHS` stack currently is.
    pub fn section_stack_depth(&self) -> usize {
        self.section_stack.len()
    }

    /// End-of-assembly check (SPEC_FULL §B): anything still open on the
    /// section or union stack, or a dangling `LOAD`, means some closing
    /// directive was missing. Reports one warning per unterminated
    /// construct, outermost first; does not mutate state.
    pub fn finish(&self, diag: &mut dyn Diagnostics) {
        if self.cursor.current_load_section.is_some() {
            diag.warning(self.last_location(), crate::diag::WarningKind::UnterminatedLoad, "end of file");
        }
        if !self.cursor.union_stack.is_empty() {
            diag.fatal(self.last_location(), DiagnosticMessage::UnterminatedAtEof { what: "UNION" });
        }
        for _ in &self.section_stack {
            diag.fatal(self.last_location(), DiagnosticMessage::UnterminatedAtEof { what: "PUSHS" });
        }
    }

    /// Every section whose accumulated size overflows its kind's
    /// maximum (SPEC_FULL §B `checkSizes` wiring); reports one error
    /// each.
    pub fn check_sizes(&self, diag: &mut dyn Diagnostics) {
        for id in self.registry.check_sizes() {
            let section = self.registry.get(id);
            diag.error(
                section.src_location,
                DiagnosticMessage::AddrOutOfBounds {
                    addr: section.size as u16,
                    kind: section.kind.name(),
                    start: section.kind.info().start_addr,
                    end: section.kind.info().end_addr(),
                },
            );
        }
    }

    fn last_location(&self) -> crate::fstack::SrcLocation {
        self.cursor
            .current_section
            .map(|id| self.registry.get(id).src_location)
            .unwrap_or(crate::fstack::SrcLocation(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_offset_adds_load_offset() {
        let mut ctx = CursorContext { symbol_offset: 10, load_offset: -4, ..Default::default() };
        assert_eq!(ctx.output_offset(), 6);
        ctx.load_offset = 3;
        assert_eq!(ctx.output_offset(), 13);
    }

    #[test]
    fn fresh_engine_has_no_sections() {
        let engine = SectionEngine::new(EngineOptions::default());
        assert_eq!(engine.registry().count(), 0);
        assert_eq!(engine.section_stack_depth(), 0);
    }
}
