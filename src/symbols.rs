//! The symbol-table collaborator (§6 "Consumed").
//!
//! The section engine is a *callee* of the symbol module for most
//! purposes (labels are defined by asking the engine's Query Surface,
//! `crate::query`, who owns the current offset). The only calls running
//! the other way are label-scope save/reset around `SECTION`/`LOAD`
//! boundaries, and fetching the symbol that denotes the program
//! counter for `JR`'s relative-offset shortcut.

use crate::expr::SymbolId;

/// Which local-label scope new labels are currently nested under.
///
/// Opaque to the engine: it only ever saves one of these (on `LOAD`
/// entry or `PUSHS`) and restores it later (on `ENDL` or `POPS`), or
/// asks the symbol table to reset it (on `SECTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelScope(pub Option<SymbolId>);

/// Label-scope and program-counter queries the engine issues into the
/// (out-of-scope) symbol table. Kept object-safe so the engine doesn't
/// need to be generic over the symbol table's concrete type.
pub trait SymbolTable {
    /// The label scope currently in effect for new labels.
    fn current_label_scope(&self) -> LabelScope;

    /// Replace the label scope currently in effect.
    fn set_current_label_scope(&mut self, scope: LabelScope);

    /// Reset to "no enclosing scope" (the state after a `SECTION` switch).
    fn reset_current_label_scope(&mut self);

    /// The symbol denoting the current program counter.
    fn program_counter_symbol(&self) -> SymbolId;
}
