//! The expression-evaluator collaborator (§6 "Consumed").
//!
//! Expression arithmetic is explicitly out of scope (§1 Non-goals); the
//! engine only ever asks an expression whether it currently reduces to
//! a known integer, and if not, records it opaquely in a [`crate::section::Patch`]
//! for the linker to resolve later.

use std::fmt;

/// Opaque handle to a symbol, as understood by the expression evaluator
/// and symbol table (both out of scope). The engine never inspects a
/// `SymbolId`'s internals; it only compares and stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// A value that may or may not be known at the point the engine asks.
///
/// Implemented by the (out-of-scope) expression evaluator. Kept
/// object-safe so [`crate::section::Patch`] can hold a `Box<dyn
/// Expression>` without making every [`crate::section::Section`]
/// generic over an expression type.
pub trait Expression: fmt::Debug {
    /// Whether this expression currently reduces to a known integer.
    fn is_known(&self) -> bool;

    /// The expression's value. Only meaningful when [`Self::is_known`]
    /// returns `true`.
    fn value(&self) -> i32;

    /// The single symbol this expression is "about", if it names one
    /// directly (used by JR's PC-relative shortcut and by diagnostics).
    fn symbol_of(&self) -> Option<SymbolId>;

    /// If this expression is statically known to equal `pc + k` for
    /// some constant `k`, returns `k`. Used by `JR` to detect "emit
    /// this, relative to the PC, right now" without full linker
    /// support for PC-relative fixups.
    fn is_diff_constant(&self, pc: SymbolId) -> Option<i32>;
}
