//! Section bookkeeping for a Game Boy assembler.
//!
//! This crate owns the part of an assembler that turns a stream of
//! directives — `SECTION`, byte/word/long emission, `UNION`/`NEXTU`/`ENDU`,
//! `LOAD`/`ENDL`, `PUSHS`/`POPS`/`ENDS`, alignment, binary inclusion —
//! into a set of named, typed memory sections with resolved or pending
//! (patched) relocations. Everything upstream of a directive (lexing,
//! parsing, expression arithmetic, macro expansion) and everything
//! downstream (linking, final placement, object-file serialization) is
//! out of scope; see each module's external-collaborator traits for the
//! seams.
//!
//! [`SectionEngine`] is the entry point: construct one per assembly run
//! with [`EngineOptions`], then drive it through [`overlay`]'s directive
//! functions.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

pub mod binary;
pub mod cursor;
pub mod diag;
pub mod engine;
pub mod expr;
pub mod fstack;
pub mod merge;
pub mod options;
pub mod overlay;
pub mod query;
pub mod registry;
pub mod section;
pub mod symbols;

pub use diag::{DiagnosticMessage, Diagnostics, WarningKind};
pub use engine::{CursorContext, SectionEngine, UnionFrame};
pub use expr::{Expression, SymbolId};
pub use fstack::{SrcLocation, SrcLocationArena, SrcLocationRecord};
pub use options::EngineOptions;
pub use registry::{SectionId, SectionRegistry};
pub use section::{KindInfo, Patch, PatchKind, Section, SectionKind, SectionModifier};
pub use symbols::{LabelScope, SymbolTable};
