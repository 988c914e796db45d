//! Assembler-wide options the section engine reads from.
//!
//! A single `TypedBuilder` struct constructed once and threaded through
//! explicitly, rather than a pile of constructor parameters or
//! process-global settings.

use std::path::PathBuf;

use typed_builder::TypedBuilder;

/// Options shared by the whole assembler (§6 "Options"). The section
/// engine only reads `pad_byte`, `include_paths`, and
/// `max_recursion_depth`; `fixed_point_precision` is carried because it
/// is one of the four options §6 lists as always present on the shared
/// `Options` object, and the engine must not assume it is the struct's
/// only consumer.
#[derive(Debug, Clone, TypedBuilder)]
pub struct EngineOptions {
    /// Byte value used to fill reserved (`DS`) space in data sections.
    #[builder(default = 0)]
    pub pad_byte: u8,

    /// Directories searched, in order, when resolving `INCBIN` targets.
    #[builder(default, setter(into))]
    pub include_paths: Vec<PathBuf>,

    /// Upper bound on nested `PUSHS`/fragment-literal depth, guarding
    /// against runaway recursion from a misbehaving macro layer.
    #[builder(default = 256)]
    pub max_recursion_depth: u32,

    /// Decimal precision used when formatting fixed-point numeric
    /// literals elsewhere in the assembler. Unused by the section
    /// engine itself.
    #[builder(default = 16)]
    pub fixed_point_precision: u8,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
