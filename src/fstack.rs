//! Source-location bookkeeping.
//!
//! The lexer/parser's file-stack is an external collaborator (§1); this
//! module only provides the small, storable handle that sections and
//! patches need for their `srcLocation` field (§3), plus an arena to
//! back it. Per Design Notes §9 ("Raw back-pointers to file-stack
//! nodes" / "Polymorphic file-stack nodes"), records are stored by
//! value in a content-addressed arena and referenced by index rather
//! than by pointer, and file/macro/REPT contexts share one tagged
//! representation.

/// A stable index into a [`SrcLocationArena`].
///
/// Cheap to copy and store on every [`crate::section::Section`] and
/// [`crate::section::Patch`] without borrowing the arena itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SrcLocation(pub(crate) u32);

/// One node of the file-stack, as the section engine needs to see it.
///
/// Upstream `rgbds` has exactly these three kinds of context a source
/// location can nest inside: a plain included file, a macro expansion,
/// and a `REPT`/`FOR` iteration. Each carries its own line counter and a
/// link to whatever invoked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrcLocationRecord {
    /// A location within an included source file.
    File {
        /// The file's name, as given to the include resolver.
        name: String,
        /// 1-based line number within the file.
        line: u32,
        /// The context that `INCLUDE`d this file, if any.
        parent: Option<SrcLocation>,
    },
    /// A location within a macro expansion.
    Macro {
        /// The macro's name.
        name: String,
        /// 1-based line number within the macro body.
        line: u32,
        /// The context the macro was invoked from.
        parent: Option<SrcLocation>,
    },
    /// A location within a `REPT`/`FOR` iteration.
    Rept {
        /// Which iteration this is (0-based).
        iteration: u32,
        /// 1-based line number within the block body.
        line: u32,
        /// The context the block was entered from.
        parent: Option<SrcLocation>,
    },
}

impl SrcLocationRecord {
    /// The context this record nests inside, if any.
    pub fn parent(&self) -> Option<SrcLocation> {
        match self {
            Self::File { parent, .. } | Self::Macro { parent, .. } | Self::Rept { parent, .. } => {
                *parent
            }
        }
    }

    /// 1-based line number recorded at this level.
    pub fn line(&self) -> u32 {
        match self {
            Self::File { line, .. } | Self::Macro { line, .. } | Self::Rept { line, .. } => *line,
        }
    }
}

/// A content-addressed arena of [`SrcLocationRecord`]s.
///
/// The parser (out of scope here) is expected to push a new record each
/// time it enters a file/macro/REPT level and hand the resulting
/// [`SrcLocation`] to the engine wherever a section or patch needs one.
#[derive(Debug, Clone, Default)]
pub struct SrcLocationArena {
    records: Vec<SrcLocationRecord>,
}

impl SrcLocationArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new location and return a stable handle to it.
    pub fn push(&mut self, record: SrcLocationRecord) -> SrcLocation {
        let index = self.records.len();
        self.records.push(record);
        SrcLocation(index as u32)
    }

    /// Look up a previously recorded location.
    pub fn get(&self, location: SrcLocation) -> Option<&SrcLocationRecord> {
        self.records.get(location.0 as usize)
    }

    /// How many records the arena holds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
