//! Diagnostic sink consumed by the section engine.
//!
//! Every directive entry point takes its diagnostics sink explicitly,
//! rather than the engine storing one process-wide. Nothing in this
//! module ever panics or aborts; a `fatal` call leaves the decision to
//! actually stop the assembler up to the sink's owner.

use std::fmt;

use crate::fstack::SrcLocation;

/// Categories of non-fatal diagnostics the engine can raise.
///
/// `BackwardsFor` and `Truncation` are not reachable from the section
/// engine itself (they belong to the `REPT`/expression layers) but are
/// kept here because the assembler's diagnostic channel is shared
/// across subsystems; splitting this into an engine-only subset would
/// just force two enums to stay in sync by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WarningKind {
    /// A `LOAD` block was still open when something else closed it.
    UnterminatedLoad,
    /// A data-emitting directive was given nothing to emit.
    EmptyDataDirective,
    /// A block-closing directive had no matching opener.
    UnmatchedDirective,
    /// A `FOR` loop's bounds would never advance toward its limit.
    BackwardsFor,
    /// A constant value didn't fit in the destination width.
    Truncation,
}

/// Every distinct condition the section engine can report, as message
/// text. One variant per condition, so wording for a given failure
/// lives in exactly one place.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DiagnosticMessage {
    /// A `SECTION` declaration with `NORMAL` modifier named a section that already exists.
    #[error("Section '{name}' already defined")]
    SectAlreadyDefined {
        /// The section's name.
        name: String,
    },
    /// Two declarations of the same section disagree on modifier (`UNION`/`FRAGMENT`/plain).
    #[error("Section '{name}' previously declared as a different kind of section (modifier mismatch)")]
    DifferentSectMod {
        /// The section's name.
        name: String,
    },
    /// Two declarations of the same section disagree on section type.
    #[error("Section '{name}' already declared with a different type")]
    DifferentSectKind {
        /// The section's name.
        name: String,
    },
    /// `UNION` was requested for a section type that carries emitted data.
    #[error("'{kind}' sections cannot be unionized, since they can contain code or data")]
    RomUnion {
        /// The section kind's human name.
        kind: &'static str,
    },
    /// A second, different fixed address was given for a section already bound to one.
    #[error("Section '{name}' already has a fixed address (${prev:04x}, requested ${new:04x})")]
    AddressMismatch {
        /// The section's name.
        name: String,
        /// The previously-recorded address.
        prev: u16,
        /// The newly requested address.
        new: u16,
    },
    /// A requested address does not satisfy the section's existing alignment.
    #[error("Section '{name}'s fixed address ${addr:04x} doesn't match its required alignment")]
    AddressAlignMismatch {
        /// The section's name.
        name: String,
        /// The address that failed to satisfy alignment.
        addr: u16,
    },
    /// A requested alignment does not satisfy the section's existing fixed address.
    #[error("Section '{name}'s alignment doesn't match its already fixed address")]
    AlignAddressMismatch {
        /// The section's name.
        name: String,
    },
    /// Two alignment constraints on the same section are mutually incompatible.
    #[error("Section '{name}'s alignment is incompatible with a previous declaration")]
    AlignIncompatible {
        /// The section's name.
        name: String,
    },
    /// Two declarations of the same section disagree on bank number.
    #[error("Section '{name}' already has bank {prev} (requested {new})")]
    DifferentBank {
        /// The section's name.
        name: String,
        /// The previously-recorded bank.
        prev: u32,
        /// The newly requested bank.
        new: u32,
    },
    /// A requested address lies outside its section kind's address range.
    #[error("Address ${addr:04x} is not within '{kind}'s address range (${start:04x}-${end:04x})")]
    AddrOutOfBounds {
        /// The requested address.
        addr: u16,
        /// The section kind's human name.
        kind: &'static str,
        /// Lower bound of the kind's address range.
        start: u16,
        /// Upper bound of the kind's address range.
        end: u16,
    },
    /// A requested bank number lies outside its section kind's bank range.
    #[error("Bank {bank} is not within '{kind}'s bank range ({start}-{end})")]
    BankOutOfRange {
        /// The requested bank number.
        bank: u32,
        /// The section kind's human name.
        kind: &'static str,
        /// Lower bound of the kind's bank range.
        start: u32,
        /// Upper bound of the kind's bank range.
        end: u32,
    },
    /// A bank was given for a section kind that has no banking at all.
    #[error("'{kind}' sections cannot be banked")]
    Unbanked {
        /// The section kind's human name.
        kind: &'static str,
    },
    /// A requested alignment exponent is outside `0..=16`.
    #[error("Alignment must be between 0 and 16 (got {align})")]
    AlignOutOfRange {
        /// The requested (invalid) alignment exponent.
        align: i64,
    },
    /// A requested alignment offset doesn't fit modulo the alignment.
    #[error("Alignment offset {offset} is not between 0 and {modulus}")]
    AlignOfsOutOfRange {
        /// The requested (invalid) offset.
        offset: i64,
        /// `1 << align`, the modulus the offset must fit under.
        modulus: u32,
    },
    /// `N` of the above were accumulated for one redeclaration and are being reported together.
    #[error("{count} error(s) in declaration of section '{name}'")]
    MergeSummary {
        /// The section's name.
        name: String,
        /// How many sub-errors were accumulated.
        count: usize,
    },
    /// A byte/word/long/JR write was attempted with no active section.
    #[error("Cannot emit bytes outside of a SECTION")]
    NoActiveSection,
    /// A byte/word/long write was attempted against a section that carries no data (e.g. `WRAM0`).
    #[error("Section '{name}' cannot contain code or data, only reserve space ({kind})")]
    NotDataSection {
        /// The section's name.
        name: String,
        /// The section kind's human name.
        kind: &'static str,
    },
    /// Advancing the cursor would overflow the 32-bit offset counter.
    #[error("Section offset overflowed")]
    OffsetOverflow,
    /// A `JR` target expression is not a known integer difference from the current PC.
    #[error("JR target must be a constant difference from the current PC")]
    JrNotPcRelative,
    /// A `JR` target is out of the signed 8-bit range.
    #[error("JR target must be between -128 and 127 (got {offset})")]
    JrOutOfRange {
        /// The (out of range) computed offset.
        offset: i32,
    },
    /// `UNION` was requested outside an active section.
    #[error("UNION requires an active section")]
    UnionOutsideSection,
    /// `NEXTU`/`ENDU` was used with no `UNION` open.
    #[error("NEXTU/ENDU without a matching UNION")]
    NoActiveUnion,
    /// `LOAD` was requested with no active has-data parent section.
    #[error("LOAD requires an active section that can contain code or data")]
    LoadRequiresDataSection,
    /// `LOAD` was requested for a section kind that itself carries data.
    #[error("'{kind}' cannot be used as a LOAD section, since it can contain code or data")]
    LoadRom {
        /// The section kind's human name.
        kind: &'static str,
    },
    /// `ENDL` was used with no `LOAD` open.
    #[error("ENDL without a matching LOAD")]
    NoActiveLoad,
    /// `SECTION` named a section already present, suspended, on the section stack.
    #[error("Section '{name}' is already active higher up the PUSHS stack")]
    SectionOnStack {
        /// The section's name.
        name: String,
    },
    /// `SECTION` was issued while a `UNION` was still open.
    #[error("Cannot change sections within a UNION")]
    SectionInsideUnion,
    /// `POPS` was used with an empty section stack.
    #[error("POPS without a matching PUSHS")]
    EmptySectionStack,
    /// `ENDS` was used outside any section.
    #[error("ENDS outside of a SECTION")]
    EndsOutsideSection,
    /// `ENDS` was used while a `UNION` was still open.
    #[error("Cannot end the section within a UNION")]
    EndsInsideUnion,
    /// A fragment-literal was requested while a `LOAD` was active.
    #[error("Cannot start an inline fragment inside a LOAD block")]
    FragmentInsideLoad,
    /// A fragment-literal was requested inside a `UNION`-modifier section.
    #[error("Cannot start an inline fragment inside a UNION section")]
    FragmentInsideUnion,
    /// A binary-file inclusion could not find the named file.
    #[error("Could not find file '{name}' in any include path")]
    IncludeFileNotFound {
        /// The requested file name.
        name: String,
    },
    /// A binary-file inclusion's start position lies beyond end of file.
    #[error("Start position {start} is beyond the end of file '{name}' ({size} bytes)")]
    IncludeStartBeyondEof {
        /// The file name.
        name: String,
        /// The requested start position.
        start: u64,
        /// The file's known size.
        size: u64,
    },
    /// A binary-file inclusion's requested length runs past end of file.
    #[error("Requested {length} bytes from offset {start} of '{name}', which is only {size} bytes")]
    IncludeLengthPastEof {
        /// The file name.
        name: String,
        /// The requested start position.
        start: u64,
        /// The requested length.
        length: u64,
        /// The file's known size.
        size: u64,
    },
    /// A binary-file inclusion hit an I/O error.
    #[error("I/O error reading '{name}': {kind}")]
    IncludeIoError {
        /// The file name.
        name: String,
        /// The underlying error kind.
        kind: std::io::ErrorKind,
    },
    /// The section stack (or a union stack within it) was non-empty at end of assembly.
    #[error("{what} was never closed before the end of the file")]
    UnterminatedAtEof {
        /// What was left open (`"PUSHS"`, `"UNION"`, ...).
        what: &'static str,
    },
    /// `PUSHS` or a fragment-literal nested deeper than the configured limit.
    #[error("Recursion limit ({limit}) exceeded while nesting sections")]
    RecursionLimitExceeded {
        /// The configured `max_recursion_depth`.
        limit: u32,
    },
}

/// Sink for the three severities the engine can raise.
///
/// - A `warning` never changes engine state.
/// - An `error` means the offending operation was skipped (no side
///   effects) and the engine otherwise continues.
/// - A `fatal` is reserved for unrecoverable states; the engine always
///   stops processing the current operation immediately after raising
///   one, but whether the *process* halts is entirely up to the sink.
pub trait Diagnostics {
    /// Report a recoverable error. The caller skipped the operation.
    fn error(&mut self, location: SrcLocation, message: DiagnosticMessage);

    /// Report a warning. Processing continues unchanged. `detail` carries
    /// call-site context (e.g. which directive forced the termination
    /// that's being warned about).
    fn warning(&mut self, location: SrcLocation, kind: WarningKind, detail: &str);

    /// Report an unrecoverable condition. Assembly should halt.
    fn fatal(&mut self, location: SrcLocation, message: DiagnosticMessage);
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnterminatedLoad => "unterminated LOAD block",
            Self::EmptyDataDirective => "data directive with no operands",
            Self::UnmatchedDirective => "directive with no matching opener",
            Self::BackwardsFor => "FOR loop bounds never converge",
            Self::Truncation => "value truncated to fit",
        };
        f.write_str(text)
    }
}
