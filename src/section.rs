//! The data model (§3): section kinds, modifiers, the `Section` entity
//! itself, and pending relocations (`Patch`).

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};

use crate::{expr::Expression, fstack::SrcLocation};

bitflags! {
    /// Small capability bitset per [`SectionKind`] — section-*kind*
    /// capabilities rather than a per-instance attribute set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KindFlags: u8 {
        /// The kind carries an emitted byte buffer (ROM0/ROMX only).
        const HAS_DATA = 0b0000_0001;
        /// The kind supports more than one bank.
        const BANKED   = 0b0000_0010;
    }
}

/// The closed set of Game Boy memory regions a section can target (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SectionKind {
    /// Fixed-bank ROM, always mapped at `$0000`.
    Rom0,
    /// Switchable-bank ROM, mapped at `$4000`.
    Romx,
    /// Video RAM.
    Vram,
    /// Cartridge RAM.
    Sram,
    /// Fixed-bank work RAM.
    Wram0,
    /// Switchable-bank work RAM (CGB only).
    Wramx,
    /// Object attribute memory (sprite table).
    Oam,
    /// High RAM (zero-page).
    Hram,
}

/// Static, per-kind metadata: everything the Constraint Merger and
/// Cursor & Emitter need to know about a kind without an instance.
#[derive(Debug, Clone, Copy)]
pub struct KindInfo {
    /// Human-readable name, used in diagnostics.
    pub name: &'static str,
    /// First address a section of this kind may occupy.
    pub start_addr: u16,
    /// Number of addressable bytes a section of this kind may occupy.
    pub max_size: u16,
    /// Inclusive range of valid bank numbers.
    pub bank_range: (u32, u32),
    /// Capability flags.
    pub flags: KindFlags,
}

impl KindInfo {
    /// Whether this kind carries an emitted byte buffer.
    pub const fn has_data(&self) -> bool {
        self.flags.contains(KindFlags::HAS_DATA)
    }

    /// Whether this kind supports more than one bank.
    pub const fn is_banked(&self) -> bool {
        self.flags.contains(KindFlags::BANKED)
    }

    /// Last valid address (`start_addr + max_size - 1`).
    pub const fn end_addr(&self) -> u16 {
        self.start_addr + self.max_size - 1
    }
}

impl SectionKind {
    /// Static metadata for this kind.
    pub const fn info(self) -> KindInfo {
        match self {
            Self::Rom0 => KindInfo {
                name: "ROM0",
                start_addr: 0x0000,
                max_size: 0x4000,
                bank_range: (0, 0),
                flags: KindFlags::HAS_DATA,
            },
            Self::Romx => KindInfo {
                name: "ROMX",
                start_addr: 0x4000,
                max_size: 0x4000,
                bank_range: (1, 511),
                flags: KindFlags::from_bits_truncate(
                    KindFlags::HAS_DATA.bits() | KindFlags::BANKED.bits(),
                ),
            },
            Self::Vram => KindInfo {
                name: "VRAM",
                start_addr: 0x8000,
                max_size: 0x2000,
                bank_range: (0, 1),
                flags: KindFlags::BANKED,
            },
            Self::Sram => KindInfo {
                name: "SRAM",
                start_addr: 0xA000,
                max_size: 0x2000,
                bank_range: (0, 255),
                flags: KindFlags::BANKED,
            },
            Self::Wram0 => KindInfo {
                name: "WRAM0",
                start_addr: 0xC000,
                max_size: 0x1000,
                bank_range: (0, 0),
                flags: KindFlags::empty(),
            },
            Self::Wramx => KindInfo {
                name: "WRAMX",
                start_addr: 0xD000,
                max_size: 0x1000,
                bank_range: (1, 7),
                flags: KindFlags::BANKED,
            },
            Self::Oam => KindInfo {
                name: "OAM",
                start_addr: 0xFE00,
                max_size: 0x00A0,
                bank_range: (0, 0),
                flags: KindFlags::empty(),
            },
            Self::Hram => KindInfo {
                name: "HRAM",
                start_addr: 0xFF80,
                max_size: 0x007F,
                bank_range: (0, 0),
                flags: KindFlags::empty(),
            },
        }
    }

    /// Shorthand for `self.info().has_data()`.
    pub const fn has_data(self) -> bool {
        self.info().has_data()
    }

    /// Shorthand for `self.info().name`.
    pub const fn name(self) -> &'static str {
        self.info().name
    }
}

/// How a `SECTION` declaration relates to any existing section of the
/// same name (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionModifier {
    /// Ordinary section; redeclaring the same name is an error.
    Normal,
    /// Members share a start offset; the section's size is their max.
    Union,
    /// Appends to an existing section of the same name.
    Fragment,
}

/// Width and encoding of a pending relocation (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum PatchKind {
    /// A single byte.
    Byte = 0,
    /// A little-endian 16-bit word.
    Word = 1,
    /// A little-endian 32-bit long.
    Long = 2,
    /// A signed 8-bit PC-relative displacement.
    Jr = 3,
}

impl PatchKind {
    /// How many bytes this patch kind occupies in the output.
    pub const fn width(self) -> usize {
        match self {
            Self::Byte | Self::Jr => 1,
            Self::Word => 2,
            Self::Long => 4,
        }
    }
}

/// A pending relocation (§3): recorded whenever an emitted value isn't
/// a known integer at the time it's written.
#[derive(Debug)]
pub struct Patch {
    /// The patch's width/encoding.
    pub kind: PatchKind,
    /// The (unresolved) expression to evaluate at link time.
    pub expr: Box<dyn Expression>,
    /// Byte offset into the owning section's `data` where the
    /// placeholder zero bytes begin.
    pub output_offset: usize,
    /// Where this directive was written.
    pub src_location: SrcLocation,
}

/// A named, typed region of target memory (§3).
#[derive(Debug)]
pub struct Section {
    /// The section's name. Unique for `NORMAL`/`UNION`; shared between
    /// `FRAGMENT` siblings and fragment-literal siblings.
    pub name: String,
    /// The section's kind.
    pub kind: SectionKind,
    /// How this section relates to same-named siblings.
    pub modifier: SectionModifier,
    /// Highest cursor offset ever reached within this section (the
    /// union-max rollup when `modifier == Union`).
    pub size: u32,
    /// Fixed address, if one was given or inferred.
    pub org: Option<u16>,
    /// Bank number, if one was given or inferred.
    pub bank: Option<u32>,
    /// Power-of-two alignment exponent, `0..16`. `0` means unconstrained.
    pub align: u8,
    /// Required residue modulo `1 << align`.
    pub align_offset: u16,
    /// Emitted bytes, sized to `kind.info().max_size`. Only meaningful
    /// when `kind.has_data()`.
    pub data: Vec<u8>,
    /// Pending relocations, in the order they were emitted.
    pub patches: Vec<Patch>,
    /// Where this section was first declared.
    pub src_location: SrcLocation,
    /// Index of the next same-named sibling in declaration order, if
    /// any (fragment-literal chaining; see `crate::registry`).
    pub next_sibling: Option<usize>,
}

impl Section {
    /// Create a freshly declared section with no data, no constraints,
    /// and no patches.
    pub fn new(name: String, kind: SectionKind, modifier: SectionModifier, src_location: SrcLocation) -> Self {
        let data = if kind.has_data() {
            vec![0; kind.info().max_size as usize]
        } else {
            Vec::new()
        };
        Self {
            name,
            kind,
            modifier,
            size: 0,
            org: None,
            bank: None,
            align: 0,
            align_offset: 0,
            data,
            patches: Vec::new(),
            src_location,
            next_sibling: None,
        }
    }

    /// Raise `self.size` to at least `offset`, never decreasing it.
    pub fn bump_size(&mut self, offset: u32) {
        if offset > self.size {
            self.size = offset;
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{FromPrimitive, ToPrimitive};

    #[test]
    fn romx_info_matches_memory_map() {
        let info = SectionKind::Romx.info();
        assert_eq!(info.start_addr, 0x4000);
        assert_eq!(info.end_addr(), 0x7FFF);
        assert!(info.has_data());
        assert!(info.is_banked());
        assert_eq!(info.bank_range, (1, 511));
    }

    #[test]
    fn wram0_has_no_data_and_single_bank() {
        let info = SectionKind::Wram0.info();
        assert!(!info.has_data());
        assert!(!info.is_banked());
        assert_eq!(info.bank_range, (0, 0));
    }

    #[test]
    fn patch_kind_widths() {
        assert_eq!(PatchKind::Byte.width(), 1);
        assert_eq!(PatchKind::Word.width(), 2);
        assert_eq!(PatchKind::Long.width(), 4);
        assert_eq!(PatchKind::Jr.width(), 1);
    }

    #[test]
    fn patch_kind_roundtrips_through_primitive() {
        for kind in [PatchKind::Byte, PatchKind::Word, PatchKind::Long, PatchKind::Jr] {
            let raw = kind.to_u8().unwrap();
            assert_eq!(PatchKind::from_u8(raw), Some(kind));
        }
    }
}
