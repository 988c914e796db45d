//! The Constraint Merger (§4.2): turns a `SECTION` declaration into
//! either a brand-new [`Section`] or a set of constraints folded into
//! an existing one of the same name.
//!
//! Every sub-check below that can fail accumulates into a single error
//! count instead of bailing out on the first one, so a malformed
//! redeclaration is reported once, as a single [`DiagnosticMessage::MergeSummary`],
//! rather than as a cascade of half-consistent complaints.

use crate::{
    diag::{DiagnosticMessage, Diagnostics},
    fstack::SrcLocation,
    registry::{SectionId, SectionRegistry},
    section::{Section, SectionKind, SectionModifier},
};

/// A fully range-checked `SECTION` declaration, ready to be folded into
/// the registry.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// The declared section kind.
    pub kind: SectionKind,
    /// The declared section modifier.
    pub modifier: SectionModifier,
    /// Fixed address, already checked against the kind's address range.
    pub org: Option<u16>,
    /// Bank number, already checked against the kind's bank range.
    pub bank: Option<u32>,
    /// Power-of-two alignment exponent, already checked to be `0..=16`.
    pub align: u8,
    /// Required residue modulo `1 << align`, already normalized into range.
    pub align_offset: u16,
}

/// Bring a raw declaration (as written by the programmer, before range
/// checking) into a [`MergeRequest`], or accumulate one error per
/// malformed field.
///
/// `align == 16` is the "fully pinned" spelling described in §3: it
/// carries no residual wiggle room, so it collapses into an explicit
/// `org` equal to the requested offset.
fn normalize(
    name: &str,
    kind: SectionKind,
    modifier: SectionModifier,
    org: Option<i64>,
    bank: Option<i64>,
    mut align: u8,
    mut align_offset: i64,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> (MergeRequest, usize) {
    let mut errors = 0;
    let info = kind.info();

    if align > 16 {
        diag.error(loc, DiagnosticMessage::AlignOutOfRange { align: align as i64 });
        errors += 1;
        align = 16;
    }

    let mut org = org;
    if align == 16 {
        if let Some(existing) = org {
            if existing != align_offset {
                diag.error(
                    loc,
                    DiagnosticMessage::AddressMismatch {
                        name: name.to_string(),
                        prev: existing as u16,
                        new: align_offset as u16,
                    },
                );
                errors += 1;
            }
        } else {
            org = Some(align_offset);
        }
        align = 0;
        align_offset = 0;
    }

    let modulus: i64 = 1 << align;
    if align_offset < 0 || align_offset >= modulus {
        diag.error(
            loc,
            DiagnosticMessage::AlignOfsOutOfRange {
                offset: align_offset,
                modulus: modulus as u32,
            },
        );
        errors += 1;
        align_offset = align_offset.rem_euclid(modulus);
    }

    let org = org.map(|raw| {
        let addr = raw as u16;
        if raw < i64::from(info.start_addr) || raw > i64::from(info.end_addr()) {
            diag.error(
                loc,
                DiagnosticMessage::AddrOutOfBounds {
                    addr,
                    kind: info.name,
                    start: info.start_addr,
                    end: info.end_addr(),
                },
            );
            errors += 1;
        }
        addr
    });

    let bank = match bank {
        Some(raw) => {
            if !info.is_banked() {
                diag.error(loc, DiagnosticMessage::Unbanked { kind: info.name });
                errors += 1;
                None
            } else if raw < i64::from(info.bank_range.0) || raw > i64::from(info.bank_range.1) {
                diag.error(
                    loc,
                    DiagnosticMessage::BankOutOfRange {
                        bank: raw as u32,
                        kind: info.name,
                        start: info.bank_range.0,
                        end: info.bank_range.1,
                    },
                );
                errors += 1;
                None
            } else {
                Some(raw as u32)
            }
        }
        None => None,
    };

    (
        MergeRequest {
            kind,
            modifier,
            org,
            bank,
            align,
            align_offset: align_offset as u16,
        },
        errors,
    )
}

/// If a kind only ever has one valid bank, a section of that kind
/// always lives there whether or not the programmer said so.
fn infer_default_bank(section: &mut Section) {
    if section.bank.is_none() {
        let (lo, hi) = section.kind.info().bank_range;
        if lo == hi {
            section.bank = Some(lo);
        }
    }
}

/// Fold `req`'s address/alignment constraint into `section`, both
/// already adjusted for "effective" values (identical for `UNION`,
/// shifted by `section.size` for `FRAGMENT`). Returns the number of
/// sub-errors raised.
fn merge_address_and_align(
    section: &mut Section,
    name: &str,
    eff_org: Option<u16>,
    req_align: u8,
    eff_align_offset: u16,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> usize {
    let mut errors = 0;

    if let Some(new_org) = eff_org {
        match section.org {
            Some(prev) if prev != new_org => {
                diag.error(
                    loc,
                    DiagnosticMessage::AddressMismatch {
                        name: name.to_string(),
                        prev,
                        new: new_org,
                    },
                );
                errors += 1;
            }
            Some(_) => {}
            None => {
                if section.align > 0 {
                    let modulus = 1u32 << section.align;
                    let residue = (u32::from(new_org).wrapping_sub(u32::from(section.align_offset))) % modulus;
                    if residue != 0 {
                        diag.error(
                            loc,
                            DiagnosticMessage::AddressAlignMismatch { name: name.to_string(), addr: new_org },
                        );
                        errors += 1;
                    } else {
                        section.org = Some(new_org);
                    }
                } else {
                    section.org = Some(new_org);
                }
            }
        }
    } else if req_align > 0 {
        if let Some(existing_org) = section.org {
            let modulus = 1u32 << req_align;
            let residue = (u32::from(existing_org).wrapping_sub(u32::from(eff_align_offset))) % modulus;
            if residue != 0 {
                diag.error(loc, DiagnosticMessage::AlignAddressMismatch { name: name.to_string() });
                errors += 1;
            }
        } else if section.align > 0 {
            let lo_align = req_align.min(section.align);
            let lo_modulus = 1u32 << lo_align;
            let a = u32::from(section.align_offset) % lo_modulus;
            let b = u32::from(eff_align_offset) % lo_modulus;
            if a != b {
                diag.error(loc, DiagnosticMessage::AlignIncompatible { name: name.to_string() });
                errors += 1;
            } else if req_align > section.align {
                section.align = req_align;
                section.align_offset = eff_align_offset;
            }
        } else {
            section.align = req_align;
            section.align_offset = eff_align_offset;
        }
    }

    errors
}

/// Fold a bank request into `section`. Returns the number of sub-errors
/// raised (0 or 1).
fn merge_bank(section: &mut Section, name: &str, bank: Option<u32>, loc: SrcLocation, diag: &mut dyn Diagnostics) -> usize {
    match bank {
        Some(requested) => match section.bank {
            Some(prev) if prev != requested => {
                diag.error(
                    loc,
                    DiagnosticMessage::DifferentBank { name: name.to_string(), prev, new: requested },
                );
                1
            }
            Some(_) => 0,
            None => {
                section.bank = Some(requested);
                0
            }
        },
        None => 0,
    }
}

/// Fold `req` into an already-existing section of the same name.
/// Returns the number of sub-errors accumulated.
fn merge_into(section: &mut Section, name: &str, req: &MergeRequest, loc: SrcLocation, diag: &mut dyn Diagnostics) -> usize {
    let mut errors = 0;

    if section.kind != req.kind {
        diag.error(loc, DiagnosticMessage::DifferentSectKind { name: name.to_string() });
        errors += 1;
    }
    if section.modifier != req.modifier {
        diag.error(loc, DiagnosticMessage::DifferentSectMod { name: name.to_string() });
        errors += 1;
    }

    if section.kind == req.kind && section.modifier == req.modifier {
        match req.modifier {
            SectionModifier::Normal => {
                diag.error(loc, DiagnosticMessage::SectAlreadyDefined { name: name.to_string() });
                errors += 1;
            }
            SectionModifier::Union => {
                if req.kind.has_data() {
                    diag.error(loc, DiagnosticMessage::RomUnion { kind: req.kind.name() });
                    errors += 1;
                } else {
                    errors += merge_address_and_align(section, name, req.org, req.align, req.align_offset, loc, diag);
                }
            }
            SectionModifier::Fragment => {
                let eff_org = req.org.map(|o| o.wrapping_sub(section.size as u16));
                let eff_align_offset = if req.align > 0 {
                    let modulus = 1u32 << req.align;
                    ((u32::from(req.align_offset).wrapping_sub(section.size)) % modulus) as u16
                } else {
                    0
                };
                errors += merge_address_and_align(section, name, eff_org, req.align, eff_align_offset, loc, diag);
            }
        }
    }

    errors += merge_bank(section, name, req.bank, loc, diag);
    errors
}

/// Declare or redeclare a section, folding range validation and
/// (if the name already exists) constraint merging into one
/// accumulated-errors-then-fatal-summary pass.
#[allow(clippy::too_many_arguments)]
pub fn declare_section(
    registry: &mut SectionRegistry,
    name: &str,
    kind: SectionKind,
    modifier: SectionModifier,
    org: Option<i64>,
    bank: Option<i64>,
    align: u8,
    align_offset: i64,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<SectionId, ()> {
    let (req, mut errors) = normalize(name, kind, modifier, org, bank, align, align_offset, loc, diag);

    let id = match registry.find(name) {
        None => {
            let mut section = Section::new(name.to_string(), req.kind, req.modifier, loc);
            section.org = req.org;
            section.bank = req.bank;
            section.align = req.align;
            section.align_offset = req.align_offset;
            infer_default_bank(&mut section);
            registry.insert_new(section)
        }
        Some(id) => {
            errors += merge_into(registry.get_mut(id), name, &req, loc, diag);
            infer_default_bank(registry.get_mut(id));
            id
        }
    };

    if errors > 0 {
        diag.fatal(loc, DiagnosticMessage::MergeSummary { name: name.to_string(), count: errors });
        return Err(());
    }

    Ok(id)
}
