//! The Section Registry (§4.1): a keyed, ordered collection of every
//! section ever declared.

use std::collections::HashMap;

use crate::section::Section;

/// A stable handle into a [`SectionRegistry`]; just the section's index
/// in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub(crate) usize);

/// All sections declared so far, indexed by name and kept in a stable
/// declaration order.
///
/// Fragment-literal siblings (§4.5.5) are appended to the order but
/// share their parent's name; `by_name` always resolves to the *first*
/// such section (the "head"), and same-named siblings are threaded
/// together via [`Section::next_sibling`] — the "(head,
/// next_sibling_index)" chain Design Notes §9 calls for.
#[derive(Debug, Default)]
pub struct SectionRegistry {
    order: Vec<Section>,
    by_name: HashMap<String, usize>,
}

impl SectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a section by name. Returns the head of its sibling
    /// chain if any fragment-literal siblings exist.
    pub fn find(&self, name: &str) -> Option<SectionId> {
        self.by_name.get(name).map(|&idx| SectionId(idx))
    }

    /// Borrow a section by id.
    pub fn get(&self, id: SectionId) -> &Section {
        &self.order[id.0]
    }

    /// Mutably borrow a section by id.
    pub fn get_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.order[id.0]
    }

    /// Insert a brand-new, not-previously-seen section and return its id.
    pub fn insert_new(&mut self, section: Section) -> SectionId {
        let idx = self.order.len();
        self.by_name.entry(section.name.clone()).or_insert(idx);
        self.order.push(section);
        SectionId(idx)
    }

    /// Insert an anonymous sibling that shares `parent`'s name (used by
    /// fragment-literal injection, §4.5.5). The new section is chained
    /// onto the end of `parent`'s sibling list.
    pub fn insert_sibling(&mut self, parent: SectionId, mut section: Section) -> SectionId {
        section.name = self.order[parent.0].name.clone();

        let idx = self.order.len();
        let mut tail = parent;
        while let Some(next) = self.order[tail.0].next_sibling {
            tail = SectionId(next);
        }
        self.order[tail.0].next_sibling = Some(idx);

        self.order.push(section);
        SectionId(idx)
    }

    /// Number of sections (including fragment-literal siblings).
    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Visit every section in declaration order.
    pub fn for_each(&self, mut callback: impl FnMut(SectionId, &Section)) {
        for (idx, section) in self.order.iter().enumerate() {
            callback(SectionId(idx), section);
        }
    }

    /// Every section whose accumulated size exceeds its kind's maximum.
    pub fn check_sizes(&self) -> Vec<SectionId> {
        self.order
            .iter()
            .enumerate()
            .filter(|(_, section)| section.size > u32::from(section.kind.info().max_size))
            .map(|(idx, _)| SectionId(idx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fstack::{SrcLocationArena, SrcLocationRecord},
        section::{SectionKind, SectionModifier},
    };

    fn loc(arena: &mut SrcLocationArena) -> crate::fstack::SrcLocation {
        arena.push(SrcLocationRecord::File {
            name: "t.asm".into(),
            line: 1,
            parent: None,
        })
    }

    #[test]
    fn find_resolves_to_first_sibling() {
        let mut arena = SrcLocationArena::new();
        let mut registry = SectionRegistry::new();
        let parent = registry.insert_new(Section::new(
            "Code".into(),
            SectionKind::Rom0,
            SectionModifier::Fragment,
            loc(&mut arena),
        ));
        let sibling = registry.insert_sibling(
            parent,
            Section::new(
                "anon".into(),
                SectionKind::Rom0,
                SectionModifier::Fragment,
                loc(&mut arena),
            ),
        );

        assert_eq!(registry.find("Code"), Some(parent));
        assert_eq!(registry.get(sibling).name, "Code");
        assert_eq!(registry.get(parent).next_sibling, Some(sibling.0));
    }

    #[test]
    fn check_sizes_flags_overflow() {
        let mut arena = SrcLocationArena::new();
        let mut registry = SectionRegistry::new();
        let id = registry.insert_new(Section::new(
            "Huge".into(),
            SectionKind::Hram,
            SectionModifier::Normal,
            loc(&mut arena),
        ));
        registry.get_mut(id).size = 0x1000;

        assert_eq!(registry.check_sizes(), vec![id]);
    }
}
