//! Cross-reference resolution.
//!
//! Each xref section of the file becomes one [`RevisionFragment`]. The
//! resolver walks the `Prev` chain from the `startxref` offset and merges
//! the fragments oldest to newest, so later revisions override earlier
//! ones per object number and per trailer key.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{PdfError, Result};
use crate::model::object::{Dictionary, ObjectKey, Value};

/// Where an in-use object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Byte offset of `N G obj` in the file.
    Offset { offset: usize, generation: u16 },
    /// Index inside an object stream.
    Compressed { container: ObjectKey, index: u32 },
}

impl Location {
    /// Generation the object is stored under. Compressed objects are always 0.
    pub const fn generation(&self) -> u16 {
        match self {
            Self::Offset { generation, .. } => *generation,
            Self::Compressed { .. } => 0,
        }
    }
}

/// One row of an xref section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    InUse(Location),
    Free { next: u32, generation: u16 },
}

/// A single revision's partial table and trailer.
#[derive(Debug, Clone, Default)]
pub struct RevisionFragment {
    pub offset: usize,
    pub entries: BTreeMap<u32, XrefEntry>,
    pub trailer: Option<Dictionary>,
}

impl RevisionFragment {
    /// The trailer's `/Prev`, when it is a usable offset.
    pub fn prev(&self) -> Option<usize> {
        match self.trailer.as_ref()?.get("Prev")? {
            Value::Int(n) => usize::try_from(*n).ok(),
            _ => None,
        }
    }
}

/// Final object table plus merged trailer.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTable {
    locations: FxHashMap<ObjectKey, Location>,
    by_number: FxHashMap<u32, ObjectKey>,
    trailer: Dictionary,
}

impl ResolvedTable {
    pub fn get(&self, key: ObjectKey) -> Option<Location> {
        self.locations.get(&key).copied()
    }

    /// The live key for an object number, whatever its generation.
    pub fn key_for_number(&self, number: u32) -> Option<ObjectKey> {
        self.by_number.get(&number).copied()
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.locations.contains_key(&key)
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All live keys in ascending order.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<_> = self.locations.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &Location)> {
        self.locations.iter()
    }

    pub(crate) fn insert(&mut self, key: ObjectKey, location: Location) {
        self.by_number.insert(key.number, key);
        self.locations.insert(key, location);
    }
}

/// Collects fragments, then merges them once.
#[derive(Debug, Default)]
pub struct XrefResolver {
    fragments: BTreeMap<usize, RevisionFragment>,
    resolved: bool,
}

impl XrefResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the section found at `offset`. A second section at the
    /// same offset replaces the first.
    pub fn add_fragment(
        &mut self,
        offset: usize,
        entries: impl IntoIterator<Item = (u32, XrefEntry)>,
        trailer: Option<Dictionary>,
    ) {
        let fragment = RevisionFragment {
            offset,
            entries: entries.into_iter().collect(),
            trailer,
        };
        tracing::trace!(
            offset,
            entries = fragment.entries.len(),
            "registered xref fragment"
        );
        self.fragments.insert(offset, fragment);
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.fragments.contains_key(&offset)
    }

    pub fn fragment(&self, offset: usize) -> Option<&RevisionFragment> {
        self.fragments.get(&offset)
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Merges the fragments reachable from `start_offset`.
    ///
    /// When no fragment sits at `start_offset`, every fragment is merged in
    /// ascending offset order instead. Consumes the fragments; a second
    /// call fails with [`PdfError::XrefAlreadyResolved`].
    pub fn resolve(
        &mut self,
        start_offset: usize,
        diags: &mut Diagnostics,
    ) -> Result<ResolvedTable> {
        if self.resolved {
            return Err(PdfError::XrefAlreadyResolved);
        }
        if self.fragments.is_empty() {
            return Err(PdfError::NoValidXRef);
        }
        self.resolved = true;

        let order = if self.fragments.contains_key(&start_offset) {
            let mut chain = self.walk_chain(start_offset, diags);
            chain.reverse();
            chain
        } else {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::XrefPrimaryMissing,
                    format!(
                        "no xref section at startxref offset {start_offset}; merging all {} sections",
                        self.fragments.len()
                    ),
                )
                .at(start_offset),
            );
            self.fragments.keys().copied().collect()
        };

        let fragments = std::mem::take(&mut self.fragments);
        let table = merge(order.iter().filter_map(|off| fragments.get(off)));
        tracing::debug!(
            sections = order.len(),
            objects = table.len(),
            "resolved cross-reference table"
        );
        Ok(table)
    }

    /// Offsets from `start` following `Prev`, newest first.
    fn walk_chain(&self, start: usize, diags: &mut Diagnostics) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut visited = FxHashSet::default();
        let mut current = Some(start);

        while let Some(offset) = current {
            if !visited.insert(offset) {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::XrefChainBroken,
                        format!("Prev loops back to xref section at {offset}"),
                    )
                    .at(offset),
                );
                break;
            }
            let Some(fragment) = self.fragments.get(&offset) else {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::XrefChainBroken,
                        format!("Prev points at {offset}, where no xref section was found"),
                    )
                    .at(offset),
                );
                break;
            };
            chain.push(offset);
            if chain.len() >= self.fragments.len() {
                break;
            }
            current = fragment.prev();
        }

        chain
    }
}

/// Right-biased merge of fragments given oldest first. Free entries
/// override earlier in-use entries for the same object number and are
/// dropped from the result.
fn merge<'a>(fragments: impl Iterator<Item = &'a RevisionFragment>) -> ResolvedTable {
    let mut entries: BTreeMap<u32, XrefEntry> = BTreeMap::new();
    let mut trailer = Dictionary::new();

    for fragment in fragments {
        if let Some(t) = &fragment.trailer {
            for (k, v) in t {
                trailer.insert(k.clone(), v.clone());
            }
        }
        entries.extend(fragment.entries.iter().map(|(n, e)| (*n, *e)));
    }

    let mut table = ResolvedTable {
        trailer,
        ..ResolvedTable::default()
    };
    for (number, entry) in entries {
        if let XrefEntry::InUse(location) = entry {
            table.insert(ObjectKey::new(number, location.generation()), location);
        }
    }
    table
}
