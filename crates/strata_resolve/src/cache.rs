//! The type resolution cache.
//!
//! Every resolved name has one cache entry. An entry lists the layers
//! known to define the name, highest position first, and records
//! `from_position`: the lowest stack position searched so far. Searches
//! always start at the top of the stack, so an entry covers every position
//! from `from_position` upward and a request at position `p` is answered
//! without touching the stack once `from_position <= p`.
//!
//! Locating a candidate only consults a layer's source index; the file is
//! parsed through the [`DeclLoader`] when a request first selects it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strata_common::{Ident, Interner, LayerId};
use strata_layer::{Layer, LayerStack};
use strata_source::SourceEntry;
use tracing::{debug, trace};

use crate::arena::{Arena, DeclId};
use crate::compiled::CompiledIndex;
use crate::decl::{DeclLoader, Resolved, TypeDecl};

/// A layer known to define a cached name.
#[derive(Debug, Clone)]
struct Candidate {
    layer: LayerId,
    position: usize,
    source: SourceEntry,
    decl: Option<DeclId>,
    failed: bool,
}

#[derive(Debug, Default)]
struct CacheEntry {
    /// Descending position.
    candidates: Vec<Candidate>,
    from_position: Option<usize>,
}

impl CacheEntry {
    fn covers(&self, position: usize) -> bool {
        self.from_position.is_some_and(|from| from <= position)
    }

    fn candidate_for(&self, position: usize) -> Option<usize> {
        self.candidates.iter().position(|c| c.position <= position)
    }

    fn is_confirmed_absent(&self) -> bool {
        self.from_position == Some(0) && self.candidates.is_empty()
    }
}

/// Counters for observing cache behaviour.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Stack scans performed.
    pub scans: u64,
    /// Declarations parsed through the loader.
    pub loads: u64,
    /// Requests answered from an entry without scanning.
    pub hits: u64,
}

/// Memoized name resolution over one layer stack.
pub struct TypeCache {
    interner: Arc<Interner>,
    decls: Arena<TypeDecl>,
    entries: HashMap<Ident, CacheEntry>,
    compiled: CompiledIndex,
    pending_changes: HashSet<Ident>,
    full_build_done: bool,
    stats: CacheStats,
}

impl TypeCache {
    /// Creates an empty cache keyed through `interner`.
    pub fn new(interner: Arc<Interner>) -> Self {
        Self {
            interner,
            decls: Arena::new(),
            entries: HashMap::new(),
            compiled: CompiledIndex::new(),
            pending_changes: HashSet::new(),
            full_build_done: false,
            stats: CacheStats::default(),
        }
    }

    /// Resolves `name` as seen from the layer `from`, or from the top of the
    /// stack when `from` is `None`.
    ///
    /// Returns the declaration of the highest layer at or below the
    /// reference position that defines the name. When no such layer exists,
    /// a compiled artifact may answer instead. `None` means the name
    /// is absent from that point of view, or its source failed to parse.
    pub fn resolve(
        &mut self,
        stack: &LayerStack,
        loader: &mut dyn DeclLoader,
        name: &str,
        from: Option<LayerId>,
    ) -> Option<Resolved> {
        let position = reference_position(stack, from)?;
        let ident = self.interner.get_or_intern(name);

        let covered = self.entries.get(&ident).is_some_and(|e| e.covers(position));
        if covered {
            self.stats.hits += 1;
        } else {
            self.scan(stack, ident, name, position);
        }

        let index = self.entries.get(&ident)?.candidate_for(position);
        match index {
            Some(i) => self.load_candidate(ident, i, loader).map(Resolved::Source),
            None => {
                let resolved = self.compiled_fallback(stack, ident, name, position)?;
                self.compiled.mark_loaded(ident);
                Some(resolved)
            }
        }
    }

    /// Answers a request from cached state alone.
    ///
    /// Returns `None` when the answer needs a scan or a parse, in which case
    /// the caller retries through [`resolve`](Self::resolve) with exclusive
    /// access. `Some(None)` is a cached absence.
    pub fn peek(&self, stack: &LayerStack, name: &str, from: Option<LayerId>) -> Option<Option<Resolved>> {
        let position = reference_position(stack, from)?;
        let ident = self.interner.get(name)?;
        let entry = self.entries.get(&ident)?;
        if !entry.covers(position) {
            return None;
        }
        match entry.candidate_for(position) {
            Some(i) => {
                let candidate = &entry.candidates[i];
                match candidate.decl {
                    Some(id) => Some(Some(Resolved::Source(id))),
                    None if candidate.failed => Some(None),
                    None => None,
                }
            }
            None => match self.compiled_fallback(stack, ident, name, position) {
                // The first hand-out of an artifact is recorded, which needs
                // exclusive access.
                Some(Resolved::Compiled(_)) if !self.compiled.is_loaded(ident) => None,
                other => Some(other),
            },
        }
    }

    fn scan(&mut self, stack: &LayerStack, ident: Ident, name: &str, position: usize) {
        self.stats.scans += 1;
        let entry = self.entries.entry(ident).or_default();
        let start = match entry.from_position {
            Some(0) => return,
            Some(from) => from - 1,
            None => stack.len() - 1,
        };
        trace!(name, start, position, "scanning layer stack");
        for pos in (0..=start).rev() {
            let Some(layer) = stack.at(pos) else { continue };
            entry.from_position = Some(pos);
            if let Some(source) = layer.src_index.find_type(name) {
                entry.candidates.push(Candidate {
                    layer: layer.id,
                    position: pos,
                    source: source.clone(),
                    decl: None,
                    failed: false,
                });
                if pos <= position {
                    return;
                }
            }
        }
        entry.from_position = Some(0);
    }

    fn load_candidate(
        &mut self,
        ident: Ident,
        index: usize,
        loader: &mut dyn DeclLoader,
    ) -> Option<DeclId> {
        let candidate = self.entries.get_mut(&ident)?.candidates.get_mut(index)?;
        if let Some(id) = candidate.decl {
            return Some(id);
        }
        if candidate.failed {
            return None;
        }
        self.stats.loads += 1;
        match loader.load(&candidate.source, candidate.position) {
            Some(decl) => {
                let id = self.decls.alloc(decl);
                candidate.decl = Some(id);
                Some(id)
            }
            None => {
                candidate.failed = true;
                None
            }
        }
    }

    /// The compiled artifact for `name`, if it may stand in for source.
    ///
    /// A compiled artifact answers only when a full build has completed, the
    /// name has no pending change in the current pass, the defining layer is
    /// compiled and at or below the reference position, and no dynamic layer
    /// above the defining layer overrides the name.
    fn compiled_fallback(
        &self,
        stack: &LayerStack,
        ident: Ident,
        name: &str,
        position: usize,
    ) -> Option<Resolved> {
        if !self.full_build_done || self.pending_changes.contains(&ident) {
            return None;
        }
        let id = self.compiled.lookup(ident)?;
        let artifact = self.compiled.get(id)?;
        if let Some(defining) = artifact.defining_layer {
            let layer = stack.get(defining)?;
            if layer.dynamic || layer.position > position {
                return None;
            }
            let shadowed = stack.layers().any(|l| {
                l.dynamic && l.position > layer.position && l.src_index.find_type(name).is_some()
            });
            if shadowed {
                return None;
            }
        }
        Some(Resolved::Compiled(id))
    }

    /// Returns the declaration for `id`.
    pub fn decl(&self, id: DeclId) -> Option<&TypeDecl> {
        self.decls.get(id)
    }

    /// Marks a declaration as having gone through output generation.
    pub fn mark_transformed(&mut self, id: DeclId) {
        if let Some(decl) = self.decls.get_mut(id) {
            decl.transformed = true;
        }
    }

    /// Disposes every transformed declaration, keeping the located
    /// candidates so the next request only re-parses. Declarations loaded
    /// purely for resolution are kept. Returns the number evicted.
    pub fn evict_transformed(&mut self) -> usize {
        let mut evicted = 0;
        for entry in self.entries.values_mut() {
            for candidate in &mut entry.candidates {
                let Some(id) = candidate.decl else { continue };
                if self.decls.get(id).is_some_and(|d| d.transformed) {
                    self.decls.dispose(id);
                    candidate.decl = None;
                    evicted += 1;
                }
            }
        }
        if evicted > 0 {
            debug!(evicted, "evicted transformed declarations");
        }
        evicted
    }

    /// Forgets everything cached for `name`, e.g. after its source file was
    /// added, removed, or changed.
    pub fn invalidate_name(&mut self, name: &str) {
        let Some(ident) = self.interner.get(name) else { return };
        if let Some(entry) = self.entries.remove(&ident) {
            dispose_entry(&mut self.decls, entry);
        }
    }

    /// Adjusts the cache for a layer just inserted into `stack`.
    ///
    /// Entries for names the new layer defines are evicted. Every other
    /// entry stays valid; positions at or above the insertion point shift up
    /// by one.
    pub fn layer_inserted(&mut self, stack: &LayerStack, id: LayerId) {
        let Some(layer) = stack.get(id) else { return };
        let inserted_at = layer.position;
        for source in layer.src_index.entries() {
            let Some(ident) = self.interner.get(source.type_name.as_str()) else { continue };
            if let Some(entry) = self.entries.remove(&ident) {
                dispose_entry(&mut self.decls, entry);
            }
        }
        for entry in self.entries.values_mut() {
            for candidate in &mut entry.candidates {
                if candidate.position >= inserted_at {
                    candidate.position += 1;
                }
            }
            if let Some(from) = entry.from_position.as_mut() {
                if *from >= inserted_at {
                    *from += 1;
                }
            }
        }
    }

    /// Adjusts the cache for a layer removed from the stack. `layer` is the
    /// value returned by [`LayerStack::remove`] and still carries its old
    /// position.
    ///
    /// Entries holding a declaration from the layer, or whose search passed
    /// through its position, are purged. Positions above it shift down.
    pub fn layer_removed(&mut self, layer: &Layer) {
        let removed_at = layer.position;
        let mut purged = Vec::new();
        for (ident, entry) in &self.entries {
            let searched_through = entry.covers(removed_at);
            let defined_there = entry.candidates.iter().any(|c| c.layer == layer.id);
            if searched_through || defined_there {
                purged.push(*ident);
            }
        }
        for ident in &purged {
            if let Some(entry) = self.entries.remove(ident) {
                dispose_entry(&mut self.decls, entry);
            }
        }
        for entry in self.entries.values_mut() {
            for candidate in &mut entry.candidates {
                if candidate.position > removed_at {
                    candidate.position -= 1;
                }
            }
            if let Some(from) = entry.from_position.as_mut() {
                if *from > removed_at {
                    *from -= 1;
                }
            }
        }
        self.compiled.clear_layer(layer.id);
        debug!(layer = %layer.name, purged = purged.len(), "purged resolution cache for removed layer");
    }

    /// Records that `name` changes in the current build pass. Pending names
    /// never resolve to compiled artifacts.
    pub fn mark_pending(&mut self, name: &str) {
        let ident = self.interner.get_or_intern(name);
        self.pending_changes.insert(ident);
    }

    /// Clears the pending-change set at the end of a pass.
    pub fn clear_pending(&mut self) {
        self.pending_changes.clear();
    }

    /// Records whether a full build has completed.
    pub fn set_full_build_done(&mut self, done: bool) {
        self.full_build_done = done;
    }

    /// Returns `true` once a full build has completed.
    pub fn full_build_done(&self) -> bool {
        self.full_build_done
    }

    /// Returns `true` if `name` is cached as absent everywhere in the stack.
    pub fn is_confirmed_absent(&self, name: &str) -> bool {
        self.interner
            .get(name)
            .and_then(|ident| self.entries.get(&ident))
            .is_some_and(CacheEntry::is_confirmed_absent)
    }

    /// Returns `true` if the compiled form of `name` was handed out.
    pub fn is_compiled_loaded(&self, name: &str) -> bool {
        self.interner
            .get(name)
            .is_some_and(|ident| self.compiled.is_loaded(ident))
    }

    /// The compiled artifact index.
    pub fn compiled(&self) -> &CompiledIndex {
        &self.compiled
    }

    /// Mutable access to the compiled artifact index.
    pub fn compiled_mut(&mut self) -> &mut CompiledIndex {
        &mut self.compiled
    }

    /// The interner names are keyed by.
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Number of cached names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live declarations.
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Counters since creation.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

fn dispose_entry(decls: &mut Arena<TypeDecl>, entry: CacheEntry) {
    for candidate in entry.candidates {
        if let Some(id) = candidate.decl {
            decls.dispose(id);
        }
    }
}

fn reference_position(stack: &LayerStack, from: Option<LayerId>) -> Option<usize> {
    match from {
        Some(id) if stack.is_active(id) => stack.get(id).map(|l| l.position),
        Some(_) => None,
        None => stack.len().checked_sub(1),
    }
}
