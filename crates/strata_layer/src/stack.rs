//! The ordered layer stack.

use std::collections::HashMap;
use std::ops::Index;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use strata_common::LayerId;

use crate::layer::Layer;

/// The active and inactive layers of one engine, plus lookup keys.
///
/// Layers live in an arena indexed by [`LayerId`]. Active layers form an
/// ordered sequence whose compiled prefix precedes a contiguous dynamic
/// suffix starting at [`first_dynamic`](Self::first_dynamic). Inactive layers
/// are known (for tooling) but never built.
///
/// `extends` relations are kept in a graph so transitive queries do not walk
/// descriptor lists.
#[derive(Debug, Default)]
pub struct LayerStack {
    arena: Vec<Option<Layer>>,
    active: Vec<LayerId>,
    inactive: Vec<LayerId>,
    first_dynamic: Option<usize>,
    keys: HashMap<String, LayerId>,
    graph: DiGraphMap<LayerId, ()>,
}

impl LayerStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fresh id. The slot stays empty until a layer is stored.
    pub fn reserve(&mut self) -> LayerId {
        let id = LayerId::from_raw(self.arena.len() as u32);
        self.arena.push(None);
        id
    }

    /// Stores `layer` in its reserved slot and inserts it into the active
    /// sequence at `pos`, renumbering every later layer.
    pub fn insert_at(&mut self, mut layer: Layer, pos: usize) {
        let id = layer.id;
        let pos = pos.min(self.active.len());
        layer.position = pos;
        self.link(&layer);
        self.arena[id.index()] = Some(layer);
        self.active.insert(pos, id);
        self.renumber(pos);
    }

    /// Stores `layer` without placing it in the active sequence.
    pub fn add_inactive(&mut self, layer: Layer) {
        let id = layer.id;
        self.link(&layer);
        self.arena[id.index()] = Some(layer);
        self.inactive.push(id);
    }

    fn link(&mut self, layer: &Layer) {
        self.graph.add_node(layer.id);
        for &base in &layer.base_ids {
            self.graph.add_edge(layer.id, base, ());
        }
    }

    fn renumber(&mut self, from: usize) {
        for pos in from..self.active.len() {
            let id = self.active[pos];
            if let Some(layer) = self.arena[id.index()].as_mut() {
                layer.position = pos;
            }
        }
        self.first_dynamic = self
            .active
            .iter()
            .position(|id| self.arena[id.index()].as_ref().is_some_and(|l| l.dynamic));
    }

    /// Registers a lookup key. Returns the layer already holding the key if
    /// it belongs to a different layer, leaving the existing mapping intact.
    pub fn register_key(&mut self, key: &str, id: LayerId) -> Option<LayerId> {
        match self.keys.get(key) {
            Some(&existing) if existing != id => Some(existing),
            Some(_) => None,
            None => {
                self.keys.insert(key.to_string(), id);
                None
            }
        }
    }

    /// Looks up a layer by short name, dotted name, or model type name.
    pub fn find(&self, key: &str) -> Option<LayerId> {
        self.keys.get(key).copied()
    }

    /// Returns the layer for `id`, or `None` if it was disposed.
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.arena.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// Mutable access to a live layer.
    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.arena.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    /// Active layer ids in ascending position.
    pub fn active_ids(&self) -> &[LayerId] {
        &self.active
    }

    /// Inactive layer ids in discovery order.
    pub fn inactive_ids(&self) -> &[LayerId] {
        &self.inactive
    }

    /// Active layers in ascending position.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.active.iter().filter_map(|id| self.get(*id))
    }

    /// The active layer at `position`.
    pub fn at(&self, position: usize) -> Option<&Layer> {
        self.active.get(position).and_then(|id| self.get(*id))
    }

    /// Number of active layers.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns `true` if no layer is active.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Returns `true` if `id` is in the active sequence.
    pub fn is_active(&self, id: LayerId) -> bool {
        self.active.contains(&id)
    }

    /// Position of the first dynamic layer, if any is placed.
    pub fn first_dynamic(&self) -> Option<usize> {
        self.first_dynamic
    }

    /// Returns `true` if `layer` transitively extends `base`.
    pub fn extends(&self, layer: LayerId, base: LayerId) -> bool {
        layer != base
            && self.graph.contains_node(layer)
            && self.graph.contains_node(base)
            && has_path_connecting(&self.graph, layer, base, None)
    }

    /// Active compiled layers whose output is built: every `build_separate`
    /// layer plus the topmost compiled layer, in ascending position.
    pub fn build_layers(&self) -> Vec<LayerId> {
        let compiled_end = self.first_dynamic.unwrap_or(self.active.len());
        self.active[..compiled_end]
            .iter()
            .enumerate()
            .filter(|(pos, id)| {
                *pos + 1 == compiled_end || self.get(**id).is_some_and(|l| l.build_separate)
            })
            .map(|(_, id)| *id)
            .collect()
    }

    /// The build layer whose output directory holds the compiled form of the
    /// layer at `position`: the lowest build layer at or above it.
    pub fn build_layer_for(&self, position: usize) -> Option<LayerId> {
        self.build_layers()
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|l| l.position >= position))
    }

    /// Removes and disposes a layer, returning it so callers can purge every
    /// cache keyed on its name or position. The id is never reused.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let layer = self.arena.get_mut(id.index())?.take()?;
        self.keys.retain(|_, v| *v != id);
        self.inactive.retain(|v| *v != id);
        if let Some(pos) = self.active.iter().position(|v| *v == id) {
            self.active.remove(pos);
            self.renumber(pos);
        }
        self.graph.remove_node(id);
        Some(layer)
    }
}

impl Index<LayerId> for LayerStack {
    type Output = Layer;

    /// # Panics
    ///
    /// Panics if the layer was disposed.
    fn index(&self, id: LayerId) -> &Layer {
        match self.get(id) {
            Some(layer) => layer,
            None => panic!("{id:?} was disposed"),
        }
    }
}
