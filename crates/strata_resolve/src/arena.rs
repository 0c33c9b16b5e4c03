//! Generational arena for parsed declarations.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Handle to a declaration stored in an [`Arena`].
///
/// Slots are recycled after [`Arena::dispose`], so every handle carries the
/// generation of the slot it was issued for. A handle held across a disposal
/// no longer resolves instead of silently pointing at a newer declaration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclId {
    index: u32,
    generation: u32,
}

impl DeclId {
    /// Returns the slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the slot generation this handle was issued for.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclId({}v{})", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of values addressed by [`DeclId`], with explicit disposal.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Stores a value and returns its handle.
    pub fn alloc(&mut self, value: T) -> DeclId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return DeclId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        DeclId {
            index,
            generation: 0,
        }
    }

    /// Returns the value for `id`, or `None` once it was disposed.
    pub fn get(&self, id: DeclId) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Mutable access to a live value.
    pub fn get_mut(&mut self, id: DeclId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Removes the value for `id` and retires the handle.
    pub fn dispose(&mut self, id: DeclId) -> Option<T> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no value is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    DeclId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<DeclId> for Arena<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if `id` was disposed.
    fn index(&self, id: DeclId) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("use of disposed {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_get() {
        let mut arena: Arena<&str> = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena[a], "a");
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn disposed_handle_does_not_alias_reused_slot() {
        let mut arena: Arena<&str> = Arena::new();
        let old = arena.alloc("old");
        assert_eq!(arena.dispose(old), Some("old"));
        let new = arena.alloc("new");
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(arena.get(old).is_none());
        assert_eq!(arena[new], "new");
    }

    #[test]
    fn double_dispose_is_noop() {
        let mut arena: Arena<u32> = Arena::new();
        let id = arena.alloc(1);
        arena.dispose(id);
        assert!(arena.dispose(id).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn iter_skips_disposed() {
        let mut arena: Arena<u32> = Arena::new();
        let a = arena.alloc(1);
        arena.alloc(2);
        arena.dispose(a);
        let values: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2]);
    }

    #[test]
    #[should_panic(expected = "use of disposed")]
    fn index_panics_on_disposed() {
        let mut arena: Arena<u32> = Arena::new();
        let id = arena.alloc(1);
        arena.dispose(id);
        let _ = arena[id];
    }
}
