//! Stable identifiers for layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable handle for a layer in a layer stack's arena.
///
/// A `LayerId` stays valid for as long as the layer is alive, independent of
/// the layer's `position`, which shifts when compiled layers are inserted
/// ahead of the dynamic suffix. Slots are never reused after a layer is
/// disposed, so a stale id can never alias a different layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(u32);

impl LayerId {
    /// Creates a `LayerId` from a raw arena index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the arena index as a `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}
