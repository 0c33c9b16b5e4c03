//! File modification stamps.
//!
//! Incremental decisions compare modification times strictly: a file is only
//! newer than another when its stamp is later, never when they are equal.

use std::path::Path;
use std::time::SystemTime;

/// Returns the modification time of `path`, or `None` if it cannot be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Returns `true` if `a` was modified strictly after `b`.
///
/// A missing `a` is never newer; a missing `b` is always older than an
/// existing `a`.
pub fn is_newer(a: &Path, b: &Path) -> bool {
    match (modified_time(a), modified_time(b)) {
        (Some(ta), Some(tb)) => ta > tb,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
