//! Standard memory orderings for dictionary publication.
//!
//! Writers publish nodes, bucket heads, and segments with release stores
//! while holding the insertion lock; the lock-free read path pairs them with
//! acquire loads. Naming the orderings keeps the intent clear at each access
//! point.

use std::sync::atomic::Ordering;

/// Ordering for lock-free reads of `current_segment`, bucket heads, and node
/// `next` links. Pairs with the writer's release stores.
pub(crate) const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for publishing a new node, bucket head, or segment.
/// Pairs with the readers' acquire loads.
pub(crate) const WRITE_ORD: Ordering = Ordering::Release;

/// Ordering for loads inside the locked insertion path.
/// The mutex already synchronizes every store that matters there.
pub(crate) const LOCKED_ORD: Ordering = Ordering::Relaxed;
