//! Segmented bucket array.
//!
//! The logical bucket vector doubles by installing a new [`Segment`] that
//! covers the upper half of the doubled table. Existing bucket heads never
//! move, so a reader holding an older `current_segment` snapshot stays
//! correct: it simply observes a smaller logical table and resolves every
//! bucket among the segments at or before its snapshot.

use std::mem;
use std::ptr;
use std::sync::atomic::AtomicPtr;

use crate::dict::InternError;
use crate::node::Node;

/// Buckets in segment 0; one page worth of head pointers. Segment `k` brings
/// the logical table to `INITIAL_TABLE_SIZE << k` buckets.
pub const INITIAL_TABLE_SIZE: usize = crate::arena::CHUNK_SIZE / mem::size_of::<AtomicPtr<Node>>();

/// Maximum number of installed segments. Once all are installed the table
/// stops doubling at `INITIAL_TABLE_SIZE << (MAX_SEGMENTS - 1)` buckets and
/// the load factor climbs instead.
pub const MAX_SEGMENTS: usize = 16;

/// One doubling step of the bucket table: the heads for logical bucket
/// indices `[prev_table_size, table_size)`.
///
/// A segment is allocated and fully initialized under the insertion lock
/// before `current_segment` is release-stored; after that it is immutable
/// apart from its atomic heads, and it lives until the dictionary drops.
pub(crate) struct Segment {
    /// Logical bucket count once this segment is installed.
    table_size: usize,
    /// Logical bucket count before this segment; the total size of all
    /// earlier segments.
    prev_table_size: usize,
    /// Previously installed segment; null for segment 0.
    prev: *const Segment,
    /// Heads for this segment's buckets, indexed by `logical - prev_table_size`.
    heads: Box<[AtomicPtr<Node>]>,
}

// Safety: `prev` only ever points at an earlier segment owned by the same
// dictionary; segments are immutable after publication (the heads are
// atomic) and outlive every reader.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    /// Segment 0: `INITIAL_TABLE_SIZE` null heads.
    pub(crate) fn first() -> Result<Self, InternError> {
        Ok(Self {
            table_size: INITIAL_TABLE_SIZE,
            prev_table_size: 0,
            prev: ptr::null(),
            heads: null_heads(INITIAL_TABLE_SIZE)?,
        })
    }

    /// Doubling segment on top of `prev`, with heads prefilled by the
    /// bucket-split scan.
    pub(crate) fn next(prev: &Segment, heads: Box<[AtomicPtr<Node>]>) -> Self {
        debug_assert_eq!(heads.len(), prev.table_size);
        Self {
            table_size: prev.table_size * 2,
            prev_table_size: prev.table_size,
            prev,
            heads,
        }
    }

    #[inline]
    pub(crate) fn table_size(&self) -> usize {
        self.table_size
    }

    #[inline]
    pub(crate) fn prev_table_size(&self) -> usize {
        self.prev_table_size
    }

    #[inline]
    pub(crate) fn prev(&self) -> *const Segment {
        self.prev
    }

    /// Head of logical bucket `index`, resolved through the segment that owns
    /// it. `index` must be below `self.table_size`.
    pub(crate) fn bucket(&self, index: usize) -> &AtomicPtr<Node> {
        debug_assert!(index < self.table_size);
        let mut segment = self;
        while index < segment.prev_table_size {
            // Safety: `prev` is non-null whenever `prev_table_size > 0` and
            // points at an earlier segment of the same dictionary.
            segment = unsafe { &*segment.prev };
        }
        &segment.heads[index - segment.prev_table_size]
    }

    /// Direct access to this segment's own head `local` (no downward walk).
    #[inline]
    pub(crate) fn head_at(&self, local: usize) -> &AtomicPtr<Node> {
        &self.heads[local]
    }
}

/// Allocate `len` null bucket heads, surfacing allocator failure instead of
/// aborting.
pub(crate) fn null_heads(len: usize) -> Result<Box<[AtomicPtr<Node>]>, InternError> {
    let mut heads = reserve_heads(len)?;
    heads.resize_with(len, || AtomicPtr::new(ptr::null_mut()));
    Ok(heads.into_boxed_slice())
}

/// Reserve capacity for `len` bucket heads, surfacing allocator failure.
pub(crate) fn reserve_heads(len: usize) -> Result<Vec<AtomicPtr<Node>>, InternError> {
    let mut heads = Vec::new();
    heads
        .try_reserve_exact(len)
        .map_err(|_| InternError::AllocationFailed)?;
    Ok(heads)
}
