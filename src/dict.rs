//! The interning engine: lock-free lookup, mutex-guarded insertion, and the
//! bucket-split growth protocol.
//!
//! All interned strings live in one singly linked list ordered by
//! bit-reversed hash, threaded through a segmented array of bucket heads.
//! Ordering the list this way makes every modulo-`T` bucket a contiguous
//! span, so doubling the table never moves a node: the new segment's heads
//! simply point into the middle of existing spans.
//!
//! # Concurrency Model
//!
//! 1. Readers: snapshot `current_segment` with an acquire load, resolve the
//!    bucket head, and chase `next` links with acquire loads. No locks, no
//!    retries; a missed concurrent insertion falls through to the locked
//!    path, which re-checks.
//! 2. Writers: one mutex per dictionary serializes node allocation, list
//!    splicing, bucket-head updates, and growth. Every pointer that readers
//!    can observe is release-stored after its target is fully written.
//!
//! Nodes, pages, and segments are immortal until the dictionary drops, which
//! removes reclamation (and the ABA problem) from the read path entirely.

use std::fmt;
use std::hash::Hasher;
use std::mem;
use std::ptr;
use std::sync::atomic::AtomicPtr;
use std::sync::OnceLock;

use fxhash::FxHasher32;
use parking_lot::Mutex;

use crate::arena::{PageArena, MAX_STRING_SIZE};
use crate::iter::Iter;
use crate::node::Node;
use crate::ordering::{LOCKED_ORD, READ_ORD, WRITE_ORD};
use crate::segment::{self, Segment, INITIAL_TABLE_SIZE, MAX_SEGMENTS};
use crate::string::DictStr;
use crate::trace::{debug_log, trace_log, warn_log};


// ============================================================================
//  InternError
// ============================================================================

/// Errors surfaced by [`Dictionary::intern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    /// The input exceeds [`MAX_STRING_SIZE`]. The dictionary is unchanged.
    TooLarge {
        /// Length of the rejected input, in bytes.
        len: usize,
    },

    /// The underlying allocator refused a page or a segment.
    /// Nothing partial is published; dictionary invariants hold.
    AllocationFailed,
}

impl fmt::Display for InternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { len } => write!(
                f,
                "string of {len} bytes exceeds the dictionary limit of {MAX_STRING_SIZE}"
            ),

            Self::AllocationFailed => write!(f, "memory allocation failed"),
        }
    }
}

impl std::error::Error for InternError {}

// ============================================================================
//  Dictionary
// ============================================================================

/// A string interning dictionary with lock-free reads.
///
/// Interning maps every distinct byte sequence to a single canonical node
/// whose address is stable for the remaining program lifetime, so handle
/// equality is pointer identity. Lookups never block; insertions serialize on
/// one mutex per dictionary.
///
/// User code reaches a dictionary through [`Dictionary::global`] (or the
/// crate-level [`intern`](crate::intern) shorthand); construction is
/// crate-private, which is what lets [`DictStr`] handles be freely copied
/// without lifetime tracking.
///
/// # Example
///
/// ```
/// use litdict::Dictionary;
///
/// let dict = Dictionary::global();
/// let a = dict.intern("canonical")?;
/// let b = dict.intern("canonical")?;
/// assert_eq!(a.as_ptr(), b.as_ptr());
/// # Ok::<(), litdict::InternError>(())
/// ```
pub struct Dictionary {
    /// Highest installed segment; null until the first insertion.
    /// Release-stored after the segment is fully initialized.
    current_segment: AtomicPtr<Segment>,

    /// Writer state. Everything inside is touched only under this mutex.
    inner: Mutex<DictInner>,
}

struct DictInner {
    /// Number of interned strings. Drives the load-factor-1 growth trigger;
    /// never read outside the lock.
    size: usize,

    /// Installed segments, ascending. Raw boxes so published segment
    /// addresses are independent of this vec; freed in `Drop`.
    segments: Vec<*mut Segment>,

    /// Node storage.
    arena: PageArena,
}

// Safety: the raw segment pointers are owned by this struct alone; they are
// dereferenced under the dictionary mutex or, once published, through the
// `current_segment` acquire/release protocol.
unsafe impl Send for DictInner {}

impl DictInner {
    /// Most recently installed segment. Callers must have installed
    /// segment 0 first.
    fn top_ptr(&self) -> *mut Segment {
        match self.segments.last() {
            Some(&segment) => segment,
            None => unreachable!("segment 0 is installed before any splice"),
        }
    }

    fn top(&self) -> &Segment {
        // Safety: segment pointers stay valid until the dictionary drops.
        unsafe { &*self.top_ptr() }
    }
}

impl Drop for DictInner {
    fn drop(&mut self) {
        for &segment in &self.segments {
            // Safety: created by `Box::into_raw`, dropped exactly once.
            drop(unsafe { Box::from_raw(segment) });
        }
    }
}

impl Dictionary {
    /// Create an empty dictionary.
    ///
    /// Crate-private: handles do not track their dictionary, so every
    /// dictionary that hands them out must outlive them. The public surface
    /// exposes only the immortal [`global`](Dictionary::global) instance;
    /// in-crate tests leak theirs.
    pub(crate) fn new() -> Self {
        Self {
            current_segment: AtomicPtr::new(ptr::null_mut()),
            inner: Mutex::new(DictInner {
                size: 0,
                segments: Vec::with_capacity(MAX_SEGMENTS),
                arena: PageArena::new(),
            }),
        }
    }

    /// The process-wide dictionary: lazily initialized on first use,
    /// thread-safe, never dropped.
    pub fn global() -> &'static Dictionary {
        static GLOBAL: OnceLock<Dictionary> = OnceLock::new();
        GLOBAL.get_or_init(Dictionary::new)
    }

    /// Intern `bytes`, returning a handle whose data pointer is canonical for
    /// that content: two calls with equal content return identical pointers.
    ///
    /// Empty input maps to the shared empty sentinel without touching the
    /// table.
    ///
    /// # Errors
    ///
    /// [`InternError::TooLarge`] if `bytes` exceeds [`MAX_STRING_SIZE`];
    /// [`InternError::AllocationFailed`] if the allocator refuses a page or
    /// segment. Either way the dictionary is unchanged.
    pub fn intern(&self, bytes: impl AsRef<[u8]>) -> Result<DictStr, InternError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Ok(DictStr::empty());
        }
        let hash = hash_bytes(bytes);
        if let Some(node) = self.lookup(hash, bytes) {
            // Safety: nodes live until the dictionary drops, and only
            // immortal dictionaries hand out handles (see `new`).
            return Ok(unsafe { DictStr::from_node(node) });
        }
        let node = self.insert(hash, bytes)?;
        // Safety: as above.
        Ok(unsafe { DictStr::from_node(node) })
    }

    /// Iterate the interned strings in split order.
    ///
    /// The iterator snapshots the installed segments at construction; see
    /// [`Iter`] for the exact semantics under concurrent insertion.
    ///
    /// ```
    /// let dict = litdict::Dictionary::global();
    /// dict.intern("walk-me")?;
    /// assert!(dict.iter().any(|s| s == "walk-me"));
    /// # Ok::<(), litdict::InternError>(())
    /// ```
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Number of interned strings. Takes the insertion lock briefly.
    pub fn len(&self) -> usize {
        self.inner.lock().size
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current snapshot of the highest installed segment (null before the
    /// first insertion).
    pub(crate) fn snapshot(&self) -> *const Segment {
        self.current_segment.load(READ_ORD)
    }

    /// Lock-free search. Acquire loads only; never blocks. May miss an
    /// insertion that races with it, in which case the caller falls through
    /// to the locked path and re-checks.
    fn lookup(&self, hash: u32, bytes: &[u8]) -> Option<&Node> {
        // Safety: a non-null `current_segment` points at a fully initialized
        // segment that lives until the dictionary drops.
        let segment = unsafe { self.current_segment.load(READ_ORD).as_ref()? };
        let table_size = segment.table_size();
        let bucket_index = hash as usize % table_size;
        let mut cursor = segment.bucket(bucket_index).load(READ_ORD);
        // Safety (loop): published node pointers stay valid forever.
        while let Some(node) = unsafe { cursor.as_ref() } {
            if node.hash == hash && node.bytes() == bytes {
                return Some(node);
            }
            if node.hash as usize % table_size != bucket_index {
                // Crossed into the next bucket's span: not present.
                break;
            }
            cursor = node.next.load(READ_ORD);
        }
        None
    }

    /// Locked insertion path. Re-searches the bucket under the mutex so two
    /// threads racing on the same content converge on one node.
    fn insert(&self, hash: u32, bytes: &[u8]) -> Result<&Node, InternError> {
        if bytes.len() > MAX_STRING_SIZE {
            return Err(InternError::TooLarge { len: bytes.len() });
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.segments.is_empty() {
            self.install_first_segment(inner)?;
        } else if inner.size == inner.top().table_size() {
            // Load factor reached 1: double the table while segments remain.
            if inner.segments.len() < MAX_SEGMENTS {
                self.install_next_segment(inner)?;
            } else {
                warn_log!(
                    size = inner.size,
                    "all segments installed; bucket chains will lengthen"
                );
            }
        }

        // Decoupled from `inner` so the arena can be borrowed mutably below;
        // segments never move or die while the dictionary lives.
        let segment: &Segment = unsafe { &*inner.top_ptr() };
        let table_size = segment.table_size();
        let bucket_index = hash as usize % table_size;
        let bucket = segment.bucket(bucket_index);

        // Find the splice position in bit-reversed hash order, returning any
        // node a concurrent thread interned while we waited on the lock.
        let reversed = hash.reverse_bits();
        let mut prev: Option<&Node> = None;
        let mut next: *mut Node = ptr::null_mut();
        let mut cursor = bucket.load(LOCKED_ORD);
        // Safety (loop): published node pointers stay valid forever.
        while let Some(node) = unsafe { cursor.as_ref() } {
            if node.hash as usize % table_size != bucket_index {
                // End of this bucket's span.
                break;
            }
            if node.hash == hash && node.bytes() == bytes {
                return Ok(node);
            }
            if next.is_null() {
                if reversed < node.hash.reverse_bits() {
                    next = cursor;
                } else {
                    prev = Some(node);
                }
            }
            cursor = node.next.load(LOCKED_ORD);
        }

        let raw = inner
            .arena
            .allocate(Node::alloc_size(bytes.len()), mem::align_of::<Node>())?;
        // Safety: `raw` spans `alloc_size(bytes.len())` bytes aligned for
        // `Node`; nothing is published until the stores below.
        let node = unsafe { Node::write(raw.as_ptr(), hash, bytes) };
        node.next.store(next, LOCKED_ORD);
        inner.size += 1;

        let published = (node as *const Node).cast_mut();
        match prev {
            Some(prev) => prev.next.store(published, WRITE_ORD),
            None => bucket.store(published, WRITE_ORD),
        }
        trace_log!(hash, len = bytes.len(), bucket = bucket_index, "interned new string");
        Ok(node)
    }

    /// Allocate segment 0, fill its heads with null, and publish it.
    fn install_first_segment(&self, inner: &mut DictInner) -> Result<(), InternError> {
        let segment = Box::into_raw(Box::new(Segment::first()?));
        inner.segments.push(segment);
        self.current_segment.store(segment, WRITE_ORD);
        debug_log!(table_size = INITIAL_TABLE_SIZE, "installed first bucket segment");
        Ok(())
    }

    /// Double the logical table: split every old bucket and install the next
    /// segment. Runs under the insertion lock.
    ///
    /// For each old bucket `i`, the first chain node whose hash modulo the
    /// doubled table is `i + old_table` becomes the head of new bucket
    /// `i + old_table`; the nodes before it stay reachable from the old head.
    /// The chains themselves are never re-linked, so readers holding the old
    /// snapshot still see valid `old_table`-sized buckets.
    fn install_next_segment(&self, inner: &mut DictInner) -> Result<(), InternError> {
        // Safety: segments never move or die while the dictionary lives.
        let top: &Segment = unsafe { &*inner.top_ptr() };
        let old_table = top.table_size();
        let new_table = old_table * 2;

        let mut heads = segment::reserve_heads(old_table)?;
        let mut owner = 0usize;
        for index in 0..old_table {
            // Safety: every pointer in `segments` is a live installed segment.
            let mut segment: &Segment = unsafe { &*inner.segments[owner] };
            if index >= segment.table_size() {
                owner += 1;
                segment = unsafe { &*inner.segments[owner] };
            }
            let mut split = segment
                .head_at(index - segment.prev_table_size())
                .load(LOCKED_ORD);
            // Safety (loop): published node pointers stay valid forever.
            while let Some(node) = unsafe { split.as_ref() } {
                let hash = node.hash as usize;
                if hash % old_table != index || hash % new_table != index {
                    break;
                }
                split = node.next.load(LOCKED_ORD);
            }
            // `split` is the first node the extra modulus bit pushes into
            // bucket `index + old_table`, or a node already past this
            // bucket's span (screened by the lookup termination rule), or
            // null.
            heads.push(AtomicPtr::new(split));
        }

        let segment = Box::into_raw(Box::new(Segment::next(top, heads.into_boxed_slice())));
        inner.segments.push(segment);
        self.current_segment.store(segment, WRITE_ORD);
        debug_log!(
            table_size = new_table,
            segments = inner.segments.len(),
            "installed bucket segment"
        );
        Ok(())
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Dictionary")
            .field("size", &inner.size)
            .field("segments", &inner.segments.len())
            .field("allocated_bytes", &inner.arena.allocated_bytes())
            .finish()
    }
}

/// Stable 32-bit content hash (FxHash). Nothing relies on distribution, only
/// on determinism; the bit-reversed value orders the split list.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut hasher = FxHasher32::default();
    hasher.write(bytes);
    hasher.finish() as u32
}
