//! Dictionary node: hash, length, and inline NUL-terminated payload.
//!
//! A [`Node`] is a 16-byte `#[repr(C)]` header followed in memory by exactly
//! `size + 1` payload bytes. The payload is written once, before any pointer
//! to the node is published; only `next` changes afterwards, and only under
//! the insertion lock.

use std::mem;
use std::ptr;
use std::slice;
use std::sync::atomic::AtomicPtr;

/// Intrusive split-ordered list node header. Payload bytes follow the header.
#[repr(C)]
pub(crate) struct Node {
    /// Next node in the split-ordered list. Release-stored under the
    /// insertion lock; acquire-loaded on the lock-free read path.
    pub(crate) next: AtomicPtr<Node>,
    /// 32-bit content hash; the bucket index is `hash % table_size`.
    pub(crate) hash: u32,
    /// Payload length in bytes, excluding the trailing NUL.
    pub(crate) size: u32,
}

// Handle arithmetic assumes the header is one pointer plus two 32-bit words.
const _: () = assert!(mem::size_of::<Node>() == mem::size_of::<usize>() + 8);

impl Node {
    /// Bytes a node with a `len`-byte payload occupies, NUL included.
    #[inline]
    pub(crate) const fn alloc_size(len: usize) -> usize {
        mem::size_of::<Node>() + len + 1
    }

    /// Pointer to the first payload byte, immediately past the header.
    #[inline]
    pub(crate) fn data(&self) -> *const u8 {
        (self as *const Node).wrapping_add(1).cast::<u8>()
    }

    /// The payload as a byte slice, without the trailing NUL.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        // Safety: `size + 1` payload bytes follow the header and were fully
        // written before the node was published.
        unsafe { slice::from_raw_parts(self.data(), self.size as usize) }
    }

    /// Recover the header from a payload pointer produced by [`Node::data`].
    ///
    /// # Safety
    ///
    /// `data` must point at the payload of a live node (the empty sentinel's
    /// payload byte qualifies).
    #[inline]
    pub(crate) unsafe fn from_data<'a>(data: *const u8) -> &'a Node {
        unsafe { &*data.cast::<Node>().sub(1) }
    }

    /// Construct a node in raw arena memory: header, payload copy, trailing
    /// NUL. The caller publishes the node afterwards.
    ///
    /// # Safety
    ///
    /// `raw` must be valid for writes of `alloc_size(bytes.len())` bytes and
    /// aligned for `Node`.
    pub(crate) unsafe fn write<'a>(raw: *mut u8, hash: u32, bytes: &[u8]) -> &'a Node {
        let node = raw.cast::<Node>();
        unsafe {
            node.write(Node {
                next: AtomicPtr::new(ptr::null_mut()),
                hash,
                size: bytes.len() as u32,
            });
            let data = node.add(1).cast::<u8>();
            ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
            data.add(bytes.len()).write(0);
            &*node
        }
    }
}

// ============================================================================
//  Empty sentinel
// ============================================================================

/// Backing storage for default handles: one empty node that is never linked
/// into the list.
#[repr(C)]
struct EmptyNode {
    node: Node,
    term: u8,
}

static EMPTY_NODE: EmptyNode = EmptyNode {
    node: Node {
        next: AtomicPtr::new(ptr::null_mut()),
        hash: 0,
        size: 0,
    },
    term: 0,
};

/// Payload pointer of the empty sentinel: a single NUL byte preceded by an
/// all-zero node header.
#[inline]
pub(crate) fn empty_data() -> *const u8 {
    &EMPTY_NODE.term
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;

    #[test]
    fn header_layout() {
        assert_eq!(mem::size_of::<Node>(), 16);
        assert_eq!(mem::align_of::<Node>(), mem::align_of::<usize>());
        assert_eq!(Node::alloc_size(0), 17);
        assert_eq!(Node::alloc_size(7), 24);
    }

    #[test]
    fn sentinel_is_an_empty_node() {
        // Safety: the sentinel payload pointer is produced by the module.
        let node = unsafe { Node::from_data(empty_data()) };
        assert_eq!(node.size, 0);
        assert_eq!(node.hash, 0);
        assert_eq!(node.bytes(), b"");
        assert_eq!(node.data(), empty_data());
        assert_eq!(unsafe { *empty_data() }, 0);
    }

    #[test]
    fn write_then_read_back() {
        let mut storage = [0u64; 8];
        let raw = storage.as_mut_ptr().cast::<u8>();
        // Safety: 64 bytes of u64-aligned storage fit alloc_size(7) = 24.
        let node = unsafe { Node::write(raw, 0xDEAD_BEEF, b"payload") };
        assert_eq!(node.hash, 0xDEAD_BEEF);
        assert_eq!(node.size, 7);
        assert_eq!(node.bytes(), b"payload");
        assert!(node.next.load(Ordering::Relaxed).is_null());
        assert_eq!(unsafe { *node.data().add(7) }, 0);
    }
}
