//! The interned-string handle.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;
use std::str::FromStr;

use crate::dict::{Dictionary, InternError};
use crate::node::{self, Node};

/// A handle to an interned string.
///
/// A `DictStr` is one pointer wide and `Copy`. It points at the
/// NUL-terminated payload of a node in the global [`Dictionary`] (or at the
/// shared empty sentinel), so copies are free and two handles with equal
/// content are pointer-identical. Equality between handles is therefore a
/// pointer compare, and hashing reads the hash stored in the node header;
/// both are O(1) regardless of string length. Ordering compares bytes.
///
/// # Example
///
/// ```
/// use litdict::DictStr;
///
/// let a = DictStr::new("example")?;
/// let b: DictStr = "example".parse()?;
/// assert_eq!(a, b);
/// assert_eq!(a.as_ptr(), b.as_ptr());
/// assert_eq!(a.len(), 7);
/// # Ok::<(), litdict::InternError>(())
/// ```
#[derive(Clone, Copy)]
pub struct DictStr {
    /// Payload pointer; the node header sits immediately before it.
    data: NonNull<u8>,
}

// Safety: the pointee is immutable after publication and lives for the
// remaining program lifetime (global dictionary storage or the static
// sentinel).
unsafe impl Send for DictStr {}
unsafe impl Sync for DictStr {}

impl DictStr {
    /// Intern `bytes` in the global dictionary.
    ///
    /// # Errors
    ///
    /// See [`Dictionary::intern`].
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self, InternError> {
        Dictionary::global().intern(bytes)
    }

    /// The empty handle, backed by the shared sentinel. Never allocates;
    /// equal to `DictStr::default()`.
    #[must_use]
    pub fn empty() -> Self {
        // Safety: the sentinel payload is a static, hence non-null.
        Self {
            data: unsafe { NonNull::new_unchecked(node::empty_data().cast_mut()) },
        }
    }

    /// Handle for `node`'s payload.
    ///
    /// # Safety
    ///
    /// `node` must stay valid for the remaining program lifetime: a node of
    /// the global dictionary, of a leaked test dictionary, or the sentinel.
    #[inline]
    pub(crate) unsafe fn from_node(node: &Node) -> Self {
        // Safety: a node's payload pointer is derived from a live node.
        Self {
            data: unsafe { NonNull::new_unchecked(node.data().cast_mut()) },
        }
    }

    #[inline]
    fn node(&self) -> &Node {
        // Safety: `data` always points at a node payload (invariant of every
        // constructor), and nodes are immortal.
        unsafe { Node::from_data(self.data.as_ptr()) }
    }

    /// Pointer to the NUL-terminated bytes.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// The interned bytes, without the trailing NUL.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.node().bytes()
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.node().size as usize
    }

    /// Whether this is the empty handle. Empty content is never interned, so
    /// this is equivalent to pointing at the sentinel.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored 32-bit content hash, widened.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        u64::from(self.node().hash)
    }
}

impl Default for DictStr {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
//  Comparisons
// ============================================================================

impl PartialEq for DictStr {
    /// Pointer identity: interning maps equal content to one node, so this is
    /// content equality at pointer-compare cost.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for DictStr {}

impl PartialEq<[u8]> for DictStr {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for DictStr {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl PartialEq<str> for DictStr {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for DictStr {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Ord for DictStr {
    /// Byte-wise content order; identity only decides equality.
    fn cmp(&self, other: &Self) -> Ordering {
        if self.data == other.data {
            Ordering::Equal
        } else {
            self.as_bytes().cmp(other.as_bytes())
        }
    }
}

impl PartialOrd for DictStr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialOrd<[u8]> for DictStr {
    fn partial_cmp(&self, other: &[u8]) -> Option<Ordering> {
        Some(self.as_bytes().cmp(other))
    }
}

impl PartialOrd<&str> for DictStr {
    fn partial_cmp(&self, other: &&str) -> Option<Ordering> {
        Some(self.as_bytes().cmp(other.as_bytes()))
    }
}

impl Hash for DictStr {
    /// The hash stored in the node header: O(1) and consistent with pointer
    /// equality.
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.node().hash);
    }
}

// ============================================================================
//  Conversions and formatting
// ============================================================================

impl AsRef<[u8]> for DictStr {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl TryFrom<&str> for DictStr {
    type Error = InternError;

    fn try_from(value: &str) -> Result<Self, InternError> {
        Self::new(value)
    }
}

impl TryFrom<&[u8]> for DictStr {
    type Error = InternError;

    fn try_from(value: &[u8]) -> Result<Self, InternError> {
        Self::new(value)
    }
}

impl FromStr for DictStr {
    type Err = InternError;

    fn from_str(s: &str) -> Result<Self, InternError> {
        Self::new(s)
    }
}

impl fmt::Display for DictStr {
    /// Writes the bytes, replacing invalid UTF-8 sequences.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
    }
}

impl fmt::Debug for DictStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DictStr({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}
