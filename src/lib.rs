//! # litdict
//!
//! A concurrent interning dictionary for short byte strings.
//!
//! Interning maps every distinct byte sequence to one canonical,
//! address-stable copy. Handles ([`DictStr`]) are one pointer wide, `Copy`,
//! and compare and hash in O(1) because equal content is pointer-identical.
//! Once interned, a string's bytes and their address stay valid for the
//! remaining program lifetime.
//!
//! ## Design
//!
//! - One split-ordered list of nodes, sorted by bit-reversed hash, so every
//!   modulo-`T` bucket is a contiguous span and doubling the table only adds
//!   new heads into existing spans; nodes never move.
//! - A segmented bucket array: the logical table doubles by installing a new
//!   segment, so existing bucket heads never reallocate.
//! - A bump-pointer page arena: nodes are carved out of 64 KiB pages that
//!   live until the dictionary drops.
//! - Lookups are lock-free (acquire loads only); insertion and growth
//!   serialize on a single mutex per dictionary.
//!
//! ## Example
//!
//! ```
//! let a = litdict::intern("hello")?;
//! let b = litdict::intern("hello")?;
//! assert_eq!(a.as_ptr(), b.as_ptr());
//! assert_eq!(a.len(), 5);
//! assert!(litdict::intern("")?.is_empty());
//! # Ok::<(), litdict::InternError>(())
//! ```

mod arena;
mod dict;
mod iter;
mod node;
mod ordering;
mod segment;
mod string;
mod trace;

pub use arena::{CHUNK_SIZE, MAX_STRING_SIZE};
pub use dict::{Dictionary, InternError};
pub use iter::Iter;
pub use segment::{INITIAL_TABLE_SIZE, MAX_SEGMENTS};
pub use string::DictStr;

/// Intern `bytes` in the process-wide dictionary.
///
/// Shorthand for [`Dictionary::global()`](Dictionary::global)`.intern(bytes)`.
///
/// # Errors
///
/// See [`Dictionary::intern`].
pub fn intern(bytes: impl AsRef<[u8]>) -> Result<DictStr, InternError> {
    Dictionary::global().intern(bytes)
}
