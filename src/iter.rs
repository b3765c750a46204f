//! Forward iteration over the interned strings in split order.

use std::iter::FusedIterator;
use std::ptr;

use crate::dict::Dictionary;
use crate::node::Node;
use crate::ordering::READ_ORD;
use crate::segment::{Segment, MAX_SEGMENTS};
use crate::string::DictStr;

/// Iterator over a dictionary's interned strings.
///
/// Takes one snapshot of the installed segments at construction. Buckets are
/// visited in logical order under the snapshot's table size; within a bucket,
/// nodes surface in bit-reversed hash order.
///
/// Iteration is not synchronized with insertion: every string interned before
/// the snapshot is yielded exactly once on a quiescent dictionary, while
/// concurrent insertions may or may not appear.
pub struct Iter<'a> {
    /// Installed segments at snapshot time, ascending; empty before the
    /// first insertion.
    segments: Vec<&'a Segment>,
    /// Logical table size of the snapshot; the modulus for bucket
    /// membership.
    table_size: usize,
    /// Index into `segments` of the segment owning `position`.
    segment_index: usize,
    /// Logical bucket currently being walked.
    position: usize,
    /// Offset within the bucket since the last head load.
    bucket_position: usize,
    /// Current node; null between buckets.
    node: *const Node,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(dict: &'a Dictionary) -> Self {
        let mut segments = Vec::with_capacity(MAX_SEGMENTS);
        let mut cursor = dict.snapshot();
        // Safety: published segments are valid for the dictionary's lifetime,
        // which contains 'a.
        while let Some(segment) = unsafe { cursor.as_ref() } {
            segments.push(segment);
            cursor = segment.prev();
        }
        segments.reverse();
        let table_size = segments.last().map_or(0, |s| s.table_size());
        Self {
            segments,
            table_size,
            segment_index: 0,
            position: 0,
            bucket_position: 0,
            node: ptr::null(),
        }
    }

    /// Logical bucket index of the most recently yielded string.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Offset of the most recently yielded string within its bucket.
    #[must_use]
    pub fn bucket_position(&self) -> usize {
        self.bucket_position
    }

    /// Bucket membership under the snapshot table size.
    ///
    /// An old segment's head can point at a node that a later growth step
    /// moved into a sibling bucket; testing against the snapshot size rather
    /// than the owning segment's is what makes every node surface at exactly
    /// one position.
    #[inline]
    fn in_bucket(&self, node: &Node) -> bool {
        node.hash as usize % self.table_size == self.position
    }
}

impl Iterator for Iter<'_> {
    type Item = DictStr;

    fn next(&mut self) -> Option<DictStr> {
        // Step along the current bucket's chain.
        // Safety: published node pointers stay valid for the dictionary's
        // lifetime; handles are only exposed for immortal dictionaries.
        if let Some(node) = unsafe { self.node.as_ref() } {
            let next = node.next.load(READ_ORD);
            match unsafe { next.as_ref() } {
                Some(next_node) if self.in_bucket(next_node) => {
                    self.node = next;
                    self.bucket_position += 1;
                    return Some(unsafe { DictStr::from_node(next_node) });
                }
                _ => {
                    self.node = ptr::null();
                    self.bucket_position = 0;
                    self.position += 1;
                }
            }
        }

        // Scan forward for the next non-empty bucket, stepping into later
        // segments as the position passes each segment's extent.
        while self.position < self.table_size {
            let segment = self.segments[self.segment_index];
            if self.position >= segment.table_size() {
                self.segment_index += 1;
                continue;
            }
            let head = segment
                .head_at(self.position - segment.prev_table_size())
                .load(READ_ORD);
            // Safety: as above.
            if let Some(node) = unsafe { head.as_ref() } {
                if self.in_bucket(node) {
                    self.node = head;
                    self.bucket_position = 0;
                    return Some(unsafe { DictStr::from_node(node) });
                }
            }
            self.position += 1;
        }
        None
    }
}

impl FusedIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::dict::Dictionary;
    use crate::segment::INITIAL_TABLE_SIZE;

    fn leaked() -> &'static Dictionary {
        Box::leak(Box::new(Dictionary::new()))
    }

    #[test]
    fn empty_dictionary_yields_nothing() {
        let dict = leaked();
        assert_eq!(dict.iter().count(), 0);
    }

    #[test]
    fn yields_every_string_exactly_once() {
        let dict = leaked();
        let keys: HashSet<String> = (0..1_000).map(|i| format!("iter-{i}")).collect();
        for key in &keys {
            dict.intern(key).unwrap();
        }

        let mut seen = HashSet::new();
        for handle in dict.iter() {
            let text = String::from_utf8(handle.as_bytes().to_vec()).unwrap();
            assert!(keys.contains(&text), "unexpected string {text:?}");
            assert!(seen.insert(text), "string yielded twice");
        }
        assert_eq!(seen.len(), keys.len());
    }

    #[test]
    fn survives_growth_without_duplicates() {
        let dict = leaked();
        // Two doubling steps put live heads in three segments.
        let total = INITIAL_TABLE_SIZE * 4;
        for i in 0..total {
            dict.intern(format!("grown-{i:06}")).unwrap();
        }

        let mut seen = HashSet::new();
        let mut last_position = 0;
        let mut iter = dict.iter();
        while let Some(handle) = iter.next() {
            assert!(iter.position() >= last_position, "positions regressed");
            last_position = iter.position();
            assert!(
                seen.insert(handle.as_ptr() as usize),
                "node yielded twice at bucket {}",
                iter.position()
            );
        }
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn iteration_reflects_a_quiescent_load() {
        let dict = leaked();
        let keys: Vec<String> = (0..500).map(|i| format!("load-{i}")).collect();
        let mut by_address: HashSet<usize> = HashSet::new();
        for key in &keys {
            by_address.insert(dict.intern(key).unwrap().as_ptr() as usize);
        }
        let iterated: HashSet<usize> = dict.iter().map(|s| s.as_ptr() as usize).collect();
        assert_eq!(iterated, by_address);
    }
}
