use std::collections::BTreeMap;
use std::ops::Bound;

use crate::core::types::SeqId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumComparator {
    LessThan,
    LessThanEquals,
    Equals,
    NotEquals,
    GreaterThanEquals,
    GreaterThan,
}

/// Order-preserving map of a float onto the integer line, so that range
/// queries and sorts share one 64-bit representation with integer
/// fields: flip the sign bit for non-negatives, flip all bits for
/// negatives, then widen.
pub fn float_to_int64(f: f32) -> i64 {
    let bits = f.to_bits();
    let mapped = if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000
    };
    mapped as i64
}

/// Ordered mapping from an int64 key to the sorted set of documents
/// holding that value.
#[derive(Debug, Default)]
pub struct NumTree {
    map: BTreeMap<i64, Vec<SeqId>>,
}

impl NumTree {
    pub fn new() -> Self {
        NumTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&mut self, value: i64, seq_id: SeqId) {
        let ids = self.map.entry(value).or_default();
        if let Err(pos) = ids.binary_search(&seq_id) {
            ids.insert(pos, seq_id);
        }
    }

    pub fn remove(&mut self, value: i64, seq_id: SeqId) {
        if let Some(ids) = self.map.get_mut(&value) {
            if let Ok(pos) = ids.binary_search(&seq_id) {
                ids.remove(pos);
            }
            if ids.is_empty() {
                self.map.remove(&value);
            }
        }
    }

    /// Sorted seq ids satisfying `comparator` against `value`.
    pub fn search(&self, comparator: NumComparator, value: i64) -> Vec<SeqId> {
        let mut out: Vec<SeqId> = match comparator {
            NumComparator::Equals => {
                return self.map.get(&value).cloned().unwrap_or_default();
            }
            NumComparator::NotEquals => self
                .map
                .iter()
                .filter(|(k, _)| **k != value)
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
            NumComparator::LessThan => self
                .map
                .range((Bound::Unbounded, Bound::Excluded(value)))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
            NumComparator::LessThanEquals => self
                .map
                .range((Bound::Unbounded, Bound::Included(value)))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
            NumComparator::GreaterThanEquals => self
                .map
                .range((Bound::Included(value), Bound::Unbounded))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
            NumComparator::GreaterThan => self
                .map
                .range((Bound::Excluded(value), Bound::Unbounded))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
        };

        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NumTree {
        let mut tree = NumTree::new();
        tree.insert(10, 1);
        tree.insert(5, 2);
        tree.insert(7, 3);
        tree.insert(7, 4);
        tree
    }

    #[test]
    fn range_comparators() {
        let tree = sample();
        assert_eq!(tree.search(NumComparator::Equals, 7), vec![3, 4]);
        assert_eq!(tree.search(NumComparator::GreaterThanEquals, 7), vec![1, 3, 4]);
        assert_eq!(tree.search(NumComparator::GreaterThan, 7), vec![1]);
        assert_eq!(tree.search(NumComparator::LessThan, 7), vec![2]);
        assert_eq!(tree.search(NumComparator::LessThanEquals, 7), vec![2, 3, 4]);
        assert_eq!(tree.search(NumComparator::NotEquals, 7), vec![1, 2]);
    }

    #[test]
    fn remove_drops_empty_keys() {
        let mut tree = sample();
        tree.remove(7, 3);
        tree.remove(7, 4);
        assert_eq!(tree.search(NumComparator::Equals, 7), Vec::<SeqId>::new());
        tree.remove(5, 2);
        tree.remove(10, 1);
        assert!(tree.is_empty());
    }

    #[test]
    fn float_mapping_preserves_order() {
        let values = [-1000.5f32, -2.25, -0.0, 0.0, 0.1, 1.0, 3.75, 4096.0];
        let mapped: Vec<i64> = values.iter().map(|&f| float_to_int64(f)).collect();
        let mut sorted = mapped.clone();
        sorted.sort_unstable();
        // -0.0 and 0.0 map adjacently; the order of everything else is strict
        assert_eq!(mapped, sorted);
        assert!(float_to_int64(-2.25) < float_to_int64(-2.0));
        assert!(float_to_int64(0.0) < float_to_int64(f32::MIN_POSITIVE));
    }

    #[test]
    fn float_range_search_agrees_with_float_order() {
        let mut tree = NumTree::new();
        tree.insert(float_to_int64(-1.5), 1);
        tree.insert(float_to_int64(0.5), 2);
        tree.insert(float_to_int64(2.5), 3);

        let hits = tree.search(NumComparator::GreaterThanEquals, float_to_int64(0.0));
        assert_eq!(hits, vec![2, 3]);
    }
}
