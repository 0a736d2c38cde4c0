use std::collections::BTreeMap;
use std::ops::Range;

/// Counts of deletion lengths anchored at one position.
pub type DeletionCounts = BTreeMap<u32, u32>;
/// Counts of inserted sequences anchored at one position.
pub type InsertionCounts = BTreeMap<String, u32>;

/// Dense per-position storage over `[begin, end)` on one contig.
///
/// Every coordinate access goes through [`CoveredRegion::offset`], which is
/// the single place an out-of-window coordinate is rejected. Indel identity
/// that the alphabet cannot express lives in two sparse side maps.
#[derive(Debug, Clone)]
pub struct CoveredRegion<T> {
    tid: u32,
    begin: u32,
    end: u32,
    values: Vec<T>,
    deletions: BTreeMap<u32, DeletionCounts>,
    insertions: BTreeMap<u32, InsertionCounts>,
}

impl<T: Default + Clone> CoveredRegion<T> {
    /// Allocate a region with every slot at its default value.
    ///
    /// # Panics
    /// Panics when `begin >= end`.
    pub fn new(tid: u32, begin: u32, end: u32) -> Self {
        assert!(
            begin < end,
            "region begin {begin} must precede end {end} on contig {tid}"
        );
        Self {
            tid,
            begin,
            end,
            values: vec![T::default(); (end - begin) as usize],
            deletions: BTreeMap::new(),
            insertions: BTreeMap::new(),
        }
    }

    /// Reset every slot and drop all indel payloads.
    pub fn clear(&mut self) {
        self.values.fill(T::default());
        self.deletions.clear();
        self.insertions.clear();
    }
}

impl<T> CoveredRegion<T> {
    /// Contig identifier.
    pub fn tid(&self) -> u32 {
        self.tid
    }

    /// Inclusive first coordinate.
    pub fn begin(&self) -> u32 {
        self.begin
    }

    /// Exclusive last coordinate.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Coordinates covered, in order.
    pub fn positions(&self) -> Range<u32> {
        self.begin..self.end
    }

    /// Number of covered positions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; a region spans at least one position.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether `pos` lies inside the region.
    pub fn contains(&self, pos: u32) -> bool {
        self.begin <= pos && pos < self.end
    }

    /// Whether `other` lies entirely inside this region on the same contig.
    pub fn covers<U>(&self, other: &CoveredRegion<U>) -> bool {
        self.tid == other.tid && self.begin <= other.begin && other.end <= self.end
    }

    #[inline]
    fn offset(&self, pos: u32) -> usize {
        assert!(
            self.contains(pos),
            "position {pos} outside region [{}, {}) on contig {}",
            self.begin,
            self.end,
            self.tid
        );
        (pos - self.begin) as usize
    }

    /// Value at absolute coordinate `pos`.
    #[inline]
    pub fn get(&self, pos: u32) -> &T {
        let idx = self.offset(pos);
        &self.values[idx]
    }

    /// Mutable value at absolute coordinate `pos`.
    #[inline]
    pub fn get_mut(&mut self, pos: u32) -> &mut T {
        let idx = self.offset(pos);
        &mut self.values[idx]
    }

    /// Iterate `(coordinate, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        (self.begin..).zip(self.values.iter())
    }

    /// Deletion lengths recorded at `pos`.
    pub fn deletions_at(&self, pos: u32) -> Option<&DeletionCounts> {
        self.offset(pos);
        self.deletions.get(&pos)
    }

    /// Inserted sequences recorded at `pos`.
    pub fn insertions_at(&self, pos: u32) -> Option<&InsertionCounts> {
        self.offset(pos);
        self.insertions.get(&pos)
    }

    /// Credit a deletion of `len` bases anchored at `pos`.
    pub fn add_deletion(&mut self, pos: u32, len: u32, count: u32) {
        self.offset(pos);
        *self.deletions.entry(pos).or_default().entry(len).or_insert(0) += count;
    }

    /// Credit an inserted sequence anchored at `pos`.
    pub fn add_insertion(&mut self, pos: u32, seq: &str, count: u32) {
        self.offset(pos);
        let at = self.insertions.entry(pos).or_default();
        match at.get_mut(seq) {
            Some(c) => *c += count,
            None => {
                at.insert(seq.to_owned(), count);
            }
        }
    }

    /// Positions carrying any deletion payload.
    pub fn deletion_positions(&self) -> impl Iterator<Item = (u32, &DeletionCounts)> + '_ {
        self.deletions.iter().map(|(&p, m)| (p, m))
    }

    /// Positions carrying any insertion payload.
    pub fn insertion_positions(&self) -> impl Iterator<Item = (u32, &InsertionCounts)> + '_ {
        self.insertions.iter().map(|(&p, m)| (p, m))
    }
}

/// Entry with the largest count; the smallest key wins a tie.
pub fn majority_entry<K: Ord>(counts: &BTreeMap<K, u32>) -> Option<(&K, u32)> {
    let mut best: Option<(&K, u32)> = None;
    for (key, &count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_is_by_absolute_coordinate() {
        let mut region: CoveredRegion<u32> = CoveredRegion::new(3, 100, 105);
        *region.get_mut(100) = 7;
        *region.get_mut(104) = 9;
        assert_eq!(*region.get(100), 7);
        assert_eq!(*region.get(104), 9);
        assert_eq!(region.len(), 5);
        let collected: Vec<_> = region.iter().map(|(p, v)| (p, *v)).collect();
        assert_eq!(collected[4], (104, 9));
    }

    #[test]
    #[should_panic(expected = "outside region")]
    fn reading_past_end_is_fatal() {
        let region: CoveredRegion<u32> = CoveredRegion::new(0, 10, 20);
        region.get(20);
    }

    #[test]
    #[should_panic(expected = "outside region")]
    fn indel_payload_before_begin_is_fatal() {
        let mut region: CoveredRegion<u32> = CoveredRegion::new(0, 10, 20);
        region.add_deletion(9, 2, 1);
    }

    #[test]
    #[should_panic(expected = "must precede")]
    fn inverted_bounds_are_fatal() {
        let _: CoveredRegion<u32> = CoveredRegion::new(0, 20, 20);
    }

    #[test]
    fn indel_maps_accumulate_and_clear() {
        let mut region: CoveredRegion<u32> = CoveredRegion::new(0, 0, 10);
        region.add_insertion(4, "AC", 2);
        region.add_insertion(4, "AC", 3);
        region.add_deletion(6, 3, 1);
        assert_eq!(region.insertions_at(4).and_then(|m| m.get("AC")), Some(&5));
        assert_eq!(region.deletions_at(6).and_then(|m| m.get(&3)), Some(&1));
        *region.get_mut(1) = 4;
        region.clear();
        assert!(region.insertions_at(4).is_none());
        assert_eq!(*region.get(1), 0);
    }

    #[test]
    fn majority_entry_prefers_first_on_tie() {
        let mut counts = BTreeMap::new();
        counts.insert("T".to_string(), 2);
        counts.insert("A".to_string(), 2);
        counts.insert("G".to_string(), 1);
        assert_eq!(majority_entry(&counts), Some((&"A".to_string(), 2)));
    }
}
