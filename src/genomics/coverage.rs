use crate::genomics::counts::{ConsensusRule, Credited, SymbolCounts, UpdateMode};
use crate::genomics::region::{majority_entry, CoveredRegion};
use crate::genomics::symbol::{AlignmentSymbol, SymbolType};

/// Symbol counters over a window or a fragment span.
pub type SymbolCoverage = CoveredRegion<SymbolCounts>;

const INSERTION_SYMBOLS: [AlignmentSymbol; 3] = [
    AlignmentSymbol::LinkI1,
    AlignmentSymbol::LinkI2,
    AlignmentSymbol::LinkI3P,
];

impl CoveredRegion<SymbolCounts> {
    fn assert_covers(&self, other: &SymbolCoverage) {
        assert!(
            self.covers(other),
            "region {}:[{}, {}) does not cover {}:[{}, {})",
            self.tid(),
            self.begin(),
            self.end(),
            other.tid(),
            other.begin(),
            other.end()
        );
    }

    /// Carry the leading indel identity of `other` at `pos` when the credited
    /// link symbol is an indel.
    fn merge_indel_payload(
        &mut self,
        other: &SymbolCoverage,
        pos: u32,
        credited: Credited,
        increment: u32,
        weighted: bool,
    ) {
        let Some(link) = credited[SymbolType::Link.index()] else {
            return;
        };
        if link.is_insertion() {
            if let Some((seq, count)) = other.insertions_at(pos).and_then(majority_entry) {
                let value = if weighted { count } else { increment };
                self.add_insertion(pos, seq, value);
            }
        } else if link.is_deletion() {
            if let Some((&len, count)) = other.deletions_at(pos).and_then(majority_entry) {
                let value = if weighted { count } else { increment };
                self.add_deletion(pos, len, value);
            }
        }
    }

    /// Position-wise [`SymbolCounts::update_by_consensus`] over `other`'s span.
    ///
    /// # Panics
    /// Panics when `self` does not cover `other`.
    pub fn update_by_consensus(
        &mut self,
        other: &SymbolCoverage,
        mode: UpdateMode,
        rule: ConsensusRule,
        increment: u32,
    ) {
        self.assert_covers(other);
        for (pos, counts) in other.iter() {
            let credited = self
                .get_mut(pos)
                .update_by_consensus(counts, mode, rule, increment);
            self.merge_indel_payload(other, pos, credited, increment, false);
        }
    }

    /// Position-wise [`SymbolCounts::update_by_representative`] over `other`'s span.
    ///
    /// # Panics
    /// Panics when `self` does not cover `other`.
    pub fn update_by_representative(
        &mut self,
        other: &SymbolCoverage,
        increment: u32,
        weighted: bool,
    ) {
        self.assert_covers(other);
        for (pos, counts) in other.iter() {
            let credited = self
                .get_mut(pos)
                .update_by_representative(counts, increment, weighted);
            self.merge_indel_payload(other, pos, credited, increment, weighted);
        }
    }

    /// Position-wise [`SymbolCounts::update_by_filtering`] over the overlap of
    /// `other` and `thresholds`. Returns the number of passing (position, type)
    /// pairs.
    ///
    /// # Panics
    /// Panics when `self` does not cover `other`.
    pub fn update_by_filtering(
        &mut self,
        other: &SymbolCoverage,
        thresholds: &SymbolCoverage,
        increment: u32,
    ) -> usize {
        self.assert_covers(other);
        let begin = other.begin().max(thresholds.begin());
        let end = other.end().min(thresholds.end());
        let mut passed = 0;
        for pos in begin..end {
            let (n, credited) =
                self.get_mut(pos)
                    .update_by_filtering(other.get(pos), thresholds.get(pos), increment);
            passed += n;
            self.merge_indel_payload(other, pos, credited, increment, false);
        }
        passed
    }

    /// Average inserted length at every position where insertion support
    /// outweighs the no-gap link, together with the sum of those lengths.
    pub fn insertion_length_profile(&self) -> (Vec<u32>, u32) {
        let mut profile = vec![0u32; self.len()];
        let mut total = 0;
        for (pos, counts) in self.iter() {
            let ins: u32 = INSERTION_SYMBOLS.iter().map(|&s| counts.get(s)).sum();
            if ins <= counts.get(AlignmentSymbol::LinkM) {
                continue;
            }
            let Some(seqs) = self.insertions_at(pos) else {
                continue;
            };
            let weight: u64 = seqs.values().map(|&c| c as u64).sum();
            if weight == 0 {
                continue;
            }
            let weighted_len: u64 = seqs.iter().map(|(s, &c)| s.len() as u64 * c as u64).sum();
            let avg = (weighted_len / weight) as u32;
            profile[(pos - self.begin()) as usize] = avg;
            total += avg;
        }
        (profile, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlignmentSymbol::*;

    fn coverage(tid: u32, begin: u32, end: u32) -> SymbolCoverage {
        SymbolCoverage::new(tid, begin, end)
    }

    #[test]
    fn consensus_merge_carries_insertion_identity() {
        let mut fragment = coverage(0, 5, 8);
        fragment.get_mut(6).set(LinkI2, 30);
        fragment.add_insertion(6, "GT", 30);
        fragment.add_insertion(6, "GA", 10);
        fragment.get_mut(7).set(BaseC, 30);

        let mut window = coverage(0, 0, 10);
        window.update_by_consensus(&fragment, UpdateMode::Sum, ConsensusRule::IndelMajor, 1);
        assert_eq!(window.get(6).get(LinkI2), 1);
        assert_eq!(window.get(7).get(BaseC), 1);
        assert_eq!(window.insertions_at(6).and_then(|m| m.get("GT")), Some(&1));
        assert!(window.insertions_at(6).and_then(|m| m.get("GA")).is_none());
    }

    #[test]
    fn weighted_representative_carries_deletion_counts() {
        let mut fragment = coverage(0, 2, 4);
        fragment.get_mut(3).set(LinkD1, 4);
        fragment.add_deletion(3, 1, 4);
        let mut window = coverage(0, 0, 10);
        window.update_by_representative(&fragment, 1, true);
        assert_eq!(window.get(3).get(LinkD1), 4);
        assert_eq!(window.deletions_at(3).and_then(|m| m.get(&1)), Some(&4));
    }

    #[test]
    #[should_panic(expected = "does not cover")]
    fn merging_wider_region_is_fatal() {
        let fragment = coverage(0, 5, 12);
        let mut window = coverage(0, 0, 10);
        window.update_by_consensus(&fragment, UpdateMode::Sum, ConsensusRule::Plurality, 1);
    }

    #[test]
    #[should_panic(expected = "does not cover")]
    fn merging_other_contig_is_fatal() {
        let fragment = coverage(1, 2, 4);
        let mut window = coverage(0, 0, 10);
        window.update_by_representative(&fragment, 1, false);
    }

    #[test]
    fn filtering_only_visits_threshold_overlap() {
        let mut fragment = coverage(0, 2, 6);
        for pos in 2..6 {
            fragment.get_mut(pos).set(BaseA, 30);
        }
        let thresholds = coverage(0, 4, 10);
        let mut amplicon = coverage(0, 0, 10);
        let passed = amplicon.update_by_filtering(&fragment, &thresholds, 1);
        assert_eq!(passed, 2);
        assert_eq!(amplicon.get(3).get(BaseA), 0);
        assert_eq!(amplicon.get(4).get(BaseA), 1);
        assert_eq!(amplicon.get(5).get(BaseA), 1);
    }

    #[test]
    fn insertion_profile_averages_dominant_insertions() {
        let mut fragment = coverage(0, 0, 6);
        fragment.get_mut(2).set(LinkI3P, 30);
        fragment.add_insertion(2, "ACGT", 20);
        fragment.add_insertion(2, "AC", 20);
        fragment.get_mut(4).set(LinkI1, 10);
        fragment.get_mut(4).set(LinkM, 30);
        fragment.add_insertion(4, "T", 10);
        let (profile, total) = fragment.insertion_length_profile();
        assert_eq!(profile, vec![0, 0, 3, 0, 0, 0]);
        assert_eq!(total, 3);
    }
}
