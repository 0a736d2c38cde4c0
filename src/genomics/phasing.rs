use std::collections::BTreeMap;

use crate::genomics::coverage::SymbolCoverage;
use crate::genomics::symbol::AlignmentSymbol;
use crate::genomics::types::Strand;

/// Ordered `(position, symbol)` mutations observed together on one molecule.
pub type MutationSet = Vec<(u32, AlignmentSymbol)>;

/// Multi-mutation sets with per-strand occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhasedMutations {
    sets: BTreeMap<MutationSet, [u32; 2]>,
}

impl PhasedMutations {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one molecule carrying `set` on `strand`; sets with fewer than two
    /// mutations carry no phase information and are ignored.
    pub fn record(&mut self, set: MutationSet, strand: Strand) {
        if set.len() > 1 {
            self.sets.entry(set).or_insert([0, 0])[strand.index()] += 1;
        }
    }

    /// Per-strand counts of `set`.
    pub fn get(&self, set: &[(u32, AlignmentSymbol)]) -> Option<[u32; 2]> {
        self.sets.get(set).copied()
    }

    /// Number of distinct sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no set is held.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets and their counts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MutationSet, &[u32; 2])> + '_ {
        self.sets.iter()
    }

    /// Drop sets whose phase support is negligible next to the depth of their
    /// least-supported allele on both strands.
    ///
    /// A set is dropped when `count[s] · max_ploidy <= min allele depth[s]`
    /// holds for both strands `s`.
    pub fn retain_supported(&mut self, depth: &[SymbolCoverage; 2], max_ploidy: u32) {
        self.sets.retain(|set, counts| {
            let mut min_depth = [u32::MAX; 2];
            for &(pos, symbol) in set.iter() {
                for strand in Strand::BOTH {
                    let d = depth[strand.index()].get(pos).get(symbol);
                    min_depth[strand.index()] = min_depth[strand.index()].min(d);
                }
            }
            let negligible = Strand::BOTH.iter().all(|s| {
                counts[s.index()].saturating_mul(max_ploidy) <= min_depth[s.index()]
            });
            !negligible
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlignmentSymbol::*;

    #[test]
    fn single_mutations_are_not_phased() {
        let mut phased = PhasedMutations::new();
        phased.record(vec![(3, BaseT)], Strand::Forward);
        assert!(phased.is_empty());
        let set = vec![(3, BaseT), (5, LinkD1)];
        phased.record(set.clone(), Strand::Forward);
        phased.record(set.clone(), Strand::Reverse);
        phased.record(set.clone(), Strand::Reverse);
        assert_eq!(phased.get(&set), Some([1, 2]));
    }

    #[test]
    fn weak_sets_are_dropped_strong_sets_kept() {
        let mut depth = [SymbolCoverage::new(0, 0, 10), SymbolCoverage::new(0, 0, 10)];
        for d in depth.iter_mut() {
            d.get_mut(2).set(BaseA, 20);
            d.get_mut(6).set(BaseC, 8);
        }
        let weak = vec![(2, BaseA), (6, BaseC)];
        let strong = vec![(2, BaseA), (7, BaseG)];
        let mut phased = PhasedMutations::new();
        phased.record(weak.clone(), Strand::Forward);
        phased.record(weak.clone(), Strand::Reverse);
        // position 7 has no allele depth, so the set is always retained
        phased.record(strong.clone(), Strand::Forward);
        phased.retain_supported(&depth, 4);
        assert_eq!(phased.get(&weak), None);
        assert_eq!(phased.get(&strong), Some([1, 0]));

        let mut phased = PhasedMutations::new();
        for _ in 0..3 {
            phased.record(weak.clone(), Strand::Forward);
        }
        phased.retain_supported(&depth, 4);
        assert_eq!(phased.get(&weak), Some([3, 0]));
    }
}
