use crate::genomics::symbol::{AlignmentSymbol, SymbolType, NUM_ALIGNMENT_SYMBOLS};

/// How a credited value combines with the value already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Counts add up.
    Sum,
    /// The slot keeps the highest quality seen.
    QualityMax,
}

/// Which symbol wins a consensus over the link type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusRule {
    /// Strictly largest count wins; the first maximum wins a tie.
    Plurality,
    /// Like plurality, except that any nonzero indel count evicts the no-gap
    /// symbol from the lead. Only affects the link type.
    IndelMajor,
}

/// Majority symbol of one type together with its support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consensus {
    /// Leading symbol, or the type's ambiguous sentinel when every count is zero.
    pub symbol: AlignmentSymbol,
    /// Count of the leading symbol.
    pub count: u32,
    /// Total over the type; under [`ConsensusRule::IndelMajor`] this is the
    /// support of the indel that took the lead.
    pub total: u32,
}

/// Symbols credited by a merge, one slot per [`SymbolType`].
///
/// `None` means the merge credited nothing for that type.
pub type Credited = [Option<AlignmentSymbol>; 2];

/// Fourteen counts (or quality accumulators) for one reference position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolCounts {
    counts: [u32; NUM_ALIGNMENT_SYMBOLS],
}

impl SymbolCounts {
    /// All-zero counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored for `symbol`.
    #[inline]
    pub fn get(&self, symbol: AlignmentSymbol) -> u32 {
        self.counts[symbol.index()]
    }

    /// Overwrite the value stored for `symbol`.
    #[inline]
    pub fn set(&mut self, symbol: AlignmentSymbol, value: u32) {
        self.counts[symbol.index()] = value;
    }

    /// Combine `value` into the slot for `symbol` according to `mode`.
    #[inline]
    pub fn credit(&mut self, symbol: AlignmentSymbol, value: u32, mode: UpdateMode) {
        let slot = &mut self.counts[symbol.index()];
        *slot = match mode {
            UpdateMode::Sum => slot.saturating_add(value),
            UpdateMode::QualityMax => (*slot).max(value),
        };
    }

    /// Reset every slot to zero.
    pub fn clear(&mut self) {
        self.counts = [0; NUM_ALIGNMENT_SYMBOLS];
    }

    /// Sum over the symbols of `ty`.
    pub fn sum_by_type(&self, ty: SymbolType) -> u32 {
        ty.symbols().iter().map(|&s| self.get(s)).sum()
    }

    /// Iterate `(symbol, value)` pairs of one type.
    pub fn by_type(&self, ty: SymbolType) -> impl Iterator<Item = (AlignmentSymbol, u32)> + '_ {
        ty.symbols().iter().map(move |&s| (s, self.get(s)))
    }

    /// Majority symbol of `ty`.
    ///
    /// With all counts zero the ambiguous sentinel is returned with zero
    /// support. The base type always uses plurality.
    pub fn consensus(&self, ty: SymbolType, rule: ConsensusRule) -> Consensus {
        let indel_major = rule == ConsensusRule::IndelMajor && ty == SymbolType::Link;
        let mut symbol = ty.ambiguous();
        let mut count = 0;
        let mut total = 0;
        for (s, c) in self.by_type(ty) {
            if indel_major {
                if count < c || (symbol == AlignmentSymbol::LinkM && c > 0) {
                    symbol = s;
                    count = c;
                    total = c;
                }
            } else {
                if count < c {
                    symbol = s;
                    count = c;
                }
                total += c;
            }
        }
        Consensus {
            symbol,
            count,
            total,
        }
    }

    /// Credit the unanimous symbol of each type in `other`, or the type's
    /// ambiguous sentinel when `other` disagrees.
    ///
    /// In [`UpdateMode::QualityMax`] the credited value is the lesser of
    /// `increment` and the majority quality. Types with no support in
    /// `other` are skipped.
    pub fn update_by_consensus(
        &mut self,
        other: &SymbolCounts,
        mode: UpdateMode,
        rule: ConsensusRule,
        increment: u32,
    ) -> Credited {
        let mut credited = [None; 2];
        for ty in SymbolType::ALL {
            let con = other.consensus(ty, rule);
            if con.count == 0 {
                continue;
            }
            let value = match mode {
                UpdateMode::Sum => increment,
                UpdateMode::QualityMax => increment.min(con.count),
            };
            let target = if con.total == con.count {
                con.symbol
            } else {
                ty.ambiguous()
            };
            self.credit(target, value, mode);
            credited[ty.index()] = Some(target);
        }
        credited
    }

    /// Credit the plurality symbol of each type in `other` with either
    /// `increment` or, when `weighted`, the type's full total in `other`.
    pub fn update_by_representative(
        &mut self,
        other: &SymbolCounts,
        increment: u32,
        weighted: bool,
    ) -> Credited {
        let mut credited = [None; 2];
        for ty in SymbolType::ALL {
            let con = other.consensus(ty, ConsensusRule::Plurality);
            if con.count == 0 {
                continue;
            }
            let value = if weighted { con.total } else { increment };
            self.credit(con.symbol, value, UpdateMode::Sum);
            credited[ty.index()] = Some(con.symbol);
        }
        credited
    }

    /// Credit the majority symbol of each type in `other` when its margin
    /// over half the total reaches the per-symbol threshold.
    ///
    /// The margin is `max(2·count, total) − total`; a zero margin never
    /// passes. Returns how many types passed along with the credited symbols.
    pub fn update_by_filtering(
        &mut self,
        other: &SymbolCounts,
        thresholds: &SymbolCounts,
        increment: u32,
    ) -> (usize, Credited) {
        let mut credited = [None; 2];
        let mut passed = 0;
        for ty in SymbolType::ALL {
            let con = other.consensus(ty, ConsensusRule::IndelMajor);
            let margin = con.count.saturating_mul(2).max(con.total) - con.total;
            if margin > 0 && margin >= thresholds.get(con.symbol) {
                self.credit(con.symbol, increment, UpdateMode::Sum);
                credited[ty.index()] = Some(con.symbol);
                passed += 1;
            }
        }
        (passed, credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlignmentSymbol::*;

    fn counts(entries: &[(AlignmentSymbol, u32)]) -> SymbolCounts {
        let mut c = SymbolCounts::new();
        for &(s, v) in entries {
            c.set(s, v);
        }
        c
    }

    #[test]
    fn plurality_prefers_first_maximum() {
        let c = counts(&[(BaseC, 4), (BaseG, 4), (BaseA, 1)]);
        let con = c.consensus(SymbolType::Base, ConsensusRule::Plurality);
        assert_eq!(con.symbol, BaseC);
        assert_eq!(con.count, 4);
        assert_eq!(con.total, 9);
    }

    #[test]
    fn empty_consensus_is_ambiguous() {
        let c = SymbolCounts::new();
        let con = c.consensus(SymbolType::Link, ConsensusRule::Plurality);
        assert_eq!(con.symbol, LinkNN);
        assert_eq!((con.count, con.total), (0, 0));
        let con = c.consensus(SymbolType::Link, ConsensusRule::IndelMajor);
        assert_eq!(con.symbol, LinkNN);
    }

    #[test]
    fn indel_major_evicts_no_gap_on_any_indel() {
        let c = counts(&[(LinkM, 9), (LinkD2, 1)]);
        let con = c.consensus(SymbolType::Link, ConsensusRule::IndelMajor);
        assert_eq!(con.symbol, LinkD2);
        assert_eq!(con.count, 1);
        assert_eq!(con.total, 1);

        let plain = c.consensus(SymbolType::Link, ConsensusRule::Plurality);
        assert_eq!(plain.symbol, LinkM);
        assert_eq!(plain.total, 10);
    }

    #[test]
    fn indel_major_does_not_touch_bases() {
        let c = counts(&[(BaseA, 3), (BaseC, 1)]);
        let con = c.consensus(SymbolType::Base, ConsensusRule::IndelMajor);
        assert_eq!((con.symbol, con.count, con.total), (BaseA, 3, 4));
    }

    #[test]
    fn agreeing_fragments_sum_into_majority() {
        let mut family = SymbolCounts::new();
        let first = counts(&[(BaseA, 5)]);
        let second = counts(&[(BaseA, 3)]);
        family.update_by_consensus(&first, UpdateMode::Sum, ConsensusRule::IndelMajor, 5);
        let credited =
            family.update_by_consensus(&second, UpdateMode::Sum, ConsensusRule::IndelMajor, 3);
        assert_eq!(credited, [Some(BaseA), None]);
        assert_eq!(family.get(BaseA), 8);
        assert_eq!(family.get(BaseNN), 0);
    }

    #[test]
    fn split_fragment_credits_ambiguous_slot() {
        let mut family = SymbolCounts::new();
        let split = counts(&[(BaseA, 3), (BaseC, 3), (LinkM, 2)]);
        let credited =
            family.update_by_consensus(&split, UpdateMode::Sum, ConsensusRule::Plurality, 1);
        assert_eq!(credited, [Some(BaseNN), Some(LinkM)]);
        assert_eq!(family.get(BaseNN), 1);
        assert_eq!(family.get(BaseA), 0);
        assert_eq!(family.get(BaseC), 0);
    }

    #[test]
    fn quality_mode_credits_lesser_of_increment_and_majority() {
        let mut acc = counts(&[(BaseG, 20)]);
        let other = counts(&[(BaseG, 35)]);
        acc.update_by_consensus(&other, UpdateMode::QualityMax, ConsensusRule::Plurality, 30);
        assert_eq!(acc.get(BaseG), 30);
        acc.update_by_consensus(&other, UpdateMode::QualityMax, ConsensusRule::Plurality, 10);
        assert_eq!(acc.get(BaseG), 30);
    }

    #[test]
    fn representative_can_weight_by_total() {
        let mut acc = SymbolCounts::new();
        let other = counts(&[(BaseT, 4), (BaseA, 2), (LinkM, 6)]);
        acc.update_by_representative(&other, 1, true);
        assert_eq!(acc.get(BaseT), 6);
        assert_eq!(acc.get(LinkM), 6);
        acc.update_by_representative(&other, 1, false);
        assert_eq!(acc.get(BaseT), 7);
    }

    #[test]
    fn filtering_requires_margin_over_threshold() {
        // base margin: 2*25 - 35 = 15, link margin: 2*25 - 25 = 25
        let other = counts(&[(BaseA, 25), (BaseC, 10), (LinkM, 25)]);
        let mut thresholds = SymbolCounts::new();
        for &s in AlignmentSymbol::all() {
            thresholds.set(s, 20);
        }
        let mut acc = SymbolCounts::new();
        let (passed, credited) = acc.update_by_filtering(&other, &thresholds, 1);
        assert_eq!(passed, 1);
        assert_eq!(credited, [None, Some(LinkM)]);
        assert_eq!(acc.get(BaseA), 0);
        assert_eq!(acc.get(LinkM), 1);

        let stronger = counts(&[(BaseA, 30), (BaseC, 10)]);
        let (passed, credited) = acc.update_by_filtering(&stronger, &thresholds, 1);
        assert_eq!(passed, 1);
        assert_eq!(credited, [Some(BaseA), None]);
        assert_eq!(acc.get(BaseA), 1);
    }

    #[test]
    fn filtering_rejects_zero_margin_even_with_zero_threshold() {
        let other = counts(&[(BaseA, 5), (BaseC, 5)]);
        let thresholds = SymbolCounts::new();
        let mut acc = SymbolCounts::new();
        let (passed, _) = acc.update_by_filtering(&other, &thresholds, 1);
        assert_eq!(passed, 0);
        assert_eq!(acc.sum_by_type(SymbolType::Base), 0);
    }

    #[test]
    fn quality_max_keeps_highest() {
        let mut c = SymbolCounts::new();
        c.credit(BaseA, 20, UpdateMode::QualityMax);
        c.credit(BaseA, 35, UpdateMode::QualityMax);
        c.credit(BaseA, 25, UpdateMode::QualityMax);
        assert_eq!(c.get(BaseA), 35);
    }
}
