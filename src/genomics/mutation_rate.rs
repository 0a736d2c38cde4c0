use crate::genomics::symbol::{AlignmentSymbol, SymbolType};

/// Expected phred error rates of consensus-level substitutions and indels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MutationRates {
    /// C>T and its reverse complement G>A.
    pub transition_cg_ta: u32,
    /// T>C and its reverse complement A>G.
    pub transition_ta_cg: u32,
    /// Any other base substitution.
    pub transversion: u32,
    /// Phred cost of opening an indel.
    pub indel_open: u32,
    /// Phred cost added per length bucket beyond one base.
    pub indel_ext: u32,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            transition_cg_ta: 44,
            transition_ta_cg: 48,
            transversion: 52,
            indel_open: 44,
            indel_ext: 4,
        }
    }
}

impl MutationRates {
    /// Phred error rate of observing `alt` where the consensus is `con`.
    pub fn phred_error_rate(&self, con: AlignmentSymbol, alt: AlignmentSymbol) -> u32 {
        use AlignmentSymbol::*;
        if alt.symbol_type() == SymbolType::Link {
            // no-gap and ambiguous links are priced like long indels
            let bucket = alt.indel_length_bucket().unwrap_or(2);
            return self.indel_open + self.indel_ext * bucket;
        }
        match (con, alt) {
            (BaseC, BaseT) | (BaseG, BaseA) => self.transition_cg_ta,
            (BaseT, BaseC) | (BaseA, BaseG) => self.transition_ta_cg,
            _ => self.transversion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AlignmentSymbol::*;

    #[test]
    fn transitions_and_transversions_use_distinct_rates() {
        let rates = MutationRates::default();
        assert_eq!(rates.phred_error_rate(BaseC, BaseT), 44);
        assert_eq!(rates.phred_error_rate(BaseG, BaseA), 44);
        assert_eq!(rates.phred_error_rate(BaseA, BaseG), 48);
        assert_eq!(rates.phred_error_rate(BaseT, BaseC), 48);
        assert_eq!(rates.phred_error_rate(BaseA, BaseC), 52);
        assert_eq!(rates.phred_error_rate(BaseC, BaseN), 52);
    }

    #[test]
    fn longer_indels_cost_more() {
        let rates = MutationRates::default();
        let one = rates.phred_error_rate(LinkM, LinkI1);
        let two = rates.phred_error_rate(LinkM, LinkD2);
        let many = rates.phred_error_rate(LinkM, LinkI3P);
        assert_eq!(one, 44);
        assert_eq!(two, 48);
        assert_eq!(many, 52);
        assert_eq!(rates.phred_error_rate(LinkM, LinkD1), one);
    }
}
