//! Phred conversions and the per-allele summary handed to downstream callers.

use crate::genomics::aggregation::{AggregationSet, TierStats};
use crate::genomics::coverage::SymbolCoverage;
use crate::genomics::symbol::{AlignmentSymbol, SymbolType};

/// Error probability of a phred score.
#[inline]
pub fn phred_to_prob(phred: f64) -> f64 {
    10f64.powf(-phred / 10.0)
}

/// Phred score of an error probability; zero probability maps to infinity.
#[inline]
pub fn prob_to_phred(prob: f64) -> f64 {
    -10.0 * prob.log10()
}

/// Per-strand values of one tier for one allele.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TierSummary {
    /// Molecules supporting the allele.
    pub depth: [u32; 2],
    /// Molecules of the allele's type.
    pub type_depth: [u32; 2],
    /// Sum of credited qualities.
    pub quality_sum: [u32; 2],
    /// Sum of squared credited qualities.
    pub quality_sqr_sum: [u32; 2],
    /// Sum of molecule mapping qualities.
    pub mapq_sum: [u32; 2],
    /// Molecules below the low-quality threshold.
    pub low_quality_depth: [u32; 2],
    /// Molecules at or above the high-quality threshold.
    pub high_quality_depth: [u32; 2],
    /// Lenient quality cutoff.
    pub pass_thres: [u32; 2],
    /// Depth kept by the lenient cutoff.
    pub pass_depth: [u32; 2],
    /// Strict quality cutoff.
    pub vars_thres: [u32; 2],
    /// Depth kept by the strict cutoff.
    pub vars_depth: [u32; 2],
    /// Score of the strict cutoff.
    pub vars_quality: [u32; 2],
    /// Bias-adjusted depth cap.
    pub bias_adjusted_depth: [u32; 2],
    /// Left edge-distance bias (×100).
    pub bias_ldist: [u32; 2],
    /// Right edge-distance bias (×100).
    pub bias_rdist: [u32; 2],
    /// Mismatch-count bias (×100).
    pub bias_nvars: [u32; 2],
    /// Normalized strand bias (×100).
    pub bias_strand: [u32; 2],
    /// Duplication bias against the previous tier (×100).
    pub bias_dup: [u32; 2],
}

impl TierSummary {
    fn from_tier(tier: &TierStats, pos: u32, symbol: AlignmentSymbol) -> Self {
        let pick = |region: &[SymbolCoverage; 2]| {
            [region[0].get(pos).get(symbol), region[1].get(pos).get(symbol)]
        };
        let ty = symbol.symbol_type();
        Self {
            depth: pick(&tier.depth),
            type_depth: [
                tier.depth[0].get(pos).sum_by_type(ty),
                tier.depth[1].get(pos).sum_by_type(ty),
            ],
            quality_sum: pick(&tier.quality_sum),
            quality_sqr_sum: pick(&tier.quality_sqr_sum),
            mapq_sum: pick(&tier.mapq_sum),
            low_quality_depth: pick(&tier.low_quality_depth),
            high_quality_depth: pick(&tier.high_quality_depth),
            pass_thres: pick(&tier.pass_thres),
            pass_depth: pick(&tier.pass_depth),
            vars_thres: pick(&tier.vars_thres),
            vars_depth: pick(&tier.vars_depth),
            vars_quality: pick(&tier.vars_vqual),
            bias_adjusted_depth: pick(&tier.vars_badep),
            bias_ldist: pick(&tier.bias_ldist),
            bias_rdist: pick(&tier.bias_rdist),
            bias_nvars: pick(&tier.bias_nvars),
            bias_strand: pick(&tier.bias_strand),
            bias_dup: pick(&tier.bias_dup),
        }
    }

    /// Depth summed over both strands.
    pub fn total_depth(&self) -> u32 {
        self.depth[0] + self.depth[1]
    }

    /// Mean credited quality over both strands, or zero without depth.
    pub fn mean_quality(&self) -> f64 {
        let depth = self.total_depth();
        if depth == 0 {
            0.0
        } else {
            (self.quality_sum[0] as f64 + self.quality_sum[1] as f64) / depth as f64
        }
    }
}

/// Everything the aggregation core knows about one allele at one position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlleleStats {
    /// Contig identifier.
    pub tid: u32,
    /// 0-based reference position.
    pub pos: u32,
    /// Allele.
    pub symbol: AlignmentSymbol,
    /// Reference base at `pos`.
    pub reference: AlignmentSymbol,
    /// Fragment-consensus tier.
    pub raw: TierSummary,
    /// Family-consensus tier, when it ran.
    pub family: Option<TierSummary>,
    /// Duplex families with any consensus at `pos` for this allele.
    pub duplex_depth: u32,
    /// Duplex families whose strands agreed on this allele.
    pub duplex_pass_depth: u32,
    /// Inserted sequences and their raw-tier molecule counts.
    pub insertions: Vec<(String, u32)>,
    /// Deletion lengths and their raw-tier molecule counts.
    pub deletions: Vec<(u32, u32)>,
}

fn same_length_bucket(symbol: AlignmentSymbol, len: usize) -> bool {
    len > 0 && symbol.indel_length_bucket() == Some((len.min(3) - 1) as u32)
}

fn indel_tables(tier: &TierStats, pos: u32, symbol: AlignmentSymbol) -> (Vec<(String, u32)>, Vec<(u32, u32)>) {
    let mut insertions: Vec<(String, u32)> = Vec::new();
    let mut deletions: Vec<(u32, u32)> = Vec::new();
    for depth in &tier.depth {
        if symbol.is_insertion() {
            for (seq, &count) in depth.insertions_at(pos).into_iter().flatten() {
                if !same_length_bucket(symbol, seq.len()) {
                    continue;
                }
                match insertions.iter_mut().find(|(s, _)| s == seq) {
                    Some(entry) => entry.1 += count,
                    None => insertions.push((seq.clone(), count)),
                }
            }
        } else if symbol.is_deletion() {
            for (&len, &count) in depth.deletions_at(pos).into_iter().flatten() {
                if !same_length_bucket(symbol, len as usize) {
                    continue;
                }
                match deletions.iter_mut().find(|(l, _)| *l == len) {
                    Some(entry) => entry.1 += count,
                    None => deletions.push((len, count)),
                }
            }
        }
    }
    insertions.sort();
    deletions.sort_unstable();
    (insertions, deletions)
}

/// Summaries of every allele observed in either tier, in position then
/// symbol order. Ambiguous symbols are skipped.
pub fn collect_allele_stats(set: &AggregationSet, with_family: bool) -> Vec<AlleleStats> {
    let mut stats = Vec::new();
    for pos in set.begin()..set.end() {
        let reference = set.reference_at(pos);
        for ty in SymbolType::ALL {
            for &symbol in ty.symbols() {
                if symbol.is_ambiguous() {
                    continue;
                }
                let raw = TierSummary::from_tier(&set.raw, pos, symbol);
                let family = with_family.then(|| TierSummary::from_tier(&set.family, pos, symbol));
                let family_depth = family.map_or(0, |f| f.total_depth());
                if raw.total_depth() == 0 && family_depth == 0 {
                    continue;
                }
                let (insertions, deletions) = indel_tables(&set.raw, pos, symbol);
                stats.push(AlleleStats {
                    tid: set.tid(),
                    pos,
                    symbol,
                    reference,
                    raw,
                    family,
                    duplex_depth: set.duplex.depth[0].get(pos).get(symbol),
                    duplex_pass_depth: set.duplex.pass_depth[0].get(pos).get(symbol),
                    insertions,
                    deletions,
                });
            }
        }
    }
    stats
}
