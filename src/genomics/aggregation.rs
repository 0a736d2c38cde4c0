//! Per-window aggregation of families into raw, family and duplex tiers.
//!
//! The raw tier collapses every fragment (its mates merged by quality-max
//! projection) into one consensus per position. The family tier collapses
//! every family strand into an amplicon consensus whose quality reflects how
//! consistently family members agree. Duplex support is counted where both
//! strands of a family agree. Each tier ends with the adaptive bias filter.

use tracing::debug;

use crate::config::AggregationConfig;
use crate::genomics::adafilter::adafilter;
use crate::genomics::bias::binomial_phredlike;
use crate::genomics::buckets::{
    edge_bucket, mismatch_bucket, quality_bucket, EdgeBuckets, MismatchBuckets, QualityBuckets,
    NUM_QUALITY_BUCKETS,
};
use crate::genomics::counts::{Consensus, ConsensusRule, UpdateMode};
use crate::genomics::coverage::SymbolCoverage;
use crate::genomics::phasing::PhasedMutations;
use crate::genomics::projection::{project_read, ProjectionOptions};
use crate::genomics::region::{majority_entry, CoveredRegion};
use crate::genomics::statistics::phred_to_prob;
use crate::genomics::symbol::{are_mutated, AlignmentSymbol, SymbolType};
use crate::genomics::types::{Family, Fragment, Strand};

fn strand_pair<T: Default + Clone>(tid: u32, begin: u32, end: u32) -> [CoveredRegion<T>; 2] {
    [
        CoveredRegion::new(tid, begin, end),
        CoveredRegion::new(tid, begin, end),
    ]
}

/// Per-strand counters of one consensus tier.
///
/// Every field is indexed by [`Strand::index`] and covers the whole window.
#[derive(Debug, Clone)]
pub struct TierStats {
    /// Molecules whose consensus was each symbol; carries indel identities.
    pub depth: [SymbolCoverage; 2],
    /// Sum of credited qualities.
    pub quality_sum: [SymbolCoverage; 2],
    /// Sum of squared credited qualities.
    pub quality_sqr_sum: [SymbolCoverage; 2],
    /// Sum of molecule mapping qualities.
    pub mapq_sum: [SymbolCoverage; 2],
    /// Sum of squared molecule mapping qualities.
    pub mapq_sqr_sum: [SymbolCoverage; 2],
    /// Molecules credited below the low-quality threshold.
    pub low_quality_depth: [SymbolCoverage; 2],
    /// Molecules credited at or above the high-quality threshold (family tier).
    pub high_quality_depth: [SymbolCoverage; 2],
    /// Sum of distances to the molecule's left edge.
    pub ldist_sum: [SymbolCoverage; 2],
    /// Sum of distances to the molecule's right edge.
    pub rdist_sum: [SymbolCoverage; 2],
    /// Lenient quality cutoff.
    pub pass_thres: [SymbolCoverage; 2],
    /// Depth at or above the lenient cutoff.
    pub pass_depth: [SymbolCoverage; 2],
    /// Strict quality cutoff.
    pub vars_thres: [SymbolCoverage; 2],
    /// Depth at or above the strict cutoff, capped by the bias-adjusted depth.
    pub vars_depth: [SymbolCoverage; 2],
    /// Bias-adjusted depth cap.
    pub vars_badep: [SymbolCoverage; 2],
    /// Score of the strict cutoff.
    pub vars_vqual: [SymbolCoverage; 2],
    /// Left edge-distance bias factor.
    pub bias_ldist: [SymbolCoverage; 2],
    /// Right edge-distance bias factor.
    pub bias_rdist: [SymbolCoverage; 2],
    /// Mismatch-count bias factor.
    pub bias_nvars: [SymbolCoverage; 2],
    /// Representative left distance at the bias change point.
    pub amax_ldist: [SymbolCoverage; 2],
    /// Representative right distance at the bias change point.
    pub amax_rdist: [SymbolCoverage; 2],
    /// Mismatch count at the bias change point.
    pub amax_nvars: [SymbolCoverage; 2],
    /// Strand bias factor before normalization.
    pub bias_strand_raw: [SymbolCoverage; 2],
    /// Strand bias factor after quality and distance normalization.
    pub bias_strand: [SymbolCoverage; 2],
    /// Duplication bias factor against the previous tier (family tier only).
    pub bias_dup: [SymbolCoverage; 2],
    /// Multi-mutation molecules seen in this tier.
    pub phased: PhasedMutations,
}

impl TierStats {
    /// Zeroed counters over `[begin, end)`.
    pub fn new(tid: u32, begin: u32, end: u32) -> Self {
        let p = || strand_pair(tid, begin, end);
        Self {
            depth: p(),
            quality_sum: p(),
            quality_sqr_sum: p(),
            mapq_sum: p(),
            mapq_sqr_sum: p(),
            low_quality_depth: p(),
            high_quality_depth: p(),
            ldist_sum: p(),
            rdist_sum: p(),
            pass_thres: p(),
            pass_depth: p(),
            vars_thres: p(),
            vars_depth: p(),
            vars_badep: p(),
            vars_vqual: p(),
            bias_ldist: p(),
            bias_rdist: p(),
            bias_nvars: p(),
            amax_ldist: p(),
            amax_rdist: p(),
            amax_nvars: p(),
            bias_strand_raw: p(),
            bias_strand: p(),
            bias_dup: p(),
            phased: PhasedMutations::new(),
        }
    }

    fn credit(&mut self, s: usize, pos: u32, symbol: AlignmentSymbol, quality: u32, mapq: u32, low: u32) {
        let add = |region: &mut SymbolCoverage, v: u32| {
            region.get_mut(pos).credit(symbol, v, UpdateMode::Sum)
        };
        add(&mut self.depth[s], 1);
        add(&mut self.quality_sum[s], quality);
        add(&mut self.quality_sqr_sum[s], quality.saturating_mul(quality));
        add(&mut self.mapq_sum[s], mapq);
        add(&mut self.mapq_sqr_sum[s], mapq * mapq);
        if quality < low {
            add(&mut self.low_quality_depth[s], 1);
        }
    }

    /// Drop phased sets no longer supported by this tier's depth.
    pub fn update_hap_map(&mut self, max_ploidy: u32) {
        self.phased.retain_supported(&self.depth, max_ploidy);
    }
}

/// Family-level support used to score family consensus.
#[derive(Debug, Clone)]
pub struct FamilySupport {
    /// Families with any consensus at the position.
    pub total_depth: [SymbolCoverage; 2],
    /// Single-fragment families.
    pub size1_depth: [SymbolCoverage; 2],
    /// Families whose consensus holds under 80% of their fragments.
    pub nocon_depth: [SymbolCoverage; 2],
    /// Family sizes where the symbol was not a clear family majority.
    pub major_amplicon: [SymbolCoverage; 2],
    /// Fragments carrying the symbol where it was not a clear family majority.
    pub minor_amplicon: [SymbolCoverage; 2],
}

impl FamilySupport {
    fn new(tid: u32, begin: u32, end: u32) -> Self {
        Self {
            total_depth: strand_pair(tid, begin, end),
            size1_depth: strand_pair(tid, begin, end),
            nocon_depth: strand_pair(tid, begin, end),
            major_amplicon: strand_pair(tid, begin, end),
            minor_amplicon: strand_pair(tid, begin, end),
        }
    }
}

/// Duplex-family support; both strand slots hold the same counts.
#[derive(Debug, Clone)]
pub struct DuplexStats {
    /// Duplex families with any consensus at the position.
    pub depth: [SymbolCoverage; 2],
    /// Duplex families whose two strands agreed.
    pub pass_depth: [SymbolCoverage; 2],
}

/// Bucketed scratch histograms, cleared position by position by the bias filter.
#[derive(Debug, Clone)]
pub(crate) struct BiasScratch {
    pub(crate) quality: [CoveredRegion<QualityBuckets>; 2],
    pub(crate) ldist: [CoveredRegion<EdgeBuckets>; 2],
    pub(crate) rdist: [CoveredRegion<EdgeBuckets>; 2],
    pub(crate) nvars: [CoveredRegion<MismatchBuckets>; 2],
}

impl BiasScratch {
    fn new(tid: u32, begin: u32, end: u32) -> Self {
        Self {
            quality: strand_pair(tid, begin, end),
            ldist: strand_pair(tid, begin, end),
            rdist: strand_pair(tid, begin, end),
            nvars: strand_pair(tid, begin, end),
        }
    }

    pub(crate) fn clear_at(&mut self, s: usize, pos: u32) {
        self.quality[s].get_mut(pos).clear();
        self.ldist[s].get_mut(pos).clear();
        self.rdist[s].get_mut(pos).clear();
        self.nvars[s].get_mut(pos).clear();
    }
}

/// How one molecule (fragment or family strand) is credited into a tier.
struct MoleculeContext<'a> {
    strand: Strand,
    mapq: u32,
    reference: &'a [AlignmentSymbol],
    window_begin: u32,
    config: &'a AggregationConfig,
    rule: ConsensusRule,
    track_high_quality: bool,
}

fn edge_capped(quality: u32, ldist: u32, rdist: u32, per_base: Option<u32>) -> u32 {
    match per_base {
        Some(per) => quality.min(ldist.min(rdist).saturating_mul(per)),
        None => quality,
    }
}

fn carry_indel_identity(target: &mut SymbolCoverage, source: &SymbolCoverage, pos: u32, symbol: AlignmentSymbol) {
    if symbol.is_insertion() {
        if let Some((seq, _)) = source.insertions_at(pos).and_then(majority_entry) {
            target.add_insertion(pos, seq, 1);
        }
    } else if symbol.is_deletion() {
        if let Some((&len, _)) = source.deletions_at(pos).and_then(majority_entry) {
            target.add_deletion(pos, len, 1);
        }
    }
}

/// Credit the per-position consensus of one molecule into `tier` and the
/// bias histograms, then record its mutations as a phased set.
fn credit_molecule(
    tier: &mut TierStats,
    scratch: &mut BiasScratch,
    source: &SymbolCoverage,
    ctx: &MoleculeContext<'_>,
    mut phredlike: impl FnMut(u32, &Consensus) -> u32,
) {
    let s = ctx.strand.index();
    let config = ctx.config;
    let (ins_profile, ins_total) = source.insertion_length_profile();
    let mut ldist_inc = 0u32;
    let mut rdist_inc = ins_total;
    let mut n_vars = 0u32;
    let mut mutations = Vec::new();
    let mut credited = Vec::new();

    for (pos, counts) in source.iter() {
        let offset = (pos - source.begin()) as usize;
        let ldist = 1 + pos - source.begin();
        let rdist = source.end() - pos;
        ldist_inc += ins_profile[offset];
        for ty in SymbolType::ALL {
            let con = counts.consensus(ty, ctx.rule);
            if con.total == 0 {
                continue;
            }
            let symbol = con.symbol;
            let phred = phredlike(pos, &con);
            let quality = edge_capped(phred, ldist, rdist, config.edge_baq_per_base);
            tier.credit(s, pos, symbol, quality, ctx.mapq, config.low_quality_threshold);
            if ctx.track_high_quality {
                let threshold = match ty {
                    SymbolType::Base => config.high_quality_threshold_snv,
                    SymbolType::Link => config.high_quality_threshold_indel,
                };
                if quality >= threshold {
                    tier.high_quality_depth[s]
                        .get_mut(pos)
                        .credit(symbol, 1, UpdateMode::Sum);
                }
            }
            carry_indel_identity(&mut tier.depth[s], source, pos, symbol);

            let ref_symbol = ctx.reference[(pos - ctx.window_begin) as usize];
            if are_mutated(ref_symbol, symbol) {
                mutations.push((pos, symbol));
                if ty == SymbolType::Base && phred >= config.min_alt_quality {
                    n_vars += 1;
                }
            }

            let left = ldist + ldist_inc;
            let right = rdist + rdist_inc;
            scratch.quality[s].get_mut(pos).inc(symbol, quality_bucket(quality));
            scratch.ldist[s].get_mut(pos).inc(symbol, edge_bucket(left));
            scratch.rdist[s].get_mut(pos).inc(symbol, edge_bucket(right));
            tier.ldist_sum[s].get_mut(pos).credit(symbol, left, UpdateMode::Sum);
            tier.rdist_sum[s].get_mut(pos).credit(symbol, right, UpdateMode::Sum);
            credited.push((pos, symbol));
        }
        rdist_inc = rdist_inc.saturating_sub(ins_profile[offset]);
    }

    let bucket = mismatch_bucket(n_vars);
    for (pos, symbol) in credited {
        scratch.nvars[s].get_mut(pos).inc(symbol, bucket);
    }
    tier.phased.record(mutations, ctx.strand);
}

/// All per-window counters of the aggregation core.
#[derive(Debug, Clone)]
pub struct AggregationSet {
    tid: u32,
    begin: u32,
    end: u32,
    reference: Vec<AlignmentSymbol>,
    /// Fragment-consensus tier.
    pub raw: TierStats,
    /// Family-consensus tier.
    pub family: TierStats,
    /// Family-level agreement statistics.
    pub family_support: FamilySupport,
    /// Duplex-family support.
    pub duplex: DuplexStats,
    /// Margins a fragment needs to enter a family amplicon, derived from the
    /// raw tier's lenient cutoffs.
    pub amplicon_thresholds: [SymbolCoverage; 2],
    scratch: BiasScratch,
}

impl AggregationSet {
    /// Zeroed set over `[begin, end)` with the window's reference bases.
    ///
    /// # Panics
    /// Panics when `begin >= end` or the reference length differs from the window.
    pub fn new(tid: u32, begin: u32, end: u32, reference: Vec<AlignmentSymbol>) -> Self {
        assert!(begin < end, "window begin {begin} must precede end {end}");
        assert_eq!(
            reference.len(),
            (end - begin) as usize,
            "reference length must match window [{begin}, {end})"
        );
        Self {
            tid,
            begin,
            end,
            reference,
            raw: TierStats::new(tid, begin, end),
            family: TierStats::new(tid, begin, end),
            family_support: FamilySupport::new(tid, begin, end),
            duplex: DuplexStats {
                depth: strand_pair(tid, begin, end),
                pass_depth: strand_pair(tid, begin, end),
            },
            amplicon_thresholds: strand_pair(tid, begin, end),
            scratch: BiasScratch::new(tid, begin, end),
        }
    }

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

    /// Reference base at `pos`.
    pub fn reference_at(&self, pos: u32) -> AlignmentSymbol {
        assert!(
            self.begin <= pos && pos < self.end,
            "position {pos} outside window [{}, {})",
            self.begin,
            self.end
        );
        self.reference[(pos - self.begin) as usize]
    }

    /// Merge the mates of one fragment by quality-max projection.
    ///
    /// The span ends one past the fragment end so a trailing insertion has
    /// an anchor.
    pub fn project_fragment(&self, fragment: &Fragment, repeat_penalty: bool) -> SymbolCoverage {
        let mut coverage = SymbolCoverage::new(self.tid, fragment.begin(), fragment.end() + 1);
        for read in &fragment.reads {
            project_read(read, &mut coverage, ProjectionOptions::quality(repeat_penalty));
        }
        coverage
    }

    /// Build the raw tier from every fragment and run its bias filter.
    pub fn add_raw_tier(&mut self, families: &[Family], config: &AggregationConfig) {
        let mut n_fragments = 0usize;
        for family in families {
            let repeat_penalty = config.repeat_penalty_for_singletons && family.size() == 1;
            for strand in Strand::BOTH {
                for fragment in family.fragments(strand) {
                    let coverage = self.project_fragment(fragment, repeat_penalty);
                    let ctx = MoleculeContext {
                        strand,
                        mapq: fragment.max_mapq() as u32,
                        reference: &self.reference,
                        window_begin: self.begin,
                        config,
                        rule: ConsensusRule::IndelMajor,
                        track_high_quality: false,
                    };
                    credit_molecule(&mut self.raw, &mut self.scratch, &coverage, &ctx, |_, con| {
                        con.count.saturating_mul(2).saturating_sub(con.total)
                    });
                    n_fragments += 1;
                }
            }
        }
        debug!(
            tid = self.tid,
            begin = self.begin,
            end = self.end,
            n_fragments,
            "raw tier populated"
        );
        adafilter(&mut self.raw, None, &mut self.scratch, config);
        self.refresh_amplicon_thresholds(config);
    }

    fn refresh_amplicon_thresholds(&mut self, config: &AggregationConfig) {
        for s in 0..2 {
            for pos in self.begin..self.end {
                let cutoffs = *self.raw.pass_thres[s].get(pos);
                let thresholds = self.amplicon_thresholds[s].get_mut(pos);
                for &symbol in AlignmentSymbol::all() {
                    let floor = match symbol.symbol_type() {
                        SymbolType::Base => config.pass_quality_snv,
                        SymbolType::Link => config.pass_quality_indel,
                    };
                    thresholds.set(symbol, floor.max(cutoffs.get(symbol)));
                }
            }
        }
    }

    fn strand_span(fragments: &[Fragment]) -> Option<(u32, u32)> {
        let begin = fragments.iter().map(Fragment::begin).min()?;
        let end = fragments.iter().map(Fragment::end).max()?;
        Some((begin, end + 1))
    }

    /// Build the family and duplex tiers and run the family bias filter.
    ///
    /// Must run after [`AggregationSet::add_raw_tier`], whose cutoffs decide
    /// which fragments enter each family amplicon.
    pub fn add_family_tier(&mut self, families: &[Family], config: &AggregationConfig) {
        let mut amplicons: Vec<[Option<SymbolCoverage>; 2]> = Vec::with_capacity(families.len());
        for family in families {
            let repeat_penalty = config.repeat_penalty_for_singletons && family.size() == 1;
            let mut per_strand: [Option<SymbolCoverage>; 2] = [None, None];
            for strand in Strand::BOTH {
                let fragments = family.fragments(strand);
                let Some((begin, end)) = Self::strand_span(fragments) else {
                    continue;
                };
                let s = strand.index();
                let mut con_ampl = SymbolCoverage::new(self.tid, begin, end);
                let mut amplicon = SymbolCoverage::new(self.tid, begin, end);
                for fragment in fragments {
                    let coverage = self.project_fragment(fragment, repeat_penalty);
                    con_ampl.update_by_consensus(&coverage, UpdateMode::Sum, ConsensusRule::IndelMajor, 1);
                    amplicon.update_by_filtering(&coverage, &self.amplicon_thresholds[s], 1);
                }
                self.tally_family_agreement(s, &con_ampl, &amplicon);
                per_strand[s] = Some(amplicon);
            }
            amplicons.push(per_strand);
        }

        let mut n_duplex = 0usize;
        for (family, per_strand) in families.iter().zip(&amplicons) {
            let mut duplex = if family.is_duplex() {
                let spans: Vec<_> = per_strand.iter().flatten().map(|a| (a.begin(), a.end())).collect();
                let begin = spans.iter().map(|s| s.0).min();
                let end = spans.iter().map(|s| s.1).max();
                begin.zip(end).map(|(b, e)| SymbolCoverage::new(self.tid, b, e))
            } else {
                None
            };
            for strand in Strand::BOTH {
                let s = strand.index();
                let Some(amplicon) = &per_strand[s] else {
                    continue;
                };
                if let Some(duplex) = duplex.as_mut() {
                    duplex.update_by_consensus(amplicon, UpdateMode::Sum, ConsensusRule::Plurality, 1);
                }
                let mapq = family
                    .fragments(strand)
                    .iter()
                    .map(Fragment::max_mapq)
                    .max()
                    .unwrap_or(0) as u32;
                let ctx = MoleculeContext {
                    strand,
                    mapq,
                    reference: &self.reference,
                    window_begin: self.begin,
                    config,
                    rule: ConsensusRule::Plurality,
                    track_high_quality: true,
                };
                let support = &self.family_support;
                let thresholds = &self.amplicon_thresholds[s];
                credit_molecule(&mut self.family, &mut self.scratch, amplicon, &ctx, |pos, con| {
                    let major = support.major_amplicon[s].get(pos).get(con.symbol) as f64;
                    let minor = support.minor_amplicon[s].get(pos).get(con.symbol) as f64;
                    let pass_prob = phred_to_prob(thresholds.get(pos).get(con.symbol) as f64);
                    let score = binomial_phredlike(
                        minor + 1.0,
                        major + minor + 1.0 / pass_prob,
                        con.count as f64,
                        con.total as f64,
                        1.0,
                        config.ess_georatio_duped_pcr,
                    );
                    let mut quality = score.round() as u32;
                    if con.symbol == AlignmentSymbol::BaseN {
                        quality = quality.min(config.min_alt_quality);
                    }
                    quality.min(NUM_QUALITY_BUCKETS as u32 - 1)
                });
            }
            if let Some(duplex) = duplex {
                self.tally_duplex(&duplex);
                n_duplex += 1;
            }
        }
        debug!(
            tid = self.tid,
            begin = self.begin,
            n_families = families.len(),
            n_duplex,
            "family tier populated"
        );
        adafilter(&mut self.family, Some(&self.raw), &mut self.scratch, config);
    }

    fn tally_family_agreement(&mut self, s: usize, con_ampl: &SymbolCoverage, amplicon: &SymbolCoverage) {
        let support = &mut self.family_support;
        for (pos, counts) in con_ampl.iter() {
            for ty in SymbolType::ALL {
                let con = counts.consensus(ty, ConsensusRule::Plurality);
                if con.total == 0 {
                    continue;
                }
                support.total_depth[s].get_mut(pos).credit(con.symbol, 1, UpdateMode::Sum);
                if con.total == 1 {
                    support.size1_depth[s].get_mut(pos).credit(con.symbol, 1, UpdateMode::Sum);
                } else if con.count * 5 < con.total * 4 {
                    support.nocon_depth[s].get_mut(pos).credit(con.symbol, 1, UpdateMode::Sum);
                }
            }
        }
        for (pos, counts) in amplicon.iter() {
            for ty in SymbolType::ALL {
                let con = counts.consensus(ty, ConsensusRule::Plurality);
                if con.count <= 1 {
                    continue;
                }
                for (symbol, count) in counts.by_type(ty) {
                    if symbol != con.symbol || con.count * 2 <= con.total {
                        support.minor_amplicon[s].get_mut(pos).credit(symbol, count, UpdateMode::Sum);
                        support.major_amplicon[s].get_mut(pos).credit(symbol, con.total, UpdateMode::Sum);
                    }
                }
            }
        }
    }

    fn tally_duplex(&mut self, duplex: &SymbolCoverage) {
        for (pos, counts) in duplex.iter() {
            for ty in SymbolType::ALL {
                let con = counts.consensus(ty, ConsensusRule::Plurality);
                if con.total == 0 {
                    continue;
                }
                debug_assert!(con.total <= 2, "duplex merges two strands at most");
                for s in 0..2 {
                    self.duplex.depth[s].get_mut(pos).credit(con.symbol, 1, UpdateMode::Sum);
                    if con.count > 1 {
                        self.duplex.pass_depth[s].get_mut(pos).credit(con.symbol, 1, UpdateMode::Sum);
                    }
                }
            }
        }
    }
}
