//! Adaptive bias filter run at the end of each tier.
//!
//! For every minority symbol the filter measures four biases (duplication,
//! edge distance, mismatch load and strand) and turns the strongest one into
//! a cap on usable depth. Every observed symbol, minority or not, then has
//! its quality histogram searched for the best lenient and strict cutoffs.

use crate::config::AggregationConfig;
use crate::genomics::aggregation::{BiasScratch, TierStats};
use crate::genomics::bias::{adabias, bias_factor100, bias_imbalance, binomial_phredlike};
use crate::genomics::buckets::{
    bucket_phred, edge_bucket_distance, mismatch_bucket_count, NUM_QUALITY_BUCKETS,
};
use crate::genomics::counts::{ConsensusRule, SymbolCounts};
use crate::genomics::coverage::SymbolCoverage;
use crate::genomics::statistics::phred_to_prob;
use crate::genomics::symbol::{AlignmentSymbol, SymbolType};
use crate::genomics::types::Strand;

const EDGE_GAP: usize = 2;
const MISMATCH_GAP: usize = 4;

/// One quality cutoff and the depth it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cutoff {
    /// Lowest phred kept.
    pub phred: u32,
    /// Depth at or above `phred`.
    pub depth: u32,
    /// Objective value reached at this cutoff.
    pub score: f64,
}

/// Lenient and strict cutoffs of one symbol histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CutoffSearch {
    /// Maximizes `depth × phred`.
    pub lenient: Cutoff,
    /// Maximizes the binomial confidence of the capped depth.
    pub strict: Cutoff,
}

/// Scan `histogram` from the highest quality bucket down.
///
/// Bucket phreds are capped at `phred_max`. The strict score is only
/// evaluated while the depth accumulated above the current bucket stays
/// within `depth_cap`; its depth is `min(cumulative, depth_cap)`.
pub fn search_cutoffs(
    histogram: &[u32; NUM_QUALITY_BUCKETS],
    phred_max: u32,
    added_phred: u32,
    depth_cap: u32,
    type_depth: u32,
    ess_georatio: f64,
) -> CutoffSearch {
    let mut best = CutoffSearch::default();
    let mut cumulative = 0u32;
    for bucket in (0..NUM_QUALITY_BUCKETS).rev() {
        let count = histogram[bucket];
        if count == 0 {
            continue;
        }
        let above = cumulative;
        cumulative += count;
        let phred = bucket_phred(bucket).min(phred_max);

        let lenient = cumulative as f64 * phred as f64;
        if lenient > best.lenient.score {
            best.lenient = Cutoff {
                phred,
                depth: cumulative,
                score: lenient,
            };
        }

        if above <= depth_cap {
            let depth = cumulative.min(depth_cap);
            let error = phred_to_prob((phred + added_phred) as f64);
            let strict = binomial_phredlike(
                error,
                1.0 + f64::EPSILON,
                depth as f64,
                type_depth as f64,
                1.0,
                ess_georatio,
            );
            if strict > best.strict.score {
                best.strict = Cutoff {
                    phred,
                    depth,
                    score: strict,
                };
            }
        }
    }
    best
}

fn is_minority(symbol_depth: u32, type_depth: u32) -> bool {
    symbol_depth > 0 && symbol_depth * 5 < type_depth * 4
}

fn smoothed<const N: usize>(row: &[u32; N]) -> [u32; N] {
    (*row).map(|v| v + 1)
}

fn average(sum: u32, n: u32) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

fn set(region: &mut [SymbolCoverage; 2], s: usize, pos: u32, symbol: AlignmentSymbol, value: u32) {
    region[s].get_mut(pos).set(symbol, value);
}

/// Fill the bias, cutoff and depth-cap outputs of `tier` and clear the
/// scratch histograms of every position.
///
/// `previous` is the raw tier this one was collapsed from; when present the
/// duplication bias between the two is measured too, and strand qualities
/// are read from it instead of from `tier`.
pub(crate) fn adafilter(
    tier: &mut TierStats,
    previous: Option<&TierStats>,
    scratch: &mut BiasScratch,
    config: &AggregationConfig,
) {
    let pc = config.bias_pseudocount;
    let positions = tier.depth[0].positions();
    for strand in Strand::BOTH {
        let s = strand.index();
        let o = strand.opposite().index();
        for pos in positions.clone() {
            let here: SymbolCounts = *tier.depth[s].get(pos);
            let there: SymbolCounts = *tier.depth[o].get(pos);
            for ty in SymbolType::ALL {
                let cur_type = here.sum_by_type(ty);
                let opp_type = there.sum_by_type(ty);
                let con_symbol = here.consensus(ty, ConsensusRule::Plurality).symbol;
                let ldist_all = smoothed(&scratch.ldist[s].get(pos).type_row(ty));
                let rdist_all = smoothed(&scratch.rdist[s].get(pos).type_row(ty));
                let nvars_all = smoothed(&scratch.nvars[s].get(pos).type_row(ty));
                // strand qualities always come from base qualities of the raw tier
                let bases = previous.unwrap_or(&*tier);
                let base_quality: SymbolCounts = *bases.quality_sum[s].get(pos);
                let base_depth: SymbolCounts = *bases.depth[s].get(pos);
                let opp_type_quality = average(
                    bases.quality_sum[o].get(pos).sum_by_type(ty),
                    bases.depth[o].get(pos).sum_by_type(ty),
                );
                let opp_type_ldist = tier.ldist_sum[o].get(pos).sum_by_type(ty) as f64;
                let opp_type_rdist = tier.rdist_sum[o].get(pos).sum_by_type(ty) as f64;
                let added_phred = match ty {
                    SymbolType::Base => config.added_phred_snv,
                    SymbolType::Link => config.added_phred_indel,
                };

                for &symbol in ty.symbols() {
                    let cur = here.get(symbol);
                    let opp = there.get(symbol);
                    let biased = !symbol.is_ambiguous()
                        && (is_minority(cur, cur_type) || is_minority(opp, opp_type));
                    // majority alleles keep their whole depth
                    let mut badep = cur;
                    if biased {
                        let mut max_imbalance = 1.0f64;

                        if let Some(prev) = previous {
                            let prev_type = prev.depth[s].get(pos).sum_by_type(ty);
                            let prev_symbol = prev.depth[s].get(pos).get(symbol);
                            let dup = bias_factor100(
                                (prev_type.max(cur_type) - cur_type + 1) as f64,
                                cur_type as f64,
                                (prev_symbol.max(cur) - cur + 1) as f64,
                                cur as f64,
                                pc / 2.0,
                            );
                            set(&mut tier.bias_dup, s, pos, symbol, dup);
                            max_imbalance = max_imbalance.max(bias_imbalance(dup));
                        }

                        let ldist = adabias(
                            &ldist_all,
                            &smoothed(scratch.ldist[s].get(pos).row(symbol)),
                            pc / 2.0,
                            EDGE_GAP,
                        );
                        let rdist = adabias(
                            &rdist_all,
                            &smoothed(scratch.rdist[s].get(pos).row(symbol)),
                            pc / 2.0,
                            EDGE_GAP,
                        );
                        let nvars = adabias(
                            &nvars_all,
                            &smoothed(scratch.nvars[s].get(pos).row(symbol)),
                            pc / 2.0,
                            MISMATCH_GAP,
                        );
                        set(&mut tier.bias_ldist, s, pos, symbol, ldist.factor);
                        set(&mut tier.bias_rdist, s, pos, symbol, rdist.factor);
                        set(&mut tier.bias_nvars, s, pos, symbol, nvars.factor);
                        set(&mut tier.amax_ldist, s, pos, symbol, edge_bucket_distance(ldist.split));
                        set(&mut tier.amax_rdist, s, pos, symbol, edge_bucket_distance(rdist.split));
                        set(&mut tier.amax_nvars, s, pos, symbol, mismatch_bucket_count(nvars.split));
                        for factor in [ldist.factor, rdist.factor, nvars.factor] {
                            max_imbalance = max_imbalance.max(bias_imbalance(factor));
                        }

                        // Reads on the opposite strand see the molecule mirrored, so
                        // this strand's left distance pairs with the opposite right.
                        let quality_imbalance = 10f64.powf(
                            (average(base_quality.get(symbol), base_depth.get(symbol)) - opp_type_quality) / 10.0,
                        );
                        let denom = (opp_type as f64 + 1.0).max(1.0);
                        let ldist_imbalance = ((tier.ldist_sum[s].get(pos).get(symbol) as f64 + 1.0)
                            / (cur as f64 + 1.0))
                            / ((opp_type_rdist + 1.0) / denom);
                        let rdist_imbalance = ((tier.rdist_sum[s].get(pos).get(symbol) as f64 + 1.0)
                            / (cur as f64 + 1.0))
                            / ((opp_type_ldist + 1.0) / denom);
                        let strand_raw = bias_factor100(
                            opp_type as f64,
                            cur_type as f64,
                            opp as f64,
                            cur as f64,
                            pc,
                        );
                        let normalizer = quality_imbalance
                            .max(ldist_imbalance)
                            .max(rdist_imbalance)
                            .max(1.0);
                        let strand_bias = (strand_raw as f64 / normalizer).round() as u32;
                        set(&mut tier.bias_strand_raw, s, pos, symbol, strand_raw);
                        set(&mut tier.bias_strand, s, pos, symbol, strand_bias);
                        max_imbalance = max_imbalance.max(bias_imbalance(strand_bias));

                        let cap_imbalance = (config.imbalance_cap as f64 / 100.0).min(max_imbalance);
                        badep = (cur as f64 / cap_imbalance / (1.0 + f64::EPSILON)).ceil() as u32;
                    }
                    if cur == 0 {
                        continue;
                    }

                    let phred_max = config.mutation_rates.phred_error_rate(con_symbol, symbol);
                    let found = search_cutoffs(
                        scratch.quality[s].get(pos).row(symbol),
                        phred_max,
                        added_phred,
                        badep,
                        cur_type,
                        config.ess_georatio_dedup,
                    );
                    set(&mut tier.pass_thres, s, pos, symbol, found.lenient.phred);
                    set(&mut tier.pass_depth, s, pos, symbol, found.lenient.depth);
                    set(&mut tier.vars_thres, s, pos, symbol, found.strict.phred);
                    set(&mut tier.vars_depth, s, pos, symbol, found.strict.depth);
                    set(&mut tier.vars_badep, s, pos, symbol, badep);
                    set(&mut tier.vars_vqual, s, pos, symbol, found.strict.score.round() as u32);
                }
            }
            scratch.clear_at(s, pos);
        }
    }
}
