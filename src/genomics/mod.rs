//! Family-aware pileup aggregation.
//!
//! Reads are projected onto per-position symbol counters, collapsed into
//! fragment and family consensus tiers, and screened by an adaptive bias
//! filter. The window driver ties the pieces together.

mod adafilter;
mod aggregation;
mod bias;
mod buckets;
mod counts;
mod coverage;
mod driver;
mod mutation_rate;
mod phasing;
mod projection;
mod region;
mod statistics;
mod symbol;
mod types;

pub use adafilter::{search_cutoffs, Cutoff, CutoffSearch};
pub use aggregation::{AggregationSet, DuplexStats, FamilySupport, TierStats};
pub use bias::{adabias, bias_factor100, bias_imbalance, binomial_phredlike, ChangePoint};
pub use buckets::{
    bucket_phred, edge_bucket, edge_bucket_distance, mismatch_bucket, mismatch_bucket_count,
    quality_bucket, EdgeBuckets, MismatchBuckets, QualityBuckets, SymbolBuckets,
    NUM_EDGE_BUCKETS, NUM_MISMATCH_BUCKETS, NUM_QUALITY_BUCKETS,
};
pub use counts::{Consensus, ConsensusRule, Credited, SymbolCounts, UpdateMode};
pub use coverage::SymbolCoverage;
pub use driver::{process_window, BatchRunner, WindowInput, WindowResult, WindowSource};
pub use mutation_rate::MutationRates;
pub use phasing::{MutationSet, PhasedMutations};
pub use projection::{project_read, repeat_penalty_phred, ProjectionOptions};
pub use region::{majority_entry, CoveredRegion, DeletionCounts, InsertionCounts};
pub use statistics::{
    collect_allele_stats, phred_to_prob, prob_to_phred, AlleleStats, TierSummary,
};
pub use symbol::{
    are_mutated, reference_to_symbols, AlignmentSymbol, SymbolType, NUM_ALIGNMENT_SYMBOLS,
};
pub use types::{AlignedRead, CigarOp, CigarOpKind, Family, Fragment, Strand};
