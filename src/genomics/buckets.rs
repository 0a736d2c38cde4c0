use crate::genomics::symbol::{AlignmentSymbol, SymbolType, NUM_ALIGNMENT_SYMBOLS};

/// Number of quality buckets; phred values at or above the last bucket share it.
pub const NUM_QUALITY_BUCKETS: usize = 48;
/// Number of distance-to-fragment-edge buckets.
pub const NUM_EDGE_BUCKETS: usize = 12;
/// Number of fragment-local mismatch-count buckets.
pub const NUM_MISMATCH_BUCKETS: usize = 12;

/// Bucket holding a phred-like quality.
#[inline]
pub fn quality_bucket(phred: u32) -> usize {
    (phred as usize).min(NUM_QUALITY_BUCKETS - 1)
}

/// Lowest phred that falls into `bucket`.
#[inline]
pub fn bucket_phred(bucket: usize) -> u32 {
    bucket as u32
}

/// Triangular-width bucket of a distance to the fragment edge.
///
/// Boundaries sit after the triangular numbers 1, 3, 6, 10, ... so that
/// distances 0-1 share bucket 0, 2-3 bucket 1, 4-6 bucket 2, and every
/// distance of 67 or more lands in the last bucket.
pub fn edge_bucket(distance: u32) -> usize {
    let mut bucket = 0;
    while bucket + 1 < NUM_EDGE_BUCKETS && edge_bucket_distance(bucket) < distance {
        bucket += 1;
    }
    bucket
}

/// Largest distance represented by `bucket` (the triangular number `T(bucket+1)`).
#[inline]
pub fn edge_bucket_distance(bucket: usize) -> u32 {
    let b = bucket as u32;
    (b + 1) * (b + 2) / 2
}

/// Bucket of a fragment's mismatch count; fewer mismatches sit in higher buckets.
#[inline]
pub fn mismatch_bucket(n_mismatches: u32) -> usize {
    let clipped = (n_mismatches as usize).min(NUM_MISMATCH_BUCKETS - 1);
    NUM_MISMATCH_BUCKETS - 1 - clipped
}

/// Mismatch count represented by `bucket`.
#[inline]
pub fn mismatch_bucket_count(bucket: usize) -> u32 {
    (NUM_MISMATCH_BUCKETS - 1 - bucket.min(NUM_MISMATCH_BUCKETS - 1)) as u32
}

/// Per-symbol histogram with `N` buckets, used as per-position scratch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolBuckets<const N: usize> {
    buckets: [[u32; N]; NUM_ALIGNMENT_SYMBOLS],
}

impl<const N: usize> Default for SymbolBuckets<N> {
    fn default() -> Self {
        Self {
            buckets: [[0; N]; NUM_ALIGNMENT_SYMBOLS],
        }
    }
}

impl<const N: usize> SymbolBuckets<N> {
    /// Add one observation of `symbol` to `bucket`.
    ///
    /// # Panics
    /// Panics when `bucket >= N`.
    #[inline]
    pub fn inc(&mut self, symbol: AlignmentSymbol, bucket: usize) {
        assert!(bucket < N, "bucket {bucket} out of range for {N} buckets");
        self.buckets[symbol.index()][bucket] += 1;
    }

    /// Histogram of one symbol.
    pub fn row(&self, symbol: AlignmentSymbol) -> &[u32; N] {
        &self.buckets[symbol.index()]
    }

    /// Count at (`symbol`, `bucket`).
    pub fn get(&self, symbol: AlignmentSymbol, bucket: usize) -> u32 {
        self.buckets[symbol.index()][bucket]
    }

    /// Bucket-wise sum over every symbol of `ty`.
    pub fn type_row(&self, ty: SymbolType) -> [u32; N] {
        let mut sum = [0; N];
        for &s in ty.symbols() {
            for (acc, v) in sum.iter_mut().zip(self.row(s)) {
                *acc += v;
            }
        }
        sum
    }

    /// Total mass recorded for `symbol`.
    pub fn total(&self, symbol: AlignmentSymbol) -> u32 {
        self.row(symbol).iter().sum()
    }

    /// Reset all histograms.
    pub fn clear(&mut self) {
        self.buckets = [[0; N]; NUM_ALIGNMENT_SYMBOLS];
    }
}

/// Histogram over quality buckets.
pub type QualityBuckets = SymbolBuckets<NUM_QUALITY_BUCKETS>;
/// Histogram over edge-distance buckets.
pub type EdgeBuckets = SymbolBuckets<NUM_EDGE_BUCKETS>;
/// Histogram over mismatch-count buckets.
pub type MismatchBuckets = SymbolBuckets<NUM_MISMATCH_BUCKETS>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0)]
    #[test_case(1, 0)]
    #[test_case(2, 1)]
    #[test_case(3, 1)]
    #[test_case(4, 2)]
    #[test_case(6, 2)]
    #[test_case(7, 3)]
    #[test_case(10, 3)]
    #[test_case(11, 4)]
    #[test_case(55, 9)]
    #[test_case(56, 10)]
    #[test_case(66, 10)]
    #[test_case(67, 11)]
    #[test_case(10_000, 11)]
    fn edge_buckets_follow_triangular_boundaries(distance: u32, bucket: usize) {
        assert_eq!(edge_bucket(distance), bucket);
    }

    #[test]
    fn edge_bucket_distance_is_upper_bound_of_bucket() {
        for bucket in 0..NUM_EDGE_BUCKETS - 1 {
            let d = edge_bucket_distance(bucket);
            assert_eq!(edge_bucket(d), bucket);
            assert_eq!(edge_bucket(d + 1), bucket + 1);
        }
        assert_eq!(edge_bucket_distance(NUM_EDGE_BUCKETS - 1), 78);
    }

    #[test]
    fn mismatch_buckets_reverse_and_clip() {
        assert_eq!(mismatch_bucket(0), 11);
        assert_eq!(mismatch_bucket(3), 8);
        assert_eq!(mismatch_bucket(40), 0);
        for n in 0..12 {
            assert_eq!(mismatch_bucket_count(mismatch_bucket(n)), n);
        }
    }

    #[test]
    fn quality_bucket_is_monotone_and_capped() {
        let mut last = 0;
        for phred in 0..200 {
            let b = quality_bucket(phred);
            assert!(b >= last);
            assert!(b < NUM_QUALITY_BUCKETS);
            last = b;
        }
        assert_eq!(bucket_phred(quality_bucket(30)), 30);
    }

    #[test]
    fn clear_zeroes_every_cell() {
        let mut h = QualityBuckets::default();
        h.inc(AlignmentSymbol::BaseA, 30);
        h.inc(AlignmentSymbol::LinkI1, 2);
        assert_eq!(h.total(AlignmentSymbol::BaseA), 1);
        h.clear();
        for &s in AlignmentSymbol::all() {
            for b in 0..NUM_QUALITY_BUCKETS {
                assert_eq!(h.get(s, b), 0);
            }
        }
    }

    #[test]
    fn type_row_sums_symbols_of_type() {
        let mut h = EdgeBuckets::default();
        h.inc(AlignmentSymbol::BaseA, 1);
        h.inc(AlignmentSymbol::BaseC, 1);
        h.inc(AlignmentSymbol::LinkM, 1);
        assert_eq!(h.type_row(SymbolType::Base)[1], 2);
        assert_eq!(h.type_row(SymbolType::Link)[1], 1);
    }
}
