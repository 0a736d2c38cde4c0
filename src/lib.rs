//! # Family-aware pileup aggregation
//!
//! This library implements the statistical core of a UMI-family variant
//! caller. Reads sharing a molecular barcode form a family; every window of
//! the genome is summarized per strand in three consensus tiers:
//!
//! 1. **Raw tier**: each fragment (mates merged by quality-max projection)
//!    contributes one consensus per position, weighted by its quality margin
//! 2. **Family tier**: each family strand contributes one amplicon consensus,
//!    scored by how consistently family members agree at that position
//! 3. **Duplex tier**: families observed on both strands count as duplex
//!    support when the two strand consensuses agree
//!
//! Every tier ends with an adaptive bias filter that measures strand,
//! edge-distance, mismatch-load and duplication biases, shrinks the usable
//! depth of biased alleles, and picks lenient and strict quality cutoffs.
//!
//! ## Usage Example
//!
//! ```no_run
//! use fampile::{AggregationConfig, BatchRunner, WindowInput};
//!
//! let config = AggregationConfig::default().with_threads(4);
//! let runner = BatchRunner::new(config)?;
//! let window = WindowInput::new(0, 0, 8, b"ACGTACGT", Vec::new())?;
//! runner.run(std::iter::once(vec![window]), |result| {
//!     for stats in result.allele_stats() {
//!         println!("{} {} {}", stats.pos, stats.symbol, stats.raw.total_depth());
//!     }
//! });
//! # Ok::<(), fampile::AggregationError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod config; // Thresholds and their validation
pub mod genomics; // Symbols, counters, tiers and the window driver

pub use config::{AggregationConfig, ConfigError};
pub use genomics::{
    process_window, AlignedRead, AlignmentSymbol, AlleleStats, BatchRunner, Family, Fragment,
    Strand, WindowInput, WindowResult,
};

use thiserror::Error;

/// Errors raised while preparing or running window aggregation.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Window coordinates are empty or reversed.
    #[error("invalid window [{begin}, {end})")]
    InvalidWindow {
        /// Inclusive first coordinate.
        begin: u32,
        /// Exclusive last coordinate.
        end: u32,
    },

    /// Reference bases do not span the window.
    #[error("reference has {actual} bases, window needs {expected}")]
    ReferenceLength {
        /// Window length.
        expected: usize,
        /// Supplied reference length.
        actual: usize,
    },

    /// A read sits on another contig.
    #[error("read on contig {found} in window of contig {expected}")]
    ContigMismatch {
        /// Window contig.
        expected: u32,
        /// Read contig.
        found: u32,
    },

    /// A read starts before the window or reaches its last position.
    #[error("read [{pos}, {read_end}) does not end inside window [{begin}, {end})")]
    ReadOutsideWindow {
        /// Read start.
        pos: u32,
        /// Read end (exclusive).
        read_end: u32,
        /// Window start.
        begin: u32,
        /// Window end (exclusive).
        end: u32,
    },

    /// A family holds a fragment without reads.
    #[error("family {family} has an empty fragment")]
    EmptyFragment {
        /// Index of the family in the window.
        family: usize,
    },

    /// Sequence and quality lengths differ.
    #[error("read at {pos}: {sequence} bases but {qualities} qualities")]
    QualityLength {
        /// Read start.
        pos: u32,
        /// Sequence length.
        sequence: usize,
        /// Quality length.
        qualities: usize,
    },

    /// The CIGAR query length differs from the sequence length.
    #[error("read at {pos}: CIGAR consumes {cigar} bases but sequence has {sequence}")]
    CigarLength {
        /// Read start.
        pos: u32,
        /// Bases consumed by the CIGAR.
        cigar: usize,
        /// Sequence length.
        sequence: usize,
    },

    /// The CIGAR holds an operation projection cannot follow.
    #[error("read at {pos}: unsupported CIGAR operation B")]
    UnsupportedCigar {
        /// Read start.
        pos: u32,
    },

    /// Invalid thresholds.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}
