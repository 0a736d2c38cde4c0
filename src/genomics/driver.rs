//! Window-level entry points and the batch runner.
//!
//! A window is processed independently of every other window: raw tier, raw
//! phased-set pruning, then (optionally) family tier and its pruning. The
//! [`BatchRunner`] overlaps fetching the next batch with aggregating the
//! current one on a fixed rayon pool and hands results to a sink in window
//! order.

use std::sync::mpsc::sync_channel;
use std::thread;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::config::AggregationConfig;
use crate::genomics::aggregation::AggregationSet;
use crate::genomics::statistics::{collect_allele_stats, AlleleStats};
use crate::genomics::symbol::{reference_to_symbols, AlignmentSymbol};
use crate::genomics::types::{AlignedRead, CigarOpKind, Family};
use crate::AggregationError;

/// Validated input of one window: its reference bases and the families whose
/// reads fall inside it.
#[derive(Debug, Clone)]
pub struct WindowInput {
    tid: u32,
    begin: u32,
    end: u32,
    reference: Vec<AlignmentSymbol>,
    families: Vec<Family>,
}

fn validate_read(read: &AlignedRead, tid: u32, begin: u32, end: u32) -> Result<(), AggregationError> {
    if read.tid != tid {
        return Err(AggregationError::ContigMismatch {
            expected: tid,
            found: read.tid,
        });
    }
    if read.cigar.iter().any(|op| op.kind == CigarOpKind::Back) {
        return Err(AggregationError::UnsupportedCigar { pos: read.pos });
    }
    if read.pos < begin || read.end() >= end {
        return Err(AggregationError::ReadOutsideWindow {
            pos: read.pos,
            read_end: read.end(),
            begin,
            end,
        });
    }
    if read.qualities.len() != read.sequence.len() {
        return Err(AggregationError::QualityLength {
            pos: read.pos,
            sequence: read.sequence.len(),
            qualities: read.qualities.len(),
        });
    }
    let query_len: usize = read
        .cigar
        .iter()
        .filter(|op| op.kind.consumes_query())
        .map(|op| op.len as usize)
        .sum();
    if query_len != read.sequence.len() {
        return Err(AggregationError::CigarLength {
            pos: read.pos,
            cigar: query_len,
            sequence: read.sequence.len(),
        });
    }
    Ok(())
}

impl WindowInput {
    /// Validate and wrap one window.
    ///
    /// Every read must sit on `tid`, start at or after `begin`, and end
    /// strictly before `end` so trailing insertions stay anchored inside the
    /// window. `reference` holds the bases of `[begin, end)`.
    pub fn new(
        tid: u32,
        begin: u32,
        end: u32,
        reference: &[u8],
        families: Vec<Family>,
    ) -> Result<Self, AggregationError> {
        if begin >= end {
            return Err(AggregationError::InvalidWindow { begin, end });
        }
        let expected = (end - begin) as usize;
        if reference.len() != expected {
            return Err(AggregationError::ReferenceLength {
                expected,
                actual: reference.len(),
            });
        }
        for (index, family) in families.iter().enumerate() {
            for fragment in family.strands.iter().flatten() {
                if fragment.reads.is_empty() {
                    return Err(AggregationError::EmptyFragment { family: index });
                }
                for read in &fragment.reads {
                    validate_read(read, tid, begin, end)?;
                }
            }
        }
        Ok(Self {
            tid,
            begin,
            end,
            reference: reference_to_symbols(reference),
            families,
        })
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

    /// Families of the window.
    pub fn families(&self) -> &[Family] {
        &self.families
    }
}

/// Aggregated counters of one window.
#[derive(Debug, Clone)]
pub struct WindowResult {
    set: AggregationSet,
    with_family: bool,
}

impl WindowResult {
    /// Underlying counters.
    pub fn set(&self) -> &AggregationSet {
        &self.set
    }

    /// Whether the family and duplex tiers were computed.
    pub fn has_family_tier(&self) -> bool {
        self.with_family
    }

    /// Per-allele summaries in position then symbol order.
    pub fn allele_stats(&self) -> Vec<AlleleStats> {
        collect_allele_stats(&self.set, self.with_family)
    }
}

/// Aggregate one window.
pub fn process_window(input: &WindowInput, config: &AggregationConfig) -> WindowResult {
    let mut set = AggregationSet::new(input.tid, input.begin, input.end, input.reference.clone());
    set.add_raw_tier(&input.families, config);
    set.raw.update_hap_map(config.max_ploidy);
    if config.use_family_tier {
        set.add_family_tier(&input.families, config);
        set.family.update_hap_map(config.max_ploidy);
    }
    WindowResult {
        set,
        with_family: config.use_family_tier,
    }
}

/// Producer of window batches; `None` ends the run.
pub trait WindowSource: Send {
    /// Next batch of windows in genomic order.
    fn next_batch(&mut self) -> Option<Vec<WindowInput>>;
}

impl<I> WindowSource for I
where
    I: Iterator<Item = Vec<WindowInput>> + Send,
{
    fn next_batch(&mut self) -> Option<Vec<WindowInput>> {
        self.next()
    }
}

/// Runs batches of windows on a fixed worker pool.
#[derive(Debug)]
pub struct BatchRunner {
    config: AggregationConfig,
    pool: ThreadPool,
}

impl BatchRunner {
    /// Validate `config` and build a pool of `config.threads` workers.
    pub fn new(config: AggregationConfig) -> Result<Self, AggregationError> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|err| AggregationError::ThreadPool(err.to_string()))?;
        Ok(Self { config, pool })
    }

    /// Configuration in use.
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate one batch, returning results in input order.
    pub fn run_batch(&self, batch: &[WindowInput]) -> Vec<WindowResult> {
        let config = &self.config;
        self.pool
            .install(|| batch.par_iter().map(|w| process_window(w, config)).collect())
    }

    /// Drain `source`, feeding every window result to `sink` in order.
    ///
    /// The next batch is fetched on a separate thread while the current one
    /// is aggregated; the producer hands batches over through a rendezvous
    /// channel, so it never holds more than one batch ahead of the consumer.
    /// Returns the number of windows processed.
    pub fn run<S, F>(&self, mut source: S, mut sink: F) -> usize
    where
        S: WindowSource,
        F: FnMut(WindowResult),
    {
        info!(threads = self.config.threads, "starting window aggregation");
        let processed = thread::scope(|scope| {
            let (tx, rx) = sync_channel::<Vec<WindowInput>>(0);
            scope.spawn(move || {
                while let Some(batch) = source.next_batch() {
                    if tx.send(batch).is_err() {
                        break;
                    }
                }
            });
            let mut processed = 0usize;
            for (index, batch) in rx.iter().enumerate() {
                let results = self.run_batch(&batch);
                debug!(batch = index, windows = results.len(), "batch aggregated");
                for result in results {
                    sink(result);
                    processed += 1;
                }
            }
            processed
        });
        info!(windows = processed, "window aggregation finished");
        processed
    }
}
