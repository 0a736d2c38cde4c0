use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use fampile::genomics::{CigarOp, TierSummary};
use fampile::{
    AggregationConfig, AlignedRead, AlleleStats, BatchRunner, Family, Fragment, Strand,
    WindowInput, WindowResult,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fampile", about = "Family-aware pileup aggregation for UMI sequencing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate barcode families into per-allele statistics.
    Aggregate {
        /// Reference sequence of the contig (plain sequence or FASTA).
        #[arg(long)]
        reference: PathBuf,
        /// Family table: `family_id strand fragment_id pos mapq cigar sequence qualities`.
        #[arg(long)]
        families: PathBuf,
        /// Contig identifier assigned to every read.
        #[arg(long, default_value_t = 0)]
        contig: u32,
        /// First reference position to aggregate.
        #[arg(long, default_value_t = 0)]
        begin: u32,
        /// Minimum window length; windows grow to hold whole families.
        #[arg(long, default_value_t = 1000)]
        window: u32,
        /// Worker threads.
        #[arg(long, default_value_t = 1)]
        threads: usize,
        /// Stop after the raw tier.
        #[arg(long)]
        no_family_tier: bool,
        /// Debug-level logging.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            reference,
            families,
            contig,
            begin,
            window,
            threads,
            no_family_tier,
            verbose,
        } => {
            init_tracing(verbose);
            let config = AggregationConfig::default()
                .with_threads(threads)
                .with_family_tier(!no_family_tier);
            run_aggregate(&reference, &families, contig, begin, window, config)?
        }
    }

    Ok(())
}

fn run_aggregate(
    reference_path: &Path,
    families_path: &Path,
    contig: u32,
    begin: u32,
    window: u32,
    config: AggregationConfig,
) -> Result<()> {
    if window == 0 {
        bail!("window length must be > 0");
    }
    let reference = read_sequence_file(reference_path).with_context(|| {
        format!("failed to read reference from {}", reference_path.display())
    })?;
    let families = read_family_file(families_path, contig)
        .with_context(|| format!("failed to read families from {}", families_path.display()))?;
    info!(families = families.len(), reference_len = reference.len(), "inputs loaded");

    let windows = tile_windows(&reference, families, contig, begin, window)?;
    let batch_size = config.threads.max(1) * 4;
    let mut batches: Vec<Vec<WindowInput>> = Vec::new();
    let mut windows = windows.into_iter().peekable();
    while windows.peek().is_some() {
        batches.push(windows.by_ref().take(batch_size).collect());
    }

    let runner = BatchRunner::new(config).context("invalid aggregation settings")?;
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "{}", HEADER.join("\t"))?;
    let mut write_error = None;
    runner.run(batches.into_iter(), |result: WindowResult| {
        if write_error.is_some() {
            return;
        }
        for stats in result.allele_stats() {
            if let Err(err) = writeln!(out, "{}", format_stats(&stats)) {
                write_error = Some(err);
                return;
            }
        }
    });
    if let Some(err) = write_error {
        return Err(err).context("failed to write statistics");
    }
    out.flush()?;
    Ok(())
}

/// Cut `[begin, reference end)` into consecutive windows of at least
/// `window` bases, stretching a window until every family starting in it
/// ends strictly before its end.
fn tile_windows(
    reference: &[u8],
    mut families: Vec<Family>,
    contig: u32,
    begin: u32,
    window: u32,
) -> Result<Vec<WindowInput>> {
    let reference_end = reference.len() as u32;
    let span = |f: &Family| {
        let fragments = f.strands.iter().flatten();
        let lo = fragments.clone().map(Fragment::begin).min().unwrap_or(0);
        let hi = fragments.map(Fragment::end).max().unwrap_or(0);
        (lo, hi)
    };
    let before = families.len();
    families.retain(|f| span(f).0 >= begin);
    if families.len() < before {
        warn!(dropped = before - families.len(), begin, "families starting before --begin skipped");
    }
    families.sort_by_key(|f| span(f).0);

    let mut windows = Vec::new();
    let mut families = families.into_iter().peekable();
    let mut start = begin;
    while start < reference_end {
        let mut end = start.saturating_add(window).min(reference_end);
        let mut members = Vec::new();
        while let Some(family) = families.next_if(|f| span(f).0 < end) {
            let (_, family_end) = span(&family);
            end = end.max(family_end + 1);
            members.push(family);
        }
        if end > reference_end {
            bail!("families extend past the reference end {reference_end}");
        }
        let input = WindowInput::new(
            contig,
            start,
            end,
            &reference[start as usize..end as usize],
            members,
        )
        .with_context(|| format!("invalid window [{start}, {end})"))?;
        windows.push(input);
        start = end;
    }
    if families.peek().is_some() {
        bail!("families start past the reference end {reference_end}");
    }
    Ok(windows)
}

fn read_sequence_file(path: &Path) -> Result<Vec<u8>> {
    let contents = std::fs::read_to_string(path)?;
    let sequence: String = contents
        .lines()
        .filter(|line| !line.starts_with('>') && !line.trim().is_empty())
        .map(str::trim)
        .collect();
    Ok(sequence.to_ascii_uppercase().into_bytes())
}

type FragmentReads = BTreeMap<String, Vec<AlignedRead>>;

fn read_family_file(path: &Path, contig: u32) -> Result<Vec<Family>> {
    let reader = BufReader::new(File::open(path)?);
    let mut grouped: BTreeMap<String, [FragmentReads; 2]> = BTreeMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [family_id, strand, fragment_id, pos, mapq, cigar, sequence, qualities] =
            fields.as_slice()
        else {
            bail!("line {}: expected 8 columns, found {}", line_no + 1, fields.len());
        };
        let strand = match *strand {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            other => bail!("line {}: strand must be + or -, found '{other}'", line_no + 1),
        };
        let pos: u32 = pos
            .parse()
            .with_context(|| format!("invalid position '{pos}' on line {}", line_no + 1))?;
        let mapq: u8 = mapq
            .parse()
            .with_context(|| format!("invalid mapq '{mapq}' on line {}", line_no + 1))?;
        let cigar = CigarOp::parse_cigar(cigar)
            .ok_or_else(|| anyhow!("invalid CIGAR '{cigar}' on line {}", line_no + 1))?;
        let qualities = qualities
            .bytes()
            .map(|q| q.checked_sub(33))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| anyhow!("quality below '!' on line {}", line_no + 1))?;
        let read = AlignedRead::new(
            contig,
            pos,
            mapq,
            cigar,
            sequence.to_ascii_uppercase().into_bytes(),
            qualities,
            strand == Strand::Reverse,
        );
        grouped.entry(family_id.to_string()).or_default()[strand.index()]
            .entry(fragment_id.to_string())
            .or_default()
            .push(read);
    }

    Ok(grouped
        .into_values()
        .map(|[fwd, rev]| {
            Family::new(
                fwd.into_values().map(Fragment::new).collect(),
                rev.into_values().map(Fragment::new).collect(),
            )
        })
        .collect())
}

const HEADER: [&str; 17] = [
    "tid", "pos", "ref", "allele", "bq_fwd", "bq_rev", "bq_meanq", "bq_vars_depth",
    "bq_vars_qual", "bq_badep", "fq_fwd", "fq_rev", "fq_vars_depth", "fq_vars_qual",
    "duplex", "duplex_pass", "indels",
];

fn strand_max(values: [u32; 2]) -> u32 {
    values[0].max(values[1])
}

fn format_stats(stats: &AlleleStats) -> String {
    let raw = &stats.raw;
    let family: TierSummary = stats.family.unwrap_or_default();
    let indels = stats
        .insertions
        .iter()
        .map(|(seq, count)| format!("+{seq}:{count}"))
        .chain(stats.deletions.iter().map(|(len, count)| format!("-{len}:{count}")))
        .collect::<Vec<_>>();
    let columns = [
        stats.tid.to_string(),
        stats.pos.to_string(),
        stats.reference.to_string(),
        stats.symbol.to_string(),
        raw.depth[0].to_string(),
        raw.depth[1].to_string(),
        format!("{:.1}", raw.mean_quality()),
        (raw.vars_depth[0] + raw.vars_depth[1]).to_string(),
        strand_max(raw.vars_quality).to_string(),
        strand_max(raw.bias_adjusted_depth).to_string(),
        family.depth[0].to_string(),
        family.depth[1].to_string(),
        (family.vars_depth[0] + family.vars_depth[1]).to_string(),
        strand_max(family.vars_quality).to_string(),
        stats.duplex_depth.to_string(),
        stats.duplex_pass_depth.to_string(),
        if indels.is_empty() { ".".to_string() } else { indels.join(",") },
    ];
    columns.join("\t")
}
