//! Projection of one aligned read onto per-position symbol counters.

use tracing::warn;

use crate::genomics::counts::{SymbolCounts, UpdateMode};
use crate::genomics::region::CoveredRegion;
use crate::genomics::symbol::AlignmentSymbol;
use crate::genomics::types::{AlignedRead, CigarOpKind};

const MAX_REPEAT_UNIT: usize = 5;
const REPEAT_BASE_PHRED: f64 = 35.0;
const REPEAT_MIN_PHRED: f64 = 2.0;

/// How a read is credited into its target counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOptions {
    /// Sum mode credits 1 per observation; quality-max mode credits base
    /// qualities and keeps the highest per slot.
    pub mode: UpdateMode,
    /// Cap indel qualities by the slippage penalty of the local repeat.
    pub repeat_penalty: bool,
}

impl ProjectionOptions {
    /// Quality-max projection, the mode used to build fragment counters.
    pub fn quality(repeat_penalty: bool) -> Self {
        Self {
            mode: UpdateMode::QualityMax,
            repeat_penalty,
        }
    }

    /// Plain observation counting.
    pub fn counting() -> Self {
        Self {
            mode: UpdateMode::Sum,
            repeat_penalty: false,
        }
    }
}

/// Phred-scaled confidence that an indel at read offset `qpos` is not a
/// polymerase slip inside a short tandem repeat.
///
/// The longest run of exact copies of a 1..=5 base unit starting at `qpos`
/// determines the number of possible slip placements; indels spanning more
/// whole units are less likely to be slips and earn a small bonus.
pub fn repeat_penalty_phred(sequence: &[u8], qpos: usize, indel_len: u32) -> u32 {
    let mut best_copies = 1usize;
    let mut best_unit = 1usize;
    for unit in 1..=MAX_REPEAT_UNIT {
        if qpos + unit > sequence.len() {
            break;
        }
        let motif = &sequence[qpos..qpos + unit];
        let mut copies = 1;
        while qpos + (copies + 1) * unit <= sequence.len()
            && &sequence[qpos + copies * unit..qpos + (copies + 1) * unit] == motif
        {
            copies += 1;
        }
        if copies > best_copies {
            best_copies = copies;
            best_unit = unit;
        }
    }
    let n_units = indel_len as usize / best_unit;
    let n_slips = best_unit * (best_copies - 1) * best_copies + 1;
    let bonus = match n_units {
        0 | 1 => 0.0,
        2 => 5.0,
        _ => 7.0,
    };
    let phred = REPEAT_BASE_PHRED + bonus - 10.0 * (n_slips as f64).log10();
    phred.max(REPEAT_MIN_PHRED).round() as u32
}

/// Credit every aligned position of `read` into `target`.
///
/// Matched bases credit their base symbol at the reference position, and
/// every matched base after the first in a run also credits the no-gap link.
/// Indels credit their length-bucket link symbol at the reference position
/// following the event and record their identity in the sparse maps.
///
/// # Panics
/// Panics on a `B` (back) CIGAR operation or when the read leaves `target`.
pub fn project_read(
    read: &AlignedRead,
    target: &mut CoveredRegion<SymbolCounts>,
    options: ProjectionOptions,
) {
    let quals = &read.qualities;
    let seq = &read.sequence;
    let read_len = read.len();
    let by_quality = options.mode == UpdateMode::QualityMax;
    let value = |q: u8| if by_quality { q as u32 } else { 1 };

    let mut qpos = 0usize;
    let mut rpos = read.pos;
    for op in &read.cigar {
        let len = op.len as usize;
        match op.kind {
            CigarOpKind::Match | CigarOpKind::SeqMatch | CigarOpKind::SeqMismatch => {
                for i in 0..len {
                    let counts = target.get_mut(rpos);
                    if i > 0 {
                        let link_q = quals[qpos - 1].min(quals[qpos]);
                        counts.credit(AlignmentSymbol::LinkM, value(link_q), options.mode);
                    }
                    let base = AlignmentSymbol::from_base(seq[qpos]);
                    counts.credit(base, value(quals[qpos]), options.mode);
                    qpos += 1;
                    rpos += 1;
                }
            }
            CigarOpKind::Insertion => {
                let inc = if by_quality {
                    let q = if qpos == 0 || qpos + len >= read_len {
                        warn!(
                            tid = read.tid,
                            pos = read.pos,
                            qpos,
                            len,
                            "insertion touches the read end, using the flanking quality"
                        );
                        if qpos > 0 {
                            quals[qpos - 1] as u32
                        } else if qpos + len < read_len {
                            quals[qpos + len] as u32
                        } else {
                            1
                        }
                    } else {
                        let flank = quals[qpos - 1].min(quals[qpos + len]) as u32;
                        if options.repeat_penalty {
                            flank.min(repeat_penalty_phred(seq, qpos, op.len))
                        } else {
                            flank
                        }
                    };
                    q.max(1)
                } else {
                    1
                };
                let inserted = String::from_utf8_lossy(&seq[qpos..qpos + len]);
                target.get_mut(rpos).credit(
                    AlignmentSymbol::insertion_for_len(op.len),
                    inc,
                    options.mode,
                );
                target.add_insertion(rpos, &inserted, inc);
                qpos += len;
            }
            CigarOpKind::Deletion => {
                let inc = if by_quality {
                    let left = qpos.checked_sub(1).and_then(|i| quals.get(i)).copied();
                    let right = quals.get(qpos).copied();
                    let flank = match (left, right) {
                        (Some(l), Some(r)) => l.min(r) as u32,
                        (Some(q), None) | (None, Some(q)) => q as u32,
                        (None, None) => 1,
                    };
                    let q = if options.repeat_penalty && qpos < read_len {
                        flank.min(repeat_penalty_phred(seq, qpos, op.len))
                    } else {
                        flank
                    };
                    q.max(1)
                } else {
                    1
                };
                target.get_mut(rpos).credit(
                    AlignmentSymbol::deletion_for_len(op.len),
                    inc,
                    options.mode,
                );
                target.add_deletion(rpos, op.len, inc);
                rpos += op.len;
            }
            CigarOpKind::RefSkip => rpos += op.len,
            CigarOpKind::SoftClip => qpos += len,
            CigarOpKind::HardClip | CigarOpKind::Pad => {}
            CigarOpKind::Back => panic!(
                "unsupported CIGAR operation B in read at {}:{}",
                read.tid, read.pos
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::types::CigarOp;
    use AlignmentSymbol::*;

    fn read(pos: u32, cigar: &str, seq: &[u8], quals: Vec<u8>) -> AlignedRead {
        AlignedRead::new(0, pos, 60, CigarOp::parse_cigar(cigar).unwrap(), seq.to_vec(), quals, false)
    }

    #[test]
    fn match_run_credits_bases_and_inner_links() {
        let r = read(2, "5M", b"ACGTA", vec![30; 5]);
        let mut region = CoveredRegion::new(0, 0, 10);
        project_read(&r, &mut region, ProjectionOptions::quality(false));
        assert_eq!(region.get(2).get(BaseA), 30);
        assert_eq!(region.get(2).get(LinkM), 0);
        assert_eq!(region.get(4).get(BaseG), 30);
        assert_eq!(region.get(4).get(LinkM), 30);
        assert_eq!(region.get(7).sum_by_type(crate::genomics::SymbolType::Base), 0);
    }

    #[test]
    fn link_quality_is_lesser_flank() {
        let r = read(0, "3M", b"AAA", vec![30, 12, 40]);
        let mut region = CoveredRegion::new(0, 0, 4);
        project_read(&r, &mut region, ProjectionOptions::quality(false));
        assert_eq!(region.get(1).get(LinkM), 12);
        assert_eq!(region.get(2).get(LinkM), 12);
    }

    #[test]
    fn insertion_anchors_at_next_reference_position() {
        let r = read(10, "3M2I3M", b"ACGTTACG", vec![30, 30, 25, 20, 20, 35, 30, 30]);
        let mut region = CoveredRegion::new(0, 0, 20);
        project_read(&r, &mut region, ProjectionOptions::quality(false));
        assert_eq!(region.get(13).get(LinkI2), 25);
        assert_eq!(region.get(13).get(LinkM), 0);
        assert_eq!(region.get(13).get(BaseA), 35);
        assert_eq!(region.insertions_at(13).and_then(|m| m.get("TT")), Some(&25));
    }

    #[test]
    fn deletion_advances_reference_only() {
        let r = read(0, "2M3D2M", b"ACGT", vec![30; 4]);
        let mut region = CoveredRegion::new(0, 0, 10);
        project_read(&r, &mut region, ProjectionOptions::counting());
        assert_eq!(region.get(2).get(LinkD3P), 1);
        assert_eq!(region.get(5).get(BaseG), 1);
        assert_eq!(region.get(6).get(BaseT), 1);
        assert_eq!(region.deletions_at(2).and_then(|m| m.get(&3)), Some(&1));
        assert_eq!(region.get(3).sum_by_type(crate::genomics::SymbolType::Base), 0);
    }

    #[test]
    fn clips_and_skips_move_the_right_cursor() {
        let r = read(5, "2S2M3N2M4H", b"TTACGT", vec![30; 6]);
        let mut region = CoveredRegion::new(0, 0, 20);
        project_read(&r, &mut region, ProjectionOptions::counting());
        assert_eq!(region.get(5).get(BaseA), 1);
        assert_eq!(region.get(6).get(BaseC), 1);
        assert_eq!(region.get(10).get(BaseG), 1);
        assert_eq!(region.get(11).get(BaseT), 1);
    }

    #[test]
    #[should_panic(expected = "unsupported CIGAR operation")]
    fn back_operation_is_fatal() {
        let r = read(0, "2M1B2M", b"ACGT", vec![30; 4]);
        let mut region = CoveredRegion::new(0, 0, 10);
        project_read(&r, &mut region, ProjectionOptions::counting());
    }

    #[test]
    fn homopolymer_lowers_indel_confidence() {
        let plain = repeat_penalty_phred(b"ACGTTGCAAC", 0, 1);
        let homopolymer = repeat_penalty_phred(b"AAAAAAAAAA", 0, 1);
        assert_eq!(plain, 35);
        assert_eq!(homopolymer, 15);
        let dinucleotide = repeat_penalty_phred(b"CACACACACA", 0, 4);
        assert!(dinucleotide < plain);
        assert!(repeat_penalty_phred(b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", 0, 1) >= 2);
    }

    #[test]
    fn repeat_penalty_caps_insertion_quality() {
        let seq = b"GCAAAAAAAAAAG";
        let r = read(0, "2M1I10M", seq, vec![40; 13]);
        let mut capped = CoveredRegion::new(0, 0, 13);
        project_read(&r, &mut capped, ProjectionOptions::quality(true));
        let mut raw = CoveredRegion::new(0, 0, 13);
        project_read(&r, &mut raw, ProjectionOptions::quality(false));
        assert_eq!(raw.get(2).get(LinkI1), 40);
        assert!(capped.get(2).get(LinkI1) < 40);
    }
}
