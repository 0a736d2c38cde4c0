use std::sync::Arc;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOpKind {
    /// Alignment match (`M`), base may or may not equal the reference.
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region such as an intron (`N`).
    RefSkip,
    /// Soft clipping (sequence present in read only).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read).
    HardClip,
    /// Silent padding (`P`).
    Pad,
    /// Sequence match (`=`).
    SeqMatch,
    /// Sequence mismatch (`X`).
    SeqMismatch,
    /// Backwards skip (`B`); not supported by pileup projection.
    Back,
}

impl CigarOpKind {
    /// Parse a SAM CIGAR operation character.
    pub fn from_char(op: char) -> Option<Self> {
        Some(match op {
            'M' => CigarOpKind::Match,
            'I' => CigarOpKind::Insertion,
            'D' => CigarOpKind::Deletion,
            'N' => CigarOpKind::RefSkip,
            'S' => CigarOpKind::SoftClip,
            'H' => CigarOpKind::HardClip,
            'P' => CigarOpKind::Pad,
            '=' => CigarOpKind::SeqMatch,
            'X' => CigarOpKind::SeqMismatch,
            'B' => CigarOpKind::Back,
            _ => return None,
        })
    }

    /// Whether the operation advances the reference cursor.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Deletion
                | CigarOpKind::RefSkip
                | CigarOpKind::SeqMatch
                | CigarOpKind::SeqMismatch
        )
    }

    /// Whether the operation advances the read cursor.
    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarOpKind::Match
                | CigarOpKind::Insertion
                | CigarOpKind::SoftClip
                | CigarOpKind::SeqMatch
                | CigarOpKind::SeqMismatch
        )
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }

    /// Parse a SAM CIGAR string such as `10M2I5M`.
    pub fn parse_cigar(cigar: &str) -> Option<Vec<CigarOp>> {
        let mut ops = Vec::new();
        let mut len: u32 = 0;
        let mut seen_digit = false;
        for c in cigar.chars() {
            if let Some(d) = c.to_digit(10) {
                len = len.checked_mul(10)?.checked_add(d)?;
                seen_digit = true;
            } else {
                if !seen_digit {
                    return None;
                }
                ops.push(CigarOp::new(CigarOpKind::from_char(c)?, len));
                len = 0;
                seen_digit = false;
            }
        }
        if seen_digit {
            return None;
        }
        Some(ops)
    }
}

/// Aligned read with sequence and quality information.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Reference contig identifier.
    pub tid: u32,
    /// 0-based leftmost reference coordinate.
    pub pos: u32,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as uppercase ASCII.
    pub sequence: Arc<[u8]>,
    /// Per-base quality scores in Phred space.
    pub qualities: Arc<[u8]>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper.
    pub fn new(
        tid: u32,
        pos: u32,
        mapq: u8,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        qualities: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            tid,
            pos,
            mapq,
            cigar,
            sequence: sequence.into(),
            qualities: qualities.into(),
            is_reverse,
        }
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read carries no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// End position (half-open) on the reference, following the CIGAR.
    pub fn end(&self) -> u32 {
        self.pos
            + self
                .cigar
                .iter()
                .filter(|op| op.kind.consumes_reference())
                .map(|op| op.len)
                .sum::<u32>()
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Quality score at the provided read offset.
    pub fn quality_at(&self, offset: usize) -> Option<u8> {
        self.qualities.get(offset).copied()
    }

    /// Mapping quality associated with the alignment.
    pub fn mapq(&self) -> u8 {
        self.mapq
    }
}

/// Strand of a family's fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strand {
    /// Forward strand.
    Forward = 0,
    /// Reverse strand.
    Reverse = 1,
}

impl Strand {
    /// Both strands in storage order.
    pub const BOTH: [Strand; 2] = [Strand::Forward, Strand::Reverse];

    /// Storage index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The other strand.
    pub fn opposite(self) -> Strand {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }
}

/// One sequenced template: its mate reads over an overlapping span.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Reads of the template in input order; never empty once validated.
    pub reads: Vec<AlignedRead>,
}

impl Fragment {
    /// Wrap the reads of one template.
    pub fn new(reads: Vec<AlignedRead>) -> Self {
        Self { reads }
    }

    /// Leftmost reference coordinate of any read.
    pub fn begin(&self) -> u32 {
        self.reads.iter().map(|r| r.pos).min().unwrap_or(0)
    }

    /// One past the rightmost aligned coordinate of any read.
    pub fn end(&self) -> u32 {
        self.reads.iter().map(AlignedRead::end).max().unwrap_or(0)
    }

    /// Highest mapping quality among the reads.
    pub fn max_mapq(&self) -> u8 {
        self.reads.iter().map(AlignedRead::mapq).max().unwrap_or(0)
    }
}

/// Fragments sharing a barcode, partitioned by strand.
#[derive(Debug, Clone, Default)]
pub struct Family {
    /// Fragments indexed by [`Strand::index`].
    pub strands: [Vec<Fragment>; 2],
}

impl Family {
    /// Build a family from its per-strand fragments.
    pub fn new(forward: Vec<Fragment>, reverse: Vec<Fragment>) -> Self {
        Self {
            strands: [forward, reverse],
        }
    }

    /// Fragments on one strand.
    pub fn fragments(&self, strand: Strand) -> &[Fragment] {
        &self.strands[strand.index()]
    }

    /// Total fragments across both strands.
    pub fn size(&self) -> usize {
        self.strands.iter().map(Vec::len).sum()
    }

    /// Whether both strands carry fragments.
    pub fn is_duplex(&self) -> bool {
        self.strands.iter().all(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cigar_string_parses_all_operations() {
        let ops = CigarOp::parse_cigar("3S10M2I4D1N5=1X2H1P").unwrap();
        assert_eq!(ops.len(), 9);
        assert_eq!(ops[0], CigarOp::new(CigarOpKind::SoftClip, 3));
        assert_eq!(ops[2], CigarOp::new(CigarOpKind::Insertion, 2));
        assert_eq!(ops[8], CigarOp::new(CigarOpKind::Pad, 1));
        assert!(CigarOp::parse_cigar("10").is_none());
        assert!(CigarOp::parse_cigar("M").is_none());
        assert!(CigarOp::parse_cigar("5Q").is_none());
    }

    #[test]
    fn read_end_follows_reference_consuming_ops() {
        let read = AlignedRead::new(
            0,
            100,
            60,
            CigarOp::parse_cigar("2S5M3I4D6M").unwrap(),
            vec![b'A'; 16],
            vec![30; 16],
            false,
        );
        assert_eq!(read.end(), 115);
    }

    #[test]
    fn fragment_span_covers_mates() {
        let r1 = AlignedRead::new(0, 10, 40, vec![CigarOp::new(CigarOpKind::Match, 5)], vec![b'C'; 5], vec![30; 5], false);
        let r2 = AlignedRead::new(0, 12, 55, vec![CigarOp::new(CigarOpKind::Match, 6)], vec![b'C'; 6], vec![30; 6], true);
        let frag = Fragment::new(vec![r1, r2]);
        assert_eq!((frag.begin(), frag.end()), (10, 18));
        assert_eq!(frag.max_mapq(), 55);
        let family = Family::new(vec![frag.clone()], vec![]);
        assert!(!family.is_duplex());
        assert_eq!(Family::new(vec![frag.clone()], vec![frag]).size(), 2);
    }
}
