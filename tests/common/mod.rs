#![allow(dead_code)]

use fampile::genomics::CigarOp;
use fampile::{AlignedRead, Family, Fragment, WindowInput};

/// Forty-base test contig; position 15 is `C`, position 20 is `C`.
pub const REFERENCE: &[u8] = b"ACGGATCCTAGCATGCAAGTCCGATTACAGGTCAGTCATG";

pub fn read(pos: u32, cigar: &str, sequence: &[u8], quality: u8, reverse: bool) -> AlignedRead {
    AlignedRead::new(
        0,
        pos,
        60,
        CigarOp::parse_cigar(cigar).expect("valid CIGAR"),
        sequence.to_vec(),
        vec![quality; sequence.len()],
        reverse,
    )
}

/// Reference bases of `[begin, end)` with `(position, base)` substitutions applied.
pub fn mutated(begin: u32, end: u32, changes: &[(u32, u8)]) -> Vec<u8> {
    let mut seq = REFERENCE[begin as usize..end as usize].to_vec();
    for &(pos, base) in changes {
        seq[(pos - begin) as usize] = base;
    }
    seq
}

/// One single-read fragment matching `[begin, end)` with the given substitutions.
pub fn matched_fragment(begin: u32, end: u32, changes: &[(u32, u8)], reverse: bool) -> Fragment {
    let seq = mutated(begin, end, changes);
    let cigar = format!("{}M", end - begin);
    Fragment::new(vec![read(begin, &cigar, &seq, 30, reverse)])
}

/// A family with `n_fwd` forward and `n_rev` reverse copies of the same molecule.
pub fn family(begin: u32, end: u32, changes: &[(u32, u8)], n_fwd: usize, n_rev: usize) -> Family {
    Family::new(
        (0..n_fwd)
            .map(|_| matched_fragment(begin, end, changes, false))
            .collect(),
        (0..n_rev)
            .map(|_| matched_fragment(begin, end, changes, true))
            .collect(),
    )
}

pub fn full_window(families: Vec<Family>) -> WindowInput {
    WindowInput::new(0, 0, REFERENCE.len() as u32, REFERENCE, families).expect("valid window")
}
