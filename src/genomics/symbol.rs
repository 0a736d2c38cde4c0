use std::fmt;

/// Number of symbols in the alignment alphabet.
pub const NUM_ALIGNMENT_SYMBOLS: usize = 14;

/// Classification of one aligned reference position.
///
/// Base calls describe the read's base at a reference position. Link calls
/// describe the gap state between a reference position and its predecessor.
/// The discriminant order is load-bearing: base symbols occupy `0..6` and
/// link symbols `6..14`, and consensus ties are broken by this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AlignmentSymbol {
    /// Adenine.
    BaseA = 0,
    /// Cytosine.
    BaseC,
    /// Guanine.
    BaseG,
    /// Thymine.
    BaseT,
    /// Uncalled base reported by the sequencer.
    BaseN,
    /// Ambiguous base produced by a split consensus.
    BaseNN,
    /// Reference-consistent link (no gap).
    LinkM,
    /// Deletion of three or more bases.
    LinkD3P,
    /// Deletion of two bases.
    LinkD2,
    /// Deletion of one base.
    LinkD1,
    /// Insertion of three or more bases.
    LinkI3P,
    /// Insertion of two bases.
    LinkI2,
    /// Insertion of one base.
    LinkI1,
    /// Ambiguous link produced by a split consensus.
    LinkNN,
}

use AlignmentSymbol::*;

const ALL_SYMBOLS: [AlignmentSymbol; NUM_ALIGNMENT_SYMBOLS] = [
    BaseA, BaseC, BaseG, BaseT, BaseN, BaseNN, LinkM, LinkD3P, LinkD2, LinkD1, LinkI3P, LinkI2,
    LinkI1, LinkNN,
];

const BASE_END: usize = 6;

/// The two disjoint groups of the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolType {
    /// Base calls `A C G T N <BN>`.
    Base,
    /// Gap-state calls between consecutive reference positions.
    Link,
}

impl SymbolType {
    /// Both types in processing order.
    pub const ALL: [SymbolType; 2] = [SymbolType::Base, SymbolType::Link];

    /// Symbols belonging to this type, in enumeration order.
    pub fn symbols(self) -> &'static [AlignmentSymbol] {
        match self {
            SymbolType::Base => &ALL_SYMBOLS[..BASE_END],
            SymbolType::Link => &ALL_SYMBOLS[BASE_END..],
        }
    }

    /// Sentinel credited when a consensus over this type disagrees.
    pub fn ambiguous(self) -> AlignmentSymbol {
        match self {
            SymbolType::Base => BaseNN,
            SymbolType::Link => LinkNN,
        }
    }

    /// Dense index (0 for base, 1 for link).
    pub fn index(self) -> usize {
        self as usize
    }
}

impl AlignmentSymbol {
    /// Every symbol in enumeration order.
    pub fn all() -> &'static [AlignmentSymbol; NUM_ALIGNMENT_SYMBOLS] {
        &ALL_SYMBOLS
    }

    /// Dense index into a 14-slot counter.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`AlignmentSymbol::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        ALL_SYMBOLS.get(index).copied()
    }

    /// Group this symbol belongs to.
    #[inline]
    pub fn symbol_type(self) -> SymbolType {
        if self.index() < BASE_END {
            SymbolType::Base
        } else {
            SymbolType::Link
        }
    }

    /// Whether this is the ambiguous sentinel of its type.
    pub fn is_ambiguous(self) -> bool {
        matches!(self, BaseNN | LinkNN)
    }

    /// Whether this symbol records an insertion of any length.
    pub fn is_insertion(self) -> bool {
        matches!(self, LinkI1 | LinkI2 | LinkI3P)
    }

    /// Whether this symbol records a deletion of any length.
    pub fn is_deletion(self) -> bool {
        matches!(self, LinkD1 | LinkD2 | LinkD3P)
    }

    /// Length bucket of an indel symbol: 0 for one base, 1 for two, 2 for three or more.
    pub fn indel_length_bucket(self) -> Option<u32> {
        match self {
            LinkD1 | LinkI1 => Some(0),
            LinkD2 | LinkI2 => Some(1),
            LinkD3P | LinkI3P => Some(2),
            _ => None,
        }
    }

    /// Insertion symbol for an inserted run of `len` bases.
    ///
    /// # Panics
    /// Panics when `len` is zero.
    pub fn insertion_for_len(len: u32) -> Self {
        assert!(len > 0, "insertion length must be positive");
        match len {
            1 => LinkI1,
            2 => LinkI2,
            _ => LinkI3P,
        }
    }

    /// Deletion symbol for a deleted run of `len` bases.
    ///
    /// # Panics
    /// Panics when `len` is zero.
    pub fn deletion_for_len(len: u32) -> Self {
        assert!(len > 0, "deletion length must be positive");
        match len {
            1 => LinkD1,
            2 => LinkD2,
            _ => LinkD3P,
        }
    }

    /// Base symbol for a sequence byte; anything other than `ACGT` maps to `N`.
    pub fn from_base(base: u8) -> Self {
        match base {
            b'A' | b'a' => BaseA,
            b'C' | b'c' => BaseC,
            b'G' | b'g' => BaseG,
            b'T' | b't' => BaseT,
            _ => BaseN,
        }
    }

    /// Short printable tag, e.g. `A` or `<LD2>`.
    pub fn description(self) -> &'static str {
        match self {
            BaseA => "A",
            BaseC => "C",
            BaseG => "G",
            BaseT => "T",
            BaseN => "N",
            BaseNN => "<BN>",
            LinkM => "<LR>",
            LinkD3P => "<LD3P>",
            LinkD2 => "<LD2>",
            LinkD1 => "<LD1>",
            LinkI3P => "<LI3P>",
            LinkI2 => "<LI2>",
            LinkI1 => "<LI1>",
            LinkNN => "<LN>",
        }
    }
}

impl fmt::Display for AlignmentSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Whether `alt` is a mutation relative to `reference`.
///
/// Two base calls mutate when both are concrete (`ACGT`) and differ. A link
/// call mutates when it is an insertion or a deletion.
pub fn are_mutated(reference: AlignmentSymbol, alt: AlignmentSymbol) -> bool {
    match alt.symbol_type() {
        SymbolType::Base => reference != alt && reference < BaseN && alt < BaseN,
        SymbolType::Link => alt != LinkM && alt != LinkNN,
    }
}

/// Convert a reference sequence into base symbols.
pub fn reference_to_symbols(reference: &[u8]) -> Vec<AlignmentSymbol> {
    reference.iter().map(|&b| AlignmentSymbol::from_base(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::AlignmentSymbol::*;
    use super::*;
    use test_case::test_case;

    #[test]
    fn type_ranges_are_contiguous_and_disjoint() {
        let bases = SymbolType::Base.symbols();
        let links = SymbolType::Link.symbols();
        assert_eq!(bases.len() + links.len(), NUM_ALIGNMENT_SYMBOLS);
        assert!(bases.iter().all(|s| s.symbol_type() == SymbolType::Base));
        assert!(links.iter().all(|s| s.symbol_type() == SymbolType::Link));
        assert_eq!(*bases.last().unwrap(), SymbolType::Base.ambiguous());
        assert_eq!(*links.last().unwrap(), SymbolType::Link.ambiguous());
    }

    #[test]
    fn index_round_trips() {
        for &sym in AlignmentSymbol::all() {
            assert_eq!(AlignmentSymbol::from_index(sym.index()), Some(sym));
        }
        assert_eq!(AlignmentSymbol::from_index(NUM_ALIGNMENT_SYMBOLS), None);
    }

    #[test_case(1, LinkI1, LinkD1)]
    #[test_case(2, LinkI2, LinkD2)]
    #[test_case(3, LinkI3P, LinkD3P)]
    #[test_case(40, LinkI3P, LinkD3P)]
    fn indel_length_maps_to_bucket(len: u32, ins: AlignmentSymbol, del: AlignmentSymbol) {
        assert_eq!(AlignmentSymbol::insertion_for_len(len), ins);
        assert_eq!(AlignmentSymbol::deletion_for_len(len), del);
        assert!(ins.is_insertion() && !ins.is_deletion());
        assert!(del.is_deletion() && !del.is_insertion());
    }

    #[test]
    #[should_panic(expected = "insertion length must be positive")]
    fn zero_length_insertion_is_fatal() {
        AlignmentSymbol::insertion_for_len(0);
    }

    #[test_case(BaseA, BaseC, true)]
    #[test_case(BaseA, BaseA, false)]
    #[test_case(BaseA, BaseN, false)]
    #[test_case(BaseN, BaseT, false)]
    #[test_case(BaseG, BaseNN, false)]
    #[test_case(BaseA, LinkM, false)]
    #[test_case(BaseA, LinkNN, false)]
    #[test_case(BaseA, LinkI2, true)]
    #[test_case(BaseA, LinkD1, true)]
    fn mutation_classification(reference: AlignmentSymbol, alt: AlignmentSymbol, expected: bool) {
        assert_eq!(are_mutated(reference, alt), expected);
    }

    #[test]
    fn reference_bytes_map_to_bases() {
        let symbols = reference_to_symbols(b"AcgTNx");
        assert_eq!(symbols, vec![BaseA, BaseC, BaseG, BaseT, BaseN, BaseN]);
        assert_eq!(LinkD3P.to_string(), "<LD3P>");
    }
}
