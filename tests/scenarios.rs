mod common;

use fampile::genomics::{
    adabias, bias_factor100, ConsensusRule, SymbolCounts, SymbolCoverage, UpdateMode,
};
use fampile::{process_window, AggregationConfig, AlignmentSymbol, Family, Fragment, WindowInput};

use common::read;

fn scenario_a_window() -> WindowInput {
    let reference = b"ACGTACGTAC";
    let fragment = Fragment::new(vec![read(2, "5M", &reference[2..7], 30, false)]);
    WindowInput::new(0, 0, 10, reference, vec![Family::new(vec![fragment], vec![])])
        .expect("valid window")
}

#[test]
fn single_fragment_credits_depth_and_quality() {
    let config = AggregationConfig::default()
        .with_family_tier(false)
        .with_edge_baq_per_base(None);
    let result = process_window(&scenario_a_window(), &config);
    let raw = &result.set().raw;
    assert_eq!(raw.depth[0].get(4).get(AlignmentSymbol::BaseA), 1);
    assert_eq!(raw.quality_sum[0].get(4).get(AlignmentSymbol::BaseA), 30);
    assert_eq!(raw.depth[1].get(4).get(AlignmentSymbol::BaseA), 0);

    let stats = result.allele_stats();
    let at4 = stats
        .iter()
        .find(|s| s.pos == 4 && s.symbol == AlignmentSymbol::BaseA)
        .expect("allele at position 4");
    assert_eq!(at4.raw.depth, [1, 0]);
    assert_eq!(at4.raw.quality_sum, [30, 0]);
    assert!(at4.family.is_none());
    assert!(stats.iter().all(|s| (2..8).contains(&s.pos)));
}

#[test]
fn edge_distance_caps_quality_near_fragment_ends() {
    let config = AggregationConfig::default()
        .with_family_tier(false)
        .with_edge_baq_per_base(Some(4));
    let result = process_window(&scenario_a_window(), &config);
    let raw = &result.set().raw;
    // three bases from the left end
    assert_eq!(raw.quality_sum[0].get(4).get(AlignmentSymbol::BaseA), 12);
    assert_eq!(raw.quality_sum[0].get(2).get(AlignmentSymbol::BaseG), 4);
    assert_eq!(raw.depth[0].get(2).get(AlignmentSymbol::BaseG), 1);
}

#[test]
fn agreeing_fragments_merge_into_one_family_entry() {
    let mut first = SymbolCoverage::new(0, 3, 4);
    first.get_mut(3).set(AlignmentSymbol::BaseA, 5);
    let mut second = SymbolCoverage::new(0, 3, 4);
    second.get_mut(3).set(AlignmentSymbol::BaseA, 3);

    let mut family = SymbolCoverage::new(0, 0, 10);
    family.update_by_consensus(&first, UpdateMode::Sum, ConsensusRule::IndelMajor, 5);
    family.update_by_consensus(&second, UpdateMode::Sum, ConsensusRule::IndelMajor, 3);
    assert_eq!(family.get(3).get(AlignmentSymbol::BaseA), 8);
    assert_eq!(family.get(3).get(AlignmentSymbol::BaseNN), 0);
}

#[test]
fn split_fragment_credits_the_ambiguous_slot() {
    let mut split = SymbolCounts::new();
    split.set(AlignmentSymbol::BaseA, 3);
    split.set(AlignmentSymbol::BaseC, 3);
    let mut family = SymbolCounts::new();
    let credited = family.update_by_consensus(&split, UpdateMode::Sum, ConsensusRule::Plurality, 1);
    assert_eq!(credited[0], Some(AlignmentSymbol::BaseNN));
    assert_eq!(family.get(AlignmentSymbol::BaseNN), 1);
    assert_eq!(family.get(AlignmentSymbol::BaseA), 0);
    assert_eq!(family.get(AlignmentSymbol::BaseC), 0);
}

#[test]
fn separated_distributions_split_at_the_boundary() {
    let best = adabias(&[10, 0, 0], &[0, 0, 10], 0.5, 0);
    assert_eq!(best.split, 1);
    // everything of `all` is near, everything of `this` is far
    assert_eq!(best.factor, bias_factor100(0.0, 10.0, 10.0, 0.0, 0.5));
    assert!(best.factor > 0);
}
