//! Threshold bundle consumed by the aggregation core.

use thiserror::Error;

use crate::genomics::MutationRates;

/// Errors raised while validating an [`AggregationConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The worker pool must have at least one thread.
    #[error("thread count must be > 0")]
    ZeroThreads,

    /// The imbalance cap is a ×100 multiplier and cannot shrink depth below itself.
    #[error("imbalance cap {0} must be >= 100")]
    ImbalanceCapTooSmall(u32),

    /// Effective sample size exponents live in (0, 1].
    #[error("{name} = {value} outside (0, 1]")]
    GeoratioOutOfRange {
        /// Name of the offending field.
        name: &'static str,
        /// Supplied value.
        value: f64,
    },

    /// Pseudocounts must be strictly positive.
    #[error("bias pseudocount {0} must be > 0")]
    NonPositivePseudocount(f64),

    /// Phased-set retention needs a positive ploidy.
    #[error("max ploidy must be > 0")]
    ZeroPloidy,
}

/// Numeric thresholds for one aggregation run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregationConfig {
    /// Phred a fragment's base consensus must reach to count as a local
    /// mismatch; also caps the family-tier quality of `N` calls.
    pub min_alt_quality: u32,
    /// Qualities below this add to the low-quality depth counter.
    pub low_quality_threshold: u32,
    /// Family-tier phred above which a base call counts as high quality.
    pub high_quality_threshold_snv: u32,
    /// Family-tier phred above which an indel call counts as high quality.
    pub high_quality_threshold_indel: u32,
    /// Fragment margin a base consensus needs to enter a family amplicon.
    pub pass_quality_snv: u32,
    /// Fragment margin an indel consensus needs to enter a family amplicon.
    pub pass_quality_indel: u32,
    /// Extra phred demanded of base calls by the strict cutoff search.
    pub added_phred_snv: u32,
    /// Extra phred demanded of indel calls by the strict cutoff search.
    pub added_phred_indel: u32,
    /// Expected consensus-level error rates.
    pub mutation_rates: MutationRates,
    /// Effective sample size exponent for deduplicated depth.
    pub ess_georatio_dedup: f64,
    /// Effective sample size exponent for family members (PCR duplicates).
    pub ess_georatio_duped_pcr: f64,
    /// Pseudocount regularizing bias factors.
    pub bias_pseudocount: f64,
    /// Largest imbalance (×100) used to shrink usable depth.
    pub imbalance_cap: u32,
    /// Phred cap per base of distance to the fragment edge; `None` disables it.
    pub edge_baq_per_base: Option<u32>,
    /// Ploidy ratio deciding when a phased set is discarded.
    pub max_ploidy: u32,
    /// Run the family and duplex tiers after the raw tier.
    pub use_family_tier: bool,
    /// Cap indel qualities of single-fragment families by repeat slippage.
    pub repeat_penalty_for_singletons: bool,
    /// Worker threads used by the batch runner.
    pub threads: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_alt_quality: 25,
            low_quality_threshold: 25,
            high_quality_threshold_snv: 30,
            high_quality_threshold_indel: 20,
            pass_quality_snv: 20,
            pass_quality_indel: 20,
            added_phred_snv: 6,
            added_phred_indel: 0,
            mutation_rates: MutationRates::default(),
            ess_georatio_dedup: 0.8,
            ess_georatio_duped_pcr: 0.5,
            bias_pseudocount: 1.0,
            imbalance_cap: 180,
            edge_baq_per_base: Some(4),
            max_ploidy: 4,
            use_family_tier: true,
            repeat_penalty_for_singletons: true,
            threads: 1,
        }
    }
}

impl AggregationConfig {
    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Enable or disable the family and duplex tiers.
    pub fn with_family_tier(mut self, enabled: bool) -> Self {
        self.use_family_tier = enabled;
        self
    }

    /// Set or disable the per-base edge quality cap.
    pub fn with_edge_baq_per_base(mut self, per_base: Option<u32>) -> Self {
        self.edge_baq_per_base = per_base;
        self
    }

    /// Replace the mutation-rate table.
    pub fn with_mutation_rates(mut self, rates: MutationRates) -> Self {
        self.mutation_rates = rates;
        self
    }

    /// Set the amplicon pass margins for base and indel calls.
    pub fn with_pass_quality(mut self, snv: u32, indel: u32) -> Self {
        self.pass_quality_snv = snv;
        self.pass_quality_indel = indel;
        self
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.imbalance_cap < 100 {
            return Err(ConfigError::ImbalanceCapTooSmall(self.imbalance_cap));
        }
        for (name, value) in [
            ("ess_georatio_dedup", self.ess_georatio_dedup),
            ("ess_georatio_duped_pcr", self.ess_georatio_duped_pcr),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::GeoratioOutOfRange { name, value });
            }
        }
        if !(self.bias_pseudocount > 0.0) {
            return Err(ConfigError::NonPositivePseudocount(self.bias_pseudocount));
        }
        if self.max_ploidy == 0 {
            return Err(ConfigError::ZeroPloidy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(AggregationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn builders_override_fields() {
        let config = AggregationConfig::default()
            .with_threads(4)
            .with_family_tier(false)
            .with_edge_baq_per_base(None)
            .with_pass_quality(10, 12);
        assert_eq!(config.threads, 4);
        assert!(!config.use_family_tier);
        assert_eq!(config.edge_baq_per_base, None);
        assert_eq!((config.pass_quality_snv, config.pass_quality_indel), (10, 12));
    }

    #[test]
    fn invalid_values_are_reported() {
        let config = AggregationConfig::default().with_threads(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreads));

        let config = AggregationConfig {
            imbalance_cap: 50,
            ..AggregationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ImbalanceCapTooSmall(50)));

        let config = AggregationConfig {
            ess_georatio_dedup: 1.5,
            ..AggregationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GeoratioOutOfRange { name: "ess_georatio_dedup", .. })
        ));

        let config = AggregationConfig {
            bias_pseudocount: 0.0,
            ..AggregationConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositivePseudocount(0.0)));
    }
}
