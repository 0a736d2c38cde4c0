use std::f64::consts::LN_10;

const FREQ_FLOOR: f64 = 1e-9;

/// Best change point found by [`adabias`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangePoint {
    /// Number of leading buckets on the near side of the split.
    pub split: usize,
    /// Dampened bias factor at the split (×100 natural-log odds ratio).
    pub factor: u32,
}

/// Bias factor between one symbol and its whole type across a two-way split.
///
/// The near/far odds of the symbol are compared with the near/far odds of the
/// type; the result is `100·|ln(odds_this / odds_all)|`, rounded. Pseudocounts
/// regularize empty sides.
pub fn bias_factor100(
    far_all: f64,
    near_all: f64,
    far_this: f64,
    near_this: f64,
    pseudocount: f64,
) -> u32 {
    let pc = pseudocount.max(f64::MIN_POSITIVE);
    let odds_all = (near_all + pc) / (far_all + pc);
    let odds_this = (near_this + pc) / (far_this + pc);
    let factor = 100.0 * (odds_this / odds_all).ln().abs();
    if factor.is_finite() {
        factor.round() as u32
    } else {
        0
    }
}

/// Multiplicative imbalance (at least 1) encoded by a bias factor.
#[inline]
pub fn bias_imbalance(factor100: u32) -> f64 {
    (factor100 as f64 / 100.0).exp()
}

/// Locate the split of an ordered distribution where `this` departs most
/// from `all`.
///
/// Each split's factor is first reduced to the minimum over itself and the
/// `gapdist` preceding splits (which start out at zero), so a lone spike in
/// one bucket cannot win.
pub fn adabias(all: &[u32], this: &[u32], pseudocount: f64, gapdist: usize) -> ChangePoint {
    assert_eq!(
        all.len(),
        this.len(),
        "bias distributions must have equal length"
    );
    let sum_all: f64 = all.iter().map(|&v| v as f64).sum();
    let sum_this: f64 = this.iter().map(|&v| v as f64).sum();
    let mut near_all = 0.0;
    let mut near_this = 0.0;
    let mut history = vec![0u32; gapdist];
    let mut best = ChangePoint::default();
    for i in 0..all.len().saturating_sub(1) {
        near_all += all[i] as f64;
        near_this += this[i] as f64;
        let current = bias_factor100(
            sum_all - near_all,
            near_all,
            sum_this - near_this,
            near_this,
            pseudocount,
        );
        let dampened = history.iter().fold(current, |acc, &h| acc.min(h));
        if dampened > best.factor {
            best = ChangePoint {
                split: i + 1,
                factor: dampened,
            };
        }
        if gapdist > 0 {
            history.rotate_right(1);
            history[0] = current;
        }
    }
    best
}

/// One-sided binomial confidence (phred-like) that the frequency
/// `h1_pos/h1_tot` exceeds the null frequency `h0_pos/h0_tot`.
///
/// The alternative frequency is shrunk toward the null by `pseudocount`
/// pseudo-observations. The log-likelihood ratio is scaled by an effective
/// sample size of `(h1_tot + pseudocount)^ess_georatio`, which discounts
/// large but correlated supports. Returns 0 when there is no excess.
pub fn binomial_phredlike(
    h0_pos: f64,
    h0_tot: f64,
    h1_pos: f64,
    h1_tot: f64,
    pseudocount: f64,
    ess_georatio: f64,
) -> f64 {
    if h0_tot <= 0.0 {
        return 0.0;
    }
    let f0 = (h0_pos / h0_tot).clamp(FREQ_FLOOR, 1.0 - FREQ_FLOOR);
    let denom = h1_tot + pseudocount;
    if denom <= 0.0 {
        return 0.0;
    }
    let f1 = ((h1_pos + pseudocount * f0) / denom).clamp(FREQ_FLOOR, 1.0 - FREQ_FLOOR);
    if f1 <= f0 {
        return 0.0;
    }
    let kl = f1 * (f1 / f0).ln() + (1.0 - f1) * ((1.0 - f1) / (1.0 - f0)).ln();
    let ess = denom.powf(ess_georatio);
    (ess * kl * 10.0 / LN_10).max(0.0)
}
