//! Likelihood of a simulated epidemic given observed incidence and a
//! reconstructed genealogy.
//!
//! Outcomes that are impossible under the model are not errors. They are
//! returned as [`IMPOSSIBLE`] on the log scale (zero on the natural scale),
//! so that an outer sampler rejects them through the usual acceptance ratio.
//! Sums that stop being finite are treated the same way.

use std::ops::Range;

use statrs::function::gamma::ln_gamma;

use crate::data::{Genealogy, IncidenceData};

/// Log likelihood of an outcome that cannot happen under the model.
pub const IMPOSSIBLE: f64 = -f64::MAX;

/// The scale a likelihood is returned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scale {
    #[default]
    Log,
    Natural,
}

impl Scale {
    /// Convert a log likelihood to this scale.
    #[inline]
    pub fn from_log(self, loglik: f64) -> f64 {
        match self {
            Scale::Log => loglik,
            Scale::Natural if loglik == IMPOSSIBLE => 0f64,
            Scale::Natural => loglik.exp(),
        }
    }
}

#[inline]
fn finite_or_impossible(loglik: f64) -> f64 {
    if loglik.is_finite() {
        loglik
    } else {
        IMPOSSIBLE
    }
}

/// `x * ln(y)`, defined as zero when `x` is zero.
#[inline]
fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0f64 {
        0f64
    } else {
        x * y.ln()
    }
}

/// Log probability of `k` successes in `n` trials with success probability
/// `p`. `n` and `k` need not be integers, the binomial coefficient is
/// extended through the gamma function.
pub fn ln_binomial_pmf(k: f64, n: f64, p: f64) -> f64 {
    let ln_choose = ln_gamma(n + 1f64) - ln_gamma(k + 1f64) - ln_gamma(n - k + 1f64);
    ln_choose + xlogy(k, p) + xlogy(n - k, 1f64 - p)
}

/// Likelihood of observing no cases at all when `total_incidence` cases
/// occurred in each of `num_groups` groups.
///
/// Used for windows that have no data coverage.
pub fn binomial_loglik_unobserved(
    reporting_rate: f64,
    total_incidence: f64,
    num_groups: usize,
    scale: Scale,
) -> f64 {
    let loglik = (0..num_groups)
        .map(|_| xlogy(total_incidence, 1f64 - reporting_rate))
        .sum();
    scale.from_log(finite_or_impossible(loglik))
}

/// Likelihood of the observed case counts in `window` when each of the
/// `total_incidence` simulated cases is reported with probability
/// `reporting_rate`.
///
/// Observations of every group are summed over the window. A negative sum
/// marks missing data for that group only: it contributes nothing and the
/// remaining groups are still scored. A sum larger than the simulated
/// incidence is impossible.
pub fn binomial_loglik(
    reporting_rate: f64,
    total_incidence: f64,
    data: &IncidenceData<'_>,
    window: Range<usize>,
    shift: usize,
    scale: Scale,
) -> f64 {
    let mut loglik = 0f64;
    for group in 0..data.num_groups() {
        let observed = data.window_sum(group, window.clone(), shift);
        if observed < 0f64 {
            continue;
        }
        if observed > total_incidence {
            return scale.from_log(IMPOSSIBLE);
        }
        if observed == 0f64 {
            loglik += xlogy(total_incidence, 1f64 - reporting_rate);
        } else {
            loglik += ln_binomial_pmf(observed, total_incidence, reporting_rate);
        }
    }
    scale.from_log(finite_or_impossible(loglik))
}

/// Likelihood of a genealogy given the coalescent rates of a simulated
/// epidemic.
///
/// `coalescent_rates` is indexed relative to `window.start`, the genealogy
/// relative to `window.start - shift`. Every interval contributes the
/// probability that no coalescence happened during it, and intervals that end
/// in a coalescence additionally contribute the rate of that coalescence.
pub fn coalescent_loglik(
    coalescent_rates: &[f64],
    genealogy: &Genealogy,
    window: Range<usize>,
    shift: usize,
    scale: Scale,
) -> f64 {
    let binomial = genealogy.binomial();
    let intervals = genealogy.intervals();
    let index = genealogy.index();

    let mut loglik = 0f64;
    for (offset, step) in window.enumerate() {
        let rate = coalescent_rates[offset];
        for event in index.events(step - shift) {
            let pairs = binomial[event];
            if pairs <= 0f64 {
                continue;
            }
            let population_rate = pairs * rate;
            let interval = intervals[event];
            if interval < 0f64 {
                // The epidemic died out before this coalescence
                if rate == 0f64 {
                    return scale.from_log(IMPOSSIBLE);
                }
                loglik += population_rate.ln() - population_rate * interval.abs();
            } else {
                loglik -= population_rate * interval;
            }
        }
        if !loglik.is_finite() {
            return scale.from_log(IMPOSSIBLE);
        }
    }
    scale.from_log(loglik)
}
