//! Discrete memory-kernel weights.
//!
//! The exponential kernel \(\rho(a) = \lambda e^{-\lambda a}\) is averaged over
//! each lag window \([jh, (j+1)h)\):
//!
//! \[
//! R_j = \frac{1}{h} e^{-\lambda j h} \left(1 - e^{-\lambda h}\right)
//! \]
//!
//! The sum is truncated at the first `J_max` with \(e^{-\lambda J_{max} h}\)
//! below the tolerance and renormalized over lags `j >= 1`, because the
//! sweeping recursion never weighs the current step:
//!
//! \[
//! \tilde r_j = R_j / \mu, \qquad \mu = h \sum_{j \ge 1} R_j
//! \]

use tracing::debug;

use crate::{Error, Result};

/// Default truncation tolerance for the kernel tail.
pub const DEFAULT_TRUNCATION_TOL: f64 = 1e-12;

/// Hard ceiling on the number of kernel terms, independent of the tolerance.
pub const MAX_KERNEL_TERMS: usize = 100_000;

/// Normalized discrete kernel weights `r̃[0..J_max)`, indexed by lag.
///
/// `r̃[0]` is kept so that indices equal lags; only `j >= 1` is consumed.
/// An empty set means "no usable memory" (see [`Error::DegenerateKernel`]).
#[derive(Debug, Clone, PartialEq)]
pub struct KernelWeights {
    weights: Vec<f64>,
    decay: f64,
    h: f64,
}

impl KernelWeights {
    /// Weights for `(decay, h)` at the default tolerance.
    pub fn exponential(decay: f64, h: f64) -> Result<Self> {
        discrete_weights(decay, h, DEFAULT_TRUNCATION_TOL)
    }

    /// Like [`KernelWeights::exponential`], but a degenerate kernel becomes
    /// an empty weight set instead of an error.
    pub fn exponential_or_empty(decay: f64, h: f64) -> Result<Self> {
        match Self::exponential(decay, h) {
            Err(Error::DegenerateKernel { decay, h }) => {
                tracing::warn!(decay, h, "degenerate kernel, running without memory");
                Ok(Self::empty(decay, h))
            }
            other => other,
        }
    }

    /// The empty ("no memory") weight set.
    pub fn empty(decay: f64, h: f64) -> Self {
        Self {
            weights: Vec::new(),
            decay,
            h,
        }
    }

    /// `J_max`: number of stored weights, lag 0 included.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight at lag `j`, or `None` past the truncation point.
    pub fn get(&self, j: usize) -> Option<f64> {
        self.weights.get(j).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// `(lag, weight)` pairs for lags `j >= 1`.
    pub fn lagged(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights.iter().copied().enumerate().skip(1)
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn h(&self) -> f64 {
        self.h
    }

    /// `h * Σ_{j>=1} r̃[j]`; 1 up to rounding for a non-empty set.
    pub fn lagged_mass(&self) -> f64 {
        self.h * self.lagged().map(|(_, w)| w).sum::<f64>()
    }
}

/// Compute normalized kernel weights for the exponential kernel.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] if `decay` or `h` is not positive and finite,
///   or `tol` is outside `(0, 1)`.
/// - [`Error::DegenerateKernel`] if truncation leaves no weight at lag `>= 1`
///   (`decay * h` too large for `tol`).
///
/// # Example
///
/// ```rust
/// use delsweep::kernel::discrete_weights;
///
/// let w = discrete_weights(2.0, 0.01, 1e-12).unwrap();
/// assert!((w.lagged_mass() - 1.0).abs() < 1e-9);
/// ```
pub fn discrete_weights(decay: f64, h: f64, tol: f64) -> Result<KernelWeights> {
    check_positive("decay", decay)?;
    check_positive("h", h)?;
    if !(tol > 0.0 && tol < 1.0) {
        return Err(Error::InvalidParameter { name: "tol", value: tol });
    }

    let j_max = truncation_index(decay, h, tol);
    if j_max <= 1 {
        return Err(Error::DegenerateKernel { decay, h });
    }

    let factor = (1.0 - (-decay * h).exp()) / h;
    let raw: Vec<f64> = (0..j_max)
        .map(|j| factor * (-decay * j as f64 * h).exp())
        .collect();

    let mu = h * raw[1..].iter().sum::<f64>();
    if !(mu > 0.0) || !mu.is_finite() {
        // The tail underflowed to zero even though J_max > 1.
        return Err(Error::DegenerateKernel { decay, h });
    }

    debug!(decay, h, j_max, mu, "computed kernel weights");

    Ok(KernelWeights {
        weights: raw.into_iter().map(|r| r / mu).collect(),
        decay,
        h,
    })
}

/// `J_max = min(ceil(-ln(tol) / (decay h)), MAX_KERNEL_TERMS)`.
pub fn truncation_index(decay: f64, h: f64, tol: f64) -> usize {
    let exact = (-tol.ln() / (decay * h)).ceil();
    if exact >= MAX_KERNEL_TERMS as f64 {
        MAX_KERNEL_TERMS
    } else if exact > 0.0 {
        exact as usize
    } else {
        0
    }
}

/// Time span over which the kernel keeps weight above `tol`: `-ln(tol) / decay`.
pub fn memory_length(decay: f64, tol: f64) -> f64 {
    -tol.ln() / decay
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weights_strictly_decrease_and_stay_below_cap() {
        let w = discrete_weights(1.0, 0.1, 1e-6).unwrap();
        assert!(w.len() < MAX_KERNEL_TERMS);
        assert_eq!(w.len(), 139);
        for j in 1..w.len() - 1 {
            assert!(w.as_slice()[j] > w.as_slice()[j + 1], "not decreasing at j={j}");
        }
    }

    #[test]
    fn safety_cap_bounds_tiny_decay() {
        let w = discrete_weights(1e-6, 1e-3, 1e-12).unwrap();
        assert_eq!(w.len(), MAX_KERNEL_TERMS);
        assert!((w.lagged_mass() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_kernel_is_reported() {
        // -ln(1e-12) ≈ 27.6, so decay*h = 50 leaves a single term.
        let err = discrete_weights(5000.0, 0.01, 1e-12).unwrap_err();
        assert!(matches!(err, Error::DegenerateKernel { .. }));

        let empty = KernelWeights::exponential_or_empty(5000.0, 0.01).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.lagged().count(), 0);
    }

    #[test]
    fn rejects_non_positive_inputs() {
        assert!(matches!(
            discrete_weights(0.0, 0.1, 1e-12),
            Err(Error::InvalidParameter { name: "decay", .. })
        ));
        assert!(matches!(
            discrete_weights(1.0, -0.1, 1e-12),
            Err(Error::InvalidParameter { name: "h", .. })
        ));
        assert!(matches!(
            discrete_weights(1.0, 0.1, 1.5),
            Err(Error::InvalidParameter { name: "tol", .. })
        ));
    }

    #[test]
    fn memory_length_matches_closed_form() {
        assert!((memory_length(2.0, 0.01) - 0.01f64.ln().abs() / 2.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn lagged_mass_is_one(decay in 0.05f64..50.0, h in 0.001f64..0.2) {
            prop_assume!(decay * h < 20.0);
            let w = discrete_weights(decay, h, DEFAULT_TRUNCATION_TOL).unwrap();
            prop_assert!((w.lagged_mass() - 1.0).abs() < 1e-9);
            prop_assert!(w.as_slice().iter().all(|&r| r >= 0.0));
        }

        #[test]
        fn truncation_is_monotone(
            decay in 0.05f64..20.0,
            h in 0.001f64..0.2,
            bump in 1.0f64..4.0,
        ) {
            let base = truncation_index(decay, h, 1e-8);
            prop_assert!(truncation_index(decay * bump, h, 1e-8) <= base);
            prop_assert!(truncation_index(decay, h * bump, 1e-8) <= base);
        }
    }
}
