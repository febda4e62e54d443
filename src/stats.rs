//! Per-step statistics for comparing the delayed and classical processes.
//!
//! Both processes are read as `Xⁿ = X̄ⁿ - λₙ Gₙ`: the projection displacement
//! `Xⁿ - X̄ⁿ` is the multiplier term, and its size relative to `|∇g|` is the
//! multiplier value itself.

use serde::Serialize;

use crate::driver::BatchResult;
use crate::kernel::KernelWeights;
use crate::vec2::Point2;
use crate::Result;

/// Gradient norms at or below this give a zero multiplier value.
pub const MIN_GRADIENT_NORM: f64 = 1e-10;

/// Series derived from one trajectory; every series has one entry per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectoryStatistics {
    /// `|Xⁿ - X^{n-1}| / h`, zero at `n = 0`.
    pub velocity: Vec<f64>,
    pub distance_from_origin: Vec<f64>,
    /// `|λₙ Gₙ| = |Xⁿ - X̄ⁿ|`.
    pub multiplier_magnitude: Vec<f64>,
    /// `<λₙGₙ - λₙ₋₁Gₙ₋₁, Xⁿ - X^{n-1}>`, zero at `n = 0`.
    pub multiplier_dot: Vec<f64>,
    pub energy: Vec<f64>,
    /// `|Xⁿ - X̄ⁿ| / |∇g(Xⁿ)|`.
    pub multiplier_value: Vec<f64>,
}

impl TrajectoryStatistics {
    /// Statistics of the delayed process. Energy is the memory-weighted
    /// spread `h Σ_{j>=1} r̃_j |Xⁿ - X^{n-j}|²` over the computed history.
    pub fn delayed(
        trajectory: &[Point2],
        pre_projection: &[Point2],
        gradient_norms: &[f64],
        weights: &KernelWeights,
    ) -> Self {
        let h = weights.h();
        let energy: Vec<f64> = (0..trajectory.len())
            .map(|n| {
                weights
                    .lagged()
                    .take_while(|&(j, _)| j <= n)
                    .map(|(j, w)| h * w * (trajectory[n] - trajectory[n - j]).length_sq())
                    .sum::<f64>()
            })
            .collect();
        Self::with_energy(trajectory, pre_projection, gradient_norms, h, energy)
    }

    /// Statistics of the classical process, with `X̄ⁿ = X^{n-1}` and the
    /// origin standing in for `X̄⁰`. Energy is `|Xⁿ - X^{n-1}|² / (2h²)`.
    pub fn classical(trajectory: &[Point2], gradient_norms: &[f64], h: f64) -> Self {
        let pre_projection: Vec<Point2> = std::iter::once(Point2::ZERO)
            .chain(trajectory.iter().copied())
            .take(trajectory.len())
            .collect();
        let energy: Vec<f64> = (0..trajectory.len())
            .map(|n| match n {
                0 => 0.0,
                _ => (trajectory[n] - trajectory[n - 1]).length_sq() / (2.0 * h * h),
            })
            .collect();
        Self::with_energy(trajectory, &pre_projection, gradient_norms, h, energy)
    }

    fn with_energy(
        trajectory: &[Point2],
        pre_projection: &[Point2],
        gradient_norms: &[f64],
        h: f64,
        energy: Vec<f64>,
    ) -> Self {
        let len = trajectory.len();
        let displacement = |n: usize| -> Option<Point2> {
            pre_projection.get(n).map(|bar| trajectory[n] - *bar)
        };

        let mut stats = Self {
            energy,
            ..Self::default()
        };
        for n in 0..len {
            let step = if n > 0 {
                trajectory[n] - trajectory[n - 1]
            } else {
                Point2::ZERO
            };
            stats.velocity.push(step.length() / h);
            stats.distance_from_origin.push(trajectory[n].length());

            let magnitude = displacement(n).map_or(0.0, Point2::length);
            stats.multiplier_magnitude.push(magnitude);

            let dot = match (n.checked_sub(1).and_then(|k| displacement(k)), displacement(n)) {
                (Some(prev), Some(cur)) => (cur - prev).dot(step),
                _ => 0.0,
            };
            stats.multiplier_dot.push(dot);

            let gn = gradient_norms.get(n).copied().unwrap_or(0.0);
            stats
                .multiplier_value
                .push(if gn > MIN_GRADIENT_NORM { magnitude / gn } else { 0.0 });
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }
}

/// Statistics for both processes of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonStatistics {
    pub delayed: TrajectoryStatistics,
    pub classical: TrajectoryStatistics,
}

impl ComparisonStatistics {
    /// Recomputes the kernel from the result's `h` and decay rate.
    pub fn from_batch(result: &BatchResult) -> Result<Self> {
        let weights = KernelWeights::exponential_or_empty(result.kernel_decay, result.h)?;
        Ok(Self {
            delayed: TrajectoryStatistics::delayed(
                &result.delayed.trajectory,
                &result.delayed.pre_projection,
                &result.delayed.gradient_norms,
                &weights,
            ),
            classical: TrajectoryStatistics::classical(
                &result.classical.trajectory,
                &result.classical.gradient_norms,
                result.h,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classical_series_on_a_straight_line() {
        let traj = [Point2::new(0.0, 0.0), Point2::new(0.5, 0.0), Point2::new(1.5, 0.0)];
        let stats = TrajectoryStatistics::classical(&traj, &[1.0, 1.0, 1.0], 0.5);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.velocity, vec![0.0, 1.0, 2.0]);
        assert_eq!(stats.distance_from_origin, vec![0.0, 0.5, 1.5]);
        assert_eq!(stats.multiplier_magnitude, vec![0.0, 0.5, 1.0]);
        // (0.5 - 0) * 0.5 at n = 1, (1.0 - 0.5) * 1.0 at n = 2.
        assert_eq!(stats.multiplier_dot, vec![0.0, 0.25, 0.5]);
        assert_eq!(stats.energy, vec![0.0, 0.5, 2.0]);
        assert_eq!(stats.multiplier_value, stats.multiplier_magnitude);
    }

    #[test]
    fn vanishing_gradient_zeroes_multiplier_value() {
        let traj = [Point2::new(1.0, 0.0)];
        let bars = [Point2::new(2.0, 0.0)];
        let weights = KernelWeights::exponential(1.0, 0.5).unwrap();
        let stats = TrajectoryStatistics::delayed(&traj, &bars, &[0.0], &weights);
        assert_eq!(stats.multiplier_magnitude, vec![1.0]);
        assert_eq!(stats.multiplier_value, vec![0.0]);
    }

    #[test]
    fn delayed_energy_uses_available_history() {
        let weights = KernelWeights::exponential(1.0, 0.5).unwrap();
        let traj = [Point2::ZERO, Point2::new(1.0, 0.0)];
        let stats = TrajectoryStatistics::delayed(&traj, &traj, &[1.0, 1.0], &weights);
        assert_eq!(stats.energy[0], 0.0);
        let expected = 0.5 * weights.get(1).unwrap();
        assert!((stats.energy[1] - expected).abs() < 1e-15);
        assert!(stats.multiplier_magnitude.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn comparison_covers_both_processes() {
        let mut cfg = crate::config::SimulationConfig::default();
        cfg.simulation.t_final = 0.5;
        cfg.simulation.h = 0.125;
        let result = crate::driver::run_batch(&cfg).unwrap();
        let stats = ComparisonStatistics::from_batch(&result).unwrap();
        assert_eq!(stats.delayed.len(), result.len());
        assert_eq!(stats.classical.len(), result.len());
        assert!(stats.delayed.energy.iter().all(|e| e.is_finite() && *e >= 0.0));
    }
}
