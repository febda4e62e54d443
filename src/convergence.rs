//! Step-size refinement study.
//!
//! Runs the same configuration over log-spaced step sizes and measures how
//! the terminal state moves as `h` shrinks. Errors are taken against the
//! finest run, so the study says nothing about the exact solution; it shows
//! whether the discretization settles and at which rate.

use ndarray::Array1;
use serde::Serialize;
use tracing::info;

use crate::config::SimulationConfig;
use crate::driver::run_batch;
use crate::stats::ComparisonStatistics;
use crate::vec2::Point2;
use crate::{Error, Result};

/// Reported in place of `log2(error)` when the error is at or below [`ERROR_FLOOR`].
pub const LOG2_ERROR_FLOOR: f64 = -50.0;

pub const ERROR_FLOOR: f64 = 1e-16;

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceSample {
    pub h: f64,
    pub log2_h: f64,
    pub terminal_position: Point2,
    pub terminal_multiplier: f64,
    pub classical_terminal_position: Point2,
    pub classical_terminal_multiplier: f64,
    /// `None` for the reference (finest) run.
    pub log2_position_error: Option<f64>,
    pub log2_multiplier_error: Option<f64>,
    pub classical_log2_position_error: Option<f64>,
    pub classical_log2_multiplier_error: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvergenceStudy {
    /// Ordered by increasing `h`; the first sample is the reference.
    pub samples: Vec<ConvergenceSample>,
}

impl ConvergenceStudy {
    /// Least-squares slope of `log2(position error)` against `log2(h)` for
    /// the delayed process, i.e. the observed order of convergence.
    ///
    /// `None` with fewer than two usable errors.
    pub fn observed_order(&self) -> Option<f64> {
        fit_slope(self.samples.iter().map(|s| (s.log2_h, s.log2_position_error)))
    }

    /// Same as [`observed_order`](Self::observed_order) for the classical process.
    pub fn classical_observed_order(&self) -> Option<f64> {
        fit_slope(
            self.samples
                .iter()
                .map(|s| (s.log2_h, s.classical_log2_position_error)),
        )
    }
}

fn fit_slope(points: impl Iterator<Item = (f64, Option<f64>)>) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = points
        .filter_map(|(x, y)| y.filter(|&v| v > LOG2_ERROR_FLOOR).map(|v| (x, v)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let x = Array1::from(xs);
    let y = Array1::from(ys);
    let x_mean = x.mean()?;
    let y_mean = y.mean()?;
    let dx = &x - x_mean;
    let var = dx.dot(&dx);
    if var <= 0.0 {
        return None;
    }
    Some(dx.dot(&(&y - y_mean)) / var)
}

/// `log2(error)`, or [`LOG2_ERROR_FLOOR`] for errors that vanish numerically.
pub fn log2_error(error: f64) -> f64 {
    if error > ERROR_FLOOR {
        error.log2()
    } else {
        LOG2_ERROR_FLOOR
    }
}

/// `samples` step sizes `2^s` for `s` evenly spaced in `[log2_h_min, log2_h_max]`.
pub fn step_sizes(log2_h_min: f64, log2_h_max: f64, samples: usize) -> Array1<f64> {
    Array1::logspace(2.0, log2_h_min, log2_h_max, samples)
}

/// Run `config` at every step size of [`step_sizes`] in finite mode.
///
/// # Errors
///
/// [`Error::Domain`] for an empty or reversed range, and any error from the
/// individual batch runs.
pub fn convergence_study(
    config: &SimulationConfig,
    log2_h_min: f64,
    log2_h_max: f64,
    samples: usize,
) -> Result<ConvergenceStudy> {
    if samples == 0 {
        return Err(Error::Domain("convergence study needs at least one step size"));
    }
    if !(log2_h_min <= log2_h_max) {
        return Err(Error::Domain("log2_h_min must not exceed log2_h_max"));
    }

    let hs = step_sizes(log2_h_min, log2_h_max, samples);
    info!(samples, h_min = hs[0], h_max = hs[samples - 1], "starting convergence study");

    let mut out = Vec::with_capacity(samples);
    for &h in hs.iter() {
        let mut run = config.clone();
        run.simulation.h = h;
        run.simulation.infinite_mode = false;

        let result = run_batch(&run)?;
        let stats = ComparisonStatistics::from_batch(&result)?;
        out.push(ConvergenceSample {
            h,
            log2_h: h.log2(),
            terminal_position: result.delayed.trajectory.last().copied().unwrap_or_default(),
            terminal_multiplier: stats.delayed.multiplier_value.last().copied().unwrap_or(0.0),
            classical_terminal_position: result
                .classical
                .trajectory
                .last()
                .copied()
                .unwrap_or_default(),
            classical_terminal_multiplier: stats
                .classical
                .multiplier_value
                .last()
                .copied()
                .unwrap_or(0.0),
            log2_position_error: None,
            log2_multiplier_error: None,
            classical_log2_position_error: None,
            classical_log2_multiplier_error: None,
        });
    }

    if let Some((reference, rest)) = out.split_first_mut() {
        for s in rest {
            s.log2_position_error = Some(log2_error(
                s.terminal_position.distance(reference.terminal_position),
            ));
            s.log2_multiplier_error = Some(log2_error(
                (s.terminal_multiplier - reference.terminal_multiplier).abs(),
            ));
            s.classical_log2_position_error = Some(log2_error(
                s.classical_terminal_position
                    .distance(reference.classical_terminal_position),
            ));
            s.classical_log2_multiplier_error = Some(log2_error(
                (s.classical_terminal_multiplier - reference.classical_terminal_multiplier).abs(),
            ));
        }
    }

    let study = ConvergenceStudy { samples: out };
    info!(order = ?study.observed_order(), "convergence study finished");
    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConstraintSpec, TrajectorySpec};
    use crate::path::CenterPath;

    fn resting_config() -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.simulation.t_final = 1.0;
        cfg.simulation.past_x = "0".to_string();
        cfg.simulation.past_y = "0".to_string();
        cfg.constraint = ConstraintSpec::disk(1.0);
        cfg.trajectory = TrajectorySpec::Curve(CenterPath::fixed(Point2::ZERO));
        cfg
    }

    #[test]
    fn step_sizes_are_powers_of_two() {
        let hs = step_sizes(-3.0, -1.0, 3);
        for (h, expected) in hs.iter().zip([0.125, 0.25, 0.5]) {
            assert!((h - expected).abs() < 1e-12, "{h} vs {expected}");
        }
    }

    #[test]
    fn floor_applies_to_vanishing_errors() {
        assert_eq!(log2_error(0.0), LOG2_ERROR_FLOOR);
        assert_eq!(log2_error(1e-17), LOG2_ERROR_FLOOR);
        assert_eq!(log2_error(0.25), -2.0);
    }

    #[test]
    fn resting_point_has_no_error() {
        let study = convergence_study(&resting_config(), -5.0, -3.0, 3).unwrap();
        assert_eq!(study.samples.len(), 3);
        assert!(study.samples[0].log2_position_error.is_none());
        for s in &study.samples[1..] {
            assert_eq!(s.log2_position_error, Some(LOG2_ERROR_FLOOR));
            assert_eq!(s.classical_log2_position_error, Some(LOG2_ERROR_FLOOR));
        }
        assert_eq!(study.observed_order(), None);
    }

    #[test]
    fn rejects_bad_ranges() {
        let cfg = resting_config();
        assert!(matches!(
            convergence_study(&cfg, -3.0, -5.0, 3),
            Err(Error::Domain(_))
        ));
        assert!(matches!(
            convergence_study(&cfg, -5.0, -3.0, 0),
            Err(Error::Domain(_))
        ));
        assert!(matches!(
            convergence_study(&cfg, f64::NAN, -3.0, 2),
            Err(Error::Domain(_))
        ));
    }

    #[test]
    fn slope_of_exact_line() {
        let pts = [(-3.0, Some(-6.0)), (-2.0, Some(-4.0)), (-1.0, Some(-2.0)), (0.0, None)];
        let slope = fit_slope(pts.into_iter()).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
    }
}
