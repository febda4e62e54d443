//! Running sweeps: batch and incremental.
//!
//! [`run_batch`] turns a [`SimulationConfig`] into a complete [`BatchResult`].
//! [`IncrementalRunner`] advances any [`Sweep`] a few steps per tick so a
//! caller can interleave stepping with rendering, pause, and resume at the
//! next untaken index.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classical::ClassicalSweeping;
use crate::config::{ParamsUpdate, SimulationConfig, SimulationParams};
use crate::constraint::ProjectionOutcome;
use crate::delayed::DelayedSweeping;
use crate::vec2::Point2;
use crate::Result;

/// What one step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub index: usize,
    /// `index * h`.
    pub time: f64,
    pub position: Point2,
    /// The point that was projected (`X̄ⁿ`, or `X^{n-1}` for the classical process).
    pub pre_projection: Point2,
    pub center: Point2,
    pub projection_distance: f64,
    pub gradient_norm: f64,
    pub outcome: ProjectionOutcome,
}

/// A stepper that extends its history one index at a time.
pub trait Sweep {
    type Record;

    /// Take step `n`; panics unless `n == self.len()`.
    fn step(&mut self, n: usize) -> Self::Record;

    /// Number of steps taken so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `floor(T / h)`.
    fn total_steps(&self) -> usize;

    fn reset(&mut self);

    fn infinite_mode(&self) -> bool;

    fn set_infinite_mode(&mut self, on: bool);
}

/// Delayed and classical processes advanced in lockstep over the same
/// constraint, path and initial history.
#[derive(Debug)]
pub struct SweepPair {
    pub delayed: DelayedSweeping,
    pub classical: ClassicalSweeping,
}

impl SweepPair {
    pub fn new(delayed: DelayedSweeping, classical: ClassicalSweeping) -> Self {
        Self { delayed, classical }
    }

    /// Compile a configuration into a ready pair. Nothing is stepped.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let params = config.params();
        let past = config.simulation.past_function()?;
        let path = config.trajectory.path()?;
        let projector = config.constraint.projector()?;

        let delayed = DelayedSweeping::from_parts(
            params,
            path.clone(),
            past.clone(),
            Box::new(projector.clone()),
        )?;
        let classical = ClassicalSweeping::from_parts(params, path, past, Box::new(projector))?;
        Ok(Self { delayed, classical })
    }

    pub fn params(&self) -> &SimulationParams {
        self.delayed.params()
    }

    pub fn update_params(&mut self, update: ParamsUpdate) -> Result<()> {
        self.delayed.update_params(update)?;
        self.classical.update_params(update)
    }
}

impl Sweep for SweepPair {
    type Record = (StepRecord, StepRecord);

    fn step(&mut self, n: usize) -> Self::Record {
        (self.delayed.step(n), self.classical.step(n))
    }

    fn len(&self) -> usize {
        self.delayed.len()
    }

    fn total_steps(&self) -> usize {
        self.delayed.total_steps()
    }

    fn reset(&mut self) {
        self.delayed.reset();
        self.classical.reset();
    }

    fn infinite_mode(&self) -> bool {
        Sweep::infinite_mode(&self.delayed)
    }

    fn set_infinite_mode(&mut self, on: bool) {
        Sweep::set_infinite_mode(&mut self.delayed, on);
        Sweep::set_infinite_mode(&mut self.classical, on);
    }
}

/// Series recorded by the delayed process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayedSeries {
    pub trajectory: Vec<Point2>,
    pub pre_projection: Vec<Point2>,
    pub centers: Vec<Point2>,
    pub projection_distances: Vec<f64>,
    pub gradient_norms: Vec<f64>,
}

/// Series recorded by the classical process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassicalSeries {
    pub trajectory: Vec<Point2>,
    pub gradient_norms: Vec<f64>,
    pub projection_distances: Vec<f64>,
}

/// Output of [`run_batch`]; every series has `total_steps + 1` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub h: f64,
    /// Decay rate the delayed series was computed with.
    pub kernel_decay: f64,
    pub delayed: DelayedSeries,
    pub classical: ClassicalSeries,
}

impl BatchResult {
    /// Snapshot the histories of a pair.
    pub fn from_pair(pair: &SweepPair) -> Self {
        let d = &pair.delayed;
        let c = &pair.classical;
        Self {
            h: d.params().h,
            kernel_decay: d.params().kernel_decay,
            delayed: DelayedSeries {
                trajectory: d.trajectory().to_vec(),
                pre_projection: d.pre_projection().to_vec(),
                centers: d.centers().to_vec(),
                projection_distances: d.projection_distances().to_vec(),
                gradient_norms: d.gradient_norms().to_vec(),
            },
            classical: ClassicalSeries {
                trajectory: c.trajectory().to_vec(),
                gradient_norms: c.gradient_norms().to_vec(),
                projection_distances: c.projection_distances().to_vec(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.delayed.trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delayed.trajectory.is_empty()
    }

    /// `n h` for row `n`.
    pub fn time(&self, n: usize) -> f64 {
        n as f64 * self.h
    }
}

/// Run both processes for `n = 0..=floor(T/h)`.
///
/// The configuration is validated first; a malformed one rejects the run
/// before any step. `infiniteMode` is ignored: a batch always stops at `T`.
pub fn run_batch(config: &SimulationConfig) -> Result<BatchResult> {
    config.validate()?;
    let mut pair = SweepPair::from_config(config)?;
    let total = pair.total_steps();
    info!(
        h = pair.params().h,
        kernel_decay = pair.params().kernel_decay,
        total_steps = total,
        kernel_terms = pair.delayed.kernel().len(),
        "starting batch run"
    );

    for n in 0..=total {
        pair.step(n);
    }

    info!(steps = pair.len(), "batch run finished");
    Ok(BatchResult::from_pair(&pair))
}

/// Result of one [`IncrementalRunner::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Not running; nothing was stepped.
    Idle,
    Running,
    /// The last finite-mode step was taken; the runner stopped itself.
    Complete,
}

/// Drives a [`Sweep`] a bounded number of steps per tick.
#[derive(Debug)]
pub struct IncrementalRunner<S> {
    sweep: S,
    running: bool,
    current_step: usize,
    steps_per_tick: usize,
}

impl<S: Sweep> IncrementalRunner<S> {
    pub fn new(sweep: S) -> Self {
        Self {
            current_step: sweep.len(),
            sweep,
            running: false,
            steps_per_tick: 1,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop stepping; the next [`start`](Self::start) continues where this left off.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Pause, then drop all history and rewind to step 0. The runner stays
    /// paused until the next [`start`](Self::start).
    pub fn restart(&mut self) {
        self.pause();
        self.sweep.reset();
        self.current_step = 0;
    }

    /// Clamped to at least one.
    pub fn set_steps_per_tick(&mut self, steps: usize) {
        self.steps_per_tick = steps.max(1);
    }

    pub fn steps_per_tick(&self) -> usize {
        self.steps_per_tick
    }

    pub fn set_infinite_mode(&mut self, on: bool) {
        self.sweep.set_infinite_mode(on);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Next index to be stepped.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Fraction of `0..=total_steps` done, in `[0, 1]`. In infinite mode the
    /// fraction saturates at 1 once the window is full.
    pub fn progress(&self) -> f64 {
        let steps = (self.sweep.total_steps() + 1) as f64;
        (self.current_step as f64 / steps).min(1.0)
    }

    fn finished(&self) -> bool {
        !self.sweep.infinite_mode() && self.current_step > self.sweep.total_steps()
    }

    /// Take up to `steps_per_tick` steps, handing each record to `on_step`.
    pub fn tick(&mut self, mut on_step: impl FnMut(&S::Record)) -> TickStatus {
        if !self.running {
            return TickStatus::Idle;
        }
        for _ in 0..self.steps_per_tick {
            if self.finished() {
                break;
            }
            let record = self.sweep.step(self.current_step);
            on_step(&record);
            self.current_step += 1;
        }
        if self.finished() {
            self.running = false;
            info!(steps = self.current_step, "incremental run complete");
            return TickStatus::Complete;
        }
        TickStatus::Running
    }

    pub fn sweep(&self) -> &S {
        &self.sweep
    }

    /// Mutable access for collaborator swaps and parameter updates.
    pub fn sweep_mut(&mut self) -> &mut S {
        &mut self.sweep
    }

    pub fn into_inner(self) -> S {
        self.sweep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConstraintSpec;
    use crate::path::CenterPath;

    fn config(t_final: f64, h: f64) -> SimulationConfig {
        let mut cfg = SimulationConfig::default();
        cfg.simulation.t_final = t_final;
        cfg.simulation.h = h;
        cfg.constraint = ConstraintSpec::disk(1.0);
        cfg
    }

    /// Counts steps, nothing else.
    #[derive(Default)]
    struct Counter {
        taken: usize,
        total: usize,
        infinite: bool,
    }

    impl Sweep for Counter {
        type Record = usize;

        fn step(&mut self, n: usize) -> usize {
            assert_eq!(n, self.taken, "out of order");
            self.taken += 1;
            n
        }

        fn len(&self) -> usize {
            self.taken
        }

        fn total_steps(&self) -> usize {
            self.total
        }

        fn reset(&mut self) {
            self.taken = 0;
        }

        fn infinite_mode(&self) -> bool {
            self.infinite
        }

        fn set_infinite_mode(&mut self, on: bool) {
            self.infinite = on;
        }
    }

    #[test]
    fn batch_lengths_match_step_count() {
        let result = run_batch(&config(1.0, 0.125)).unwrap();
        assert_eq!(result.len(), 9);
        assert_eq!(result.delayed.pre_projection.len(), 9);
        assert_eq!(result.delayed.centers.len(), 9);
        assert_eq!(result.classical.trajectory.len(), 9);
        assert_eq!(result.classical.projection_distances.len(), 9);
        assert_eq!(result.time(8), 1.0);
    }

    #[test]
    fn batch_ignores_infinite_mode() {
        let mut cfg = config(0.5, 0.125);
        cfg.simulation.infinite_mode = true;
        assert_eq!(run_batch(&cfg).unwrap().len(), 5);
    }

    #[test]
    fn batch_rejects_malformed_expression() {
        let mut cfg = config(1.0, 0.1);
        cfg.simulation.past_x = "cos(".to_string();
        assert!(run_batch(&cfg).is_err());
    }

    #[test]
    fn pair_shares_path_and_history() {
        let mut cfg = config(0.5, 0.25);
        cfg.trajectory = crate::config::TrajectorySpec::Curve(CenterPath::circle(0.5, 1.0));
        let mut pair = SweepPair::from_config(&cfg).unwrap();
        let (d, c) = pair.step(0);
        assert_eq!(d.center, c.center);
        assert_eq!(d.time, 0.0);
        assert_eq!(pair.delayed.len(), pair.classical.len());
    }

    #[test]
    fn runner_idles_until_started() {
        let mut runner = IncrementalRunner::new(Counter {
            total: 3,
            ..Counter::default()
        });
        assert_eq!(runner.tick(|_| {}), TickStatus::Idle);
        assert_eq!(runner.current_step(), 0);
    }

    #[test]
    fn runner_completes_after_last_step() {
        let mut runner = IncrementalRunner::new(Counter {
            total: 4,
            ..Counter::default()
        });
        runner.set_steps_per_tick(2);
        runner.start();

        let mut seen = Vec::new();
        assert_eq!(runner.tick(|&n| seen.push(n)), TickStatus::Running);
        assert_eq!(runner.tick(|&n| seen.push(n)), TickStatus::Running);
        assert_eq!(runner.tick(|&n| seen.push(n)), TickStatus::Complete);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(!runner.is_running());
        assert_eq!(runner.progress(), 1.0);
        assert_eq!(runner.tick(|&n| seen.push(n)), TickStatus::Idle);
    }

    #[test]
    fn pause_resumes_at_next_index() {
        let mut runner = IncrementalRunner::new(Counter {
            total: 10,
            ..Counter::default()
        });
        runner.start();
        runner.tick(|_| {});
        runner.tick(|_| {});
        runner.pause();
        assert_eq!(runner.tick(|_| {}), TickStatus::Idle);
        runner.start();
        let mut next = None;
        runner.tick(|&n| next = Some(n));
        assert_eq!(next, Some(2));
    }

    #[test]
    fn infinite_mode_keeps_running() {
        let mut runner = IncrementalRunner::new(Counter {
            total: 2,
            ..Counter::default()
        });
        runner.set_infinite_mode(true);
        runner.set_steps_per_tick(0);
        assert_eq!(runner.steps_per_tick(), 1);
        runner.start();
        for _ in 0..10 {
            assert_eq!(runner.tick(|_| {}), TickStatus::Running);
        }
        assert_eq!(runner.sweep().len(), 10);

        runner.set_infinite_mode(false);
        assert_eq!(runner.tick(|_| {}), TickStatus::Complete);
    }

    #[test]
    fn restart_clears_history() {
        let mut runner = IncrementalRunner::new(Counter {
            total: 5,
            ..Counter::default()
        });
        runner.start();
        runner.tick(|_| {});
        runner.restart();
        assert_eq!(runner.current_step(), 0);
        assert!(runner.sweep().is_empty());
        assert!(!runner.is_running(), "restart leaves the runner paused");

        let mut first = None;
        assert_eq!(runner.tick(|&n| first = Some(n)), TickStatus::Idle);
        assert_eq!(first, None);
        assert!(runner.sweep().is_empty());

        runner.start();
        runner.tick(|&n| first = Some(n));
        assert_eq!(first, Some(0));
    }
}
