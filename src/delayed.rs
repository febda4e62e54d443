//! Delayed sweeping stepper.
//!
//! Each step replaces the previous position by a kernel-weighted average of
//! the whole history,
//!
//! \[
//! \bar X^n = h \sum_{j=1}^{J_{max}-1} \tilde r_j X^{n-j},
//! \]
//!
//! and projects that average onto the constraint placed at `t_n = n h`.
//! Indices `n - j < 0` read the prescribed initial history `X(t)`, `t <= 0`.
//!
//! An empty kernel (see [`crate::Error::DegenerateKernel`]) degrades to the
//! `decay → ∞` limit `X̄ⁿ = X^{n-1}`.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{ParamsUpdate, SimulationParams};
use crate::constraint::{Frame, SweepProjection};
use crate::driver::{StepRecord, Sweep};
use crate::kernel::KernelWeights;
use crate::path::{ConstraintPath, PastFn, SharedPath};
use crate::vec2::Point2;
use crate::Result;

/// Delayed sweeping process with an exponential memory kernel.
pub struct DelayedSweeping {
    params: SimulationParams,
    weights: KernelWeights,
    total_steps: usize,
    path: SharedPath,
    past: PastFn,
    projection: Box<dyn SweepProjection + Send>,
    trajectory: Vec<Point2>,
    pre_projection: Vec<Point2>,
    centers: Vec<Point2>,
    projection_distances: Vec<f64>,
    gradient_norms: Vec<f64>,
}

impl std::fmt::Debug for DelayedSweeping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedSweeping")
            .field("params", &self.params)
            .field("kernel_terms", &self.weights.len())
            .field("steps", &self.trajectory.len())
            .finish_non_exhaustive()
    }
}

impl DelayedSweeping {
    /// Build a stepper and compute its kernel weights.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidParameter`] if `T`, `h` or the decay rate is not
    /// positive and finite. A degenerate kernel is not an error here.
    pub fn new(
        params: SimulationParams,
        path: impl ConstraintPath + 'static,
        past: impl Fn(f64) -> Point2 + Send + Sync + 'static,
        projection: impl SweepProjection + Send + 'static,
    ) -> Result<Self> {
        Self::from_parts(params, Arc::new(path), Arc::new(past), Box::new(projection))
    }

    /// Build from collaborators that may be shared with another stepper.
    pub fn from_parts(
        params: SimulationParams,
        path: SharedPath,
        past: PastFn,
        projection: Box<dyn SweepProjection + Send>,
    ) -> Result<Self> {
        params.validate()?;
        let weights = KernelWeights::exponential_or_empty(params.kernel_decay, params.h)?;
        debug!(
            kernel_terms = weights.len(),
            total_steps = params.total_steps(),
            "delayed stepper ready"
        );
        Ok(Self {
            total_steps: params.total_steps(),
            params,
            weights,
            path,
            past,
            projection,
            trajectory: Vec::new(),
            pre_projection: Vec::new(),
            centers: Vec::new(),
            projection_distances: Vec::new(),
            gradient_norms: Vec::new(),
        })
    }

    /// Position at step index `k`; negative indices read the initial history.
    fn history(&self, k: isize) -> Point2 {
        if k >= 0 {
            self.trajectory[k as usize]
        } else {
            (self.past)(k as f64 * self.params.h)
        }
    }

    /// `X̄ⁿ` from the current history.
    pub fn memory_average(&self, n: usize) -> Point2 {
        let n = n as isize;
        if self.weights.is_empty() {
            return self.history(n - 1);
        }
        let mut acc = Point2::ZERO;
        for (j, w) in self.weights.lagged() {
            acc += self.history(n - j as isize) * w;
        }
        acc * self.params.h
    }

    /// Take step `n`.
    ///
    /// # Panics
    ///
    /// If `n` is not the next untaken index.
    pub fn step(&mut self, n: usize) -> StepRecord {
        assert_eq!(n, self.trajectory.len(), "delayed step requested out of order");

        let time = n as f64 * self.params.h;
        let x_bar = self.memory_average(n);
        let frame = Frame::new(self.path.position(time), self.path.angle(time));
        let sample = self.projection.project_onto(x_bar, frame);
        let distance = sample.projected.distance(x_bar);

        self.trajectory.push(sample.projected);
        self.pre_projection.push(x_bar);
        self.centers.push(frame.center);
        self.projection_distances.push(distance);
        self.gradient_norms.push(sample.gradient_norm);

        trace!(n, time, x = sample.projected.x, y = sample.projected.y, distance, "delayed step");

        StepRecord {
            index: n,
            time,
            position: sample.projected,
            pre_projection: x_bar,
            center: frame.center,
            projection_distance: distance,
            gradient_norm: sample.gradient_norm,
            outcome: sample.outcome,
        }
    }

    /// Clear history and run steps `0..=total_steps`.
    pub fn simulate(&mut self) -> &[Point2] {
        self.reset();
        for n in 0..=self.total_steps {
            self.step(n);
        }
        &self.trajectory
    }

    /// Drop the computed history; parameters and collaborators stay.
    pub fn reset(&mut self) {
        self.trajectory.clear();
        self.pre_projection.clear();
        self.centers.clear();
        self.projection_distances.clear();
        self.gradient_norms.clear();
    }

    /// Apply a partial parameter update. Kernel weights are recomputed when
    /// `h` or the decay rate changes; computed history is kept.
    pub fn update_params(&mut self, update: ParamsUpdate) -> Result<()> {
        let next = update.apply(&self.params);
        next.validate()?;
        if update.touches_kernel(&self.params) {
            self.weights = KernelWeights::exponential_or_empty(next.kernel_decay, next.h)?;
            debug!(kernel_terms = self.weights.len(), "kernel recomputed");
        }
        self.params = next;
        self.total_steps = next.total_steps();
        Ok(())
    }

    pub fn set_path(&mut self, path: impl ConstraintPath + 'static) {
        self.path = Arc::new(path);
    }

    pub fn set_shared_path(&mut self, path: SharedPath) {
        self.path = path;
    }

    pub fn set_projection(&mut self, projection: impl SweepProjection + Send + 'static) {
        self.projection = Box::new(projection);
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn kernel(&self) -> &KernelWeights {
        &self.weights
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Number of steps taken.
    pub fn len(&self) -> usize {
        self.trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty()
    }

    pub fn trajectory(&self) -> &[Point2] {
        &self.trajectory
    }

    /// `X̄ⁿ` per step.
    pub fn pre_projection(&self) -> &[Point2] {
        &self.pre_projection
    }

    pub fn centers(&self) -> &[Point2] {
        &self.centers
    }

    /// `|Xⁿ - X̄ⁿ|` per step.
    pub fn projection_distances(&self) -> &[f64] {
        &self.projection_distances
    }

    pub fn gradient_norms(&self) -> &[f64] {
        &self.gradient_norms
    }
}

impl Sweep for DelayedSweeping {
    type Record = StepRecord;

    fn step(&mut self, n: usize) -> StepRecord {
        DelayedSweeping::step(self, n)
    }

    fn len(&self) -> usize {
        self.trajectory.len()
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn reset(&mut self) {
        DelayedSweeping::reset(self)
    }

    fn infinite_mode(&self) -> bool {
        self.params.infinite_mode
    }

    fn set_infinite_mode(&mut self, on: bool) {
        self.params.infinite_mode = on;
    }
}
