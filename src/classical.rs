//! Classical (Moreau) sweeping stepper: project the previous position onto
//! the constraint at the current time.

use std::sync::Arc;

use tracing::trace;

use crate::config::{ParamsUpdate, SimulationParams};
use crate::constraint::{Frame, SweepProjection};
use crate::driver::{StepRecord, Sweep};
use crate::path::{ConstraintPath, PastFn, SharedPath};
use crate::vec2::Point2;
use crate::Result;

/// Memoryless reference process, `Xⁿ = P_{C(t_n)}(X^{n-1})`.
pub struct ClassicalSweeping {
    params: SimulationParams,
    total_steps: usize,
    path: SharedPath,
    past: PastFn,
    projection: Box<dyn SweepProjection + Send>,
    trajectory: Vec<Point2>,
    centers: Vec<Point2>,
    projection_distances: Vec<f64>,
    gradient_norms: Vec<f64>,
}

impl std::fmt::Debug for ClassicalSweeping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassicalSweeping")
            .field("params", &self.params)
            .field("steps", &self.trajectory.len())
            .finish_non_exhaustive()
    }
}

impl ClassicalSweeping {
    pub fn new(
        params: SimulationParams,
        path: impl ConstraintPath + 'static,
        past: impl Fn(f64) -> Point2 + Send + Sync + 'static,
        projection: impl SweepProjection + Send + 'static,
    ) -> Result<Self> {
        Self::from_parts(params, Arc::new(path), Arc::new(past), Box::new(projection))
    }

    pub fn from_parts(
        params: SimulationParams,
        path: SharedPath,
        past: PastFn,
        projection: Box<dyn SweepProjection + Send>,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            total_steps: params.total_steps(),
            params,
            path,
            past,
            projection,
            trajectory: Vec::new(),
            centers: Vec::new(),
            projection_distances: Vec::new(),
            gradient_norms: Vec::new(),
        })
    }

    fn previous(&self, n: usize) -> Point2 {
        match n.checked_sub(1) {
            Some(k) => self.trajectory[k],
            None => (self.past)(0.0),
        }
    }

    /// Take step `n`. The recorded distance is `|g(X^{n-1})|` in this step's
    /// frame, i.e. how far the constraint moved away from the last position.
    ///
    /// # Panics
    ///
    /// If `n` is not the next untaken index.
    pub fn step(&mut self, n: usize) -> StepRecord {
        assert_eq!(n, self.trajectory.len(), "classical step requested out of order");

        let time = n as f64 * self.params.h;
        let previous = self.previous(n);
        let frame = Frame::new(self.path.position(time), self.path.angle(time));
        let sample = self.projection.project_onto(previous, frame);

        self.trajectory.push(sample.projected);
        self.centers.push(frame.center);
        self.projection_distances.push(sample.violation);
        self.gradient_norms.push(sample.gradient_norm);

        trace!(n, time, x = sample.projected.x, y = sample.projected.y, "classical step");

        StepRecord {
            index: n,
            time,
            position: sample.projected,
            pre_projection: previous,
            center: frame.center,
            projection_distance: sample.violation,
            gradient_norm: sample.gradient_norm,
            outcome: sample.outcome,
        }
    }

    pub fn simulate(&mut self) -> &[Point2] {
        self.reset();
        for n in 0..=self.total_steps {
            self.step(n);
        }
        &self.trajectory
    }

    pub fn reset(&mut self) {
        self.trajectory.clear();
        self.centers.clear();
        self.projection_distances.clear();
        self.gradient_norms.clear();
    }

    pub fn update_params(&mut self, update: ParamsUpdate) -> Result<()> {
        let next = update.apply(&self.params);
        next.validate()?;
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

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn len(&self) -> usize {
        self.trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty()
    }

    pub fn trajectory(&self) -> &[Point2] {
        &self.trajectory
    }

    pub fn centers(&self) -> &[Point2] {
        &self.centers
    }

    pub fn projection_distances(&self) -> &[f64] {
        &self.projection_distances
    }

    pub fn gradient_norms(&self) -> &[f64] {
        &self.gradient_norms
    }
}

impl Sweep for ClassicalSweeping {
    type Record = StepRecord;

    fn step(&mut self, n: usize) -> StepRecord {
        ClassicalSweeping::step(self, n)
    }

    fn len(&self) -> usize {
        self.trajectory.len()
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn reset(&mut self) {
        ClassicalSweeping::reset(self)
    }

    fn infinite_mode(&self) -> bool {
        self.params.infinite_mode
    }

    fn set_infinite_mode(&mut self, on: bool) {
        self.params.infinite_mode = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Projector;
    use crate::path::CenterPath;

    fn disk(radius: f64) -> Projector {
        Projector::new(move |x: f64, y: f64| radius - (x * x + y * y).sqrt())
    }

    #[test]
    fn first_step_projects_initial_position() {
        let params = SimulationParams::new(1.0, 0.25, 1.0);
        let mut sweep = ClassicalSweeping::new(
            params,
            CenterPath::fixed(Point2::ZERO),
            |t: f64| Point2::new(3.0 + t, 0.0),
            disk(1.0),
        )
        .unwrap();
        let rec = sweep.step(0);
        assert_eq!(rec.pre_projection, Point2::new(3.0, 0.0));
        assert!((rec.position.x - 1.0).abs() < 1e-6);
        assert!((rec.projection_distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stationary_constraint_freezes_the_point() {
        let params = SimulationParams::new(1.0, 0.25, 1.0);
        let mut sweep = ClassicalSweeping::new(
            params,
            CenterPath::fixed(Point2::ZERO),
            |_t: f64| Point2::new(0.0, 5.0),
            disk(1.0),
        )
        .unwrap();
        sweep.simulate();
        let first = sweep.trajectory()[0];
        for p in &sweep.trajectory()[1..] {
            assert_eq!(*p, first);
        }
        assert!(sweep.projection_distances()[1..].iter().all(|&d| d < 1e-6));
    }

    #[test]
    fn translating_disk_drags_point() {
        // Center moves right at unit speed; the point is pushed along.
        let params = SimulationParams::new(2.0, 0.25, 1.0);
        let path = CenterPath::Linear {
            start_x: 0.0,
            start_y: 0.0,
            velocity_x: 1.0,
            velocity_y: 0.0,
        };
        let mut sweep =
            ClassicalSweeping::new(params, path, |_t: f64| Point2::ZERO, disk(0.5)).unwrap();
        sweep.simulate();
        assert_eq!(sweep.len(), 9);
        let last = *sweep.trajectory().last().unwrap();
        assert!((last.x - 1.5).abs() < 1e-6, "last={last:?}");
        for (p, c) in sweep.trajectory().iter().zip(sweep.centers()) {
            assert!(p.distance(*c) <= 0.5 + 1e-6);
        }
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn repeating_a_step_panics() {
        let params = SimulationParams::new(1.0, 0.25, 1.0);
        let mut sweep = ClassicalSweeping::new(
            params,
            CenterPath::fixed(Point2::ZERO),
            |_t: f64| Point2::ZERO,
            disk(1.0),
        )
        .unwrap();
        sweep.step(0);
        sweep.step(0);
    }
}
