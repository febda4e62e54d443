//! Constraint evaluation and projection.
//!
//! A constraint is an implicit region `C = {p : g(p) >= 0}` given by a scalar
//! field `g` defined in *local* coordinates. A [`Frame`] places the region in
//! the world (translation by `center`, rotation by `angle`). The [`Projector`]
//! evaluates `g` through that frame and pushes infeasible points back onto the
//! zero level set with Newton steps along the numerical gradient.
//!
//! Newton steps are exact for quadratic `g` (a disk in squared form) and a
//! good local approximation otherwise. Convergence is not guaranteed for
//! non-convex or multiply-connected sets; the projector then returns its best
//! estimate and reports the outcome instead of failing.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::vec2::Point2;
use crate::Result;

/// Value substituted for `g` when the field cannot be evaluated.
pub const INFEASIBLE: f64 = -1.0;

/// Central finite-difference step used for gradients.
pub const FD_STEP: f64 = 1e-6;

/// A scalar field `g(x, y)` in local constraint coordinates.
///
/// Implementations must be pure and deterministic. Failing evaluations are
/// allowed; the projector treats them as infeasible.
pub trait ScalarField: Send + Sync {
    fn try_eval(&self, x: f64, y: f64) -> Result<f64>;
}

impl<F> ScalarField for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn try_eval(&self, x: f64, y: f64) -> Result<f64> {
        Ok(self(x, y))
    }
}

/// Rigid transform between local constraint coordinates and world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub center: Point2,
    /// Rotation in radians, counter-clockwise.
    pub angle: f64,
}

impl Frame {
    pub fn new(center: Point2, angle: f64) -> Self {
        Self { center, angle }
    }

    /// Unrotated frame at `center`.
    pub fn at(center: Point2) -> Self {
        Self { center, angle: 0.0 }
    }

    /// World point → local point: translate by `-center`, rotate by `-angle`.
    #[inline]
    pub fn to_local(&self, world: Point2) -> Point2 {
        (world - self.center).rotate(-self.angle)
    }

    /// Local point → world point.
    #[inline]
    pub fn to_world(&self, local: Point2) -> Point2 {
        local.rotate(self.angle) + self.center
    }

    /// Local direction → world direction (rotation only).
    #[inline]
    pub fn vector_to_world(&self, local: Point2) -> Point2 {
        local.rotate(self.angle)
    }
}

/// Central-difference gradient of `f` at `p`.
pub fn numerical_gradient(f: impl Fn(f64, f64) -> f64, p: Point2, step: f64) -> Point2 {
    let dx = (f(p.x + step, p.y) - f(p.x - step, p.y)) / (2.0 * step);
    let dy = (f(p.x, p.y + step) - f(p.x, p.y - step)) / (2.0 * step);
    Point2::new(dx, dy)
}

/// Tuning for the Newton boundary projection.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionParams {
    /// Maximum Newton iterations.
    pub max_iterations: usize,
    /// Stop once `g >= -tolerance`.
    pub tolerance: f64,
    /// Squared gradient norm below which the iteration gives up.
    pub min_grad_norm_sq: f64,
    /// Finite-difference step for gradients.
    pub fd_step: f64,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-8,
            min_grad_norm_sq: 1e-12,
            fd_step: FD_STEP,
        }
    }
}

/// How a projection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// Input was already feasible and returned unchanged.
    Feasible,
    /// Reached `g >= -tolerance`.
    Converged,
    /// Gradient vanished; the returned point is the last estimate.
    Degenerate,
    /// Iteration budget exhausted.
    MaxIterations,
}

/// Result of [`Projector::project_detailed`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point2,
    pub iterations: usize,
    pub outcome: ProjectionOutcome,
}

/// Evaluates and projects onto `{g >= 0}` placed in the world by a [`Frame`].
#[derive(Clone)]
pub struct Projector {
    field: Arc<dyn ScalarField>,
    frame: Frame,
    params: ProjectionParams,
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projector")
            .field("frame", &self.frame)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Projector {
    pub fn new(field: impl ScalarField + 'static) -> Self {
        Self::from_shared(Arc::new(field))
    }

    /// Build from an already shared field (several steppers, one field).
    pub fn from_shared(field: Arc<dyn ScalarField>) -> Self {
        Self {
            field,
            frame: Frame::default(),
            params: ProjectionParams::default(),
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_params(mut self, params: ProjectionParams) -> Self {
        self.params = params;
        self
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn params(&self) -> &ProjectionParams {
        &self.params
    }

    /// Partial frame update; `None` leaves the field unchanged.
    pub fn update(&mut self, center: Option<Point2>, angle: Option<f64>) {
        if let Some(c) = center {
            self.frame.center = c;
        }
        if let Some(a) = angle {
            self.frame.angle = a;
        }
    }

    /// `g` at a local point; errors and NaN become [`INFEASIBLE`].
    fn g_local(&self, x: f64, y: f64) -> f64 {
        match self.field.try_eval(x, y) {
            Ok(v) if !v.is_nan() => v,
            _ => INFEASIBLE,
        }
    }

    fn grad_local(&self, p: Point2) -> Point2 {
        numerical_gradient(|x, y| self.g_local(x, y), p, self.params.fd_step)
    }

    /// `g(p)` for a world point `p`. Non-negative means feasible.
    pub fn evaluate(&self, p: Point2) -> f64 {
        let local = self.frame.to_local(p);
        self.g_local(local.x, local.y)
    }

    /// World-oriented gradient of `g` at the world point `p`.
    pub fn gradient(&self, p: Point2) -> Point2 {
        let local = self.frame.to_local(p);
        self.frame.vector_to_world(self.grad_local(local))
    }

    pub fn is_feasible(&self, p: Point2) -> bool {
        self.evaluate(p) >= 0.0
    }

    /// Project `p` onto the constraint set. Feasible points are returned
    /// unchanged, bit for bit.
    pub fn project(&self, p: Point2) -> Point2 {
        self.project_detailed(p).point
    }

    /// [`Projector::project`] with iteration count and outcome.
    pub fn project_detailed(&self, p: Point2) -> Projection {
        if self.evaluate(p) >= 0.0 {
            return Projection {
                point: p,
                iterations: 0,
                outcome: ProjectionOutcome::Feasible,
            };
        }

        let params = &self.params;
        let mut local = self.frame.to_local(p);
        let mut outcome = ProjectionOutcome::MaxIterations;
        let mut iterations = 0;

        for _ in 0..params.max_iterations {
            let g = self.g_local(local.x, local.y);
            if g >= -params.tolerance {
                outcome = ProjectionOutcome::Converged;
                break;
            }

            let grad = self.grad_local(local);
            let grad_norm_sq = grad.length_sq();
            if grad_norm_sq < params.min_grad_norm_sq {
                debug!(x = local.x, y = local.y, g, "projection hit a vanishing gradient");
                outcome = ProjectionOutcome::Degenerate;
                break;
            }

            local = local - grad * (g / grad_norm_sq);
            iterations += 1;
        }

        Projection {
            point: self.frame.to_world(local),
            iterations,
            outcome,
        }
    }
}

/// One projection as seen by a sweeping stepper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionSample {
    pub projected: Point2,
    /// `|∇g|` at the projected point.
    pub gradient_norm: f64,
    /// `|g|` at the input point, in the same frame.
    pub violation: f64,
    pub outcome: ProjectionOutcome,
}

/// Projection capability injected into the steppers.
///
/// The stepper supplies the frame for the current step; implementations must
/// not depend on anything else that changes between calls.
pub trait SweepProjection {
    fn project_onto(&mut self, point: Point2, frame: Frame) -> ProjectionSample;
}

impl SweepProjection for Projector {
    fn project_onto(&mut self, point: Point2, frame: Frame) -> ProjectionSample {
        self.update(Some(frame.center), Some(frame.angle));
        let violation = self.evaluate(point).abs();
        let Projection { point: projected, outcome, .. } = self.project_detailed(point);
        ProjectionSample {
            projected,
            gradient_norm: self.gradient(projected).length(),
            violation,
            outcome,
        }
    }
}

impl<F> SweepProjection for F
where
    F: FnMut(Point2, Frame) -> ProjectionSample,
{
    fn project_onto(&mut self, point: Point2, frame: Frame) -> ProjectionSample {
        self(point, frame)
    }
}
