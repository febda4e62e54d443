//! Constraint-center paths.
//!
//! A [`ConstraintPath`] tells a stepper where the constraint sits at time `t`
//! and how far it is rotated. Any `Fn(f64) -> Point2` is a path with zero
//! rotation; [`CenterPath`] covers the closed-form curves used by
//! configurations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vec2::Point2;

/// Path handle shared between the two steppers of a run.
pub type SharedPath = Arc<dyn ConstraintPath>;

/// Initial history `t ↦ X(t)` for `t <= 0`.
pub type PastFn = Arc<dyn Fn(f64) -> Point2 + Send + Sync>;

/// World placement of the constraint over time.
pub trait ConstraintPath: Send + Sync {
    /// Constraint center at time `t`.
    fn position(&self, t: f64) -> Point2;

    /// Constraint rotation (radians) at time `t`.
    fn angle(&self, _t: f64) -> f64 {
        0.0
    }
}

impl<F> ConstraintPath for F
where
    F: Fn(f64) -> Point2 + Send + Sync,
{
    fn position(&self, t: f64) -> Point2 {
        self(t)
    }
}

/// Closed-form center curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CenterPath {
    /// Fixed center.
    Stationary {
        #[serde(default, rename = "centerX")]
        center_x: f64,
        #[serde(default, rename = "centerY")]
        center_y: f64,
    },
    /// `c + radius (cos(ωt + φ), sin(ωt + φ))`.
    #[serde(rename_all = "camelCase")]
    Circular {
        #[serde(default)]
        center_x: f64,
        #[serde(default)]
        center_y: f64,
        radius: f64,
        omega: f64,
        #[serde(default)]
        phase: f64,
    },
    /// `c + (a cos(ωt + φ), b sin(ωt + φ))`.
    #[serde(rename_all = "camelCase")]
    Ellipse {
        #[serde(default)]
        center_x: f64,
        #[serde(default)]
        center_y: f64,
        semi_major: f64,
        semi_minor: f64,
        omega: f64,
        #[serde(default)]
        phase: f64,
    },
    /// `c + (A_x sin(f_x t + φ_x), A_y sin(f_y t + φ_y))`.
    #[serde(rename_all = "camelCase")]
    Lissajous {
        #[serde(default)]
        center_x: f64,
        #[serde(default)]
        center_y: f64,
        amplitude_x: f64,
        amplitude_y: f64,
        freq_x: f64,
        freq_y: f64,
        #[serde(default)]
        phase_x: f64,
        #[serde(default)]
        phase_y: f64,
    },
    /// `start + velocity t`.
    #[serde(rename_all = "camelCase")]
    Linear {
        start_x: f64,
        start_y: f64,
        velocity_x: f64,
        velocity_y: f64,
    },
}

impl CenterPath {
    /// Circle of `radius` about the origin with angular speed `omega`.
    pub fn circle(radius: f64, omega: f64) -> Self {
        CenterPath::Circular {
            center_x: 0.0,
            center_y: 0.0,
            radius,
            omega,
            phase: 0.0,
        }
    }

    pub fn fixed(center: Point2) -> Self {
        CenterPath::Stationary {
            center_x: center.x,
            center_y: center.y,
        }
    }

    pub fn at(&self, t: f64) -> Point2 {
        match *self {
            CenterPath::Stationary { center_x, center_y } => Point2::new(center_x, center_y),
            CenterPath::Circular {
                center_x,
                center_y,
                radius,
                omega,
                phase,
            } => {
                let (s, c) = (omega * t + phase).sin_cos();
                Point2::new(center_x + radius * c, center_y + radius * s)
            }
            CenterPath::Ellipse {
                center_x,
                center_y,
                semi_major,
                semi_minor,
                omega,
                phase,
            } => {
                let (s, c) = (omega * t + phase).sin_cos();
                Point2::new(center_x + semi_major * c, center_y + semi_minor * s)
            }
            CenterPath::Lissajous {
                center_x,
                center_y,
                amplitude_x,
                amplitude_y,
                freq_x,
                freq_y,
                phase_x,
                phase_y,
            } => Point2::new(
                center_x + amplitude_x * (freq_x * t + phase_x).sin(),
                center_y + amplitude_y * (freq_y * t + phase_y).sin(),
            ),
            CenterPath::Linear {
                start_x,
                start_y,
                velocity_x,
                velocity_y,
            } => Point2::new(start_x + velocity_x * t, start_y + velocity_y * t),
        }
    }
}

impl ConstraintPath for CenterPath {
    fn position(&self, t: f64) -> Point2 {
        self.at(t)
    }
}

/// A path plus an explicit rotation schedule.
pub struct Rotating<P, A> {
    pub path: P,
    pub angle: A,
}

impl<P, A> ConstraintPath for Rotating<P, A>
where
    P: ConstraintPath,
    A: Fn(f64) -> f64 + Send + Sync,
{
    fn position(&self, t: f64) -> Point2 {
        self.path.position(t)
    }

    fn angle(&self, t: f64) -> f64 {
        (self.angle)(t)
    }
}
