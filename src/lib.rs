//! # delsweep
//!
//! Delayed convex sweeping: a point dragged by a moving convex set, with the
//! drag computed from an exponentially weighted memory of its own past.
//!
//! ## The Problem
//!
//! A constraint set `C(t) = {p : g(p) >= 0}` moves through the plane. At each
//! step of size `h` the point is first pulled toward a weighted average of its
//! history (the *memory*), then projected back onto `C(t)`. With a very
//! short memory this is the classical Moreau sweeping process, which simply
//! projects the previous position.
//!
//! ## Key Types
//!
//! | Item | Role |
//! |------|------|
//! | [`kernel::discrete_weights`] | normalized exponential memory weights |
//! | [`constraint::Projector`] | evaluate `g` in a moving frame, Newton projection |
//! | [`delayed::DelayedSweeping`] | stepper with memory |
//! | [`classical::ClassicalSweeping`] | memoryless reference stepper |
//! | [`driver::run_batch`] | full run from a [`config::SimulationConfig`] |
//! | [`driver::IncrementalRunner`] | tick-driven runner with pause and resume |
//!
//! ## Quick Start
//!
//! ```rust
//! use delsweep::config::SimulationParams;
//! use delsweep::constraint::Projector;
//! use delsweep::delayed::DelayedSweeping;
//! use delsweep::path::CenterPath;
//! use delsweep::Point2;
//!
//! let params = SimulationParams::new(1.0, 0.05, 2.0);
//! let disk = Projector::new(|x: f64, y: f64| 1.0 - (x * x + y * y).sqrt());
//! let mut sweep = DelayedSweeping::new(
//!     params,
//!     CenterPath::circle(0.5, 1.0),
//!     |_t: f64| Point2::new(2.0, 0.0),
//!     disk,
//! )
//! .unwrap();
//!
//! sweep.simulate();
//! assert_eq!(sweep.len(), params.total_steps() + 1);
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Degenerate kernel**: `decay * h` so large that no lag keeps weight.
//!    The stepper logs a warning and falls back to the previous position.
//! 2. **Non-convex constraints**: Newton projection may stall; the projector
//!    returns its best estimate and records the outcome.
//! 3. **Long memories**: the kernel is capped at
//!    [`kernel::MAX_KERNEL_TERMS`] terms, so very small `decay * h` pays
//!    for every term on every step.

use thiserror::Error;

pub mod classical;
pub mod config;
pub mod constraint;
pub mod convergence;
pub mod delayed;
pub mod driver;
pub mod export;
pub mod expr;
pub mod kernel;
pub mod path;
pub mod stats;
pub mod vec2;

pub use classical::ClassicalSweeping;
pub use config::{ParamsUpdate, SimulationConfig, SimulationParams};
pub use constraint::{Frame, Projector, ScalarField, SweepProjection};
pub use delayed::DelayedSweeping;
pub use driver::{run_batch, BatchResult, IncrementalRunner, StepRecord, Sweep, SweepPair};
pub use kernel::{discrete_weights, KernelWeights};
pub use path::{CenterPath, ConstraintPath};
pub use vec2::Point2;

/// Sweeping error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// A numeric parameter is out of range.
    #[error("parameter `{name}` must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Kernel truncation leaves no weight at lag >= 1.
    #[error("degenerate kernel: decay {decay} with step {h} leaves no memory")]
    DegenerateKernel { decay: f64, h: f64 },

    /// An expression failed to compile.
    #[error("invalid expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Inputs outside the domain of a study or computation.
    #[error("{0}")]
    Domain(&'static str),
}

/// Result type for sweeping operations.
pub type Result<T> = std::result::Result<T, Error>;
