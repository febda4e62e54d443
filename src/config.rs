//! Run configuration.
//!
//! A configuration is a TOML document with four sections:
//!
//! ```toml
//! [simulation]
//! T = 12.0
//! h = 0.01
//! kernelDecay = 2.0        # aliases: epsilon, lambda
//! infiniteMode = false
//! pastX = "2*cos(t)"
//! pastY = "2*sin(t)"
//!
//! [constraint]
//! expression = "R - sqrt(x^2 + y^2)"
//! R = 0.8
//! r = 0.5
//! a = 0.0
//! b = 0.0
//!
//! [trajectory]
//! type = "parametric"      # or circular, ellipse, lissajous, linear, stationary
//! xExpression = "2*cos(t)"
//! yExpression = "2*sin(t)"
//! alphaExpression = "0"
//!
//! [metadata]               # optional
//! name = "default"
//! ```
//!
//! Loading is strict: unreadable files, TOML errors, invalid numbers and
//! expressions that do not compile all reject the run before any step is
//! taken.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constraint::Projector;
use crate::expr::{ConstraintField, ParametricPath, TimeFunction};
use crate::path::{CenterPath, PastFn, SharedPath};
use crate::vec2::Point2;
use crate::{Error, Result};

/// Core numerical parameters of a sweeping run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Final time `T` (window length in infinite mode).
    pub t_final: f64,
    /// Step size `h`.
    pub h: f64,
    /// Exponential kernel decay rate (ε or λ).
    pub kernel_decay: f64,
    /// Keep stepping past `T` until the caller stops.
    pub infinite_mode: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            t_final: 12.0,
            h: 0.01,
            kernel_decay: 2.0,
            infinite_mode: false,
        }
    }
}

impl SimulationParams {
    pub fn new(t_final: f64, h: f64, kernel_decay: f64) -> Self {
        Self {
            t_final,
            h,
            kernel_decay,
            infinite_mode: false,
        }
    }

    /// `floor(T / h)`; a batch run takes `total_steps() + 1` steps.
    pub fn total_steps(&self) -> usize {
        (self.t_final / self.h).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("T", self.t_final),
            ("h", self.h),
            ("kernelDecay", self.kernel_decay),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Partial update of [`SimulationParams`]; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamsUpdate {
    pub t_final: Option<f64>,
    pub h: Option<f64>,
    pub kernel_decay: Option<f64>,
    pub infinite_mode: Option<bool>,
}

impl ParamsUpdate {
    pub fn apply(&self, params: &SimulationParams) -> SimulationParams {
        SimulationParams {
            t_final: self.t_final.unwrap_or(params.t_final),
            h: self.h.unwrap_or(params.h),
            kernel_decay: self.kernel_decay.unwrap_or(params.kernel_decay),
            infinite_mode: self.infinite_mode.unwrap_or(params.infinite_mode),
        }
    }

    /// Whether applying this update changes the kernel weights.
    pub fn touches_kernel(&self, params: &SimulationParams) -> bool {
        self.h.is_some_and(|h| h != params.h)
            || self.kernel_decay.is_some_and(|d| d != params.kernel_decay)
    }
}

/// `[simulation]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSection {
    #[serde(rename = "T")]
    pub t_final: f64,
    pub h: f64,
    #[serde(alias = "epsilon", alias = "lambda")]
    pub kernel_decay: f64,
    #[serde(default)]
    pub infinite_mode: bool,
    /// `x_p(t)` for `t < 0`.
    #[serde(alias = "xPastExpression")]
    pub past_x: String,
    /// `y_p(t)` for `t < 0`.
    #[serde(alias = "yPastExpression")]
    pub past_y: String,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let params = SimulationParams::default();
        Self {
            t_final: params.t_final,
            h: params.h,
            kernel_decay: params.kernel_decay,
            infinite_mode: params.infinite_mode,
            past_x: "2*cos(t)".to_string(),
            past_y: "2*sin(t)".to_string(),
        }
    }
}

impl SimulationSection {
    pub fn params(&self) -> SimulationParams {
        SimulationParams {
            t_final: self.t_final,
            h: self.h,
            kernel_decay: self.kernel_decay,
            infinite_mode: self.infinite_mode,
        }
    }

    /// Compile the initial-history function `t ↦ (x_p(t), y_p(t))`.
    pub fn past_function(&self) -> Result<PastFn> {
        let x = TimeFunction::compile(&self.past_x)?;
        let y = TimeFunction::compile(&self.past_y)?;
        Ok(Arc::new(move |t: f64| Point2::new(x.at(t), y.at(t))))
    }
}

/// `[constraint]` section: expression `g(x, y)` plus four named parameters.
///
/// `g >= 0` is feasible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub expression: String,
    #[serde(rename = "R")]
    pub big_r: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub a: f64,
    #[serde(default)]
    pub b: f64,
}

impl Default for ConstraintSpec {
    fn default() -> Self {
        Self {
            expression: crate::expr::DEFAULT_CONSTRAINT_EXPRESSION.to_string(),
            big_r: 0.8,
            r: 0.5,
            a: 0.0,
            b: 0.0,
        }
    }
}

impl ConstraintSpec {
    /// Disk of radius `radius` centered at the local origin.
    pub fn disk(radius: f64) -> Self {
        Self {
            big_r: radius,
            ..Self::default()
        }
    }

    pub fn projector(&self) -> Result<Projector> {
        Ok(Projector::new(ConstraintField::compile(self)?))
    }
}

/// Expression-driven center path, the `type = "parametric"` trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametricSpec {
    pub x_expression: String,
    pub y_expression: String,
    #[serde(default = "zero_expression")]
    pub alpha_expression: String,
}

fn zero_expression() -> String {
    "0".to_string()
}

/// `[trajectory]` section, dispatched on its `type` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrajectorySpec {
    Parametric(ParametricSpec),
    /// Every other `type` names one of the closed-form curves.
    #[serde(untagged)]
    Curve(CenterPath),
}

impl Default for TrajectorySpec {
    fn default() -> Self {
        TrajectorySpec::Parametric(ParametricSpec {
            x_expression: "2*cos(t)".to_string(),
            y_expression: "2*sin(t)".to_string(),
            alpha_expression: zero_expression(),
        })
    }
}

impl TrajectorySpec {
    pub fn path(&self) -> Result<SharedPath> {
        let path: SharedPath = match self {
            TrajectorySpec::Parametric(p) => Arc::new(ParametricPath::compile(
                &p.x_expression,
                &p.y_expression,
                &p.alpha_expression,
            )?),
            TrajectorySpec::Curve(c) => Arc::new(c.clone()),
        };
        Ok(path)
    }
}

/// `[metadata]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// A complete run description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    pub constraint: ConstraintSpec,
    pub trajectory: TrajectorySpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl SimulationConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(format!("failed to serialize TOML: {e}")))
    }

    pub fn params(&self) -> SimulationParams {
        self.simulation.params()
    }

    /// Check every number and compile every expression once.
    pub fn validate(&self) -> Result<()> {
        self.params()
            .validate()
            .map_err(|e| Error::Config(format!("[simulation] {e}")))?;
        self.simulation
            .past_function()
            .map_err(|e| Error::Config(format!("[simulation] past function: {e}")))?;
        ConstraintField::compile(&self.constraint)
            .map_err(|e| Error::Config(format!("[constraint] {e}")))?;
        self.trajectory
            .path()
            .map_err(|e| Error::Config(format!("[trajectory] {e}")))?;
        Ok(())
    }
}
