//! Scalar expressions over named variables, evaluated with `evalexpr`.
//!
//! Sources are rewritten into the `evalexpr` dialect before parsing:
//!
//! - implicit products get an explicit `*`, so `2cos(t)`, `2 t`, `2pi` and
//!   `3(t+1)` read as products;
//! - `**` becomes `^`;
//! - numeric literals and the constants `pi`/`e` are written as floats, so
//!   `1/2` divides in `f64`.
//!
//! Only arithmetic is accepted. Names are checked against the variable list
//! and [`FUNCTIONS`] at compile time, and a trial evaluation catches wrong
//! argument counts. Out-of-domain arithmetic yields NaN, which the projector
//! treats as infeasible.

use std::fmt;

use evalexpr::{Context, EvalexprError, EvalexprResult, Node, Value};
use tracing::warn;

use crate::config::ConstraintSpec;
use crate::constraint::ScalarField;
use crate::path::ConstraintPath;
use crate::vec2::Point2;
use crate::{Error, Result};

/// Disk of radius `R`, used when a constraint expression does not compile.
pub const DEFAULT_CONSTRAINT_EXPRESSION: &str = "R - sqrt(x^2 + y^2)";

/// Functions callable from expressions.
pub const FUNCTIONS: [&str; 26] = [
    "sqrt", "abs", "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh",
    "exp", "ln", "log", "log10", "log2", "pow", "min", "max", "hypot", "floor", "ceil", "round",
    "sign", "mod",
];

fn invalid(source: &str, message: impl Into<String>) -> Error {
    Error::Expression {
        expression: source.to_string(),
        message: message.into(),
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> EvalexprError {
    EvalexprError::CustomMessage(format!("{name}() takes {expected} argument(s), got {got}"))
}

fn apply(name: &str, args: &[f64]) -> EvalexprResult<f64> {
    let unary = |f: fn(f64) -> f64| match args {
        [a] => Ok(f(*a)),
        _ => Err(arity_error(name, "1", args.len())),
    };
    let binary = |f: fn(f64, f64) -> f64| match args {
        [a, b] => Ok(f(*a, *b)),
        _ => Err(arity_error(name, "2", args.len())),
    };

    match name {
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "log2" => unary(f64::log2),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "round" => unary(f64::round),
        "sign" => unary(|a| if a == 0.0 || a.is_nan() { a } else { a.signum() }),
        "atan2" => binary(f64::atan2),
        "pow" => binary(f64::powf),
        // Result takes the sign of the divisor.
        "mod" => binary(|a, b| a - b * (a / b).floor()),
        "log" => match args {
            [a] => Ok(a.ln()),
            [a, base] => Ok(a.ln() / base.ln()),
            _ => Err(arity_error(name, "1 or 2", args.len())),
        },
        "min" | "max" | "hypot" if args.is_empty() => Err(arity_error(name, "at least 1", 0)),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "hypot" => Ok(args.iter().map(|v| v * v).sum::<f64>().sqrt()),
        _ => Err(EvalexprError::FunctionIdentifierNotFound(name.to_string())),
    }
}

/// Variable values for one evaluation. Builtins are disabled, so every call
/// goes through [`apply`].
struct Bindings<'a> {
    names: &'a [String],
    values: Vec<Value>,
}

impl Context for Bindings<'_> {
    fn get_value(&self, identifier: &str) -> Option<&Value> {
        let slot = self.names.iter().position(|n| n == identifier)?;
        self.values.get(slot)
    }

    fn call_function(&self, identifier: &str, argument: &Value) -> EvalexprResult<Value> {
        let args = match argument {
            Value::Tuple(items) => items
                .iter()
                .map(Value::as_number)
                .collect::<EvalexprResult<Vec<f64>>>()?,
            Value::Empty => Vec::new(),
            single => vec![single.as_number()?],
        };
        apply(identifier, &args).map(Value::Float)
    }

    fn are_builtin_functions_disabled(&self) -> bool {
        true
    }

    fn set_builtin_functions_disabled(&mut self, disabled: bool) -> EvalexprResult<()> {
        if disabled {
            Ok(())
        } else {
            Err(EvalexprError::CustomMessage(
                "expression builtins cannot be enabled".to_string(),
            ))
        }
    }
}

/// What the previous token leaves open, for implicit multiplication.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Open {
    Operand,
    Value,
    Call,
}

fn push_float(out: &mut String, value: f64) {
    let text = value.to_string();
    out.push_str(&text);
    if !text.contains('.') {
        out.push_str(".0");
    }
}

/// End of the numeric literal starting at `i`. An exponent is only taken
/// when digits follow, so `2e` stays `2 * e`.
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "PI" => Some(std::f64::consts::PI),
        "e" | "E" => Some(std::f64::consts::E),
        _ => None,
    }
}

/// Rewrite `src` into the arithmetic subset of the `evalexpr` dialect.
fn normalize(src: &str, vars: &[&str]) -> Result<String> {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len() + 8);
    let mut open = Open::Operand;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i);
            let text = &src[start..i];
            let value: f64 = text
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| invalid(src, format!("malformed number '{text}' at byte {start}")))?;
            if open == Open::Value {
                out.push('*');
            }
            push_float(&mut out, value);
            open = Open::Value;
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let name = &src[start..i];
            if open == Open::Value {
                out.push('*');
            }
            if vars.contains(&name) {
                out.push_str(name);
                open = Open::Value;
            } else if let Some(value) = constant(name) {
                push_float(&mut out, value);
                open = Open::Value;
            } else if FUNCTIONS.contains(&name) {
                out.push_str(name);
                open = Open::Call;
            } else {
                return Err(invalid(src, format!("unknown name '{name}' at byte {start}")));
            }
        } else {
            match c {
                b'(' => {
                    if open == Open::Value {
                        out.push('*');
                    }
                    out.push('(');
                    open = Open::Operand;
                }
                b')' => {
                    out.push(')');
                    open = Open::Value;
                }
                b'*' if bytes.get(i + 1) == Some(&b'*') => {
                    out.push('^');
                    open = Open::Operand;
                    i += 1;
                }
                b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b',' => {
                    out.push(c as char);
                    open = Open::Operand;
                }
                _ => {
                    let ch = src[start..].chars().next().unwrap_or('?');
                    return Err(invalid(src, format!("unexpected '{ch}' at byte {start}")));
                }
            }
            i += 1;
        }
    }
    Ok(out)
}

/// A compiled expression over a fixed, ordered variable list.
#[derive(Clone)]
pub struct Expr {
    tree: Node,
    vars: Vec<String>,
    source: String,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.source).finish()
    }
}

impl Expr {
    /// Compile `src`; `vars` fixes the names and the order of values passed
    /// to [`Expr::eval`].
    pub fn compile(src: &str, vars: &[&str]) -> Result<Self> {
        let rewritten = normalize(src, vars)?;
        let tree = evalexpr::build_operator_tree(&rewritten)
            .map_err(|e| invalid(src, e.to_string()))?;
        let expr = Self {
            tree,
            vars: vars.iter().map(|v| v.to_string()).collect(),
            source: src.to_string(),
        };
        // Argument counts and non-numeric results only show up when evaluating.
        expr.eval(&vec![1.0; vars.len()])?;
        Ok(expr)
    }

    /// Evaluate with values in the order given at compile time.
    pub fn eval(&self, values: &[f64]) -> Result<f64> {
        let bindings = Bindings {
            names: &self.vars,
            values: values.iter().map(|&v| Value::Float(v)).collect(),
        };
        self.tree
            .eval_number_with_context(&bindings)
            .map_err(|e| invalid(&self.source, e.to_string()))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Expression(Expr),
    DefaultDisk,
}

/// Constraint `g(x, y)` with the named parameters `R, r, a, b` bound.
#[derive(Debug, Clone)]
pub struct ConstraintField {
    shape: Shape,
    params: [f64; 4],
}

impl ConstraintField {
    const VARS: [&'static str; 6] = ["x", "y", "R", "r", "a", "b"];

    pub fn compile(spec: &ConstraintSpec) -> Result<Self> {
        Ok(Self {
            shape: Shape::Expression(Expr::compile(&spec.expression, &Self::VARS)?),
            params: [spec.big_r, spec.r, spec.a, spec.b],
        })
    }

    /// Compile, falling back to [`DEFAULT_CONSTRAINT_EXPRESSION`] on a
    /// malformed expression.
    pub fn compile_or_disk(spec: &ConstraintSpec) -> Self {
        Self::compile(spec).unwrap_or_else(|err| {
            warn!(expression = %spec.expression, %err, "falling back to disk constraint");
            Self {
                shape: Shape::DefaultDisk,
                params: [spec.big_r, spec.r, spec.a, spec.b],
            }
        })
    }

    pub fn expression(&self) -> &str {
        match &self.shape {
            Shape::Expression(expr) => expr.source(),
            Shape::DefaultDisk => DEFAULT_CONSTRAINT_EXPRESSION,
        }
    }

    /// `g(x, y)`, NaN when evaluation fails.
    pub fn value(&self, x: f64, y: f64) -> f64 {
        self.try_eval(x, y).unwrap_or(f64::NAN)
    }
}

impl ScalarField for ConstraintField {
    fn try_eval(&self, x: f64, y: f64) -> Result<f64> {
        let [big_r, r, a, b] = self.params;
        match &self.shape {
            Shape::Expression(expr) => expr.eval(&[x, y, big_r, r, a, b]),
            Shape::DefaultDisk => Ok(big_r - x.hypot(y)),
        }
    }
}

/// A real function of time `f(t)`.
#[derive(Debug, Clone)]
pub struct TimeFunction(Expr);

impl TimeFunction {
    pub fn compile(src: &str) -> Result<Self> {
        Expr::compile(src, &["t"]).map(Self)
    }

    /// `f(t)`, NaN when evaluation fails.
    pub fn at(&self, t: f64) -> f64 {
        self.0.eval(&[t]).unwrap_or(f64::NAN)
    }
}

/// Center path `(x(t), y(t))` with rotation `alpha(t)`, all as expressions.
#[derive(Debug, Clone)]
pub struct ParametricPath {
    pub x: TimeFunction,
    pub y: TimeFunction,
    pub alpha: TimeFunction,
}

impl ParametricPath {
    pub fn compile(x: &str, y: &str, alpha: &str) -> Result<Self> {
        Ok(Self {
            x: TimeFunction::compile(x)?,
            y: TimeFunction::compile(y)?,
            alpha: TimeFunction::compile(alpha)?,
        })
    }

    pub fn point(&self, t: f64) -> Point2 {
        Point2::new(self.x.at(t), self.y.at(t))
    }
}

impl ConstraintPath for ParametricPath {
    fn position(&self, t: f64) -> Point2 {
        self.point(t)
    }

    fn angle(&self, t: f64) -> f64 {
        self.alpha.at(t)
    }
}
