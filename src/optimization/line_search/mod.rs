//! line_search — step-size selection along a search direction.
//!
//! Purpose
//! -------
//! House the two Wolfe-condition line searches the conjugate-gradient
//! driver chooses between: [`hager_zhang::HagerZhang`] and
//! [`more_thuente::MoreThuente`]. Both minimize the one-dimensional
//! restriction `φ(α) = -fitness(x + α·d)`; the sign flip is what lets a
//! maximizing optimizer reuse textbook minimizing searches.
//!
//! Key behaviors
//! -------------
//! - [`Phi`] owns the restriction: it evaluates fitness and gradient at
//!   `x + α·d`, negates them, counts evaluations against the caller's
//!   budget, and remembers the best point seen so a failed search can still
//!   report its best-known step.
//! - Failure to find an acceptable step is an outcome
//!   (`SearchOutcome::success == false`), never an `Err`; errors are
//!   reserved for invalid inputs and lower-layer failures.
//!
//! Conventions
//! -----------
//! - `d` must be an *ascent* direction for the fitness, so `φ'(0) < 0`.
//!   Both searches verify this before evaluating any trial step.
use std::str::FromStr;

use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::finite_diff::fd_gradient;
use crate::optimization::fitness::{FitnessFunction, Grad, Theta};

pub mod hager_zhang;
pub mod more_thuente;

pub use hager_zhang::HagerZhang;
pub use more_thuente::MoreThuente;

/// Result of one line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOutcome {
    /// The chosen step, or the best-known step on failure.
    pub alpha: f64,
    /// Whether the step satisfies the search's acceptance conditions.
    pub success: bool,
    /// Trial-point evaluations spent (the evaluation at `α = 0` is free).
    pub evaluations: usize,
}

/// Choice of line search used inside the conjugate-gradient driver.
///
/// Parsing: implements `FromStr` and accepts case-insensitive names
/// (`"MoreThuente"`, `"HagerZhang"`). Unknown names return
/// `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// One evaluated point of the restriction: step, value, and derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PhiPoint {
    pub x: f64,
    pub f: f64,
    pub df: f64,
}

/// The one-dimensional restriction `φ(α) = -fitness(x + α·d)` with its
/// evaluation counter and best-seen tracking.
pub(crate) struct Phi<'a, F: FitnessFunction> {
    fitness: &'a F,
    x: &'a Theta,
    direction: &'a Grad,
    evaluations: usize,
    best: Option<PhiPoint>,
}

impl<'a, F: FitnessFunction> Phi<'a, F> {
    pub fn new(fitness: &'a F, x: &'a Theta, direction: &'a Grad) -> Self {
        Self { fitness, x, direction, evaluations: 0, best: None }
    }

    /// Trial evaluations spent so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// The lowest finite `φ` seen, as a fallback step for failed searches.
    pub fn best_alpha(&self) -> f64 {
        self.best.map(|p| p.x).unwrap_or(0.0)
    }

    /// Evaluate at `α = 0` without spending budget; the optimizer already
    /// sits at `x`.
    pub fn at_zero(&self) -> OptResult<PhiPoint> {
        self.restriction(0.0)
    }

    /// Evaluate one trial step, spending one unit of budget.
    pub fn eval(&mut self, alpha: f64) -> OptResult<PhiPoint> {
        self.evaluations += 1;
        let point = self.restriction(alpha)?;
        if point.f.is_finite()
            && self.best.map_or(true, |b| point.f < b.f)
        {
            self.best = Some(point);
        }
        Ok(point)
    }

    /// Evaluate one trial step with non-finite values sanitized: a
    /// non-finite fitness reads as the large sentinel `1e20` and NaN
    /// gradient entries as zero, so interpolation formulas stay defined.
    pub fn eval_sanitized(&mut self, alpha: f64) -> OptResult<PhiPoint> {
        let point = self.eval(alpha)?;
        let f = if point.f.is_finite() { point.f } else { 1e20 };
        let df = if point.df.is_nan() { 0.0 } else { point.df };
        Ok(PhiPoint { x: point.x, f, df })
    }

    fn restriction(&self, alpha: f64) -> OptResult<PhiPoint> {
        let theta = self.x + &(self.direction * alpha);
        let fitness = self.fitness.value(&theta)?;
        let gradient = match self.fitness.gradient(&theta) {
            Ok(gradient) => gradient,
            Err(OptError::GradientNotImplemented) => {
                fd_gradient(&theta, &|t: &Theta| self.fitness.value(t))?
            }
            Err(other) => return Err(other),
        };
        if gradient.len() != theta.len() {
            return Err(OptError::GradientDimMismatch {
                expected: theta.len(),
                found: gradient.len(),
            });
        }
        Ok(PhiPoint {
            x: alpha,
            f: -fitness,
            df: -gradient.dot(self.direction),
        })
    }
}

/// The next representable f64 above `x`, used to detect numerically
/// indistinguishable bracket endpoints.
pub(crate) fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    let bits = if x == 0.0 {
        1
    } else if x > 0.0 {
        x.to_bits() + 1
    } else {
        x.to_bits() - 1
    };
    f64::from_bits(bits)
}
