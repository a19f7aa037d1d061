//! hager_zhang — the Hager–Zhang approximate-Wolfe line search.
//!
//! Purpose
//! -------
//! Find a step `α` along an ascent direction satisfying either the exact
//! Wolfe conditions or the approximate-Wolfe envelope, via geometric
//! bracketing followed by secant-based interval refinement.
//!
//! Key behaviors
//! -------------
//! - The search runs as a state machine: bracket the minimizer of
//!   `φ(α) = -fitness(x + α·d)` by growing the step geometrically, then
//!   shrink the bracket with double-secant steps, falling back to
//!   θ-weighted bisection when a trial value overshoots the `fLimit`
//!   envelope.
//! - Every iteration checks for insufficient shrinkage: when the bracket
//!   width fails to contract by the factor `γ`, an explicit midpoint
//!   evaluation is forced, which also guarantees the evaluation budget is
//!   eventually the binding bound on pathological (e.g. flat) inputs.
//! - Non-finite trial values shrink the trial step toward the valid end of
//!   the bracket by `step_shrink` instead of aborting.
//!
//! Invariants & assumptions
//! ------------------------
//! - Bracket invariant: `a.f ≤ fLimit`, `a.df < 0`, and either `b.df ≥ 0`
//!   or `b.f > fLimit`; every update preserves it.
//! - A non-descent direction (`φ'(0) ≥ 0`) fails the search before any
//!   trial evaluation; a non-finite `φ(0)` is an input error.
use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::fitness::{FitnessFunction, Grad, Theta};
use crate::optimization::line_search::{next_up, Phi, PhiPoint, SearchOutcome};

/// Hager–Zhang line search with its published default tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct HagerZhang {
    /// ε in the approximate-Wolfe envelope `fLimit = φ(0) + ε·|φ(0)|`.
    threshold_approx_wolfe: f64,
    /// Shrink factor applied to trial steps that evaluate non-finite.
    step_shrink: f64,
    /// Geometric growth factor for bracketing (ρ).
    rho: f64,
    /// Bisection weight (θ) for the U3 fallback.
    theta: f64,
    /// Required per-iteration bracket shrink factor (γ).
    gamma: f64,
    /// Sufficient-decrease constant (δ).
    delta: f64,
    /// Curvature constant (σ).
    sigma: f64,
    /// Hard cap on trial-point evaluations.
    max_evaluations: usize,
}

impl Default for HagerZhang {
    fn default() -> Self {
        Self {
            threshold_approx_wolfe: 1e-6,
            step_shrink: 0.1,
            rho: 5.0,
            theta: 0.5,
            gamma: 0.66,
            delta: 0.1,
            sigma: 0.9,
            max_evaluations: 1000,
        }
    }
}

/// Where one phase of the search left off.
enum Step {
    Converged(f64),
    Bracketed(PhiPoint, PhiPoint),
    Exhausted,
    BisectFailed,
}

impl HagerZhang {
    /// Replace the evaluation budget.
    ///
    /// # Errors
    /// [`OptError::InvalidMaxIter`] when the budget is zero.
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> OptResult<Self> {
        if max_evaluations == 0 {
            return Err(OptError::InvalidMaxIter {
                max_iter: max_evaluations,
                reason: "the evaluation budget must be at least 1",
            });
        }
        self.max_evaluations = max_evaluations;
        Ok(self)
    }

    /// Replace the Wolfe constants `δ` (sufficient decrease) and `σ`
    /// (curvature).
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < δ < σ < 1`.
    pub fn with_wolfe_constants(mut self, delta: f64, sigma: f64) -> OptResult<Self> {
        if !(delta > 0.0 && delta < sigma && sigma < 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "delta/sigma",
                value: delta,
                reason: "the Wolfe constants must satisfy 0 < delta < sigma < 1",
            });
        }
        self.delta = delta;
        self.sigma = sigma;
        Ok(self)
    }

    /// Replace the approximate-Wolfe envelope threshold ε.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] for negative or non-finite ε.
    pub fn with_approx_threshold(mut self, threshold: f64) -> OptResult<Self> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "threshold_approx_wolfe",
                value: threshold,
                reason: "the envelope threshold must be finite and non-negative",
            });
        }
        self.threshold_approx_wolfe = threshold;
        Ok(self)
    }

    /// Replace the geometric bracketing growth factor ρ.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless ρ is finite and above 1.
    pub fn with_growth_factor(mut self, rho: f64) -> OptResult<Self> {
        if !(rho.is_finite() && rho > 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "rho",
                value: rho,
                reason: "the growth factor must be finite and greater than 1",
            });
        }
        self.rho = rho;
        Ok(self)
    }

    /// Replace the bisection weight θ.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < θ < 1`.
    pub fn with_bisection_weight(mut self, theta: f64) -> OptResult<Self> {
        if !(theta > 0.0 && theta < 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "theta",
                value: theta,
                reason: "the bisection weight must lie strictly between 0 and 1",
            });
        }
        self.theta = theta;
        Ok(self)
    }

    /// Replace the required per-iteration bracket shrink factor γ.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < γ < 1`.
    pub fn with_shrink_requirement(mut self, gamma: f64) -> OptResult<Self> {
        if !(gamma > 0.0 && gamma < 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "gamma",
                value: gamma,
                reason: "the shrink requirement must lie strictly between 0 and 1",
            });
        }
        self.gamma = gamma;
        Ok(self)
    }

    /// Replace the shrink factor applied to non-finite trial steps.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < factor < 1`.
    pub fn with_step_shrink(mut self, step_shrink: f64) -> OptResult<Self> {
        if !(step_shrink > 0.0 && step_shrink < 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "step_shrink",
                value: step_shrink,
                reason: "the step shrink factor must lie strictly between 0 and 1",
            });
        }
        self.step_shrink = step_shrink;
        Ok(self)
    }

    /// Purpose
    /// -------
    /// Search for a Wolfe step along `direction` starting from `x`.
    ///
    /// Parameters
    /// ----------
    /// - `fitness`: the objective being maximized.
    /// - `x`: the current parameter vector.
    /// - `direction`: an ascent direction for the fitness.
    /// - `initial_alpha`: the first trial step; must be finite and
    ///   positive, otherwise the search fails without evaluating.
    ///
    /// Returns
    /// -------
    /// - `success = true` with a Wolfe-satisfying `alpha`, or
    ///   `success = false` with the best-known step when the direction is
    ///   not a descent direction for `φ`, the budget runs out, or
    ///   bisection cannot separate the bracket.
    ///
    /// Errors
    /// ------
    /// - [`OptError::NonFiniteStartingFitness`] when `φ(0)` is not finite.
    /// - Lower-layer evaluation failures.
    pub fn search<F: FitnessFunction>(
        &self, fitness: &F, x: &Theta, direction: &Grad, initial_alpha: f64,
    ) -> OptResult<SearchOutcome> {
        let mut phi = Phi::new(fitness, x, direction);
        let phi0 = phi.at_zero()?;
        if !phi0.f.is_finite() {
            return Err(OptError::NonFiniteStartingFitness { value: -phi0.f });
        }
        // NaN slopes must take this branch too; `< 0.0` is false for NaN.
        if !(phi0.df < 0.0) || !(initial_alpha.is_finite() && initial_alpha > 0.0) {
            return Ok(SearchOutcome { alpha: 0.0, success: false, evaluations: 0 });
        }
        let f_limit = phi0.f + self.threshold_approx_wolfe * phi0.f.abs();

        let mut state = self.bracket(&mut phi, phi0, f_limit, initial_alpha)?;
        loop {
            let (a, b) = match state {
                Step::Converged(alpha) => {
                    return Ok(SearchOutcome {
                        alpha,
                        success: true,
                        evaluations: phi.evaluations(),
                    });
                }
                Step::Exhausted | Step::BisectFailed => {
                    return Ok(SearchOutcome {
                        alpha: phi.best_alpha(),
                        success: false,
                        evaluations: phi.evaluations(),
                    });
                }
                Step::Bracketed(a, b) => (a, b),
            };
            // Endpoints one ulp apart cannot be refined further; the left
            // endpoint is the best admissible step.
            if next_up(a.x) >= b.x {
                return Ok(SearchOutcome {
                    alpha: a.x,
                    success: true,
                    evaluations: phi.evaluations(),
                });
            }

            let old_width = b.x - a.x;
            state = self.secant2(&mut phi, phi0, f_limit, a, b)?;
            if let Step::Bracketed(na, nb) = state {
                if nb.x - na.x > self.gamma * old_width {
                    state = self.force_midpoint(&mut phi, phi0, f_limit, na, nb)?;
                }
            }
        }
    }

    // ---- Bracketing --------------------------------------------------------

    /// Grow the trial step geometrically until the derivative turns
    /// non-negative or the value escapes the envelope.
    fn bracket<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, phi0: PhiPoint, f_limit: f64, initial_alpha: f64,
    ) -> OptResult<Step> {
        let mut a = phi0;
        let mut c = match self.eval_valid(phi, 0.0, initial_alpha)? {
            Some(p) => p,
            None => return Ok(Step::Exhausted),
        };
        loop {
            if self.wolfe(phi0, f_limit, c) {
                return Ok(Step::Converged(c.x));
            }
            if c.df >= 0.0 {
                return Ok(Step::Bracketed(a, c));
            }
            if c.f > f_limit {
                return self.bisect(phi, f_limit, a, c);
            }
            a = c;
            let next = c.x * self.rho;
            if !next.is_finite() {
                return Ok(Step::Exhausted);
            }
            c = match self.eval_valid(phi, a.x, next)? {
                Some(p) => p,
                None => return Ok(Step::Exhausted),
            };
        }
    }

    /// θ-weighted bisection (update rule U3): shrink `[a, b]` where
    /// `b.f > fLimit` until the derivative turns or the value re-enters
    /// the envelope.
    fn bisect<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, f_limit: f64, mut a: PhiPoint, mut b: PhiPoint,
    ) -> OptResult<Step> {
        loop {
            let mid = (1.0 - self.theta) * a.x + self.theta * b.x;
            if mid <= a.x || mid >= b.x || next_up(a.x) >= b.x {
                return Ok(Step::BisectFailed);
            }
            let p = match self.eval_valid(phi, a.x, mid)? {
                Some(p) => p,
                None => return Ok(Step::Exhausted),
            };
            if p.df >= 0.0 {
                return Ok(Step::Bracketed(a, p));
            }
            if p.f <= f_limit {
                a = p;
            } else {
                b = p;
            }
        }
    }

    // ---- Refinement --------------------------------------------------------

    /// Double secant step: propose the secant point, update the bracket,
    /// and when the proposal lands on the moved edge, retry once with a
    /// secant through that edge.
    fn secant2<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, phi0: PhiPoint, f_limit: f64, a: PhiPoint, b: PhiPoint,
    ) -> OptResult<Step> {
        let proposal = secant(a, b);
        if !(proposal.is_finite() && proposal > a.x && proposal < b.x) {
            return Ok(Step::Bracketed(a, b));
        }
        let c = match self.eval_valid(phi, a.x, proposal)? {
            Some(p) => p,
            None => return Ok(Step::Exhausted),
        };
        if self.wolfe(phi0, f_limit, c) {
            return Ok(Step::Converged(c.x));
        }
        let (big_a, big_b) = match self.update(phi, f_limit, a, b, c)? {
            Step::Bracketed(na, nb) => (na, nb),
            other => return Ok(other),
        };

        // Second secant through whichever original edge just moved.
        let retry = if c.x == big_b.x {
            secant(b, big_b)
        } else if c.x == big_a.x {
            secant(a, big_a)
        } else {
            return Ok(Step::Bracketed(big_a, big_b));
        };
        if !(retry.is_finite() && retry > big_a.x && retry < big_b.x) {
            return Ok(Step::Bracketed(big_a, big_b));
        }
        let p = match self.eval_valid(phi, big_a.x, retry)? {
            Some(p) => p,
            None => return Ok(Step::Exhausted),
        };
        if self.wolfe(phi0, f_limit, p) {
            return Ok(Step::Converged(p.x));
        }
        self.update(phi, f_limit, big_a, big_b, p)
    }

    /// Interval update rules U0 to U3 for an already-evaluated trial point.
    fn update<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, f_limit: f64, a: PhiPoint, b: PhiPoint, c: PhiPoint,
    ) -> OptResult<Step> {
        if c.x <= a.x || c.x >= b.x {
            return Ok(Step::Bracketed(a, b));
        }
        if c.df >= 0.0 {
            return Ok(Step::Bracketed(a, c));
        }
        if c.f <= f_limit {
            return Ok(Step::Bracketed(c, b));
        }
        self.bisect(phi, f_limit, a, c)
    }

    /// Insufficient-shrinkage fallback: evaluate the plain midpoint and
    /// fold it into the bracket.
    fn force_midpoint<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, phi0: PhiPoint, f_limit: f64, a: PhiPoint, b: PhiPoint,
    ) -> OptResult<Step> {
        let mid = 0.5 * (a.x + b.x);
        if mid <= a.x || mid >= b.x {
            return Ok(Step::Bracketed(a, b));
        }
        let p = match self.eval_valid(phi, a.x, mid)? {
            Some(p) => p,
            None => return Ok(Step::Exhausted),
        };
        if self.wolfe(phi0, f_limit, p) {
            return Ok(Step::Converged(p.x));
        }
        self.update(phi, f_limit, a, b, p)
    }

    // ---- Shared ------------------------------------------------------------

    /// Evaluate a trial step under the budget, shrinking toward `anchor`
    /// while the point comes back non-finite. `None` means the budget ran
    /// out or no valid step remains.
    fn eval_valid<F: FitnessFunction>(
        &self, phi: &mut Phi<'_, F>, anchor: f64, mut alpha: f64,
    ) -> OptResult<Option<PhiPoint>> {
        loop {
            if phi.evaluations() >= self.max_evaluations {
                return Ok(None);
            }
            let p = phi.eval(alpha)?;
            if p.f.is_finite() && p.df.is_finite() {
                return Ok(Some(p));
            }
            alpha = anchor + self.step_shrink * (alpha - anchor);
            let scale = anchor.abs().max(1.0);
            if !alpha.is_finite() || (alpha - anchor).abs() < f64::EPSILON * scale {
                return Ok(None);
            }
        }
    }

    /// Accept a point satisfying either the exact or the approximate
    /// Wolfe conditions.
    fn wolfe(&self, phi0: PhiPoint, f_limit: f64, c: PhiPoint) -> bool {
        let curvature = c.df >= self.sigma * phi0.df;
        let exact = self.delta * phi0.df >= (c.f - phi0.f) / c.x && curvature;
        let approx = c.f <= f_limit
            && (2.0 * self.delta - 1.0) * phi0.df >= c.df
            && curvature;
        exact || approx
    }
}

/// Secant step through two evaluated points.
fn secant(a: PhiPoint, b: PhiPoint) -> f64 {
    (a.x * b.df - b.x * a.df) / (b.df - a.df)
}
