//! more_thuente — the More–Thuente strong-Wolfe line search.
//!
//! Purpose
//! -------
//! Select a step satisfying the strong Wolfe conditions by maintaining a
//! bracket `(stx, sty)` of best and second-best steps, safeguarded cubic
//! and quadratic interpolation (`cstep`), and a modified-function stage
//! that keeps early iterations honest about sufficient decrease.
//!
//! Key behaviors
//! -------------
//! - The trial step is always clamped into `[step_min, step_max]`,
//!   extrapolated by `xtrapf` while no bracket exists, and forced to plain
//!   bisection when the bracket shrinks too slowly.
//! - Non-finite trial fitness reads as the sentinel `1e20` and NaN
//!   gradient entries as zero, so a trial that wanders into a
//!   zero-probability region steers the interpolation back instead of
//!   poisoning it.
//! - Exit reasons are tracked as internal info codes mirroring the
//!   classical implementation (Wolfe satisfied, step pinned at a bound,
//!   budget exhausted, bracket below `x_tolerance`, rounding stall); the
//!   outcome exposes only success and the final step.
//!
//! Invariants & assumptions
//! ------------------------
//! - `stx` always holds the step with the lowest (modified) value found so
//!   far; convergence failures therefore still return a usable step.
use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::fitness::{FitnessFunction, Grad, Theta};
use crate::optimization::line_search::{Phi, SearchOutcome};

/// More–Thuente line search with its published default tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct MoreThuente {
    /// Relative width below which the bracket counts as collapsed.
    x_tolerance: f64,
    /// Sufficient-decrease constant (ftol).
    fitness_tolerance: f64,
    /// Curvature constant (gtol).
    gradient_tolerance: f64,
    /// Smallest admissible step.
    step_min: f64,
    /// Largest admissible step.
    step_max: f64,
    /// Extrapolation factor while unbracketed.
    xtrapf: f64,
    /// Hard cap on trial-point evaluations.
    max_evaluations: usize,
}

impl Default for MoreThuente {
    fn default() -> Self {
        Self {
            x_tolerance: 1e-15,
            fitness_tolerance: 1e-4,
            gradient_tolerance: 1e-2,
            step_min: 1e-8,
            step_max: 1e8,
            xtrapf: 4.0,
            max_evaluations: 20,
        }
    }
}

impl MoreThuente {
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

    /// Replace the step bounds.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < step_min < step_max`
    /// and both are finite.
    pub fn with_step_bounds(mut self, step_min: f64, step_max: f64) -> OptResult<Self> {
        if !(step_min.is_finite() && step_max.is_finite() && 0.0 < step_min && step_min < step_max)
        {
            return Err(OptError::InvalidSearchTunable {
                name: "step_min/step_max",
                value: step_min,
                reason: "the step bounds must satisfy 0 < step_min < step_max, both finite",
            });
        }
        self.step_min = step_min;
        self.step_max = step_max;
        Ok(self)
    }

    /// Replace the relative bracket-width tolerance.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless the tolerance is finite
    /// and positive.
    pub fn with_x_tolerance(mut self, x_tolerance: f64) -> OptResult<Self> {
        if !(x_tolerance.is_finite() && x_tolerance > 0.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "x_tolerance",
                value: x_tolerance,
                reason: "the bracket-width tolerance must be finite and positive",
            });
        }
        self.x_tolerance = x_tolerance;
        Ok(self)
    }

    /// Replace the sufficient-decrease (ftol) and curvature (gtol)
    /// constants.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless `0 < ftol < gtol < 1`.
    pub fn with_wolfe_tolerances(
        mut self, fitness_tolerance: f64, gradient_tolerance: f64,
    ) -> OptResult<Self> {
        if !(fitness_tolerance > 0.0
            && fitness_tolerance < gradient_tolerance
            && gradient_tolerance < 1.0)
        {
            return Err(OptError::InvalidSearchTunable {
                name: "fitness_tolerance/gradient_tolerance",
                value: fitness_tolerance,
                reason: "the Wolfe tolerances must satisfy 0 < ftol < gtol < 1",
            });
        }
        self.fitness_tolerance = fitness_tolerance;
        self.gradient_tolerance = gradient_tolerance;
        Ok(self)
    }

    /// Replace the unbracketed extrapolation factor.
    ///
    /// # Errors
    /// [`OptError::InvalidSearchTunable`] unless the factor is finite and
    /// above 1.
    pub fn with_extrapolation_factor(mut self, xtrapf: f64) -> OptResult<Self> {
        if !(xtrapf.is_finite() && xtrapf > 1.0) {
            return Err(OptError::InvalidSearchTunable {
                name: "xtrapf",
                value: xtrapf,
                reason: "the extrapolation factor must be finite and greater than 1",
            });
        }
        self.xtrapf = xtrapf;
        Ok(self)
    }

    /// Purpose
    /// -------
    /// Search for a strong-Wolfe step along `direction` starting from `x`.
    ///
    /// Parameters
    /// ----------
    /// - `fitness`: the objective being maximized.
    /// - `direction`: an ascent direction for the fitness.
    /// - `initial_alpha`: the first trial step; clamped into the step
    ///   bounds, but a non-finite or non-positive value fails the search
    ///   without evaluating.
    ///
    /// Returns
    /// -------
    /// - `success = true` with a step satisfying sufficient decrease and
    ///   the strong curvature condition; `success = false` with the best
    ///   trial step for every other exit (budget, pinned bound, collapsed
    ///   bracket).
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
        let dg0 = phi0.df;
        // NaN slopes must take this branch too; `< 0.0` is false for NaN.
        if !(dg0 < 0.0) || !(initial_alpha.is_finite() && initial_alpha > 0.0) {
            return Ok(SearchOutcome { alpha: 0.0, success: false, evaluations: 0 });
        }

        let finit = phi0.f;
        let dgtest = self.fitness_tolerance * dg0;
        let mut brackt = false;
        let mut stage1 = true;
        let mut width = self.step_max - self.step_min;
        let mut width1 = 2.0 * width;

        // stx carries the best step so far, sty the other bracket end.
        let (mut stx, mut fx, mut dx): (f64, f64, f64) = (0.0, finit, dg0);
        let (mut sty, mut fy, mut dy): (f64, f64, f64) = (0.0, finit, dg0);
        let mut stp = initial_alpha.clamp(self.step_min, self.step_max);

        loop {
            let (stmin, stmax) = if brackt {
                (stx.min(sty), stx.max(sty))
            } else {
                (stx, stp + self.xtrapf * (stp - stx))
            };
            stp = stp.clamp(self.step_min, self.step_max);

            // When no further progress is possible, fall back to the best
            // step before evaluating.
            let unusable = (brackt && (stp <= stmin || stp >= stmax))
                || phi.evaluations() + 1 >= self.max_evaluations
                || (brackt && stmax - stmin <= self.x_tolerance * stmax);
            if unusable {
                stp = stx.max(self.step_min);
            }

            let point = phi.eval_sanitized(stp)?;
            let f = point.f;
            let dg = point.df;
            let ftest1 = finit + stp * dgtest;

            let mut info = 0;
            if brackt && (stp <= stmin || stp >= stmax) {
                info = 6;
            }
            if stp == self.step_max && f <= ftest1 && dg <= dgtest {
                info = 5;
            }
            if stp == self.step_min && (f > ftest1 || dg >= dgtest) {
                info = 4;
            }
            if phi.evaluations() >= self.max_evaluations {
                info = 3;
            }
            if brackt && stmax - stmin <= self.x_tolerance * stmax {
                info = 2;
            }
            if f <= ftest1 && dg.abs() <= self.gradient_tolerance * (-dg0) {
                info = 1;
            }
            if info != 0 {
                return Ok(SearchOutcome {
                    alpha: stp,
                    success: info == 1,
                    evaluations: phi.evaluations(),
                });
            }

            if stage1
                && f <= ftest1
                && dg >= self.fitness_tolerance.min(self.gradient_tolerance) * dg0
            {
                stage1 = false;
            }

            // In stage one, while the trial value sits above the decrease
            // line but below the best value, interpolate on the modified
            // function so the quadratic/cubic steps respect the line.
            if stage1 && f <= fx && f > ftest1 {
                let mut state = CstepState {
                    stx,
                    fx: fx - stx * dgtest,
                    dx: dx - dgtest,
                    sty,
                    fy: fy - sty * dgtest,
                    dy: dy - dgtest,
                    stp,
                    fp: f - stp * dgtest,
                    dp: dg - dgtest,
                    brackt,
                    stmin,
                    stmax,
                };
                state.cstep();
                stx = state.stx;
                fx = state.fx + state.stx * dgtest;
                dx = state.dx + dgtest;
                sty = state.sty;
                fy = state.fy + state.sty * dgtest;
                dy = state.dy + dgtest;
                stp = state.stp;
                brackt = state.brackt;
            } else {
                let mut state = CstepState {
                    stx,
                    fx,
                    dx,
                    sty,
                    fy,
                    dy,
                    stp,
                    fp: f,
                    dp: dg,
                    brackt,
                    stmin,
                    stmax,
                };
                state.cstep();
                stx = state.stx;
                fx = state.fx;
                dx = state.dx;
                sty = state.sty;
                fy = state.fy;
                dy = state.dy;
                stp = state.stp;
                brackt = state.brackt;
            }

            // Force bisection when the bracket shrinks too slowly.
            if brackt {
                if (sty - stx).abs() >= 0.66 * width1 {
                    stp = stx + 0.5 * (sty - stx);
                }
                width1 = width;
                width = (sty - stx).abs();
            }
        }
    }
}

/// The safeguarded-interpolation state threaded through one `cstep` call:
/// the bracket `(stx, sty)`, the trial `(stp, fp, dp)`, and the bounds.
struct CstepState {
    stx: f64,
    fx: f64,
    dx: f64,
    sty: f64,
    fy: f64,
    dy: f64,
    stp: f64,
    fp: f64,
    dp: f64,
    brackt: bool,
    stmin: f64,
    stmax: f64,
}

impl CstepState {
    /// One safeguarded interpolation step: pick among the four classical
    /// cases from the sign of the new derivative and whether the trial
    /// value beats the best endpoint, update the bracket, and clamp the
    /// next trial into the admissible range.
    fn cstep(&mut self) {
        let sgnd = self.dp * (self.dx / self.dx.abs());
        let stpf;
        let bound;

        if self.fp > self.fx {
            // Case 1: higher value. The minimum is bracketed between stx
            // and stp; blend the cubic and quadratic steps toward stx.
            bound = true;
            let theta = 3.0 * (self.fx - self.fp) / (self.stp - self.stx) + self.dx + self.dp;
            let s = theta.abs().max(self.dx.abs()).max(self.dp.abs());
            let mut gamma =
                s * ((theta / s).powi(2) - (self.dx / s) * (self.dp / s)).sqrt();
            if self.stp < self.stx {
                gamma = -gamma;
            }
            let p = (gamma - self.dx) + theta;
            let q = ((gamma - self.dx) + gamma) + self.dp;
            let r = p / q;
            let stpc = self.stx + r * (self.stp - self.stx);
            let stpq = self.stx
                + ((self.dx / ((self.fx - self.fp) / (self.stp - self.stx) + self.dx)) / 2.0)
                    * (self.stp - self.stx);
            stpf = if (stpc - self.stx).abs() < (stpq - self.stx).abs() {
                stpc
            } else {
                stpc + (stpq - stpc) / 2.0
            };
            self.brackt = true;
        } else if sgnd < 0.0 {
            // Case 2: lower value, opposite derivative signs. The minimum
            // is bracketed; take whichever step moves further.
            bound = false;
            let theta = 3.0 * (self.fx - self.fp) / (self.stp - self.stx) + self.dx + self.dp;
            let s = theta.abs().max(self.dx.abs()).max(self.dp.abs());
            let mut gamma =
                s * ((theta / s).powi(2) - (self.dx / s) * (self.dp / s)).sqrt();
            if self.stp > self.stx {
                gamma = -gamma;
            }
            let p = (gamma - self.dp) + theta;
            let q = ((gamma - self.dp) + gamma) + self.dx;
            let r = p / q;
            let stpc = self.stp + r * (self.stx - self.stp);
            let stpq = self.stp + (self.dp / (self.dp - self.dx)) * (self.stx - self.stp);
            stpf = if (stpc - self.stp).abs() > (stpq - self.stp).abs() {
                stpc
            } else {
                stpq
            };
            self.brackt = true;
        } else if self.dp.abs() < self.dx.abs() {
            // Case 3: lower value, same sign, shrinking derivative. The
            // cubic may have no minimizer ahead; guard the discriminant
            // and lean on the bounds.
            bound = true;
            let theta = 3.0 * (self.fx - self.fp) / (self.stp - self.stx) + self.dx + self.dp;
            let s = theta.abs().max(self.dx.abs()).max(self.dp.abs());
            let mut gamma = s
                * (((theta / s).powi(2) - (self.dx / s) * (self.dp / s)).max(0.0)).sqrt();
            if self.stp > self.stx {
                gamma = -gamma;
            }
            let p = (gamma - self.dp) + theta;
            let q = (gamma + (self.dx - self.dp)) + gamma;
            let r = p / q;
            let stpc = if r < 0.0 && gamma != 0.0 {
                self.stp + r * (self.stx - self.stp)
            } else if self.stp > self.stx {
                self.stmax
            } else {
                self.stmin
            };
            let stpq = self.stp + (self.dp / (self.dp - self.dx)) * (self.stx - self.stp);
            stpf = if self.brackt {
                if (self.stp - stpc).abs() < (self.stp - stpq).abs() {
                    stpc
                } else {
                    stpq
                }
            } else if (self.stp - stpc).abs() > (self.stp - stpq).abs() {
                stpc
            } else {
                stpq
            };
        } else {
            // Case 4: lower value, same sign, growing derivative. Without
            // a bracket, run to the bound; with one, take a cubic step
            // toward the far end.
            bound = false;
            stpf = if self.brackt {
                let theta =
                    3.0 * (self.fp - self.fy) / (self.sty - self.stp) + self.dy + self.dp;
                let s = theta.abs().max(self.dy.abs()).max(self.dp.abs());
                let mut gamma =
                    s * ((theta / s).powi(2) - (self.dy / s) * (self.dp / s)).sqrt();
                if self.stp > self.sty {
                    gamma = -gamma;
                }
                let p = (gamma - self.dp) + theta;
                let q = ((gamma - self.dp) + gamma) + self.dy;
                let r = p / q;
                self.stp + r * (self.sty - self.stp)
            } else if self.stp > self.stx {
                self.stmax
            } else {
                self.stmin
            };
        }

        // Fold the trial into the bracket, keeping the best point at stx.
        if self.fp > self.fx {
            self.sty = self.stp;
            self.fy = self.fp;
            self.dy = self.dp;
        } else {
            if sgnd < 0.0 {
                self.sty = self.stx;
                self.fy = self.fx;
                self.dy = self.dx;
            }
            self.stx = self.stp;
            self.fx = self.fp;
            self.dx = self.dp;
        }

        self.stp = stpf.clamp(self.stmin, self.stmax);
        if self.brackt && bound {
            let guard = self.stx + 0.66 * (self.sty - self.stx);
            self.stp = if self.sty > self.stx {
                self.stp.min(guard)
            } else {
                self.stp.max(guard)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Strong-Wolfe satisfaction on a smooth quadratic.
    // - Non-descent directions failing with zero evaluations.
    // - A curvature-free objective pinning the step at the upper bound.
    // - Recovery from trials landing in a non-finite region.
    // - Tunable validation.
    // -------------------------------------------------------------------------

    struct Quadratic;

    impl FitnessFunction for Quadratic {
        fn value(&self, theta: &Theta) -> OptResult<f64> {
            Ok(-(theta[0] - 3.0) * (theta[0] - 3.0))
        }

        fn gradient(&self, theta: &Theta) -> OptResult<Grad> {
            Ok(array![-2.0 * (theta[0] - 3.0)])
        }

        fn check(&self, _theta: &Theta) -> OptResult<()> {
            Ok(())
        }
    }

    // The same quadratic, but a cliff into zero probability beyond θ = 6.
    struct CliffQuadratic;

    impl FitnessFunction for CliffQuadratic {
        fn value(&self, theta: &Theta) -> OptResult<f64> {
            if theta[0] > 6.0 {
                Ok(f64::NEG_INFINITY)
            } else {
                Ok(-(theta[0] - 3.0) * (theta[0] - 3.0))
            }
        }

        fn gradient(&self, theta: &Theta) -> OptResult<Grad> {
            if theta[0] > 6.0 {
                Ok(array![f64::NAN])
            } else {
                Ok(array![-2.0 * (theta[0] - 3.0)])
            }
        }

        fn check(&self, _theta: &Theta) -> OptResult<()> {
            Ok(())
        }
    }

    struct Linear;

    impl FitnessFunction for Linear {
        fn value(&self, theta: &Theta) -> OptResult<f64> {
            Ok(theta[0])
        }

        fn gradient(&self, _theta: &Theta) -> OptResult<Grad> {
            Ok(array![1.0])
        }

        fn check(&self, _theta: &Theta) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // On a smooth quadratic the search must return a step satisfying both
    // the sufficient-decrease and the strong curvature conditions.
    fn quadratic_satisfies_strong_wolfe() {
        // Arrange: maximize -(θ-3)² from θ = 0 along d = +1.
        let search = MoreThuente::default();
        let x = array![0.0];
        let d = array![1.0];

        // Act
        let outcome = search.search(&Quadratic, &x, &d, 1.0).unwrap();

        // Assert: φ(α) = (α-3)², φ'(α) = 2(α-3), φ(0) = 9, φ'(0) = -6.
        assert!(outcome.success);
        let alpha = outcome.alpha;
        let phi_a = (alpha - 3.0) * (alpha - 3.0);
        let dphi_a = 2.0 * (alpha - 3.0);
        assert!(phi_a <= 9.0 + 1e-4 * alpha * (-6.0));
        assert!(dphi_a.abs() <= 1e-2 * 6.0);
    }

    #[test]
    // Purpose
    // -------
    // A non-descent direction must fail immediately with zero trial
    // evaluations.
    fn non_descent_direction_fails_without_evaluating() {
        let search = MoreThuente::default();
        let x = array![0.0];
        let d = array![-1.0];

        let outcome = search.search(&Quadratic, &x, &d, 1.0).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.evaluations, 0);
    }

    // A fitness whose gradient is NaN everywhere, so φ'(0) is NaN.
    struct NanSlope;

    impl FitnessFunction for NanSlope {
        fn value(&self, _theta: &Theta) -> OptResult<f64> {
            Ok(0.0)
        }

        fn gradient(&self, _theta: &Theta) -> OptResult<Grad> {
            Ok(array![f64::NAN])
        }

        fn check(&self, _theta: &Theta) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // A NaN starting slope is not a descent direction; the search must
    // fail immediately, spending no trial evaluations.
    fn nan_starting_slope_fails_without_evaluating() {
        // Arrange
        let search = MoreThuente::default();
        let x = array![0.0];
        let d = array![1.0];

        // Act
        let outcome = search.search(&NanSlope, &x, &d, 1.0).unwrap();

        // Assert
        assert!(!outcome.success);
        assert_eq!(outcome.evaluations, 0);
        assert_eq!(outcome.alpha, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // A linear objective has no curvature point; the search must pin the
    // step at the upper bound and report failure.
    fn linear_objective_pins_at_step_max() {
        // Arrange
        let search = MoreThuente::default().with_step_bounds(1e-8, 100.0).unwrap();
        let x = array![0.0];
        let d = array![1.0];

        // Act
        let outcome = search.search(&Linear, &x, &d, 1.0).unwrap();

        // Assert
        assert!(!outcome.success);
        assert_eq!(outcome.alpha, 100.0);
    }

    #[test]
    // Purpose
    // -------
    // An initial trial landing past the cliff must be steered back by the
    // sanitized sentinel and still converge to a Wolfe step.
    fn recovers_from_non_finite_region() {
        // Arrange: first trial at α = 8 lands past the cliff at θ = 6.
        let search = MoreThuente::default();
        let x = array![0.0];
        let d = array![1.0];

        // Act
        let outcome = search.search(&CliffQuadratic, &x, &d, 8.0).unwrap();

        // Assert
        assert!(outcome.success);
        assert!(outcome.alpha < 6.0);
        let dphi = 2.0 * (outcome.alpha - 3.0);
        assert!(dphi.abs() <= 1e-2 * 6.0);
    }

    #[test]
    // Purpose
    // -------
    // Tunable setters must reject out-of-range values with typed errors.
    fn tunable_validation() {
        assert!(matches!(
            MoreThuente::default().with_max_evaluations(0),
            Err(OptError::InvalidMaxIter { .. })
        ));
        assert!(matches!(
            MoreThuente::default().with_step_bounds(1.0, 0.5),
            Err(OptError::InvalidSearchTunable { .. })
        ));
        assert!(matches!(
            MoreThuente::default().with_x_tolerance(0.0),
            Err(OptError::InvalidSearchTunable { .. })
        ));
        assert!(matches!(
            MoreThuente::default().with_wolfe_tolerances(0.5, 0.1),
            Err(OptError::InvalidSearchTunable { .. })
        ));
        assert!(matches!(
            MoreThuente::default().with_extrapolation_factor(1.0),
            Err(OptError::InvalidSearchTunable { .. })
        ));
        assert!(MoreThuente::default().with_step_bounds(1e-10, 1e10).is_ok());
        assert!(MoreThuente::default()
            .with_x_tolerance(1e-12)
            .and_then(|s| s.with_wolfe_tolerances(1e-3, 0.1))
            .and_then(|s| s.with_extrapolation_factor(2.0))
            .is_ok());
    }
}
