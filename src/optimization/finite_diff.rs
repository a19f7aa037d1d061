//! finite_diff — finite-difference gradients for fitness functions.
//!
//! Purpose
//! -------
//! Approximate `∇fitness(θ)` by central differences when a
//! [`FitnessFunction`](crate::optimization::fitness::FitnessFunction) does
//! not provide an analytic gradient, capturing any error raised inside the
//! evaluation closure and validating the result before returning it.
//!
//! Key behaviors
//! -------------
//! - Route evaluation errors through a shared cell: the `finitediff`
//!   closure must return a plain `f64`, so failures are parked in a
//!   `RefCell` and the closure yields `NaN` until the sweep finishes.
//! - Validate the finished gradient for dimension and finiteness, so the
//!   optimizer never consumes a silently broken approximation.
//!
//! Testing notes
//! -------------
//! - The agreement between these approximations and the autodiff gradients
//!   is the finite-difference cross-check exercised here and in the
//!   integration suite.
use std::cell::RefCell;

use finitediff::FiniteDiff;

use crate::optimization::errors::{OptError, OptResult};
use crate::optimization::fitness::{Grad, Theta};

/// Purpose
/// -------
/// Central-difference gradient of a scalar objective at `theta`.
///
/// Parameters
/// ----------
/// - `theta`: the evaluation point; its length fixes the gradient length.
/// - `value`: the objective. Errors it returns are captured and re-raised
///   after the sweep.
///
/// Errors
/// ------
/// - The first error `value` raised during the sweep, if any.
/// - `OptError::GradientDimMismatch` / `OptError::InvalidGradient` when the
///   approximation comes back misshapen or non-finite.
pub fn fd_gradient<V>(theta: &Theta, value: &V) -> OptResult<Grad>
where
    V: Fn(&Theta) -> OptResult<f64>,
{
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let wrapped = |x: &Theta| -> f64 {
        match value(x) {
            Ok(v) => v,
            Err(err) => {
                // Keep the first failure; later NaNs trace back to it.
                closure_err.borrow_mut().get_or_insert(err);
                f64::NAN
            }
        }
    };

    let grad = theta.central_diff(&wrapped);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(theta.len(), &grad)?;
    Ok(grad)
}

fn validate_grad(expected: usize, grad: &Grad) -> OptResult<()> {
    if grad.len() != expected {
        return Err(OptError::GradientDimMismatch { expected, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "finite-difference gradient entries must be finite",
            });
        }
    }
    Ok(())
}
