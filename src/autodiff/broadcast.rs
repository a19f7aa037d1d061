//! broadcast — wrt-shape reconciliation for partial derivatives.
//!
//! Purpose
//! -------
//! When an operation broadcasts one operand (a scalar added to a matrix, a
//! row vector multiplied across rows), the adjoint flowing back to that
//! operand carries the *result's* shape in its wrt block, not the operand's
//! own shape. This module sums the surplus broadcast dimensions back out so
//! the accumulated gradient matches the operand, and performs the opposite
//! up-ranking needed before a reduction's adjoint can multiply through.
//!
//! Key behaviors
//! -------------
//! - [`correct_for_broadcast_reverse`] collapses wrt dimensions that were
//!   introduced or stretched by broadcasting, counting positions from the
//!   right, then reshapes to `of_shape ++ wrt_shape`.
//! - [`up_rank_over_wrt`] grows a partial's wrt block to a larger target
//!   shape by broadcasting, the reverse rule for full-tensor reduction.
//!
//! Invariants & assumptions
//! ------------------------
//! - A wrt dimension is a broadcast dimension exactly when its
//!   position-from-the-end exceeds the target rank or its size differs from
//!   the target size at that position. Anything else surviving the sweep
//!   with a wrong element count is a hard shape error, never silently
//!   reshaped.
use ndarray::IxDyn;

use crate::autodiff::errors::{AdError, AdResult};
use crate::autodiff::partial::PartialDerivative;
use crate::tensor_ops;

/// Purpose
/// -------
/// Reconcile a reverse-mode contribution's wrt block with the shape of the
/// parent it is about to accumulate into.
///
/// Parameters
/// ----------
/// - `partial`: the per-parent contribution; absent passes through.
/// - `wrt_shape`: the parent's actual shape.
///
/// Returns
/// -------
/// - A partial whose wrt block equals `wrt_shape`, with every broadcast
///   dimension summed out. Already-matching partials are returned as-is.
///
/// Errors
/// ------
/// - `AdError::IrreconcilableWrtShape` when, after summing broadcast
///   dimensions, the element counts still do not admit a reshape to
///   `of_shape ++ wrt_shape`.
pub fn correct_for_broadcast_reverse(
    partial: PartialDerivative, wrt_shape: &[usize],
) -> AdResult<PartialDerivative> {
    let (of_shape, tensor) = match partial {
        PartialDerivative::Absent => return Ok(PartialDerivative::Absent),
        PartialDerivative::Present { of_shape, tensor } => (of_shape, tensor),
    };
    let found_wrt = tensor.shape()[of_shape.len()..].to_vec();
    if found_wrt == wrt_shape {
        return Ok(PartialDerivative::Present { of_shape, tensor });
    }

    // Sweep the candidate wrt dims right-to-left; a position past the target
    // rank or with a differing size was created by broadcasting and must be
    // summed out. Collect absolute axes high-to-low so removal is stable.
    let full_rank = tensor.ndim();
    let mut axes_desc: Vec<usize> = Vec::new();
    for i in 1..=found_wrt.len() {
        let from_end = found_wrt[found_wrt.len() - i];
        let mismatched =
            i > wrt_shape.len() || from_end != wrt_shape[wrt_shape.len() - i];
        if mismatched {
            axes_desc.push(full_rank - i);
        }
    }
    axes_desc.sort_unstable_by(|a, b| b.cmp(a));
    let summed = tensor_ops::sum_axes_desc(tensor, &axes_desc);

    let mut target = of_shape.clone();
    target.extend_from_slice(wrt_shape);
    let reshaped = summed
        .into_shape(IxDyn(&target))
        .map_err(|_| AdError::IrreconcilableWrtShape {
            of_shape: of_shape.clone(),
            found_wrt,
            expected_wrt: wrt_shape.to_vec(),
        })?;
    Ok(PartialDerivative::Present { of_shape, tensor: reshaped })
}

/// Grow a partial's wrt block to `target_wrt` by broadcast.
///
/// The reverse rule for `sum`: the adjoint's wrt block is the scalar result,
/// and every element of the reduced parent receives that same adjoint. Fails
/// with `AdError::IrreconcilableWrtShape` when the existing wrt block cannot
/// broadcast to the target.
pub fn up_rank_over_wrt(
    partial: &PartialDerivative, target_wrt: &[usize],
) -> AdResult<PartialDerivative> {
    let (of_shape, tensor) = match partial {
        PartialDerivative::Absent => return Ok(PartialDerivative::Absent),
        PartialDerivative::Present { of_shape, tensor } => (of_shape, tensor),
    };
    let found_wrt = tensor.shape()[of_shape.len()..].to_vec();
    let irreconcilable = || AdError::IrreconcilableWrtShape {
        of_shape: of_shape.clone(),
        found_wrt: found_wrt.clone(),
        expected_wrt: target_wrt.to_vec(),
    };

    // Insert length-1 dims between the of block and the existing wrt block,
    // then let ndarray broadcasting stretch them to the target.
    if found_wrt.len() > target_wrt.len() {
        return Err(irreconcilable());
    }
    let mut staged = of_shape.clone();
    staged.extend(std::iter::repeat(1).take(target_wrt.len() - found_wrt.len()));
    staged.extend_from_slice(&found_wrt);
    let mut full_target = of_shape.clone();
    full_target.extend_from_slice(target_wrt);

    let grown = tensor
        .as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&staged))
        .map_err(|_| irreconcilable())?
        .broadcast(IxDyn(&full_target))
        .ok_or_else(irreconcilable)?
        .to_owned();
    Ok(PartialDerivative::Present {
        of_shape: of_shape.clone(),
        tensor: grown,
    })
}
