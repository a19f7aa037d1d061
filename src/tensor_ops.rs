//! tensor_ops — shape and broadcast glue over `ndarray`.
//!
//! Purpose
//! -------
//! Centralize the handful of N-dimensional shape manipulations the graph
//! evaluator and the autodiff engines share: NumPy-style co-broadcasting,
//! axis permutation, single-axis tensor contraction, and the generalized
//! identity tensor used to seed reverse-mode adjoints.
//!
//! Key behaviors
//! -------------
//! - Compute the broadcast shape of two dimension lists ([`broadcast_shape`])
//!   and apply an elementwise combinator across co-broadcast operands
//!   ([`co_broadcast`]).
//! - Contract one axis of one tensor against one axis of another
//!   ([`tensordot_single`]), the primitive behind the partial-derivative
//!   matrix-multiply rules.
//! - Build the identity partial-derivative tensor for a given shape
//!   ([`identity_partial`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - All tensors are `ndarray::ArrayD<f64>`; this module adds no numeric
//!   kernels of its own beyond composing `ndarray` operations.
//! - Broadcasting aligns trailing dimensions, exactly as NumPy does; the
//!   autodiff layer relies on this when partial-derivative tensors carry
//!   their wrt dimensions on the right.
//!
//! Conventions
//! -----------
//! - Fallible shape work returns `Option`/`Result`; callers translate a
//!   `None` into their own domain error with full context.
//! - Functions here never mutate their inputs; everything returns freshly
//!   allocated arrays because partials are shared across graph fan-out.
use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn, Zip};

/// NumPy-style broadcast shape of two dimension lists, trailing-aligned.
///
/// Returns `None` when some right-aligned pair of sizes differs and neither
/// side is 1.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0usize; rank];
    for i in 1..=rank {
        let da = if i <= a.len() { a[a.len() - i] } else { 1 };
        let db = if i <= b.len() { b[b.len() - i] } else { 1 };
        out[rank - i] = if da == db {
            da
        } else if da == 1 {
            db
        } else if db == 1 {
            da
        } else {
            return None;
        };
    }
    Some(out)
}

/// Apply an elementwise combinator across two co-broadcast tensors.
///
/// Both operands are broadcast to their joint shape before `f` is applied
/// pairwise. Returns `None` when the shapes cannot be reconciled.
pub fn co_broadcast<F>(a: &ArrayD<f64>, b: &ArrayD<f64>, f: F) -> Option<ArrayD<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    let shape = broadcast_shape(a.shape(), b.shape())?;
    let av = a.broadcast(IxDyn(&shape))?;
    let bv = b.broadcast(IxDyn(&shape))?;
    Some(Zip::from(&av).and(&bv).map_collect(|&x, &y| f(x, y)))
}

/// Identity partial-derivative tensor for a quantity of shape `shape`.
///
/// The result has shape `shape ++ shape` and holds 1.0 exactly where the
/// leading ("of") index tuple equals the trailing ("wrt") index tuple. For
/// the scalar shape `[]` the result is the scalar 1.0.
pub fn identity_partial(shape: &[usize]) -> ArrayD<f64> {
    let n: usize = shape.iter().product();
    let mut full_shape = shape.to_vec();
    full_shape.extend_from_slice(shape);
    // Eye over the flattened index pair, reshaped to of ++ wrt. The element
    // counts match by construction, so the reshape cannot fail.
    Array2::<f64>::eye(n)
        .into_dyn()
        .into_shape(IxDyn(&full_shape))
        .expect("identity tensor reshape: element counts match by construction")
}

/// Move one axis of a tensor to a new position, copying to standard layout.
pub fn move_axis(a: &ArrayD<f64>, from: usize, to: usize) -> ArrayD<f64> {
    let rank = a.ndim();
    let mut perm: Vec<usize> = (0..rank).filter(|&i| i != from).collect();
    perm.insert(to, from);
    a.view()
        .permuted_axes(IxDyn(&perm))
        .as_standard_layout()
        .into_owned()
}

/// Contract `a`'s axis `a_axis` against `b`'s axis `b_axis`.
///
/// The output carries `a`'s remaining axes (in order) followed by `b`'s
/// remaining axes, matching the single-axis case of a tensor dot product.
/// Returns `None` when the contracted extents differ.
pub fn tensordot_single(
    a: &ArrayD<f64>, a_axis: usize, b: &ArrayD<f64>, b_axis: usize,
) -> Option<ArrayD<f64>> {
    let k = a.shape()[a_axis];
    if b.shape()[b_axis] != k {
        return None;
    }

    // Move the contracted axis of `a` last and of `b` first, flatten both
    // sides to matrices, and multiply.
    let mut perm_a: Vec<usize> = (0..a.ndim()).filter(|&i| i != a_axis).collect();
    perm_a.push(a_axis);
    let a_moved = a
        .view()
        .permuted_axes(IxDyn(&perm_a))
        .as_standard_layout()
        .into_owned();
    let m = a.len() / k.max(1);

    let mut perm_b: Vec<usize> = vec![b_axis];
    perm_b.extend((0..b.ndim()).filter(|&i| i != b_axis));
    let b_moved = b
        .view()
        .permuted_axes(IxDyn(&perm_b))
        .as_standard_layout()
        .into_owned();
    let n = b.len() / k.max(1);

    let a2 = a_moved
        .into_shape(IxDyn(&[m, k]))
        .ok()?
        .into_dimensionality::<Ix2>()
        .ok()?;
    let b2 = b_moved
        .into_shape(IxDyn(&[k, n]))
        .ok()?
        .into_dimensionality::<Ix2>()
        .ok()?;
    let prod = a2.dot(&b2);

    let mut out_shape: Vec<usize> = a
        .shape()
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != a_axis)
        .map(|(_, &d)| d)
        .collect();
    out_shape.extend(
        b.shape()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != b_axis)
            .map(|(_, &d)| d),
    );
    prod.into_dyn().into_shape(IxDyn(&out_shape)).ok()
}

/// Sum a tensor over a descending-sorted list of axes.
///
/// Axes must be listed high-to-low so that removing one does not shift the
/// indices of those still to be removed.
pub fn sum_axes_desc(mut t: ArrayD<f64>, axes_desc: &[usize]) -> ArrayD<f64> {
    for &ax in axes_desc {
        t = t.sum_axis(Axis(ax));
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Broadcast-shape computation including incompatible pairs.
    // - Elementwise co-broadcast application.
    // - The generalized identity tensor for scalar and matrix shapes.
    // - Single-axis tensor contraction against a plain matrix product.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify trailing-aligned broadcast shapes for typical and degenerate
    // operand pairs, and rejection of irreconcilable pairs.
    fn broadcast_shape_matches_numpy_rules() {
        assert_eq!(broadcast_shape(&[2, 3], &[]), Some(vec![2, 3]));
        assert_eq!(broadcast_shape(&[2, 1], &[3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shape(&[4], &[4]), Some(vec![4]));
        assert_eq!(broadcast_shape(&[2, 3], &[4]), None);
    }

    #[test]
    // Purpose
    // -------
    // Check that co_broadcast grows a scalar against a matrix and applies
    // the combinator elementwise.
    fn co_broadcast_scalar_against_matrix() {
        // Arrange
        let a = ndarray::arr0(2.0).into_dyn();
        let b = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();

        // Act
        let out = co_broadcast(&a, &b, |x, y| x * y).unwrap();

        // Assert
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out[[1, 1]], 8.0);
    }

    #[test]
    // Purpose
    // -------
    // The identity partial for shape [2, 2] must be 1 exactly where the
    // leading index pair equals the trailing index pair.
    fn identity_partial_is_generalized_eye() {
        let eye = identity_partial(&[2, 2]);
        assert_eq!(eye.shape(), &[2, 2, 2, 2]);
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    for l in 0..2 {
                        let expected = if (i, j) == (k, l) { 1.0 } else { 0.0 };
                        assert_eq!(eye[[i, j, k, l]], expected);
                    }
                }
            }
        }
        // Scalar case: a single 1.0 of rank zero.
        let scalar = identity_partial(&[]);
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(scalar.sum(), 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Contracting the inner axes of two matrices must reproduce the plain
    // matrix product.
    fn tensordot_single_matches_matrix_product() {
        // Arrange
        let a = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let b = arr2(&[[5.0, 6.0], [7.0, 8.0]]).into_dyn();

        // Act
        let out = tensordot_single(&a, 1, &b, 0).unwrap();

        // Assert
        let expected = arr2(&[[19.0, 22.0], [43.0, 50.0]]).into_dyn();
        assert_eq!(out, expected);
    }

    #[test]
    // Purpose
    // -------
    // Mismatched contraction extents must be rejected, not panic.
    fn tensordot_single_rejects_mismatched_axes() {
        let a = ArrayD::zeros(IxDyn(&[2, 3]));
        let b = ArrayD::zeros(IxDyn(&[2, 2]));
        assert!(tensordot_single(&a, 1, &b, 0).is_none());
    }
}
