//! partial — the partial-derivative value type shared by both AD engines.
//!
//! Purpose
//! -------
//! Pair a derivative tensor with the shape of the quantity being
//! differentiated (the "of" shape), and provide the small algebra the
//! derivative rules are written in: add, subtract, negate, elementwise
//! multiply/divide against value tensors, and the matrix-multiply rules.
//!
//! Key behaviors
//! -------------
//! - `Absent` encodes an exact-zero derivative. It is the additive identity
//!   and an absorbing element for every multiplicative combinator, and those
//!   paths allocate nothing.
//! - A present tensor has rank `of_rank + wrt_rank`: the leading dimensions
//!   are the of shape and the trailing dimensions are the wrt shape. Keeping
//!   wrt trailing means NumPy-style broadcasting lines partials up against
//!   each other and against value tensors with no extra bookkeeping in the
//!   elementwise rules.
//!
//! Invariants & assumptions
//! ------------------------
//! - Two present partials may only be added or subtracted when their wrt
//!   ranks agree; the of dimensions are then free to broadcast.
//! - All combinators are pure and return fresh values. Partials are shared
//!   across graph fan-out, so in-place mutation is never safe here.
//!
//! Conventions
//! -----------
//! - "along of" combinators align the other operand with the leading (of)
//!   dimensions; "along wrt" combinators align it with the trailing (wrt)
//!   dimensions. Forward mode multiplies along of, reverse mode along wrt.
//!
//! Downstream usage
//! ----------------
//! - `autodiff::forward` and `autodiff::reverse` express every operator rule
//!   through this type; `autodiff::broadcast` reconciles its wrt shape after
//!   reverse-mode fan-in.
use ndarray::{ArrayD, IxDyn};

use crate::autodiff::errors::{AdError, AdResult};
use crate::tensor_ops;

/// A derivative tensor tagged with the shape of the differentiated quantity.
///
/// `Absent` is an exact zero; `Present` carries a tensor of shape
/// `of_shape ++ wrt_shape`.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialDerivative {
    Absent,
    Present {
        of_shape: Vec<usize>,
        tensor: ArrayD<f64>,
    },
}

impl PartialDerivative {
    /// Identity partial for a quantity of shape `shape`: of and wrt shapes
    /// both equal `shape`, with 1.0 exactly on the diagonal index pairs.
    /// Seeds reverse-mode adjoints and forward-mode start vertices.
    pub fn identity(shape: &[usize]) -> Self {
        PartialDerivative::Present {
            of_shape: shape.to_vec(),
            tensor: tensor_ops::identity_partial(shape),
        }
    }

    /// Wrap an already-shaped tensor. The caller guarantees the leading
    /// dimensions of `tensor` equal `of_shape`.
    pub fn present(of_shape: Vec<usize>, tensor: ArrayD<f64>) -> Self {
        PartialDerivative::Present { of_shape, tensor }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, PartialDerivative::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Rank of the trailing (wrt) dimensions, or `None` when absent.
    pub fn wrt_rank(&self) -> Option<usize> {
        match self {
            PartialDerivative::Absent => None,
            PartialDerivative::Present { of_shape, tensor } => {
                Some(tensor.ndim() - of_shape.len())
            }
        }
    }

    /// The trailing (wrt) dimensions, or `None` when absent.
    pub fn wrt_shape(&self) -> Option<Vec<usize>> {
        match self {
            PartialDerivative::Absent => None,
            PartialDerivative::Present { of_shape, tensor } => {
                Some(tensor.shape()[of_shape.len()..].to_vec())
            }
        }
    }

    /// Purpose
    /// -------
    /// Sum of two partials, treating `Absent` as the additive identity.
    ///
    /// Parameters
    /// ----------
    /// - `other`: the right operand.
    ///
    /// Returns
    /// -------
    /// - The elementwise sum. The of dimensions of both operands broadcast
    ///   against each other; the result's of shape is whatever leads once
    ///   the shared wrt rank is accounted for.
    ///
    /// Errors
    /// ------
    /// - `AdError::WrtRankMismatch` when both are present with different
    ///   wrt ranks.
    /// - `AdError::PartialBroadcastMismatch` when the tensors cannot be
    ///   broadcast together.
    pub fn add(&self, other: &PartialDerivative) -> AdResult<PartialDerivative> {
        self.combine_additive(other, "add", |x, y| x + y)
    }

    /// Difference of two partials. Mirrors [`add`](Self::add), except an
    /// absent left operand negates the right.
    pub fn subtract(&self, other: &PartialDerivative) -> AdResult<PartialDerivative> {
        match (self, other) {
            (PartialDerivative::Absent, rhs) => Ok(rhs.negate()),
            _ => self.combine_additive(other, "subtract", |x, y| x - y),
        }
    }

    fn combine_additive<F>(
        &self, other: &PartialDerivative, op: &'static str, f: F,
    ) -> AdResult<PartialDerivative>
    where
        F: Fn(f64, f64) -> f64,
    {
        match (self, other) {
            (PartialDerivative::Absent, rhs) => Ok(rhs.clone()),
            (lhs, PartialDerivative::Absent) => Ok(lhs.clone()),
            (
                PartialDerivative::Present { of_shape: of_l, tensor: t_l },
                PartialDerivative::Present { of_shape: of_r, tensor: t_r },
            ) => {
                let wrt_rank = t_l.ndim() - of_l.len();
                let wrt_rank_r = t_r.ndim() - of_r.len();
                if wrt_rank != wrt_rank_r {
                    return Err(AdError::WrtRankMismatch {
                        left: wrt_rank,
                        right: wrt_rank_r,
                    });
                }
                // Both operands carry their wrt dims trailing, so the shared
                // wrt rank aligns under trailing broadcast and the of dims
                // broadcast freely against each other.
                let sum = tensor_ops::co_broadcast(t_l, t_r, f).ok_or_else(|| {
                    AdError::PartialBroadcastMismatch {
                        op,
                        left: t_l.shape().to_vec(),
                        right: t_r.shape().to_vec(),
                    }
                })?;
                let of_rank = sum.ndim() - wrt_rank;
                let of_shape = sum.shape()[..of_rank].to_vec();
                Ok(PartialDerivative::Present { of_shape, tensor: sum })
            }
        }
    }

    /// Elementwise negation. Absent stays absent.
    pub fn negate(&self) -> PartialDerivative {
        match self {
            PartialDerivative::Absent => PartialDerivative::Absent,
            PartialDerivative::Present { of_shape, tensor } => PartialDerivative::Present {
                of_shape: of_shape.clone(),
                tensor: tensor.mapv(|x| -x),
            },
        }
    }

    /// Purpose
    /// -------
    /// Multiply this partial elementwise by a *value* tensor aligned with
    /// the leading (of) dimensions. This is the forward-mode product-rule
    /// primitive: the of dims of the partial describe the operation result,
    /// which is exactly what the co-operand's value broadcasts against.
    ///
    /// Parameters
    /// ----------
    /// - `value`: a value tensor (not a derivative) to align with the of
    ///   dims. Its rank may exceed the current of rank, in which case the
    ///   of shape grows by broadcast.
    ///
    /// Errors
    /// ------
    /// - `AdError::PartialBroadcastMismatch` when the value cannot be
    ///   broadcast against the of dimensions.
    pub fn multiply_along_of(&self, value: &ArrayD<f64>) -> AdResult<PartialDerivative> {
        self.scale_along_of(value, "multiply", |p, v| p * v)
    }

    /// Divide this partial elementwise by a value tensor aligned with the
    /// of dimensions. Mirrors [`multiply_along_of`](Self::multiply_along_of).
    pub fn divide_along_of(&self, value: &ArrayD<f64>) -> AdResult<PartialDerivative> {
        self.scale_along_of(value, "divide", |p, v| p / v)
    }

    fn scale_along_of<F>(
        &self, value: &ArrayD<f64>, op: &'static str, f: F,
    ) -> AdResult<PartialDerivative>
    where
        F: Fn(f64, f64) -> f64,
    {
        match self {
            PartialDerivative::Absent => Ok(PartialDerivative::Absent),
            PartialDerivative::Present { of_shape, tensor } => {
                let wrt_rank = tensor.ndim() - of_shape.len();
                // Pad the value with trailing length-1 dims so its own dims
                // line up with the of block instead of the wrt block.
                let mut padded_shape = value.shape().to_vec();
                padded_shape.extend(std::iter::repeat(1).take(wrt_rank));
                let padded = value
                    .as_standard_layout()
                    .into_owned()
                    .into_shape(IxDyn(&padded_shape))
                    .map_err(|_| AdError::PartialBroadcastMismatch {
                        op,
                        left: tensor.shape().to_vec(),
                        right: value.shape().to_vec(),
                    })?;
                let scaled =
                    tensor_ops::co_broadcast(tensor, &padded, |p, v| f(p, v)).ok_or_else(
                        || AdError::PartialBroadcastMismatch {
                            op,
                            left: tensor.shape().to_vec(),
                            right: value.shape().to_vec(),
                        },
                    )?;
                let of_rank = scaled.ndim() - wrt_rank;
                let of_shape = scaled.shape()[..of_rank].to_vec();
                Ok(PartialDerivative::Present { of_shape, tensor: scaled })
            }
        }
    }

    /// Purpose
    /// -------
    /// Multiply this partial elementwise by a value tensor aligned with the
    /// trailing (wrt) dimensions. This is the reverse-mode chain-rule
    /// primitive: an adjoint's wrt dims describe the vertex itself, which is
    /// the shape local derivative factors come in.
    ///
    /// Parameters
    /// ----------
    /// - `value`: a value tensor of rank at most the wrt rank; it broadcasts
    ///   trailing-aligned against the wrt block.
    ///
    /// Errors
    /// ------
    /// - `AdError::PartialBroadcastMismatch` when the value's rank exceeds
    ///   the wrt rank or its dims cannot broadcast against the wrt block.
    pub fn multiply_along_wrt(&self, value: &ArrayD<f64>) -> AdResult<PartialDerivative> {
        match self {
            PartialDerivative::Absent => Ok(PartialDerivative::Absent),
            PartialDerivative::Present { of_shape, tensor } => {
                let wrt_rank = tensor.ndim() - of_shape.len();
                if value.ndim() > wrt_rank {
                    return Err(AdError::PartialBroadcastMismatch {
                        op: "multiply",
                        left: tensor.shape().to_vec(),
                        right: value.shape().to_vec(),
                    });
                }
                // Trailing alignment already places the value over the wrt
                // block; no padding needed.
                let scaled = tensor_ops::co_broadcast(tensor, value, |p, v| p * v)
                    .ok_or_else(|| AdError::PartialBroadcastMismatch {
                        op: "multiply",
                        left: tensor.shape().to_vec(),
                        right: value.shape().to_vec(),
                    })?;
                let of_rank = scaled.ndim() - wrt_rank;
                let of_shape = scaled.shape()[..of_rank].to_vec();
                Ok(PartialDerivative::Present { of_shape, tensor: scaled })
            }
        }
    }

    /// Purpose
    /// -------
    /// Forward-mode matrix-multiply rule: contract the *leading* matrix
    /// block of this partial (the of dims) against a multiplier value, so
    /// `d(A B) = dA ⊠ B` or `A ⊠ dB` depending on which operand carried the
    /// partial.
    ///
    /// Parameters
    /// ----------
    /// - `multiplier`: the 2-D value tensor of the other matmul operand.
    /// - `partial_is_left`: true when this partial belongs to the left
    ///   matmul operand.
    ///
    /// Returns
    /// -------
    /// - A partial whose of shape is the matmul result shape and whose wrt
    ///   block is carried through unchanged.
    ///
    /// Errors
    /// ------
    /// - `AdError::MatmulRuleNonConformant` when the contracted extents do
    ///   not agree.
    pub fn matrix_multiply_along_of(
        &self, multiplier: &ArrayD<f64>, partial_is_left: bool,
    ) -> AdResult<PartialDerivative> {
        match self {
            PartialDerivative::Absent => Ok(PartialDerivative::Absent),
            PartialDerivative::Present { of_shape, tensor } => {
                let wrt_rank = tensor.ndim() - of_shape.len();
                let nonconformant = || AdError::MatmulRuleNonConformant {
                    partial_shape: tensor.shape().to_vec(),
                    multiplier_shape: multiplier.shape().to_vec(),
                };
                let contracted = if partial_is_left {
                    // Partial is [m, k, wrt...]; contract k against the
                    // multiplier's rows, then bring n home next to m.
                    let raw = tensor_ops::tensordot_single(tensor, 1, multiplier, 0)
                        .ok_or_else(nonconformant)?;
                    tensor_ops::move_axis(&raw, raw.ndim() - 1, 1)
                } else {
                    // Partial is [k, n, wrt...]; contract the multiplier's
                    // columns against k. Output is already [m, n, wrt...].
                    tensor_ops::tensordot_single(multiplier, 1, tensor, 0)
                        .ok_or_else(nonconformant)?
                };
                let of_rank = contracted.ndim() - wrt_rank;
                let of_shape = contracted.shape()[..of_rank].to_vec();
                Ok(PartialDerivative::Present { of_shape, tensor: contracted })
            }
        }
    }

    /// Purpose
    /// -------
    /// Reverse-mode matrix-multiply rule: the adjoint's *trailing* block is
    /// the matmul result `[m, n]`, and the per-parent contribution is
    /// `adjoint ⊠ Bᵀ` (left parent) or `Aᵀ ⊠ adjoint` (right parent), with
    /// the of dims carried through unchanged.
    ///
    /// Parameters
    /// ----------
    /// - `multiplier`: the 2-D value tensor of the *other* matmul operand.
    /// - `partial_is_left`: true when the contribution targets the left
    ///   matmul parent.
    ///
    /// Errors
    /// ------
    /// - `AdError::MatmulRuleNonConformant` when the contracted extents do
    ///   not agree.
    pub fn matrix_multiply_along_wrt(
        &self, multiplier: &ArrayD<f64>, partial_is_left: bool,
    ) -> AdResult<PartialDerivative> {
        match self {
            PartialDerivative::Absent => Ok(PartialDerivative::Absent),
            PartialDerivative::Present { of_shape, tensor } => {
                let of_rank = of_shape.len();
                let nonconformant = || AdError::MatmulRuleNonConformant {
                    partial_shape: tensor.shape().to_vec(),
                    multiplier_shape: multiplier.shape().to_vec(),
                };
                let contracted = if partial_is_left {
                    // Adjoint is [of..., m, n]; d/dA[of..., m, k] =
                    // Σ_n adjoint[of..., m, n] · B[k, n].
                    tensor_ops::tensordot_single(tensor, tensor.ndim() - 1, multiplier, 1)
                        .ok_or_else(nonconformant)?
                } else {
                    // d/dB[of..., k, n] = Σ_m A[m, k] · adjoint[of..., m, n].
                    // The contraction leaves k leading; move it back beside n.
                    let raw = tensor_ops::tensordot_single(multiplier, 0, tensor, of_rank)
                        .ok_or_else(nonconformant)?;
                    tensor_ops::move_axis(&raw, 0, of_rank)
                };
                Ok(PartialDerivative::Present {
                    of_shape: of_shape.clone(),
                    tensor: contracted,
                })
            }
        }
    }

    /// Collapse the of dimensions by summation, leaving a scalar of shape.
    /// This is the forward-mode rule for full-tensor reduction: the
    /// derivative of a sum is the sum of the derivatives.
    pub fn sum_over_of(&self) -> PartialDerivative {
        match self {
            PartialDerivative::Absent => PartialDerivative::Absent,
            PartialDerivative::Present { of_shape, tensor } => {
                let axes_desc: Vec<usize> = (0..of_shape.len()).rev().collect();
                PartialDerivative::Present {
                    of_shape: Vec::new(),
                    tensor: tensor_ops::sum_axes_desc(tensor.clone(), &axes_desc),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Absent as additive identity and multiplicative absorber.
    // - Wrt-rank agreement enforcement on add.
    // - Of-aligned and wrt-aligned scaling, including broadcast growth.
    // - Both matrix-multiply rules against hand-computed Jacobian products.
    // -------------------------------------------------------------------------

    fn scalar_partial(v: f64) -> PartialDerivative {
        PartialDerivative::present(vec![], arr0(v).into_dyn())
    }

    #[test]
    // Purpose
    // -------
    // Absent must behave as the additive identity in all four operand
    // combinations, and subtract(absent, B) must negate B.
    fn absent_is_additive_identity() {
        // Arrange
        let present = scalar_partial(3.0);

        // Act / Assert
        assert_eq!(present.add(&PartialDerivative::Absent).unwrap(), present);
        assert_eq!(PartialDerivative::Absent.add(&present).unwrap(), present);
        assert!(PartialDerivative::Absent
            .add(&PartialDerivative::Absent)
            .unwrap()
            .is_absent());
        assert_eq!(
            PartialDerivative::Absent.subtract(&present).unwrap(),
            scalar_partial(-3.0)
        );
    }

    #[test]
    // Purpose
    // -------
    // Absent must absorb every multiplicative combinator without error.
    fn absent_absorbs_multiplication() {
        let value = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        assert!(PartialDerivative::Absent
            .multiply_along_of(&value)
            .unwrap()
            .is_absent());
        assert!(PartialDerivative::Absent
            .multiply_along_wrt(&value)
            .unwrap()
            .is_absent());
        assert!(PartialDerivative::Absent
            .matrix_multiply_along_wrt(&value, true)
            .unwrap()
            .is_absent());
    }

    #[test]
    // Purpose
    // -------
    // Adding partials with disagreeing wrt ranks must be rejected.
    fn add_rejects_wrt_rank_mismatch() {
        // Arrange: wrt rank 1 vs wrt rank 0.
        let a = PartialDerivative::present(vec![], arr1(&[1.0, 2.0]).into_dyn());
        let b = scalar_partial(1.0);

        // Act
        let err = a.add(&b).unwrap_err();

        // Assert
        assert!(matches!(err, AdError::WrtRankMismatch { left: 1, right: 0 }));
    }

    #[test]
    // Purpose
    // -------
    // Adding partials whose of ranks differ must broadcast the of block,
    // since their shared wrt dims stay trailing-aligned.
    fn add_broadcasts_of_dimensions() {
        // Arrange: both wrt rank 1 (wrt shape [3]); of shapes [] and [2].
        let a = PartialDerivative::present(vec![], arr1(&[1.0, 1.0, 1.0]).into_dyn());
        let b = PartialDerivative::present(
            vec![2],
            arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn(),
        );

        // Act
        let sum = a.add(&b).unwrap();

        // Assert
        match sum {
            PartialDerivative::Present { of_shape, tensor } => {
                assert_eq!(of_shape, vec![2]);
                assert_eq!(tensor[[0, 0]], 2.0);
                assert_eq!(tensor[[1, 2]], 7.0);
            }
            PartialDerivative::Absent => panic!("expected present sum"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Scaling along of must align the value with the leading dims, leaving
    // the wrt block untouched; scaling along wrt must align trailing.
    fn scaling_aligns_with_the_right_block() {
        // Arrange: of shape [2], wrt shape [3]; tensor of ones.
        let p = PartialDerivative::present(
            vec![2],
            ArrayD::ones(IxDyn(&[2, 3])),
        );
        let of_value = arr1(&[10.0, 20.0]).into_dyn();
        let wrt_value = arr1(&[1.0, 2.0, 3.0]).into_dyn();

        // Act
        let by_of = p.multiply_along_of(&of_value).unwrap();
        let by_wrt = p.multiply_along_wrt(&wrt_value).unwrap();

        // Assert
        match by_of {
            PartialDerivative::Present { tensor, .. } => {
                assert_eq!(tensor[[0, 2]], 10.0);
                assert_eq!(tensor[[1, 0]], 20.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
        match by_wrt {
            PartialDerivative::Present { tensor, .. } => {
                assert_eq!(tensor[[0, 2]], 3.0);
                assert_eq!(tensor[[1, 0]], 1.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A wrt-aligned value of rank above the wrt rank must be rejected
    // rather than silently reinterpreted as an of-block match.
    fn multiply_along_wrt_rejects_over_ranked_value() {
        let p = PartialDerivative::present(vec![2], ArrayD::ones(IxDyn(&[2, 3])));
        let too_big = ArrayD::<f64>::ones(IxDyn(&[2, 3]));
        assert!(matches!(
            p.multiply_along_wrt(&too_big),
            Err(AdError::PartialBroadcastMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // For z = A·B with a scalar wrt, the reverse-mode matmul rule applied
    // to an identity-like adjoint must reproduce d z_{mn}/dA = adjoint·Bᵀ
    // and d z_{mn}/dB = Aᵀ·adjoint, checked entrywise.
    fn reverse_matmul_rule_matches_hand_jacobian() {
        // Arrange: of shape [] (scalar objective), wrt block is z's [2, 2];
        // seed the adjoint with ones so the contribution sums all entries.
        let adjoint = PartialDerivative::present(vec![], ArrayD::ones(IxDyn(&[2, 2])));
        let a = arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn();
        let b = arr2(&[[5.0, 6.0], [7.0, 8.0]]).into_dyn();

        // Act
        let to_left = adjoint.matrix_multiply_along_wrt(&b, true).unwrap();
        let to_right = adjoint.matrix_multiply_along_wrt(&a, false).unwrap();

        // Assert: ones ⊠ Bᵀ and Aᵀ ⊠ ones.
        match to_left {
            PartialDerivative::Present { of_shape, tensor } => {
                assert!(of_shape.is_empty());
                // Row m of ones·Bᵀ is the column sums of Bᵀ's rows: each
                // entry [m, k] = Σ_n B[k, n].
                assert_eq!(tensor[[0, 0]], 11.0);
                assert_eq!(tensor[[0, 1]], 15.0);
                assert_eq!(tensor[[1, 0]], 11.0);
                assert_eq!(tensor[[1, 1]], 15.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
        match to_right {
            PartialDerivative::Present { tensor, .. } => {
                // Entry [k, n] = Σ_m A[m, k].
                assert_eq!(tensor[[0, 0]], 4.0);
                assert_eq!(tensor[[0, 1]], 4.0);
                assert_eq!(tensor[[1, 0]], 6.0);
                assert_eq!(tensor[[1, 1]], 6.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Forward-mode matmul rule: with dA the identity partial of a 2x2
    // block, d(A·B) along of must place B's rows according to the
    // contracted index, matching the hand-computed Jacobian slice.
    fn forward_matmul_rule_matches_hand_jacobian() {
        // Arrange: partial of A wrt A itself (identity), so the result is
        // the full Jacobian d(AB)/dA with of block [2, 2] and wrt [2, 2].
        let d_a = PartialDerivative::identity(&[2, 2]);
        let b = arr2(&[[5.0, 6.0], [7.0, 8.0]]).into_dyn();

        // Act
        let d_z = d_a.matrix_multiply_along_of(&b, true).unwrap();

        // Assert: d z_{mn} / d A_{pk} = δ_{mp} B_{kn}.
        match d_z {
            PartialDerivative::Present { of_shape, tensor } => {
                assert_eq!(of_shape, vec![2, 2]);
                assert_eq!(tensor[[0, 0, 0, 0]], 5.0);
                assert_eq!(tensor[[0, 0, 0, 1]], 7.0);
                assert_eq!(tensor[[0, 1, 0, 0]], 6.0);
                assert_eq!(tensor[[1, 0, 0, 0]], 0.0);
                assert_eq!(tensor[[1, 1, 1, 1]], 8.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
    }

    #[test]
    // Purpose
    // -------
    // sum_over_of must collapse the of block to a scalar of shape while
    // preserving the wrt block.
    fn sum_over_of_collapses_leading_block() {
        // Arrange: of [2], wrt [3].
        let p = PartialDerivative::present(
            vec![2],
            arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn(),
        );

        // Act
        let summed = p.sum_over_of();

        // Assert
        match summed {
            PartialDerivative::Present { of_shape, tensor } => {
                assert!(of_shape.is_empty());
                assert_eq!(tensor.shape(), &[3]);
                assert_eq!(tensor[[0]], 5.0);
                assert_eq!(tensor[[2]], 9.0);
            }
            PartialDerivative::Absent => panic!("expected present"),
        }
    }
}
