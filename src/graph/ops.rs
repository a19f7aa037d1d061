//! Operator kinds and value evaluation for graph vertices.
//!
//! Purpose
//! -------
//! Define the tagged union of operators a vertex can carry ([`Op`]) and the
//! pure evaluation of a deterministic operator from its parents' values
//! ([`eval`]). Derivative rules for these operators live in the autodiff
//! layer; this module only knows how to compute values and result shapes.
//!
//! Key behaviors
//! -------------
//! - Elementwise binary operators broadcast NumPy-style; their result shape
//!   is validated once at graph-construction time ([`result_shape`]) so that
//!   evaluation can assume compatibility.
//! - `Sum` reduces over all dimensions to a scalar; `MatrixMultiply`
//!   requires rank-2 conforming operands.
//! - Probabilistic operators (`Gaussian`, `Exponential`) have no value
//!   rule: their value is a free quantity held by the vertex, and only
//!   their density is a function of the parents.
//!
//! Conventions
//! -----------
//! - Operator dispatch is a `match` on the tag; there is no virtual
//!   dispatch and no per-operator state beyond the tag itself.
//! - `eval` is pure: it never mutates a parent value and always allocates
//!   its result.
use ndarray::{ArrayD, IxDyn};

use crate::graph::errors::{GraphError, GraphResult};
use crate::tensor_ops::{broadcast_shape, co_broadcast, tensordot_single};

/// Operator carried by a vertex.
///
/// `Constant` marks a source vertex whose value is externally assigned.
/// The probabilistic tags mark vertices whose value is a sample-space
/// quantity with a log density over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Constant,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    MatrixMultiply,
    Exp,
    Log,
    Sin,
    Cos,
    Sum,
    Gaussian,
    Exponential,
}

impl Op {
    /// Stable operator name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Constant => "constant",
            Op::Add => "add",
            Op::Subtract => "subtract",
            Op::Multiply => "multiply",
            Op::Divide => "divide",
            Op::Power => "power",
            Op::MatrixMultiply => "matrix_multiply",
            Op::Exp => "exp",
            Op::Log => "log",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Sum => "sum",
            Op::Gaussian => "gaussian",
            Op::Exponential => "exponential",
        }
    }

    /// True for operators that carry a log density over their own value.
    pub fn is_probabilistic(&self) -> bool {
        matches!(self, Op::Gaussian | Op::Exponential)
    }

    /// True for operators whose value is recomputed from parent values.
    pub fn is_deterministic(&self) -> bool {
        !self.is_probabilistic() && !matches!(self, Op::Constant)
    }
}

/// Result shape of a deterministic operator over the given parent shapes.
///
/// # Errors
/// - [`GraphError::BroadcastMismatch`] for incompatible elementwise
///   operands.
/// - [`GraphError::MatmulNonConformant`] for non-matrix or non-conforming
///   matrix-multiply operands.
pub fn result_shape(op: Op, parent_shapes: &[&[usize]]) -> GraphResult<Vec<usize>> {
    match op {
        Op::Add | Op::Subtract | Op::Multiply | Op::Divide | Op::Power => {
            broadcast_shape(parent_shapes[0], parent_shapes[1]).ok_or_else(|| {
                GraphError::BroadcastMismatch {
                    op: op.name(),
                    left: parent_shapes[0].to_vec(),
                    right: parent_shapes[1].to_vec(),
                }
            })
        }
        Op::MatrixMultiply => {
            let (l, r) = (parent_shapes[0], parent_shapes[1]);
            if l.len() != 2 || r.len() != 2 || l[1] != r[0] {
                return Err(GraphError::MatmulNonConformant {
                    left: l.to_vec(),
                    right: r.to_vec(),
                });
            }
            Ok(vec![l[0], r[1]])
        }
        Op::Exp | Op::Log | Op::Sin | Op::Cos => Ok(parent_shapes[0].to_vec()),
        Op::Sum => Ok(vec![]),
        // Sources and probabilistic vertices have externally assigned shapes.
        Op::Constant | Op::Gaussian | Op::Exponential => Ok(vec![]),
    }
}

/// Evaluate a deterministic operator from its parents' values.
///
/// Shapes are assumed to have passed [`result_shape`] at construction;
/// a broadcast failure here still surfaces as a typed error rather than a
/// panic.
pub fn eval(op: Op, parents: &[&ArrayD<f64>]) -> GraphResult<ArrayD<f64>> {
    let broadcast_err = |left: &ArrayD<f64>, right: &ArrayD<f64>| GraphError::BroadcastMismatch {
        op: op.name(),
        left: left.shape().to_vec(),
        right: right.shape().to_vec(),
    };
    match op {
        Op::Add => co_broadcast(parents[0], parents[1], |a, b| a + b)
            .ok_or_else(|| broadcast_err(parents[0], parents[1])),
        Op::Subtract => co_broadcast(parents[0], parents[1], |a, b| a - b)
            .ok_or_else(|| broadcast_err(parents[0], parents[1])),
        Op::Multiply => co_broadcast(parents[0], parents[1], |a, b| a * b)
            .ok_or_else(|| broadcast_err(parents[0], parents[1])),
        Op::Divide => co_broadcast(parents[0], parents[1], |a, b| a / b)
            .ok_or_else(|| broadcast_err(parents[0], parents[1])),
        Op::Power => co_broadcast(parents[0], parents[1], f64::powf)
            .ok_or_else(|| broadcast_err(parents[0], parents[1])),
        Op::MatrixMultiply => tensordot_single(parents[0], 1, parents[1], 0).ok_or_else(|| {
            GraphError::MatmulNonConformant {
                left: parents[0].shape().to_vec(),
                right: parents[1].shape().to_vec(),
            }
        }),
        Op::Exp => Ok(parents[0].mapv(f64::exp)),
        Op::Log => Ok(parents[0].mapv(f64::ln)),
        Op::Sin => Ok(parents[0].mapv(f64::sin)),
        Op::Cos => Ok(parents[0].mapv(f64::cos)),
        Op::Sum => Ok(ndarray::arr0(parents[0].sum()).into_dyn()),
        Op::Constant | Op::Gaussian | Op::Exponential => {
            // Value is externally assigned; evaluation is undefined.
            Err(GraphError::NotASource { index: usize::MAX, op: op.name() })
        }
    }
}

/// Zero tensor of a given shape; convenience for absent-gradient fills.
pub fn zeros(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::zeros(IxDyn(shape))
}
