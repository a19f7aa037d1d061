//! forward — forward-mode (dual-number) differentiation over the graph.
//!
//! Purpose
//! -------
//! Propagate a `(value, partial)` pair from a chosen differentiation
//! variable through the graph to a target vertex. Each visited vertex
//! computes its partial purely from its parents' partials and its own
//! operator's derivative rule.
//!
//! Key behaviors
//! -------------
//! - Visits only the subgraph between the wrt vertex and the target: the
//!   target's ancestors intersected with the vertices that reach the wrt
//!   vertex. Everything else contributes an absent partial by construction.
//! - Vertices are processed in ascending arena order, which the arena
//!   guarantees is topological, so every parent partial is ready when its
//!   child needs it.
//! - Probabilistic vertices have no forward-mode derivative rule. A sampled
//!   value does not vary smoothly with its parameters, so if a present
//!   partial reaches one the pass fails with
//!   [`AdError::UnsupportedOperation`] rather than returning a silent zero.
//!
//! Conventions
//! -----------
//! - Partials keep wrt dims trailing throughout, so every product-rule
//!   factor multiplies "along of" and every broadcast the graph performed on
//!   values replays on partials for free.
//!
//! Testing notes
//! -------------
//! - Correctness is cross-checked against reverse mode and central finite
//!   differences in `optimization::finite_diff` tests.
use std::collections::{HashMap, HashSet};

use ndarray::ArrayD;

use crate::autodiff::errors::{AdError, AdResult};
use crate::autodiff::partial::PartialDerivative;
use crate::graph::ops::Op;
use crate::graph::traversal;
use crate::graph::vertex::{BayesNet, VertexId};
use crate::tensor_ops;

/// Value plus partial derivatives of one vertex, keyed by wrt vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct DualNumber {
    pub value: ArrayD<f64>,
    pub partials: HashMap<VertexId, PartialDerivative>,
}

impl DualNumber {
    /// The partial with respect to `wrt`; absent when the vertex does not
    /// depend on it.
    pub fn partial_wrt(&self, wrt: VertexId) -> &PartialDerivative {
        self.partials.get(&wrt).unwrap_or(&PartialDerivative::Absent)
    }
}

/// Purpose
/// -------
/// Compute the dual number of `of` with respect to `wrt` by one forward
/// sweep over the subgraph connecting them.
///
/// Parameters
/// ----------
/// - `net`: the graph; not mutated.
/// - `wrt`: the differentiation variable. It is seeded with the identity
///   partial, so the result's partial has of shape `shape(of)` and wrt
///   shape `shape(wrt)`.
/// - `of`: the target vertex.
///
/// Returns
/// -------
/// - The target's [`DualNumber`]. When no path connects `wrt` to `of` the
///   partial is absent.
///
/// Errors
/// ------
/// - `AdError::Graph` when either id is unknown.
/// - `AdError::UnsupportedOperation` when a present partial reaches a
///   probabilistic vertex.
pub fn forward_mode_autodiff(
    net: &BayesNet, wrt: VertexId, of: VertexId,
) -> AdResult<DualNumber> {
    net.checked(wrt)?;
    net.checked(of)?;

    // Restrict the sweep to vertices both upstream of the target and
    // downstream of the wrt vertex; partials are absent everywhere else.
    let ancestors = traversal::ancestors_inclusive(net, &[of]);
    let mut wrt_set = HashSet::new();
    wrt_set.insert(wrt);
    let reaches_wrt = traversal::connects_to_any(net, &wrt_set);
    let touched: HashSet<VertexId> =
        ancestors.intersection(&reaches_wrt).copied().collect();

    let mut partials: HashMap<VertexId, PartialDerivative> = HashMap::new();
    for id in traversal::sorted_ascending(&touched) {
        let partial = if id == wrt {
            PartialDerivative::identity(net.shape(wrt))
        } else {
            forward_rule(net, id, &partials)?
        };
        partials.insert(id, partial);
    }

    let partial_of = partials.remove(&of).unwrap_or(PartialDerivative::Absent);
    let mut out = HashMap::new();
    out.insert(wrt, partial_of);
    Ok(DualNumber { value: net.value(of).clone(), partials: out })
}

/// One vertex's forward derivative rule, evaluated from its parents'
/// already-computed partials. Parents outside the touched set read as
/// absent.
fn forward_rule(
    net: &BayesNet, id: VertexId,
    partials: &HashMap<VertexId, PartialDerivative>,
) -> AdResult<PartialDerivative> {
    let op = net.op(id);
    let parents = net.parents(id);
    let parent_partial = |i: usize| -> &PartialDerivative {
        partials.get(&parents[i]).unwrap_or(&PartialDerivative::Absent)
    };

    if op.is_probabilistic() {
        if (0..parents.len()).any(|i| parent_partial(i).is_present()) {
            return Err(AdError::UnsupportedOperation {
                op: op.name(),
                mode: "forward",
            });
        }
        return Ok(PartialDerivative::Absent);
    }

    match op {
        Op::Add => parent_partial(0).add(parent_partial(1)),
        Op::Subtract => parent_partial(0).subtract(parent_partial(1)),
        Op::Multiply => {
            // Product rule: dz = da·b + a·db.
            let a = net.value(parents[0]);
            let b = net.value(parents[1]);
            let left = parent_partial(0).multiply_along_of(b)?;
            let right = parent_partial(1).multiply_along_of(a)?;
            left.add(&right)
        }
        Op::Divide => {
            // Quotient rule: dz = da/b − db·(a/b²).
            let a = net.value(parents[0]);
            let b = net.value(parents[1]);
            let left = parent_partial(0).divide_along_of(b)?;
            let a_over_b2 = elementwise_factor(a, b, "divide", |x, y| x / (y * y))?;
            let right = parent_partial(1).multiply_along_of(&a_over_b2)?;
            left.subtract(&right)
        }
        Op::Power => {
            // dz = da·(b·a^(b−1)) + db·(a^b·ln a).
            let a = net.value(parents[0]);
            let b = net.value(parents[1]);
            let d_base = elementwise_factor(a, b, "power", |x, y| y * x.powf(y - 1.0))?;
            let d_exp = elementwise_factor(a, b, "power", |x, y| x.powf(y) * x.ln())?;
            let left = parent_partial(0).multiply_along_of(&d_base)?;
            let right = parent_partial(1).multiply_along_of(&d_exp)?;
            left.add(&right)
        }
        Op::MatrixMultiply => {
            let a = net.value(parents[0]);
            let b = net.value(parents[1]);
            let left = parent_partial(0).matrix_multiply_along_of(b, true)?;
            let right = parent_partial(1).matrix_multiply_along_of(a, false)?;
            left.add(&right)
        }
        // The node's own value is e^a, which is also the chain factor.
        Op::Exp => parent_partial(0).multiply_along_of(net.value(id)),
        Op::Log => parent_partial(0).divide_along_of(net.value(parents[0])),
        Op::Sin => {
            let factor = net.value(parents[0]).mapv(f64::cos);
            parent_partial(0).multiply_along_of(&factor)
        }
        Op::Cos => {
            let factor = net.value(parents[0]).mapv(|x| -x.sin());
            parent_partial(0).multiply_along_of(&factor)
        }
        Op::Sum => Ok(parent_partial(0).sum_over_of()),
        Op::Constant | Op::Gaussian | Op::Exponential => Ok(PartialDerivative::Absent),
    }
}

fn elementwise_factor<F>(
    a: &ArrayD<f64>, b: &ArrayD<f64>, op: &'static str, f: F,
) -> AdResult<ArrayD<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    tensor_ops::co_broadcast(a, b, f).ok_or_else(|| AdError::PartialBroadcastMismatch {
        op,
        left: a.shape().to_vec(),
        right: b.shape().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Scalar chain, product, and quotient rules against closed forms.
    // - Absent partials for disconnected vertices.
    // - Broadcast-aware product rule (scalar against vector).
    // - The matrix-multiply forward rule against a hand Jacobian slice.
    // - UnsupportedOperation through probabilistic vertices.
    // -------------------------------------------------------------------------

    fn scalar_of(p: &PartialDerivative) -> f64 {
        match p {
            PartialDerivative::Present { tensor, .. } => tensor.sum(),
            PartialDerivative::Absent => panic!("expected present partial"),
        }
    }

    #[test]
    // Purpose
    // -------
    // d/dx [exp(sin(x)) * x] at x = 0.7 must match the closed form
    // exp(sin x)·(x·cos x + 1).
    fn scalar_chain_and_product_rule() {
        // Arrange
        let x0 = 0.7;
        let mut net = BayesNet::new();
        let x = net.constant_scalar(x0);
        let s = net.sin(x).unwrap();
        let e = net.exp(s).unwrap();
        let z = net.multiply(e, x).unwrap();

        // Act
        let dual = forward_mode_autodiff(&net, x, z).unwrap();

        // Assert
        let expected = x0.sin().exp() * (x0 * x0.cos() + 1.0);
        assert!((scalar_of(dual.partial_wrt(x)) - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The quotient and power rules must match their closed forms for
    // z = x^3 / (x + 2) at x = 1.5.
    fn quotient_and_power_rules() {
        // Arrange
        let x0 = 1.5_f64;
        let mut net = BayesNet::new();
        let x = net.constant_scalar(x0);
        let three = net.constant_scalar(3.0);
        let two = net.constant_scalar(2.0);
        let cubed = net.power(x, three).unwrap();
        let shifted = net.add(x, two).unwrap();
        let z = net.divide(cubed, shifted).unwrap();

        // Act
        let dual = forward_mode_autodiff(&net, x, z).unwrap();

        // Assert
        let expected =
            (3.0 * x0.powi(2) * (x0 + 2.0) - x0.powi(3)) / (x0 + 2.0).powi(2);
        assert!((scalar_of(dual.partial_wrt(x)) - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // A vertex with no path from the wrt vertex must report an absent
    // partial, not a zero tensor.
    fn disconnected_vertex_reports_absent() {
        let mut net = BayesNet::new();
        let x = net.constant_scalar(1.0);
        let y = net.constant_scalar(2.0);
        let z = net.exp(y).unwrap();

        let dual = forward_mode_autodiff(&net, x, z).unwrap();
        assert!(dual.partial_wrt(x).is_absent());
    }

    #[test]
    // Purpose
    // -------
    // Multiplying a scalar wrt variable into a vector must broadcast the
    // partial: d(c·v)/dc = v, with of shape [3] and wrt shape [].
    fn broadcast_product_rule() {
        // Arrange
        let mut net = BayesNet::new();
        let c = net.constant_scalar(2.0);
        let v = net.constant(arr1(&[1.0, 2.0, 3.0]).into_dyn());
        let z = net.multiply(c, v).unwrap();

        // Act
        let dual = forward_mode_autodiff(&net, c, z).unwrap();

        // Assert
        match dual.partial_wrt(c) {
            PartialDerivative::Present { of_shape, tensor } => {
                assert_eq!(of_shape, &vec![3]);
                assert_eq!(tensor, &arr1(&[1.0, 2.0, 3.0]).into_dyn());
            }
            PartialDerivative::Absent => panic!("expected present partial"),
        }
    }

    #[test]
    // Purpose
    // -------
    // d(sum(A·B))/dA entries must equal the row sums of B, combining the
    // matmul forward rule with the reduction rule.
    fn matmul_then_sum_forward_rule() {
        // Arrange
        let mut net = BayesNet::new();
        let a = net.constant(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        let b = net.constant(arr2(&[[5.0, 6.0], [7.0, 8.0]]).into_dyn());
        let prod = net.matrix_multiply(a, b).unwrap();
        let z = net.sum(prod).unwrap();

        // Act
        let dual = forward_mode_autodiff(&net, a, z).unwrap();

        // Assert: d sum / dA_{ik} = Σ_n B_{kn}.
        match dual.partial_wrt(a) {
            PartialDerivative::Present { of_shape, tensor } => {
                assert!(of_shape.is_empty());
                assert_eq!(tensor.shape(), &[2, 2]);
                assert_eq!(tensor[[0, 0]], 11.0);
                assert_eq!(tensor[[0, 1]], 15.0);
                assert_eq!(tensor[[1, 0]], 11.0);
                assert_eq!(tensor[[1, 1]], 15.0);
            }
            PartialDerivative::Absent => panic!("expected present partial"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A present partial flowing into a probabilistic vertex must fail with
    // UnsupportedOperation, never silently zero.
    fn probabilistic_vertex_rejects_forward_flow() {
        // Arrange: mu depends on x, and the target depends on the gaussian.
        let mut net = BayesNet::new();
        let x = net.constant_scalar(0.3);
        let mu = net.exp(x).unwrap();
        let sigma = net.constant_scalar(1.0);
        let g = net.gaussian(mu, sigma, arr0(0.1).into_dyn()).unwrap();
        let z = net.sin(g).unwrap();

        // Act
        let err = forward_mode_autodiff(&net, x, z).unwrap_err();

        // Assert
        assert!(matches!(err, AdError::UnsupportedOperation { mode: "forward", .. }));
    }
}
