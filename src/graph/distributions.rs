//! Log densities and their leaf-level derivatives.
//!
//! Purpose
//! -------
//! Implement the density contract every probabilistic vertex exposes: the
//! scalar log probability of its current value ([`log_prob`]), and the map
//! of elementwise derivatives of that log probability with respect to
//! itself and each direct parent ([`d_log_prob`]).
//!
//! Key behaviors
//! -------------
//! - Parameters broadcast against the sample shape; densities are summed
//!   over sample elements so `log_prob` is always a scalar.
//! - `d_log_prob` returns *sample-shaped* elementwise derivative tensors;
//!   summing broadcast dimensions down to each parameter's own shape is
//!   the caller's job (the autodiff layer owns broadcast correction).
//! - Degenerate parameters (non-positive standard deviation or rate) are
//!   rejected with [`GraphError::InvalidDistributionParameter`] rather
//!   than silently producing NaN derivatives.
//!
//! Conventions
//! -----------
//! - Densities are evaluated through `statrs` (`Normal`, `Exp`); the
//!   derivative formulas are the closed forms of the same densities.
//! - A log probability of `-inf` (zero density, e.g. a negative
//!   exponential sample) is a legal value, not an error; the optimizer
//!   layer decides what to do with it.
use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn, Zip};
use statrs::distribution::{Continuous, Exp, Normal};

use crate::graph::errors::{GraphError, GraphResult};
use crate::graph::ops::Op;
use crate::graph::vertex::{BayesNet, VertexId};
use crate::tensor_ops::broadcast_shape;

/// Broadcast a parameter tensor to the sample shape.
fn at_sample_shape(param: &ArrayD<f64>, sample_shape: &[usize]) -> GraphResult<ArrayD<f64>> {
    param
        .broadcast(IxDyn(sample_shape))
        .map(|v| v.to_owned())
        .ok_or_else(|| GraphError::BroadcastMismatch {
            op: "density_parameter",
            left: param.shape().to_vec(),
            right: sample_shape.to_vec(),
        })
}

/// Log density of one probabilistic vertex at its current value, summed
/// over sample elements.
///
/// # Errors
/// - [`GraphError::NotProbabilistic`] for non-probabilistic vertices.
/// - [`GraphError::InvalidDistributionParameter`] for out-of-domain
///   parameters.
pub fn log_prob(net: &BayesNet, id: VertexId) -> GraphResult<f64> {
    let node = net.checked(id)?;
    let x = &node.value;
    match node.op {
        Op::Gaussian => {
            let mu = at_sample_shape(net.value(node.parents[0]), x.shape())?;
            let sigma = at_sample_shape(net.value(node.parents[1]), x.shape())?;
            let mut total = 0.0;
            for ((&xi, &mi), &si) in x.iter().zip(mu.iter()).zip(sigma.iter()) {
                let dist = Normal::new(mi, si).map_err(|_| {
                    GraphError::InvalidDistributionParameter {
                        distribution: "gaussian",
                        parameter: "std_dev",
                        value: si,
                    }
                })?;
                total += dist.ln_pdf(xi);
            }
            Ok(total)
        }
        Op::Exponential => {
            let rate = at_sample_shape(net.value(node.parents[0]), x.shape())?;
            let mut total = 0.0;
            for (&xi, &ri) in x.iter().zip(rate.iter()) {
                let dist = Exp::new(ri).map_err(|_| GraphError::InvalidDistributionParameter {
                    distribution: "exponential",
                    parameter: "rate",
                    value: ri,
                })?;
                total += if xi < 0.0 { f64::NEG_INFINITY } else { dist.ln_pdf(xi) };
            }
            Ok(total)
        }
        _ => Err(GraphError::NotProbabilistic { index: id.0, op: "log_prob" }),
    }
}

/// Elementwise derivatives of a vertex's log probability with respect to
/// itself and each direct parent.
///
/// Every returned tensor has the *sample* shape; entries are keyed by the
/// vertex itself and its parent ids. Callers reduce parameter entries down
/// to the parameter's own shape via broadcast correction.
///
/// # Errors
/// - [`GraphError::NotProbabilistic`] for non-probabilistic vertices.
/// - [`GraphError::InvalidDistributionParameter`] for out-of-domain
///   parameters.
pub fn d_log_prob(net: &BayesNet, id: VertexId) -> GraphResult<HashMap<VertexId, ArrayD<f64>>> {
    let node = net.checked(id)?;
    let x = &node.value;
    let mut out = HashMap::new();
    match node.op {
        Op::Gaussian => {
            let mu_id = node.parents[0];
            let sigma_id = node.parents[1];
            let mu = at_sample_shape(net.value(mu_id), x.shape())?;
            let sigma = at_sample_shape(net.value(sigma_id), x.shape())?;
            for &s in sigma.iter() {
                if !(s.is_finite() && s > 0.0) {
                    return Err(GraphError::InvalidDistributionParameter {
                        distribution: "gaussian",
                        parameter: "std_dev",
                        value: s,
                    });
                }
            }

            // d ln p / dx = -(x - mu) / sigma^2
            let wrt_x = Zip::from(x).and(&mu).and(&sigma).map_collect(|&xi, &mi, &si| {
                -(xi - mi) / (si * si)
            });
            // d ln p / d mu = (x - mu) / sigma^2
            let wrt_mu = wrt_x.mapv(|v| -v);
            // d ln p / d sigma = ((x - mu)^2 - sigma^2) / sigma^3
            let wrt_sigma = Zip::from(x).and(&mu).and(&sigma).map_collect(|&xi, &mi, &si| {
                let d = xi - mi;
                (d * d - si * si) / (si * si * si)
            });

            out.insert(id, wrt_x);
            accumulate(&mut out, mu_id, wrt_mu)?;
            accumulate(&mut out, sigma_id, wrt_sigma)?;
        }
        Op::Exponential => {
            let rate_id = node.parents[0];
            let rate = at_sample_shape(net.value(rate_id), x.shape())?;
            for &r in rate.iter() {
                if !(r.is_finite() && r > 0.0) {
                    return Err(GraphError::InvalidDistributionParameter {
                        distribution: "exponential",
                        parameter: "rate",
                        value: r,
                    });
                }
            }

            // ln p = ln(rate) - rate * x, for x >= 0
            let wrt_x = rate.mapv(|r| -r);
            let wrt_rate = Zip::from(&rate).and(x).map_collect(|&ri, &xi| 1.0 / ri - xi);

            out.insert(id, wrt_x);
            accumulate(&mut out, rate_id, wrt_rate)?;
        }
        _ => return Err(GraphError::NotProbabilistic { index: id.0, op: "d_log_prob" }),
    }
    Ok(out)
}

/// Fold a contribution into the derivative map, summing when both density
/// parameters are the same vertex (e.g. Gaussian with mean == std-dev).
/// Contributions arrive at the sample shape, so the sum always conforms;
/// a mismatch is still surfaced as an error rather than dropped.
fn accumulate(
    map: &mut HashMap<VertexId, ArrayD<f64>>, id: VertexId, tensor: ArrayD<f64>,
) -> GraphResult<()> {
    match map.remove(&id) {
        Some(existing) => {
            let summed = crate::tensor_ops::co_broadcast(&existing, &tensor, |a, b| a + b)
                .ok_or_else(|| GraphError::BroadcastMismatch {
                    op: "d_log_prob",
                    left: existing.shape().to_vec(),
                    right: tensor.shape().to_vec(),
                })?;
            map.insert(id, summed);
        }
        None => {
            map.insert(id, tensor);
        }
    }
    Ok(())
}

/// True when the parameter shape can legally broadcast against the sample
/// shape; used by construction-time validation.
pub fn parameter_conforms(param: &[usize], sample: &[usize]) -> bool {
    matches!(broadcast_shape(param, sample), Some(ref s) if s == &sample.to_vec())
}
