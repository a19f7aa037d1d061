//! logprob_gradient — gradients of joint log probability over latents.
//!
//! Purpose
//! -------
//! Compute `∂(Σ log p)/∂θ` for a chosen set of log-probability-contributing
//! vertices and a chosen set of latent vertices, without sweeping the whole
//! graph: each probabilistic vertex exposes the derivative of its own log
//! density with respect to itself and its direct parameters, and those
//! local derivatives are routed down to the latents through seeded
//! reverse-mode sweeps.
//!
//! Key behaviors
//! -------------
//! - The self entry of a latent contributes directly (the density varies
//!   with the latent's own value); parameter entries are chased through
//!   whatever deterministic subgraph links the parameter to the latents.
//! - Entries on vertices that reach no latent are skipped outright, using
//!   the same reachability set the reverse sweep prunes with.
//! - Parameters the density broadcast (a scalar mean under a vector
//!   sample) are broadcast-corrected before routing, so every contribution
//!   arrives shaped like the vertex it sits on.
//!
//! Downstream usage
//! ----------------
//! - `optimization::fitness` packs these per-latent tensors into the flat
//!   gradient vector the optimizer and line searches consume.
use std::collections::HashMap;

use ndarray::ArrayD;

use crate::autodiff::broadcast;
use crate::autodiff::errors::{AdError, AdResult};
use crate::autodiff::partial::PartialDerivative;
use crate::autodiff::reverse;
use crate::graph::distributions;
use crate::graph::ops;
use crate::graph::traversal;
use crate::graph::vertex::{BayesNet, VertexId};

/// Gradient calculator for a fixed choice of density vertices ("of") and
/// latent vertices ("wrt") over one graph.
pub struct LogProbGradientCalculator<'g> {
    net: &'g BayesNet,
    of: Vec<VertexId>,
    wrt: Vec<VertexId>,
}

impl<'g> LogProbGradientCalculator<'g> {
    /// Purpose
    /// -------
    /// Validate and bind the differentiation sets.
    ///
    /// Parameters
    /// ----------
    /// - `of`: the vertices whose log densities are summed. Every one must
    ///   be probabilistic.
    /// - `wrt`: the latent vertices the gradient is taken over.
    ///
    /// Errors
    /// ------
    /// - `AdError::Graph` when an id is unknown.
    /// - `AdError::NotProbabilistic` for an of vertex without a density.
    /// - `AdError::NotLatent` for a wrt vertex that is deterministic or
    ///   observed.
    pub fn new(
        net: &'g BayesNet, of: Vec<VertexId>, wrt: Vec<VertexId>,
    ) -> AdResult<Self> {
        for &v in &of {
            net.checked(v)?;
            if !net.is_probabilistic(v) {
                return Err(AdError::NotProbabilistic { index: v.0 });
            }
        }
        for &w in &wrt {
            net.checked(w)?;
            if !net.is_latent(w) {
                return Err(AdError::NotLatent { index: w.0 });
            }
        }
        Ok(Self { net, of, wrt })
    }

    /// Calculator over every probabilistic vertex with respect to every
    /// latent: the gradient of the joint log probability.
    pub fn for_joint(net: &'g BayesNet) -> AdResult<Self> {
        Self::new(net, net.probabilistic_vertices(), net.latent_vertices())
    }

    /// Purpose
    /// -------
    /// Accumulate `∂(Σ log p)/∂wrt` at the graph's current values.
    ///
    /// Returns
    /// -------
    /// - One tensor per wrt vertex, shaped like that vertex. Latents no
    ///   density entry reaches map to zeros.
    ///
    /// Errors
    /// ------
    /// - `AdError::Graph` when a density rejects its current parameters.
    /// - Shape errors from broadcast correction or the reverse sweeps.
    pub fn gradients(&self) -> AdResult<HashMap<VertexId, ArrayD<f64>>> {
        // One reachability scan serves every routed entry: a local
        // derivative sitting on a vertex outside this set can never move a
        // latent.
        let wrt_set = self.wrt.iter().copied().collect();
        let reaches_latent = traversal::connects_to_any(self.net, &wrt_set);

        let mut gradients: HashMap<VertexId, ArrayD<f64>> = HashMap::new();
        for &v in &self.of {
            let local = distributions::d_log_prob(self.net, v)?;
            for (entry, tensor) in local {
                if !reaches_latent.contains(&entry) {
                    continue;
                }
                // The local derivative is sample-shaped; fold broadcast
                // dimensions back onto the entry's own shape before routing.
                let seed = broadcast::correct_for_broadcast_reverse(
                    PartialDerivative::present(Vec::new(), tensor),
                    self.net.shape(entry),
                )?;
                let outcome = reverse::reverse_mode_autodiff_seeded(
                    self.net,
                    vec![(entry, seed)],
                    &self.wrt,
                )?;
                for &w in &self.wrt {
                    if let PartialDerivative::Present { tensor, .. } =
                        outcome.partial_of(w)
                    {
                        match gradients.remove(&w) {
                            Some(acc) => {
                                gradients.insert(w, acc + tensor);
                            }
                            None => {
                                gradients.insert(w, tensor.clone());
                            }
                        }
                    }
                }
            }
        }

        for &w in &self.wrt {
            gradients
                .entry(w)
                .or_insert_with(|| ops::zeros(self.net.shape(w)));
        }
        Ok(gradients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The self entry of a single latent against the closed-form score.
    // - Prior and likelihood contributions summing on a shared latent.
    // - Routing a parameter entry through a deterministic transform.
    // - Broadcast of a scalar mean under a vector observation.
    // - Validation of the of/wrt sets.
    // -------------------------------------------------------------------------

    fn scalar(g: &ArrayD<f64>) -> f64 {
        assert_eq!(g.ndim(), 0);
        g.sum()
    }

    #[test]
    // Purpose
    // -------
    // A standard-normal latent at x = 0.4 has score d log p/dx = -x.
    fn single_latent_self_entry() {
        // Arrange
        let mut net = BayesNet::new();
        let mu = net.constant_scalar(0.0);
        let sigma = net.constant_scalar(1.0);
        let x = net.gaussian(mu, sigma, arr0(0.4).into_dyn()).unwrap();

        // Act
        let calc = LogProbGradientCalculator::for_joint(&net).unwrap();
        let grads = calc.gradients().unwrap();

        // Assert
        assert!((scalar(&grads[&x]) + 0.4).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // With a standard-normal prior on mu and one observation y = 2 under
    // y ~ N(mu, 1), the gradient at mu = 0.5 is -mu + (y - mu) = 1.0.
    fn prior_and_likelihood_contributions_sum() {
        // Arrange
        let mut net = BayesNet::new();
        let zero = net.constant_scalar(0.0);
        let one = net.constant_scalar(1.0);
        let mu = net.gaussian(zero, one, arr0(0.5).into_dyn()).unwrap();
        let y = net.gaussian(mu, one, arr0(0.0).into_dyn()).unwrap();
        net.observe(y, arr0(2.0).into_dyn()).unwrap();

        // Act
        let calc = LogProbGradientCalculator::for_joint(&net).unwrap();
        let grads = calc.gradients().unwrap();

        // Assert
        assert!((scalar(&grads[&mu]) - 1.0).abs() < 1e-12);
        assert!(!grads.contains_key(&y));
    }

    #[test]
    // Purpose
    // -------
    // A parameter entry must route through deterministic structure: for
    // y ~ N(exp(m), 1), d log p/dm = (y - e^m)·e^m.
    fn parameter_entry_routes_through_transform() {
        // Arrange
        let m0 = 0.3_f64;
        let y0 = 2.0_f64;
        let mut net = BayesNet::new();
        let zero = net.constant_scalar(0.0);
        let ten = net.constant_scalar(10.0);
        let m = net.gaussian(zero, ten, arr0(m0).into_dyn()).unwrap();
        let mean = net.exp(m).unwrap();
        let one = net.constant_scalar(1.0);
        let y = net.gaussian(mean, one, arr0(0.0).into_dyn()).unwrap();
        net.observe(y, arr0(y0).into_dyn()).unwrap();

        // Act
        let calc = LogProbGradientCalculator::for_joint(&net).unwrap();
        let grads = calc.gradients().unwrap();

        // Assert: likelihood term plus the wide prior's own score.
        let expected = (y0 - m0.exp()) * m0.exp() + (-m0 / 100.0);
        assert!((scalar(&grads[&m]) - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // A scalar latent mean under a vector observation must receive the sum
    // of per-element scores: Σ_i (y_i - mu).
    fn scalar_mean_under_vector_observation() {
        // Arrange
        let mut net = BayesNet::new();
        let zero = net.constant_scalar(0.0);
        let hundred = net.constant_scalar(100.0);
        let one = net.constant_scalar(1.0);
        let mu = net.gaussian(zero, hundred, arr0(1.0).into_dyn()).unwrap();
        let y = net.gaussian(mu, one, arr1(&[0.0, 0.0, 0.0]).into_dyn()).unwrap();
        net.observe(y, arr1(&[1.5, 2.5, 3.5]).into_dyn()).unwrap();

        // Act
        let calc = LogProbGradientCalculator::for_joint(&net).unwrap();
        let grads = calc.gradients().unwrap();

        // Assert
        let expected = (1.5 - 1.0) + (2.5 - 1.0) + (3.5 - 1.0) + (-1.0 / 10_000.0);
        assert!((scalar(&grads[&mu]) - expected).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Construction must reject non-probabilistic of vertices and
    // non-latent wrt vertices.
    fn construction_validates_sets() {
        let mut net = BayesNet::new();
        let c = net.constant_scalar(1.0);
        let zero = net.constant_scalar(0.0);
        let one = net.constant_scalar(1.0);
        let g = net.gaussian(zero, one, arr0(0.0).into_dyn()).unwrap();
        net.observe(g, arr0(0.5).into_dyn()).unwrap();

        assert!(matches!(
            LogProbGradientCalculator::new(&net, vec![c], vec![]),
            Err(AdError::NotProbabilistic { .. })
        ));
        assert!(matches!(
            LogProbGradientCalculator::new(&net, vec![g], vec![g]),
            Err(AdError::NotLatent { .. })
        ));
    }
}
