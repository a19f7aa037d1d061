//! fitness — the scalar objective surface consumed by line search and the
//! conjugate-gradient driver.
//!
//! Purpose
//! -------
//! Define the [`FitnessFunction`] contract (value, optional analytic
//! gradient, pre-flight check over a flat parameter vector) and provide
//! [`GraphFitness`], the adapter that exposes a [`BayesNet`]'s joint log
//! probability over its latent vertices as such an objective.
//!
//! Key behaviors
//! -------------
//! - Latent tensors are flattened into one `θ` vector in arena order, row
//!   major per latent; [`GraphFitness::theta_from_net`] and the internal
//!   unpacking are exact inverses.
//! - `value` writes `θ` into the latents, re-propagates deterministic
//!   vertices, and returns the joint log probability. A zero-probability
//!   configuration comes back as `-inf`, not as an error; the line searches
//!   treat it as an invalid point.
//! - `gradient` routes through the log-prob gradient calculator and
//!   flattens per-latent tensors with the same layout.
//! - `check` rejects wrong-length or non-finite `θ` and a non-finite
//!   starting fitness before any optimizer loop begins.
//!
//! Conventions
//! -----------
//! - Fitness is *maximized*; the line searches negate internally.
//! - The graph sits behind a `RefCell` so evaluation can move latent values
//!   under a shared reference; callers must not hold graph borrows across
//!   fitness calls.
use std::cell::RefCell;

use ndarray::{Array1, ArrayD, IxDyn};

use crate::autodiff::logprob_gradient::LogProbGradientCalculator;
use crate::graph::vertex::{BayesNet, VertexId};
use crate::optimization::errors::{OptError, OptResult};

/// Parameter vector `θ` over the flattened latents.
pub type Theta = Array1<f64>;

/// Gradient vector `∇fitness(θ)`, matching the shape of `Theta`.
pub type Grad = Array1<f64>;

/// Scalar objective to maximize, with an optional analytic gradient.
///
/// Required:
/// - `value(&Theta) -> OptResult<f64>`: the fitness at `θ`. Non-finite
///   values are legal returns; they mark invalid points, not errors.
/// - `check(&Theta) -> OptResult<()>`: pre-flight validation, called once
///   before optimization.
///
/// Optional:
/// - `gradient(&Theta) -> OptResult<Grad>`: the ascent gradient. The
///   default defers to finite differences via
///   [`OptError::GradientNotImplemented`].
pub trait FitnessFunction {
    fn value(&self, theta: &Theta) -> OptResult<f64>;
    fn check(&self, theta: &Theta) -> OptResult<()>;

    fn gradient(&self, _theta: &Theta) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Flattening layout of one latent vertex inside `θ`.
#[derive(Debug, Clone, PartialEq)]
struct LatentSlot {
    id: VertexId,
    shape: Vec<usize>,
    offset: usize,
    len: usize,
}

/// Joint log probability of a [`BayesNet`] as a fitness over its latents.
pub struct GraphFitness {
    net: RefCell<BayesNet>,
    slots: Vec<LatentSlot>,
    dim: usize,
}

impl GraphFitness {
    /// Purpose
    /// -------
    /// Take ownership of a graph and fix the `θ` layout over its latent
    /// vertices, in arena order.
    ///
    /// Errors
    /// ------
    /// - [`OptError::NoLatentVertices`] when nothing is free to optimize.
    pub fn new(net: BayesNet) -> OptResult<Self> {
        let latents = net.latent_vertices();
        if latents.is_empty() {
            return Err(OptError::NoLatentVertices);
        }
        let mut slots = Vec::with_capacity(latents.len());
        let mut offset = 0;
        for id in latents {
            let shape = net.shape(id).to_vec();
            let len = shape.iter().product::<usize>().max(1);
            slots.push(LatentSlot { id, shape, offset, len });
            offset += len;
        }
        Ok(Self { net: RefCell::new(net), slots, dim: offset })
    }

    /// Length of the flat parameter vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The latent vertices in `θ` order.
    pub fn latents(&self) -> Vec<VertexId> {
        self.slots.iter().map(|s| s.id).collect()
    }

    /// Flatten the graph's current latent values into a `θ` vector.
    pub fn theta_from_net(&self) -> Theta {
        let net = self.net.borrow();
        let mut theta = Array1::zeros(self.dim);
        for slot in &self.slots {
            for (i, &v) in net.value(slot.id).iter().enumerate() {
                theta[slot.offset + i] = v;
            }
        }
        theta
    }

    /// Surrender the graph, typically after optimization has written the
    /// fitted latent values into it.
    pub fn into_net(self) -> BayesNet {
        self.net.into_inner()
    }

    /// Write `θ` into the latents and re-propagate deterministic values.
    fn apply(&self, theta: &Theta) -> OptResult<()> {
        if theta.len() != self.dim {
            return Err(OptError::ThetaDimMismatch {
                expected: self.dim,
                found: theta.len(),
            });
        }
        let mut net = self.net.borrow_mut();
        for slot in &self.slots {
            let values: Vec<f64> =
                theta.slice(ndarray::s![slot.offset..slot.offset + slot.len]).to_vec();
            let tensor = ArrayD::from_shape_vec(IxDyn(&slot.shape), values)
                .map_err(|_| OptError::ThetaDimMismatch {
                    expected: self.dim,
                    found: theta.len(),
                })?;
            net.set_value(slot.id, tensor)?;
        }
        net.propagate_values()?;
        Ok(())
    }
}

impl FitnessFunction for GraphFitness {
    fn value(&self, theta: &Theta) -> OptResult<f64> {
        self.apply(theta)?;
        let fitness = self.net.borrow().joint_log_prob()?;
        Ok(fitness)
    }

    fn gradient(&self, theta: &Theta) -> OptResult<Grad> {
        self.apply(theta)?;
        let net = self.net.borrow();
        let calc = LogProbGradientCalculator::for_joint(&net)?;
        let by_latent = calc.gradients()?;
        let mut grad = Array1::zeros(self.dim);
        for slot in &self.slots {
            let tensor = &by_latent[&slot.id];
            for (i, &v) in tensor.iter().enumerate() {
                grad[slot.offset + i] = v;
            }
        }
        Ok(grad)
    }

    fn check(&self, theta: &Theta) -> OptResult<()> {
        if theta.len() != self.dim {
            return Err(OptError::ThetaDimMismatch {
                expected: self.dim,
                found: theta.len(),
            });
        }
        for (index, &value) in theta.iter().enumerate() {
            if !value.is_finite() {
                return Err(OptError::InvalidTheta {
                    index,
                    value,
                    reason: "parameter entries must be finite",
                });
            }
        }
        let start = self.value(theta)?;
        if !start.is_finite() {
            return Err(OptError::NonFiniteStartingFitness { value: start });
        }
        Ok(())
    }
}
