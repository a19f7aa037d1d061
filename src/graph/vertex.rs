//! Vertex arena for the probabilistic computation graph.
//!
//! Purpose
//! -------
//! Own the directed acyclic graph of tensor-valued vertices that the
//! autodiff engines differentiate and the optimizer mutates. Vertices are
//! stored in an arena and addressed by integer index; edges point from
//! parent (input) to child (output) and are recorded as per-vertex parent
//! lists.
//!
//! Key behaviors
//! -------------
//! - Typed constructor methods per operator (`add`, `multiply`,
//!   `matrix_multiply`, `gaussian`, …) that validate operand shapes at
//!   build time and evaluate deterministic values eagerly.
//! - Source mutation (`set_value`, `observe`) restricted to vertices whose
//!   value is not derived, plus whole-graph re-evaluation
//!   ([`BayesNet::propagate_values`]).
//! - Joint log-probability over all probabilistic vertices
//!   ([`BayesNet::joint_log_prob`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Constructors only accept vertex ids already present in the arena, so
//!   arena index order is a topological order: every parent index is
//!   strictly smaller than its child's. Traversal code relies on this.
//! - Every vertex always holds a value whose shape never changes after
//!   construction; `set_value`/`observe` enforce shape equality.
//! - The graph is never mutated during a differentiation pass; callers
//!   sequence mutation and differentiation externally.
//!
//! Conventions
//! -----------
//! - "Latent" means probabilistic and not observed; these are the free
//!   quantities MAP optimization moves.
//! - All public entry points taking a [`VertexId`] from outside validate it
//!   with [`BayesNet::checked`]; internal code indexes directly under the
//!   arena invariant.
use ndarray::ArrayD;

use crate::graph::distributions;
use crate::graph::errors::{GraphError, GraphResult};
use crate::graph::ops::{self, Op};

/// Stable identity of a vertex within one [`BayesNet`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// One node of the computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexNode {
    pub op: Op,
    pub parents: Vec<VertexId>,
    pub value: ArrayD<f64>,
    pub observed: bool,
}

/// Arena-owned probabilistic computation graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BayesNet {
    vertices: Vec<VertexNode>,
}

impl BayesNet {
    pub fn new() -> Self {
        Self { vertices: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Borrow a vertex, validating the id against the arena.
    ///
    /// # Errors
    /// [`GraphError::UnknownVertex`] when the id is out of range.
    pub fn checked(&self, id: VertexId) -> GraphResult<&VertexNode> {
        self.vertices.get(id.0).ok_or(GraphError::UnknownVertex { index: id.0 })
    }

    /// Borrow a vertex under the arena invariant (id created by this arena).
    pub(crate) fn node(&self, id: VertexId) -> &VertexNode {
        &self.vertices[id.0]
    }

    pub fn value(&self, id: VertexId) -> &ArrayD<f64> {
        &self.node(id).value
    }

    pub fn shape(&self, id: VertexId) -> &[usize] {
        self.node(id).value.shape()
    }

    pub fn parents(&self, id: VertexId) -> &[VertexId] {
        &self.node(id).parents
    }

    pub fn op(&self, id: VertexId) -> Op {
        self.node(id).op
    }

    pub fn is_observed(&self, id: VertexId) -> bool {
        self.node(id).observed
    }

    pub fn is_probabilistic(&self, id: VertexId) -> bool {
        self.node(id).op.is_probabilistic()
    }

    /// Probabilistic and unobserved: a free quantity to be inferred.
    pub fn is_latent(&self, id: VertexId) -> bool {
        let node = self.node(id);
        node.op.is_probabilistic() && !node.observed
    }

    /// All vertex ids in arena (topological) order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(VertexId)
    }

    /// All probabilistic vertices, in arena order.
    pub fn probabilistic_vertices(&self) -> Vec<VertexId> {
        self.vertex_ids().filter(|&id| self.is_probabilistic(id)).collect()
    }

    /// All latent (probabilistic, unobserved) vertices, in arena order.
    pub fn latent_vertices(&self) -> Vec<VertexId> {
        self.vertex_ids().filter(|&id| self.is_latent(id)).collect()
    }

    // ---- Construction ------------------------------------------------------

    fn push(&mut self, node: VertexNode) -> VertexId {
        self.vertices.push(node);
        VertexId(self.vertices.len() - 1)
    }

    /// Source vertex holding an externally assigned tensor value.
    pub fn constant(&mut self, value: ArrayD<f64>) -> VertexId {
        self.push(VertexNode { op: Op::Constant, parents: vec![], value, observed: false })
    }

    /// Scalar convenience wrapper over [`BayesNet::constant`].
    pub fn constant_scalar(&mut self, value: f64) -> VertexId {
        self.constant(ndarray::arr0(value).into_dyn())
    }

    fn binary(&mut self, op: Op, left: VertexId, right: VertexId) -> GraphResult<VertexId> {
        self.checked(left)?;
        self.checked(right)?;
        ops::result_shape(op, &[self.shape(left), self.shape(right)])?;
        let value = ops::eval(op, &[self.value(left), self.value(right)])?;
        Ok(self.push(VertexNode { op, parents: vec![left, right], value, observed: false }))
    }

    fn unary(&mut self, op: Op, parent: VertexId) -> GraphResult<VertexId> {
        self.checked(parent)?;
        let value = ops::eval(op, &[self.value(parent)])?;
        Ok(self.push(VertexNode { op, parents: vec![parent], value, observed: false }))
    }

    pub fn add(&mut self, a: VertexId, b: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::Add, a, b)
    }

    pub fn subtract(&mut self, a: VertexId, b: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::Subtract, a, b)
    }

    pub fn multiply(&mut self, a: VertexId, b: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::Multiply, a, b)
    }

    pub fn divide(&mut self, a: VertexId, b: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::Divide, a, b)
    }

    pub fn power(&mut self, base: VertexId, exponent: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::Power, base, exponent)
    }

    pub fn matrix_multiply(&mut self, a: VertexId, b: VertexId) -> GraphResult<VertexId> {
        self.binary(Op::MatrixMultiply, a, b)
    }

    pub fn exp(&mut self, a: VertexId) -> GraphResult<VertexId> {
        self.unary(Op::Exp, a)
    }

    pub fn log(&mut self, a: VertexId) -> GraphResult<VertexId> {
        self.unary(Op::Log, a)
    }

    pub fn sin(&mut self, a: VertexId) -> GraphResult<VertexId> {
        self.unary(Op::Sin, a)
    }

    pub fn cos(&mut self, a: VertexId) -> GraphResult<VertexId> {
        self.unary(Op::Cos, a)
    }

    /// Full reduction to a scalar.
    pub fn sum(&mut self, a: VertexId) -> GraphResult<VertexId> {
        self.unary(Op::Sum, a)
    }

    /// Gaussian vertex with the given mean and standard-deviation parents.
    ///
    /// `initial` seeds the vertex's sample value and fixes its shape; the
    /// parameter shapes must broadcast against it.
    pub fn gaussian(
        &mut self, mean: VertexId, std_dev: VertexId, initial: ArrayD<f64>,
    ) -> GraphResult<VertexId> {
        self.probabilistic(Op::Gaussian, vec![mean, std_dev], initial)
    }

    /// Exponential vertex parameterized by rate.
    pub fn exponential(&mut self, rate: VertexId, initial: ArrayD<f64>) -> GraphResult<VertexId> {
        self.probabilistic(Op::Exponential, vec![rate], initial)
    }

    fn probabilistic(
        &mut self, op: Op, parents: Vec<VertexId>, initial: ArrayD<f64>,
    ) -> GraphResult<VertexId> {
        for &p in &parents {
            self.checked(p)?;
            // Parameters broadcast against the sample, never the reverse:
            // a parameter broader than the sample has no density.
            if !distributions::parameter_conforms(self.shape(p), initial.shape()) {
                return Err(GraphError::BroadcastMismatch {
                    op: op.name(),
                    left: self.shape(p).to_vec(),
                    right: initial.shape().to_vec(),
                });
            }
        }
        Ok(self.push(VertexNode { op, parents, value: initial, observed: false }))
    }

    // ---- Mutation ----------------------------------------------------------

    /// Assign a value to a source vertex (constant or probabilistic).
    ///
    /// # Errors
    /// - [`GraphError::NotASource`] for deterministic vertices.
    /// - [`GraphError::ValueShapeMismatch`] when the shape changes.
    pub fn set_value(&mut self, id: VertexId, value: ArrayD<f64>) -> GraphResult<()> {
        let node = self.checked(id)?;
        if node.op.is_deterministic() {
            return Err(GraphError::NotASource { index: id.0, op: "set_value" });
        }
        if node.value.shape() != value.shape() {
            return Err(GraphError::ValueShapeMismatch {
                expected: node.value.shape().to_vec(),
                found: value.shape().to_vec(),
            });
        }
        self.vertices[id.0].value = value;
        Ok(())
    }

    /// Fix a probabilistic vertex at an observed value.
    ///
    /// # Errors
    /// - [`GraphError::NotProbabilistic`] for non-probabilistic vertices.
    /// - [`GraphError::ValueShapeMismatch`] when the shape changes.
    pub fn observe(&mut self, id: VertexId, value: ArrayD<f64>) -> GraphResult<()> {
        if !self.checked(id)?.op.is_probabilistic() {
            return Err(GraphError::NotProbabilistic { index: id.0, op: "observe" });
        }
        self.set_value(id, value)?;
        self.vertices[id.0].observed = true;
        Ok(())
    }

    /// Re-evaluate every deterministic vertex from its parents, in arena
    /// (topological) order. Source and probabilistic values are untouched.
    pub fn propagate_values(&mut self) -> GraphResult<()> {
        for i in 0..self.vertices.len() {
            if !self.vertices[i].op.is_deterministic() {
                continue;
            }
            let parent_values: Vec<&ArrayD<f64>> =
                self.vertices[i].parents.iter().map(|&p| &self.vertices[p.0].value).collect();
            let value = ops::eval(self.vertices[i].op, &parent_values)?;
            self.vertices[i].value = value;
        }
        Ok(())
    }

    // ---- Densities ---------------------------------------------------------

    /// Log density of one probabilistic vertex at its current value,
    /// summed over elements.
    pub fn log_prob(&self, id: VertexId) -> GraphResult<f64> {
        distributions::log_prob(self, id)
    }

    /// Joint log probability: the sum of [`BayesNet::log_prob`] over every
    /// probabilistic vertex (latent priors and observed likelihoods alike).
    pub fn joint_log_prob(&self) -> GraphResult<f64> {
        let mut total = 0.0;
        for id in self.probabilistic_vertices() {
            total += distributions::log_prob(self, id)?;
        }
        Ok(total)
    }
}
