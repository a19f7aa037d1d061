//! graph — vertex arena, operators, and densities.
//!
//! Purpose
//! -------
//! Provide the probabilistic computation graph the rest of the crate
//! operates on: an arena of tensor-valued vertices connected by
//! parent/child edges, the tagged union of operators those vertices carry,
//! per-vertex log densities for the probabilistic operators, and the
//! reachability/ordering primitives the autodiff engines traverse with.
//!
//! Key behaviors
//! -------------
//! - Shape-validated graph construction with eager evaluation of
//!   deterministic vertices (`vertex`).
//! - Value assignment on sources, observation of probabilistic vertices,
//!   and whole-graph value propagation in topological order.
//! - Gaussian and Exponential log densities with analytic elementwise
//!   derivative maps (`distributions`).
//! - Ancestor/reachability scans and topological ordering (`traversal`).
//!
//! Invariants & assumptions
//! ------------------------
//! - The graph is a DAG by construction: vertex constructors only accept
//!   already-existing parents, so arena index order is topological.
//! - Vertex shapes are fixed at construction; every value mutation
//!   preserves shape.
//! - The graph is externally synchronized: it is never mutated while a
//!   differentiation pass reads it.
//!
//! Conventions
//! -----------
//! - Fallible operations return `GraphResult<T>` with typed
//!   `GraphError` values; this module never panics on user input.
//! - This module and its children avoid I/O and logging.
//!
//! Downstream usage
//! ----------------
//! - `autodiff` consumes values, shapes, parent lists, operator tags, and
//!   the density derivative maps.
//! - `optimization` mutates latent values and re-propagates between
//!   fitness evaluations.

pub mod distributions;
pub mod errors;
pub mod ops;
pub mod traversal;
pub mod vertex;

pub use self::errors::{GraphError, GraphResult};
pub use self::ops::Op;
pub use self::vertex::{BayesNet, VertexId, VertexNode};

pub mod prelude {
    pub use super::errors::{GraphError, GraphResult};
    pub use super::ops::Op;
    pub use super::vertex::{BayesNet, VertexId};
}
