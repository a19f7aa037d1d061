//! rust_probgraph — probabilistic-graph inference core.
//!
//! Purpose
//! -------
//! Serve as the crate root for a directed-graph probabilistic modeling
//! engine: a vertex arena with value propagation and log-probabilities
//! (`graph`), forward- and reverse-mode tensor differentiation over that
//! arena (`autodiff`), shared dense-tensor helpers (`tensor_ops`), and a
//! MAP-estimation stack built on conjugate gradients and strong-Wolfe
//! line searches (`optimization`).
//!
//! Key behaviors
//! -------------
//! - Re-export the core modules as the public crate surface; the layering
//!   is strictly `tensor_ops` → `graph` → `autodiff` → `optimization`.
//! - Keep one error enum per layer, each converting upward via `From`, so
//!   a MAP run surfaces graph and differentiation failures through a
//!   single `OptError`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Vertex indices ascend in creation order and creation order is
//!   topological order; every traversal and differentiation sweep in the
//!   crate leans on that invariant.
//! - All tensors are dense row-major `f64` arrays (`ndarray::ArrayD`).
//!
//! Conventions
//! -----------
//! - Derivative tensors concatenate output dimensions before
//!   differentiated-variable dimensions; `autodiff::PartialDerivative`
//!   documents the full convention.
//! - Public fallible entrypoints return the layer's result alias
//!   (`GraphResult`, `AdResult`, `OptResult`); panics are reserved for
//!   violated internal invariants.
//!
//! Downstream usage
//! ----------------
//! - Model code builds a `graph::vertex::BayesNet`, observes data, and
//!   either queries gradients directly
//!   (`autodiff::LogProbGradientCalculator`) or runs
//!   `optimization::conjugate_gradient::maximize` over a
//!   `optimization::fitness::GraphFitness`.
//! - `prelude` re-exports the surface most callers need in one import.
//!
//! Testing notes
//! -------------
//! - Each module carries unit tests against closed-form derivatives and
//!   densities; `tests/` holds the end-to-end MAP pipeline test.

pub mod autodiff;
pub mod graph;
pub mod optimization;
pub mod tensor_ops;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_probgraph::prelude::*;
//
// to import the main crate surface in a single line.

pub mod prelude {
    pub use crate::autodiff::{
        forward_mode_autodiff, reverse_mode_autodiff, AdError, AdResult, DualNumber,
        LogProbGradientCalculator, PartialDerivative,
    };
    pub use crate::graph::errors::{GraphError, GraphResult};
    pub use crate::graph::vertex::{BayesNet, VertexId};
    pub use crate::optimization::prelude::*;
}
