//! optimization — MAP estimation stack and unified error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for posterior-mode finding,
//! combining a conjugate-gradient driver, two strong-Wolfe line searches,
//! a graph-backed fitness adapter, a finite-difference fallback, and a
//! single error/result surface. Callers supply a fitness (or a
//! [`BayesNet`](crate::graph::vertex::BayesNet)), choose tolerances, and
//! obtain a maximizing parameter vector and diagnostics.
//!
//! Key behaviors
//! -------------
//! - Expose a high-level API for **maximizing fitness functions** (joint
//!   log-probabilities in particular) via `conjugate_gradient::maximize`
//!   with Polak–Ribière+ updates.
//! - Supply two interchangeable strong-Wolfe step selectors
//!   (`line_search::HagerZhang`, `line_search::MoreThuente`), selected by
//!   name through `line_search::LineSearcher`.
//! - Adapt a graph to the optimizer through `fitness::GraphFitness`,
//!   which flattens latent vertices into one parameter vector and routes
//!   gradients through reverse-mode differentiation.
//! - Normalize configuration issues, numerical failures, and lower-layer
//!   graph or differentiation errors into a single enum
//!   (`errors::OptError`) with a common result alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate on an unconstrained flat vector `θ` and assume
//!   inputs are finite once `FitnessFunction::check` has passed; invalid
//!   states are reported as `OptError`, not panics.
//! - A fitness may legally evaluate to `-inf` or NaN away from the start
//!   point (zero-probability regions); the line searches treat such
//!   trials as poor steps rather than hard failures.
//!
//! Conventions
//! -----------
//! - Everything maximizes. The line searches internally minimize the
//!   negated restriction `φ(α) = -fitness(x + α·d)`, but every public
//!   surface speaks in fitness terms.
//! - Parameters and gradients use the `ndarray`-based aliases
//!   `fitness::Theta` and `fitness::Grad`; mapping between vertex-shaped
//!   values and the flat vector is row-major and owned by `GraphFitness`.
//! - Public entrypoints that can fail return `OptResult<T>`.
//!
//! Downstream usage
//! ----------------
//! - Callers wrap a graph in `GraphFitness`, seed `θ` from the graph with
//!   `theta_from_net`, and call `conjugate_gradient::maximize` with
//!   `MapOptions` to obtain an `OptimOutcome`.
//! - Custom objectives implement `fitness::FitnessFunction` directly; the
//!   default `gradient` triggers the `finite_diff` fallback.
//!
//! Testing notes
//! -------------
//! - Unit tests in the submodules focus on local concerns:
//!   - `line_search`: Wolfe satisfaction on closed-form objectives,
//!     budget exhaustion, and recovery from non-finite regions.
//!   - `conjugate_gradient`: convergence on quadratics and conjugate
//!     Gaussian posteriors against closed-form modes.
//!   - `fitness` / `finite_diff`: θ round-trips, analytic-vs-numerical
//!     gradient agreement, and validation failures.
//! - The crate-level integration test exercises the full pipeline from
//!   graph construction to the recovered posterior mode.

pub mod conjugate_gradient;
pub mod errors;
pub mod finite_diff;
pub mod fitness;
pub mod line_search;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_probgraph::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::conjugate_gradient::{maximize, MapOptions, OptimOutcome};
    pub use super::errors::{OptError, OptResult};
    pub use super::finite_diff::fd_gradient;
    pub use super::fitness::{FitnessFunction, Grad, GraphFitness, Theta};
    pub use super::line_search::{HagerZhang, LineSearcher, MoreThuente, SearchOutcome};
}
