//! Error surface for the autodiff engines.
//!
//! The taxonomy mirrors how differentiation can fail:
//!
//! - **UnsupportedOperation**: an operator on the differentiation path has
//!   no derivative rule (e.g. a probabilistic vertex in forward mode).
//!   This must fail loudly — a silent zero would corrupt downstream
//!   optimization.
//! - **Shape failures**: partial-derivative operands whose of/wrt
//!   structure cannot be combined, or broadcast corrections that cannot
//!   reconcile a partial with the expected wrt shape.
//! - **Argument failures**: differentiating a non-probabilistic vertex's
//!   log probability, or supplying an observed vertex where a latent is
//!   required.
use crate::graph::errors::GraphError;

/// Crate-wide result alias for autodiff operations.
pub type AdResult<T> = Result<T, AdError>;

#[derive(Debug, Clone, PartialEq)]
pub enum AdError {
    /// An operator on the differentiation path has no derivative rule for
    /// the requested mode.
    UnsupportedOperation {
        op: &'static str,
        mode: &'static str,
    },

    /// Two partial derivatives disagree on their wrt rank and cannot be
    /// combined.
    WrtRankMismatch {
        left: usize,
        right: usize,
    },

    /// Partial-derivative operands could not be broadcast together.
    PartialBroadcastMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Broadcast correction cannot reconcile a partial's trailing
    /// dimensions with the expected wrt shape.
    IrreconcilableWrtShape {
        of_shape: Vec<usize>,
        found_wrt: Vec<usize>,
        expected_wrt: Vec<usize>,
    },

    /// Matrix-multiply rule applied to a partial whose operand dimensions
    /// do not conform with the multiplier.
    MatmulRuleNonConformant {
        partial_shape: Vec<usize>,
        multiplier_shape: Vec<usize>,
    },

    /// Log-probability differentiation requested on a vertex that exposes
    /// no log probability.
    NotProbabilistic {
        index: usize,
    },

    /// A with-respect-to vertex for log-probability gradients must be
    /// latent (probabilistic and unobserved).
    NotLatent {
        index: usize,
    },

    /// Wrapper for graph-layer failures encountered mid-differentiation.
    Graph(GraphError),
}

impl std::error::Error for AdError {}

impl std::fmt::Display for AdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdError::UnsupportedOperation { op, mode } => {
                write!(f, "Operator '{op}' has no {mode}-mode derivative rule")
            }
            AdError::WrtRankMismatch { left, right } => {
                write!(f, "Partial derivatives disagree on wrt rank: {left} vs {right}")
            }
            AdError::PartialBroadcastMismatch { op, left, right } => {
                write!(f, "Cannot broadcast partials {left:?} and {right:?} for '{op}'")
            }
            AdError::IrreconcilableWrtShape { of_shape, found_wrt, expected_wrt } => {
                write!(
                    f,
                    "Cannot reconcile wrt shape {found_wrt:?} with expected {expected_wrt:?} (of shape {of_shape:?})"
                )
            }
            AdError::MatmulRuleNonConformant { partial_shape, multiplier_shape } => {
                write!(
                    f,
                    "Matrix-multiply rule non-conformant: partial {partial_shape:?} vs multiplier {multiplier_shape:?}"
                )
            }
            AdError::NotProbabilistic { index } => {
                write!(f, "Vertex {index} does not expose a log probability")
            }
            AdError::NotLatent { index } => {
                write!(f, "Vertex {index} is not latent (probabilistic and unobserved)")
            }
            AdError::Graph(err) => write!(f, "Graph error during differentiation: {err}"),
        }
    }
}

impl From<GraphError> for AdError {
    fn from(err: GraphError) -> Self {
        AdError::Graph(err)
    }
}
