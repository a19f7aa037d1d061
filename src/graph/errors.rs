//! Error surface for the vertex graph.
//!
//! This module centralizes the failure modes of graph construction and
//! value propagation:
//!
//! - **Shape checks**: broadcast incompatibility, matrix-multiply
//!   conformance, and value/vertex shape disagreements.
//! - **Distribution parameters**: rejection of degenerate density
//!   parameters (non-positive scales or rates).
//! - **Identity checks**: references to vertices that do not exist in the
//!   arena, or operations applied to the wrong kind of vertex.
//!
//! All variants carry the offending values so callers can report precisely
//! what was wrong without re-deriving context.

/// Crate-wide result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Operand shapes cannot be broadcast together.
    BroadcastMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Matrix multiply requires rank-2 operands with conforming inner dims.
    MatmulNonConformant {
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// A supplied value's shape disagrees with the vertex's shape.
    ValueShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A vertex id does not refer to a vertex in this arena.
    UnknownVertex {
        index: usize,
    },

    /// Observation or density evaluation requested on a non-probabilistic
    /// vertex.
    NotProbabilistic {
        index: usize,
        op: &'static str,
    },

    /// Value assignment requested on a vertex whose value is derived.
    NotASource {
        index: usize,
        op: &'static str,
    },

    /// A distribution parameter is outside its valid domain.
    InvalidDistributionParameter {
        distribution: &'static str,
        parameter: &'static str,
        value: f64,
    },
}

impl std::error::Error for GraphError {}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::BroadcastMismatch { op, left, right } => {
                write!(f, "Cannot broadcast shapes {left:?} and {right:?} for '{op}'")
            }
            GraphError::MatmulNonConformant { left, right } => {
                write!(f, "Matrix multiply requires conforming matrices, got {left:?} x {right:?}")
            }
            GraphError::ValueShapeMismatch { expected, found } => {
                write!(f, "Value shape mismatch: expected {expected:?}, found {found:?}")
            }
            GraphError::UnknownVertex { index } => {
                write!(f, "Unknown vertex id {index}")
            }
            GraphError::NotProbabilistic { index, op } => {
                write!(f, "Vertex {index} is not probabilistic; cannot apply '{op}'")
            }
            GraphError::NotASource { index, op } => {
                write!(f, "Vertex {index} has a derived value; cannot apply '{op}'")
            }
            GraphError::InvalidDistributionParameter { distribution, parameter, value } => {
                write!(
                    f,
                    "Invalid {distribution} parameter '{parameter}': {value}, must be finite and in-domain"
                )
            }
        }
    }
}
