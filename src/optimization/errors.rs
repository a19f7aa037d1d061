//! Unified error surface for the optimization layer.
//!
//! Everything the fitness adapter, the line searches, and the
//! conjugate-gradient driver can reject is collected into one enum so that
//! callers see a single `OptResult<T>` everywhere. Graph and autodiff
//! failures cross into this surface through `From` conversions.
//!
//! Note the split the line searches rely on: invalid *inputs* (non-finite
//! starting fitness, bad tunables, bad θ) are `Err`; a search that merely
//! fails to find a Wolfe step reports `success = false` inside its outcome
//! and is not an error here.
use crate::autodiff::errors::AdError;
use crate::graph::errors::GraphError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that finite differences should be used.
    GradientNotImplemented,

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Gradient elements need to be finite.
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- Parameters ----
    /// Parameter vector length does not match the latent layout.
    ThetaDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Parameter elements need to be finite.
    InvalidTheta {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    // ---- Fitness ----
    /// The fitness at the starting point is not finite (e.g. a
    /// zero-probability network); optimization cannot start there.
    NonFiniteStartingFitness {
        value: f64,
    },

    /// The graph exposes no latent vertices to optimize over.
    NoLatentVertices,

    // ---- Configuration ----
    /// Gradient tolerance needs to be positive and finite.
    InvalidTolGrad {
        tol: f64,
        reason: &'static str,
    },
    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: usize,
        reason: &'static str,
    },
    /// Invalid line searcher name.
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },
    /// A line-search tunable is outside its admissible range.
    InvalidSearchTunable {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    // ---- Lower layers ----
    /// Wrapper for graph-construction and density failures.
    Graph(GraphError),
    /// Wrapper for differentiation failures.
    Ad(AdError),
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptError::GradientNotImplemented => {
                write!(f, "No analytic gradient implemented; use finite differences")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient has length {found}, expected {expected}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient entry {value} at index {index}: {reason}")
            }
            OptError::ThetaDimMismatch { expected, found } => {
                write!(f, "Parameter vector has length {found}, expected {expected}")
            }
            OptError::InvalidTheta { index, value, reason } => {
                write!(f, "Invalid parameter {value} at index {index}: {reason}")
            }
            OptError::NonFiniteStartingFitness { value } => {
                write!(f, "Starting fitness {value} is not finite")
            }
            OptError::NoLatentVertices => {
                write!(f, "The graph has no latent vertices to optimize")
            }
            OptError::InvalidTolGrad { tol, reason } => {
                write!(f, "Invalid gradient tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid max_iter {max_iter}: {reason}")
            }
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidSearchTunable { name, value, reason } => {
                write!(f, "Invalid line-search tunable {name} = {value}: {reason}")
            }
            OptError::Graph(err) => write!(f, "Graph error during optimization: {err}"),
            OptError::Ad(err) => write!(f, "Autodiff error during optimization: {err}"),
        }
    }
}

impl From<GraphError> for OptError {
    fn from(err: GraphError) -> Self {
        OptError::Graph(err)
    }
}

impl From<AdError> for OptError {
    fn from(err: AdError) -> Self {
        OptError::Ad(err)
    }
}
