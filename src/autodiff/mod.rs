//! Automatic differentiation over the probabilistic computation graph.
//!
//! Purpose
//! -------
//! House both differentiation engines and the value type they share:
//! forward-mode dual numbers for one-variable sweeps, reverse-mode
//! backpropagation for many-variable gradients, and the log-probability
//! gradient calculator that routes density derivatives down to latents.
//!
//! Key behaviors
//! -------------
//! - [`partial::PartialDerivative`] carries every derivative tensor with
//!   its of shape; `Absent` is an exact, allocation-free zero.
//! - [`forward::forward_mode_autodiff`] and
//!   [`reverse::reverse_mode_autodiff`] both prune traversal to the
//!   subgraph actually connecting their endpoints.
//! - [`broadcast::correct_for_broadcast_reverse`] keeps gradients shaped
//!   like the vertices they land on, whatever the graph broadcast on the
//!   way forward.
//!
//! Conventions
//! -----------
//! - Derivative tensors are `of_shape ++ wrt_shape`, of dims leading.
//! - All engines borrow the graph immutably; nothing here mutates values.
//!
//! Testing notes
//! -------------
//! - Each submodule carries closed-form unit tests; cross-engine and
//!   finite-difference agreement is exercised in `optimization` and the
//!   integration suite.
pub mod broadcast;
pub mod errors;
pub mod forward;
pub mod logprob_gradient;
pub mod partial;
pub mod reverse;

pub use broadcast::correct_for_broadcast_reverse;
pub use errors::{AdError, AdResult};
pub use forward::{forward_mode_autodiff, DualNumber};
pub use logprob_gradient::LogProbGradientCalculator;
pub use partial::PartialDerivative;
pub use reverse::{reverse_mode_autodiff, reverse_mode_autodiff_seeded, ReversePassOutcome};
