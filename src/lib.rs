//! Emission models for hidden Markov model toolkits.
//!
//! Provides a common [`Model`] trait for unsupervised probabilistic emission
//! distributions and two concrete implementations: [`CategoricalModel`] for
//! discrete observations and [`DiagNormalModel`] for real vectors with
//! independent dimensions. Each model supports random initialization,
//! sampling, batched log-likelihood evaluation, closed-form maximum
//! likelihood fitting and parameter export/import, so a composing sequence
//! model can treat heterogeneous emissions interchangeably.

pub(crate) mod categorical;
pub(crate) mod diag_normal;
pub(crate) mod math;
pub(crate) mod model;

pub use categorical::CategoricalModel;
pub use diag_normal::DiagNormalModel;
pub use model::{Model, ModelError};
