//! Core abstractions for emission models.
//!
//! Provides the `Model` trait which defines the interface every emission
//! distribution exposes to a composing sequence model, and the error type
//! shared by all model operations.

use faer::Col;
use rand::Rng;
use thiserror::Error;

/// Errors produced by emission model construction and operations.
///
/// Every failure happens before any parameter mutation, so a model that
/// returns an error is left in its previous state.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    /// The operation has no implementation for this model variant.
    ///
    /// Signals an integration error in the composing sequence model.
    #[error("{0} is not implemented for this model")]
    NotImplemented(&'static str),
    #[error("both probs and logits provided; only one may be used")]
    BothProbsAndLogits,
    #[error("neither probs nor logits provided; one must be")]
    MissingProbsAndLogits,
    #[error("expected a vector of length {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("expected {expected} parameter vectors, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("category index {index} out of range for {num_categories} categories")]
    CategoryOutOfRange {
        index: usize,
        num_categories: usize,
    },
    /// The current weights cannot be turned into a sampler (zero or
    /// non-finite total mass).
    #[error("distribution weights do not form a valid sampler")]
    DegenerateDistribution,
}

/// Interface for unsupervised emission models.
///
/// An emission model is a probability distribution over observed symbols or
/// vectors, one per hidden state in a sequence model. The trait lets
/// heterogeneous distributions plug into an HMM interchangeably: random
/// initialization, sampling, log-likelihood evaluation, closed-form fitting
/// and parameter export/import all go through the same capability set.
///
/// Every operation has a default body that fails with
/// [`ModelError::NotImplemented`], so a variant that omits one still
/// satisfies the trait but signals the gap at the call site.
///
/// Models are not internally synchronized. Concurrent `fit`, `sample` or
/// `set_parameters` calls on one instance must be serialized by the caller.
pub trait Model {
    /// Batch of draws produced by [`sample`](Model::sample).
    type Sample;

    /// Batched observations accepted by [`log_prob`](Model::log_prob) and
    /// [`fit`](Model::fit).
    type Data: ?Sized;

    /// Replaces the parameters with a random but valid configuration.
    ///
    /// Used to restart model fitting from fresh parameters.
    fn init_params_random<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented("init_params_random"))
    }

    /// Draws `n` independent samples from the current distribution.
    fn sample<R: Rng + ?Sized>(&self, _rng: &mut R, _n: usize) -> Result<Self::Sample, ModelError> {
        Err(ModelError::NotImplemented("sample"))
    }

    /// Computes the log-likelihood of each observation in `value` under the
    /// current parameters. Pure, mutates nothing.
    fn log_prob(&self, _value: &Self::Data) -> Result<Col<f64>, ModelError> {
        Err(ModelError::NotImplemented("log_prob"))
    }

    /// Updates the parameters in place to best explain `data`, using the
    /// closed-form maximum-likelihood estimator. The update is an atomic
    /// replacement of the affected parameters.
    fn fit(&mut self, _data: &Self::Data) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented("fit"))
    }

    /// Like [`fit`](Model::fit), but each observation contributes with the
    /// given weight. This is the update an EM procedure needs when fitting
    /// against posterior state responsibilities.
    fn fit_weighted(&mut self, _data: &Self::Data, _weights: &Col<f64>) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented("fit_weighted"))
    }

    /// Returns the learnable parameter vectors in a fixed, documented order.
    ///
    /// Composing models and optimizers iterate or index this list directly;
    /// the order matches what [`set_parameters`](Model::set_parameters)
    /// expects.
    fn parameters(&self) -> Result<Vec<Col<f64>>, ModelError> {
        Err(ModelError::NotImplemented("parameters"))
    }

    /// Overwrites the parameters from a slice in the order produced by
    /// [`parameters`](Model::parameters). Count or shape mismatches fail
    /// before any parameter is touched.
    fn set_parameters(&mut self, _params: &[Col<f64>]) -> Result<(), ModelError> {
        Err(ModelError::NotImplemented("set_parameters"))
    }
}
