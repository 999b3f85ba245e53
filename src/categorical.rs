//! Discrete emission distribution over a fixed, finite set of categories.

use faer::{Col, ColRef};
use itertools::izip;
use rand::Rng;
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, StandardUniform};

use crate::math::{logsumexp, softmax};
use crate::model::{Model, ModelError};

/// Categorical emission model over `K` categories.
///
/// Parameterized by a length-`K` vector of logits (unnormalized
/// log-probabilities). `K` is fixed at construction and never changes; every
/// mutating operation replaces the logits wholesale.
#[derive(Debug, Clone)]
pub struct CategoricalModel {
    logits: Col<f64>,
}

impl CategoricalModel {
    /// Builds a model from exactly one of `probs` or `logits`.
    ///
    /// Supplying both or neither is an error. Probabilities are stored as
    /// their natural log, so zero-probability categories get `-inf` logits.
    pub fn new(probs: Option<Col<f64>>, logits: Option<Col<f64>>) -> Result<Self, ModelError> {
        match (probs, logits) {
            (Some(_), Some(_)) => Err(ModelError::BothProbsAndLogits),
            (Some(probs), None) => Ok(Self::from_probs(probs)),
            (None, Some(logits)) => Ok(Self::from_logits(logits)),
            (None, None) => Err(ModelError::MissingProbsAndLogits),
        }
    }

    /// Builds a model from a probability vector (need not be normalized).
    pub fn from_probs(probs: Col<f64>) -> Self {
        let mut logits = probs;
        faer::zip!(&mut logits).for_each(|faer::unzip!(val)| *val = val.ln());
        Self { logits }
    }

    /// Builds a model directly from a logit vector.
    pub fn from_logits(logits: Col<f64>) -> Self {
        Self { logits }
    }

    /// Number of categories `K`.
    pub fn num_categories(&self) -> usize {
        self.logits.nrows()
    }

    /// Current logits.
    pub fn logits(&self) -> &Col<f64> {
        &self.logits
    }

    fn logits_slice(&self) -> &[f64] {
        // An owned Col is always col-major.
        self.logits.try_as_col_major().unwrap().as_slice()
    }

    fn set_logits_from_counts(&mut self, counts: &[f64]) {
        let total: f64 = counts.iter().sum();
        // total == 0 leaves NaN logits (0/0); callers must fit non-empty
        // data covering the support.
        self.logits = Col::from_fn(counts.len(), |i| (counts[i] / total).ln());
    }
}

impl Model for CategoricalModel {
    type Sample = Vec<usize>;
    type Data = [usize];

    /// Draws uniform noise per category, normalizes it with a softmax and
    /// stores the log. The result is always a valid categorical distribution.
    fn init_params_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ModelError> {
        let num_categories = self.num_categories();
        let noise: Vec<f64> = (0..num_categories)
            .map(|_| rng.sample(StandardUniform))
            .collect();
        let mut probs = vec![0f64; num_categories];
        softmax(&noise, &mut probs);
        self.logits = Col::from_fn(num_categories, |i| probs[i].ln());
        Ok(())
    }

    /// Draws `n` independent category indices.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<Vec<usize>, ModelError> {
        let mut probs = vec![0f64; self.num_categories()];
        softmax(self.logits_slice(), &mut probs);
        let dist = WeightedIndex::new(&probs).map_err(|_| ModelError::DegenerateDistribution)?;
        Ok((0..n).map(|_| dist.sample(rng)).collect())
    }

    /// Log-softmax lookup: `logits[i] - logsumexp(logits)` per index.
    fn log_prob(&self, value: &[usize]) -> Result<Col<f64>, ModelError> {
        let logits = self.logits_slice();
        let norm = logsumexp(logits);
        let logprobs = value
            .iter()
            .map(|&index| match logits.get(index) {
                Some(logit) => Ok(logit - norm),
                None => Err(ModelError::CategoryOutOfRange {
                    index,
                    num_categories: logits.len(),
                }),
            })
            .collect::<Result<Vec<f64>, _>>()?;
        Ok(ColRef::from_slice(&logprobs).to_owned())
    }

    /// Replaces the logits with the log of the empirical category
    /// frequencies of `data`. Unobserved categories get probability zero
    /// (`-inf` logits).
    fn fit(&mut self, data: &[usize]) -> Result<(), ModelError> {
        let num_categories = self.num_categories();
        let mut counts = vec![0f64; num_categories];
        for &index in data {
            match counts.get_mut(index) {
                Some(count) => *count += 1.,
                None => {
                    return Err(ModelError::CategoryOutOfRange {
                        index,
                        num_categories,
                    })
                }
            }
        }
        self.set_logits_from_counts(&counts);
        Ok(())
    }

    /// Weighted variant of [`fit`](Model::fit): each observation adds its
    /// weight to its category instead of a unit count.
    fn fit_weighted(&mut self, data: &[usize], weights: &Col<f64>) -> Result<(), ModelError> {
        if weights.nrows() != data.len() {
            return Err(ModelError::ShapeMismatch {
                expected: data.len(),
                actual: weights.nrows(),
            });
        }
        let num_categories = self.num_categories();
        let weights = weights.try_as_col_major().unwrap().as_slice();
        let mut counts = vec![0f64; num_categories];
        for (&index, &weight) in izip!(data, weights) {
            match counts.get_mut(index) {
                Some(count) => *count += weight,
                None => {
                    return Err(ModelError::CategoryOutOfRange {
                        index,
                        num_categories,
                    })
                }
            }
        }
        self.set_logits_from_counts(&counts);
        Ok(())
    }

    /// Single parameter vector, order `[logits]`.
    fn parameters(&self) -> Result<Vec<Col<f64>>, ModelError> {
        Ok(vec![self.logits.clone()])
    }

    fn set_parameters(&mut self, params: &[Col<f64>]) -> Result<(), ModelError> {
        let [logits] = params else {
            return Err(ModelError::ParameterCount {
                expected: 1,
                actual: params.len(),
            });
        };
        if logits.nrows() != self.num_categories() {
            return Err(ModelError::ShapeMismatch {
                expected: self.num_categories(),
                actual: logits.nrows(),
            });
        }
        self.logits = logits.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn probs_col(probs: &[f64]) -> Col<f64> {
        ColRef::from_slice(probs).to_owned()
    }

    #[test]
    fn both_or_neither_fails() {
        let probs = probs_col(&[0.5, 0.5]);
        assert!(matches!(
            CategoricalModel::new(Some(probs.clone()), Some(probs.clone())),
            Err(ModelError::BothProbsAndLogits)
        ));
        assert!(matches!(
            CategoricalModel::new(None, None),
            Err(ModelError::MissingProbsAndLogits)
        ));
        assert!(CategoricalModel::new(Some(probs), None).is_ok());
    }

    #[test]
    fn probs_and_logits_paths_agree() {
        let probs = [0.2, 0.3, 0.5];
        let from_probs = CategoricalModel::from_probs(probs_col(&probs));
        let logits: Vec<f64> = probs.iter().map(|p| p.ln()).collect();
        let from_logits = CategoricalModel::from_logits(probs_col(&logits));

        let values = [0usize, 1, 2];
        let a = from_probs.log_prob(&values).unwrap();
        let b = from_logits.log_prob(&values).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn log_prob_matches_probs() {
        // Unnormalized probs must be normalized by log_prob.
        let model = CategoricalModel::from_probs(probs_col(&[2., 3., 5.]));
        let logprobs = model.log_prob(&[0, 1, 2]).unwrap();
        assert_abs_diff_eq!(logprobs[0], 0.2f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(logprobs[1], 0.3f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(logprobs[2], 0.5f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn log_prob_rejects_out_of_range() {
        let model = CategoricalModel::from_probs(probs_col(&[0.5, 0.5]));
        assert!(matches!(
            model.log_prob(&[2]),
            Err(ModelError::CategoryOutOfRange {
                index: 2,
                num_categories: 2
            })
        ));
    }

    #[test]
    fn fit_counts_categories() {
        let mut model = CategoricalModel::from_probs(probs_col(&[1., 1., 1.]));
        model.fit(&[0, 0, 1, 1, 1, 2]).unwrap();
        let logprobs = model.log_prob(&[0, 1, 2]).unwrap();
        assert_abs_diff_eq!(logprobs[0], (2f64 / 6.).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(logprobs[1], 0.5f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(logprobs[2], (1f64 / 6.).ln(), epsilon = 1e-12);
    }

    #[test]
    fn fit_gives_unseen_categories_zero_mass() {
        let mut model = CategoricalModel::from_probs(probs_col(&[1., 1., 1.]));
        model.fit(&[0, 0, 1]).unwrap();
        let logprobs = model.log_prob(&[2]).unwrap();
        assert_eq!(logprobs[0], f64::NEG_INFINITY);
    }

    #[test]
    fn fit_rejects_out_of_range_before_mutation() {
        let mut model = CategoricalModel::from_probs(probs_col(&[0.25, 0.75]));
        let before = model.parameters().unwrap();
        assert!(model.fit(&[0, 5]).is_err());
        let after = model.parameters().unwrap();
        for (x, y) in before[0].iter().zip(after[0].iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn fit_weighted_uniform_matches_fit() {
        let data = [0usize, 0, 1, 1, 1, 2];
        let mut fitted = CategoricalModel::from_probs(probs_col(&[1., 1., 1.]));
        fitted.fit(&data).unwrap();
        let mut weighted = CategoricalModel::from_probs(probs_col(&[1., 1., 1.]));
        weighted
            .fit_weighted(&data, &Col::full(data.len(), 0.5))
            .unwrap();

        let values = [0usize, 1, 2];
        let a = fitted.log_prob(&values).unwrap();
        let b = weighted.log_prob(&values).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn init_params_random_is_normalized() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut model = CategoricalModel::from_probs(probs_col(&[0.1, 0.2, 0.3, 0.4]));
        model.init_params_random(&mut rng).unwrap();
        let logits = model.logits();
        assert!(logits.iter().all(|val| val.is_finite()));
        let total: f64 = logits.iter().map(|val| val.exp()).sum();
        assert_abs_diff_eq!(total, 1., epsilon = 1e-10);
    }

    #[test]
    fn sample_returns_requested_count() {
        let mut rng = SmallRng::seed_from_u64(3);
        let model = CategoricalModel::from_probs(probs_col(&[0.3, 0.7]));
        let draws = model.sample(&mut rng, 17).unwrap();
        assert_eq!(draws.len(), 17);
        assert!(draws.iter().all(|&idx| idx < 2));
        assert_eq!(model.sample(&mut rng, 1).unwrap().len(), 1);
    }

    #[test]
    fn sample_skips_zero_mass_categories() {
        let mut rng = SmallRng::seed_from_u64(7);
        let model = CategoricalModel::from_probs(probs_col(&[0.5, 0., 0.5]));
        let draws = model.sample(&mut rng, 200).unwrap();
        assert!(draws.iter().all(|&idx| idx != 1));
    }

    #[test]
    fn sample_fails_on_degenerate_weights() {
        let model = CategoricalModel::from_probs(probs_col(&[0., 0.]));
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(matches!(
            model.sample(&mut rng, 1),
            Err(ModelError::DegenerateDistribution)
        ));
    }

    #[test]
    fn set_parameters_round_trip() {
        let model = CategoricalModel::from_probs(probs_col(&[0.2, 0.3, 0.5]));
        let mut other = CategoricalModel::from_probs(probs_col(&[1., 1., 1.]));
        other.set_parameters(&model.parameters().unwrap()).unwrap();
        let values = [0usize, 1, 2];
        let a = model.log_prob(&values).unwrap();
        let b = other.log_prob(&values).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn set_parameters_checks_count_and_shape() {
        let mut model = CategoricalModel::from_probs(probs_col(&[0.5, 0.5]));
        assert!(matches!(
            model.set_parameters(&[]),
            Err(ModelError::ParameterCount {
                expected: 1,
                actual: 0
            })
        ));
        assert!(matches!(
            model.set_parameters(&[Col::zeros(3)]),
            Err(ModelError::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
