//! Continuous emission distribution: a Gaussian with diagonal covariance.

use std::f64::consts::PI;

use faer::{Col, ColRef, Mat};
use itertools::izip;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::model::{Model, ModelError};

/// Diagonal-covariance Gaussian emission model over `D`-dimensional vectors.
///
/// Parameterized by per-dimension means and variances; dimensions are
/// independent. The dimensionality is fixed at construction.
///
/// The `covs` vector is treated as a variance vector but is never validated
/// as non-negative. `sample` and `log_prob` take the absolute value of each
/// entry, so ill-signed variances are coerced at use time rather than
/// rejected.
///
/// Observation batches are `Mat<f64>` with `D` rows and one column per
/// observation.
#[derive(Debug, Clone)]
pub struct DiagNormalModel {
    means: Col<f64>,
    covs: Col<f64>,
}

impl DiagNormalModel {
    /// Builds a model from per-dimension means and variances.
    ///
    /// Fails if the two vectors differ in length.
    pub fn new(means: Col<f64>, covs: Col<f64>) -> Result<Self, ModelError> {
        if means.nrows() != covs.nrows() {
            return Err(ModelError::ShapeMismatch {
                expected: means.nrows(),
                actual: covs.nrows(),
            });
        }
        Ok(Self { means, covs })
    }

    /// Event dimensionality `D`.
    pub fn dim(&self) -> usize {
        self.means.nrows()
    }

    /// Current per-dimension means.
    pub fn means(&self) -> &Col<f64> {
        &self.means
    }

    /// Current per-dimension variances (unvalidated, see the type docs).
    pub fn covs(&self) -> &Col<f64> {
        &self.covs
    }

    fn means_slice(&self) -> &[f64] {
        self.means.try_as_col_major().unwrap().as_slice()
    }

    fn covs_slice(&self) -> &[f64] {
        self.covs.try_as_col_major().unwrap().as_slice()
    }
}

impl Model for DiagNormalModel {
    type Sample = Mat<f64>;
    type Data = Mat<f64>;

    /// Resets to an arbitrary valid Gaussian: standard-normal means and
    /// log-normal variances, independent of the previous parameters.
    fn init_params_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ModelError> {
        let dim = self.dim();
        self.means = Col::from_fn(dim, |_| rng.sample(StandardNormal));
        self.covs = Col::from_fn(dim, |_| {
            let draw: f64 = rng.sample(StandardNormal);
            draw.exp()
        });
        Ok(())
    }

    /// Draws `n` vectors, returned as a `D x n` matrix with one draw per
    /// column.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<Mat<f64>, ModelError> {
        let means = self.means_slice();
        let covs = self.covs_slice();
        Ok(Mat::from_fn(self.dim(), n, |row, _| {
            let draw: f64 = rng.sample(StandardNormal);
            means[row] + covs[row].abs().sqrt() * draw
        }))
    }

    /// Per-column log-density under `N(means, diag(|covs|))`.
    fn log_prob(&self, value: &Mat<f64>) -> Result<Col<f64>, ModelError> {
        if value.nrows() != self.dim() {
            return Err(ModelError::ShapeMismatch {
                expected: self.dim(),
                actual: value.nrows(),
            });
        }
        let means = self.means_slice();
        let covs = self.covs_slice();
        let log_det: f64 = covs.iter().map(|cov| cov.abs().ln()).sum();
        let norm = -0.5 * (self.dim() as f64 * (2. * PI).ln() + log_det);
        let logprobs: Vec<f64> = value
            .col_iter()
            .map(|obs| {
                let quad: f64 = izip!(obs.iter(), means, covs)
                    .map(|(&x, &mean, &cov)| {
                        let diff = x - mean;
                        diff * diff / cov.abs()
                    })
                    .sum();
                norm - 0.5 * quad
            })
            .collect();
        Ok(ColRef::from_slice(&logprobs).to_owned())
    }

    /// Sets means to the per-dimension sample mean and variances to the
    /// unbiased sample variance (N - 1 denominator). A batch with fewer than
    /// two observations leaves non-finite variances.
    fn fit(&mut self, data: &Mat<f64>) -> Result<(), ModelError> {
        if data.nrows() != self.dim() {
            return Err(ModelError::ShapeMismatch {
                expected: self.dim(),
                actual: data.nrows(),
            });
        }
        let count = data.ncols() as f64;
        let means: Vec<f64> = (0..self.dim())
            .map(|row| data.row(row).sum() / count)
            .collect();
        let covs: Vec<f64> = (0..self.dim())
            .map(|row| {
                let mean = means[row];
                data.row(row)
                    .iter()
                    .map(|&x| (x - mean) * (x - mean))
                    .sum::<f64>()
                    / (count - 1.)
            })
            .collect();
        self.means = ColRef::from_slice(&means).to_owned();
        self.covs = ColRef::from_slice(&covs).to_owned();
        Ok(())
    }

    /// Weighted mean and variance, both normalized by the total weight. Note
    /// the denominator differs from the unweighted [`fit`](Model::fit); with
    /// posterior responsibilities this is the usual EM M-step.
    fn fit_weighted(&mut self, data: &Mat<f64>, weights: &Col<f64>) -> Result<(), ModelError> {
        if data.nrows() != self.dim() {
            return Err(ModelError::ShapeMismatch {
                expected: self.dim(),
                actual: data.nrows(),
            });
        }
        if weights.nrows() != data.ncols() {
            return Err(ModelError::ShapeMismatch {
                expected: data.ncols(),
                actual: weights.nrows(),
            });
        }
        let weights = weights.try_as_col_major().unwrap().as_slice();
        let total: f64 = weights.iter().sum();
        let means: Vec<f64> = (0..self.dim())
            .map(|row| {
                izip!(data.row(row).iter(), weights)
                    .map(|(&x, &w)| w * x)
                    .sum::<f64>()
                    / total
            })
            .collect();
        let covs: Vec<f64> = (0..self.dim())
            .map(|row| {
                let mean = means[row];
                izip!(data.row(row).iter(), weights)
                    .map(|(&x, &w)| w * (x - mean) * (x - mean))
                    .sum::<f64>()
                    / total
            })
            .collect();
        self.means = ColRef::from_slice(&means).to_owned();
        self.covs = ColRef::from_slice(&covs).to_owned();
        Ok(())
    }

    /// Two parameter vectors, order `[means, covs]`.
    fn parameters(&self) -> Result<Vec<Col<f64>>, ModelError> {
        Ok(vec![self.means.clone(), self.covs.clone()])
    }

    fn set_parameters(&mut self, params: &[Col<f64>]) -> Result<(), ModelError> {
        let [means, covs] = params else {
            return Err(ModelError::ParameterCount {
                expected: 2,
                actual: params.len(),
            });
        };
        for param in [means, covs] {
            if param.nrows() != self.dim() {
                return Err(ModelError::ShapeMismatch {
                    expected: self.dim(),
                    actual: param.nrows(),
                });
            }
        }
        self.means = means.clone();
        self.covs = covs.clone();
        Ok(())
    }
}
