//! # Linear regression
//!
//! Batch gradient descent written purely against the [`NormalizedMatrix`]
//! operator surface, so that the same code trains on a factorized or a
//! materialized design matrix.

use std::sync::Arc;

use log::{debug, info};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::avatar::Avatar;
use crate::error::{MatrixError, Result};
use crate::matrix::NormalizedMatrix;

pub const DEFAULT_ITERATIONS: usize = 20;
pub const DEFAULT_GAMMA: f64 = 1e-6;

pub struct LinearRegressionBuilder {
    iterations: usize,
    gamma: f64,
    seed: Option<u64>,
}

impl Default for LinearRegressionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegressionBuilder {
    pub fn new() -> Self {
        LinearRegressionBuilder {
            iterations: DEFAULT_ITERATIONS,
            gamma: DEFAULT_GAMMA,
            seed: None,
        }
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Learning rate.
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Seed for the random initial weights used when `fit` gets none.
    /// Unseeded models draw from the OS.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> NormalizedLinearRegression {
        NormalizedLinearRegression {
            iterations: self.iterations,
            gamma: self.gamma,
            seed: self.seed,
            weights: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedLinearRegression {
    iterations: usize,
    gamma: f64,
    seed: Option<u64>,
    weights: Option<NormalizedMatrix>,
}

impl NormalizedLinearRegression {
    /// Runs `iterations` steps of `w ← w − γ·Xᵗ(X·w − y)`.
    ///
    /// Without `w_init` the weights start as a `d × 1` standard normal draw
    /// from the configured seed.
    pub fn fit(
        &mut self,
        x: &NormalizedMatrix,
        y: &NormalizedMatrix,
        w_init: Option<&NormalizedMatrix>,
    ) -> Result<&mut Self> {
        let (n, d) = x.shape();
        if y.shape().0 != n {
            return Err(MatrixError::ShapeMismatch {
                op: "fit",
                left: x.shape(),
                right: y.shape(),
            });
        }

        let mut w = match w_init {
            Some(w) => w.clone(),
            None => self.initial_weights(d, x.avatar()),
        };

        info!(
            "fitting linear regression on {:?} {} matrix: {} iterations, gamma {}",
            x.shape(),
            x.representation(),
            self.iterations,
            self.gamma
        );

        // Xᵗ is a view over the same join for factorized inputs
        let xt = x.transpose()?;
        for iteration in 0..self.iterations {
            let residual = x.mul(&w)?.sub(y)?;
            let step = xt.mul(&residual)?.rmul(self.gamma)?;
            w = w.sub(&step)?;
            debug!("iteration {} done", iteration + 1);
        }

        self.weights = Some(w);
        Ok(self)
    }

    /// `X·w`
    pub fn predict(&self, x: &NormalizedMatrix) -> Result<NormalizedMatrix> {
        let w = self.weights.as_ref().ok_or(MatrixError::NotTrained)?;
        x.mul(w)
    }

    pub fn weights(&self) -> Option<&NormalizedMatrix> {
        self.weights.as_ref()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn initial_weights(&self, d: usize, avatar: &Arc<dyn Avatar>) -> NormalizedMatrix {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        let w = Array2::from_shape_fn((d, 1), |_| StandardNormal.sample(&mut rng));
        NormalizedMatrix::dense(w, Arc::clone(avatar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::NdarrayAvatar;
    use crate::matrix::FactorizedBuilder;
    use crate::sparse::indicator_from_indices;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn avatar() -> Arc<dyn Avatar> {
        Arc::new(NdarrayAvatar::new())
    }

    fn weights_of(model: &NormalizedLinearRegression) -> Array2<f64> {
        model.weights().unwrap().to_dense().unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let model = LinearRegressionBuilder::new().build();
        assert_eq!(model.iterations(), 20);
        assert_abs_diff_eq!(model.gamma(), 1e-6);
        assert!(model.weights().is_none());
    }

    #[test]
    fn test_single_step() {
        let avatar = avatar();
        let x = NormalizedMatrix::dense(array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], avatar.clone());
        let y = NormalizedMatrix::dense(array![[1.0], [1.0], [2.0]], avatar.clone());
        let w0 = NormalizedMatrix::dense(Array2::zeros((2, 1)), avatar);

        let mut model = LinearRegressionBuilder::new()
            .iterations(1)
            .gamma(0.1)
            .build();
        model.fit(&x, &y, Some(&w0)).unwrap();

        // Xᵗy = [3, 3]
        let w = weights_of(&model);
        assert_abs_diff_eq!(w[[0, 0]], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(w[[1, 0]], 0.3, epsilon = 1e-12);

        let prediction = model.predict(&x).unwrap().to_dense().unwrap();
        assert_abs_diff_eq!(prediction[[2, 0]], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_iterations_keeps_initial_weights() {
        let avatar = avatar();
        let x = NormalizedMatrix::dense(Array2::ones((3, 2)), avatar.clone());
        let y = NormalizedMatrix::dense(Array2::ones((3, 1)), avatar.clone());
        let w0 = NormalizedMatrix::dense(array![[0.25], [-4.0]], avatar);

        let mut model = LinearRegressionBuilder::new().iterations(0).build();
        model.fit(&x, &y, Some(&w0)).unwrap();
        assert_eq!(weights_of(&model), array![[0.25], [-4.0]]);
    }

    #[test]
    fn test_random_initialization_is_seeded() {
        let avatar = avatar();
        let x = NormalizedMatrix::dense(Array2::ones((4, 3)), avatar.clone());
        let y = NormalizedMatrix::dense(Array2::ones((4, 1)), avatar);

        let mut first = LinearRegressionBuilder::new().iterations(0).seed(7).build();
        let mut second = LinearRegressionBuilder::new().iterations(0).seed(7).build();
        first.fit(&x, &y, None).unwrap();
        second.fit(&x, &y, None).unwrap();

        let w = weights_of(&first);
        assert_eq!(w.dim(), (3, 1));
        assert_eq!(w, weights_of(&second));
    }

    #[test]
    fn test_fit_with_explicit_weights_is_deterministic() {
        let avatar = avatar();
        let k = indicator_from_indices(3, &[2, 0, 1, 1, 0, 2]).unwrap();
        let x = FactorizedBuilder::new()
            .base(array![[1.0], [0.5], [-1.0], [2.0], [0.0], [1.5]])
            .join(k, array![[1.0, 0.0], [0.5, 2.0], [-1.0, 1.0]])
            .avatar(avatar.clone())
            .build()
            .unwrap();
        let y = NormalizedMatrix::dense(
            array![[1.0], [2.0], [0.0], [1.0], [3.0], [-1.0]],
            avatar.clone(),
        );
        let w0 = NormalizedMatrix::dense(array![[0.5], [-0.25], [1.0]], avatar);

        let fit = || {
            let mut model = LinearRegressionBuilder::new()
                .iterations(5)
                .gamma(0.01)
                .build();
            model.fit(&x, &y, Some(&w0)).unwrap();
            weights_of(&model)
        };
        let first = fit();
        let second = fit();

        assert_eq!(first.dim(), (3, 1));
        assert_eq!(first, second);
        assert_ne!(first, w0.to_dense().unwrap());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegressionBuilder::new().build();
        let x = NormalizedMatrix::dense(Array2::ones((2, 2)), avatar());
        assert_eq!(model.predict(&x).unwrap_err(), MatrixError::NotTrained);
        assert_eq!(
            MatrixError::NotTrained.to_string(),
            "You must train the regressor before predicting data!"
        );
    }

    #[test]
    fn test_target_row_mismatch() {
        let avatar = avatar();
        let x = NormalizedMatrix::dense(Array2::ones((3, 2)), avatar.clone());
        let y = NormalizedMatrix::dense(Array2::ones((2, 1)), avatar);
        let mut model = LinearRegressionBuilder::new().build();
        assert!(matches!(
            model.fit(&x, &y, None),
            Err(MatrixError::ShapeMismatch { op: "fit", .. })
        ));
    }

    #[test]
    fn test_factorized_matches_materialized() {
        let avatar = avatar();
        let s = array![[1.0, 0.5], [2.0, -1.0], [0.0, 3.0], [1.5, 1.0], [-2.0, 0.0]];
        let r = array![[1.0], [0.5]];
        let k = indicator_from_indices(2, &[0, 1, 1, 0, 1]).unwrap();
        let f = FactorizedBuilder::new()
            .base(s)
            .join(k, r)
            .avatar(avatar.clone())
            .build()
            .unwrap();
        let d = NormalizedMatrix::dense(f.to_dense().unwrap(), avatar.clone());
        let y = NormalizedMatrix::dense(array![[1.0], [0.0], [2.0], [1.0], [-1.0]], avatar.clone());
        let w0 = NormalizedMatrix::dense(array![[0.1], [0.2], [0.3]], avatar);

        let mut factorized = LinearRegressionBuilder::new().iterations(5).gamma(0.01).build();
        let mut materialized = factorized.clone();
        factorized.fit(&f, &y, Some(&w0)).unwrap();
        materialized.fit(&d, &y, Some(&w0)).unwrap();

        let wf = weights_of(&factorized);
        let wd = weights_of(&materialized);
        for (a, b) in wf.iter().zip(wd.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }

        let pf = factorized.predict(&f).unwrap().to_dense().unwrap();
        let pd = materialized.predict(&d).unwrap().to_dense().unwrap();
        for (a, b) in pf.iter().zip(pd.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }
}
