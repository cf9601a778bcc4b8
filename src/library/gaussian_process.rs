//! Exact Gaussian Process regression over a single input dimension.
//!
//! The prior has zero mean and a squared exponential (RBF) covariance. Observations are
//! assumed to carry independent Gaussian noise. Kernel and noise parameters are fixed
//! by the caller; nothing here tunes them.

use itertools::Itertools;
use ndarray::{s, Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpError {
    #[error("Cannot fit a Gaussian Process to zero observations")]
    EmptyInputError,

    #[error("Inputs have {x} rows but outputs have {y} rows")]
    ShapeMismatchError { x: usize, y: usize },

    #[error("Expected a single column, got {0}")]
    ColumnCountError(usize),

    #[error("{name} must be positive and finite, got {value}")]
    InvalidParameterError { name: &'static str, value: f64 },

    #[error("Covariance matrix is not positive definite")]
    NotPositiveDefiniteError,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RbfKernel {
    pub variance: f64,
    pub lengthscale: f64,
}

impl RbfKernel {
    pub fn new(variance: f64, lengthscale: f64) -> Result<Self, GpError> {
        check_positive("kernel variance", variance)?;
        check_positive("lengthscale", lengthscale)?;

        Ok(Self { variance, lengthscale })
    }

    /// `variance * exp(-(a - b)^2 / (2 * lengthscale^2))`
    pub fn eval(&self, a: f64, b: f64) -> f64 {
        let r = (a - b) / self.lengthscale;
        self.variance * (-0.5 * r * r).exp()
    }

    pub fn matrix(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
        Array2::from_shape_fn((a.len(), b.len()), |(i, j)| self.eval(a[i], b[j]))
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), GpError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GpError::InvalidParameterError { name, value })
    }
}

fn single_column(arr: &Array2<f64>) -> Result<ArrayView1<'_, f64>, GpError> {
    match arr.ncols() {
        1 => Ok(arr.column(0)),
        n => Err(GpError::ColumnCountError(n)),
    }
}

/// Mean and variance of the predictive distribution at a set of points.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub mean: Array1<f64>,
    pub variance: Array1<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn std_dev(&self) -> Array1<f64> {
        self.variance.mapv(f64::sqrt)
    }
}

#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernel: RbfKernel,
    noise_variance: f64,
    // distinct observation locations, ascending
    x: Array1<f64>,
    // mean of the observations at each location
    y: Array1<f64>,
    // lower cholesky factor of K + noise * diag(1 / count)
    chol: Array2<f64>,
    // (K + noise * diag(1 / count))^-1 y
    alpha: Array1<f64>,
    // log likelihood of the observations' spread around their location means
    replicate_log_lik: f64,
}

impl GaussianProcess {
    /// Condition the prior on observations `y` at locations `x`. Both are `N x 1`.
    ///
    /// Observations sharing a location are replaced by their mean, observed with the noise
    /// variance divided by their count. The posterior is unchanged but the covariance matrix
    /// only grows with the number of distinct locations.
    pub fn fit(x: &Array2<f64>, y: &Array2<f64>, kernel: RbfKernel, noise_variance: f64) -> Result<Self, GpError> {
        check_positive("noise variance", noise_variance)?;
        let x = single_column(x)?;
        let y = single_column(y)?;

        if x.len() != y.len() {
            return Err(GpError::ShapeMismatchError { x: x.len(), y: y.len() });
        }
        if x.is_empty() {
            return Err(GpError::EmptyInputError);
        }

        let mut pairs = x.iter().copied().zip(y.iter().copied()).collect::<Vec<_>>();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut locations = vec![];
        let mut means = vec![];
        let mut counts = vec![];
        let mut replicate_log_lik = 0.0;

        let log_2pi_noise = (2.0 * std::f64::consts::PI * noise_variance).ln();
        let groups = pairs.iter().group_by(|&&(xi, _)| xi);
        for (location, group) in &groups {
            let ys = group.map(|&(_, yi)| yi).collect::<Vec<_>>();
            let count = ys.len() as f64;
            let mean = ys.iter().sum::<f64>() / count;
            let spread = ys.iter().map(|yi| (yi - mean).powi(2)).sum::<f64>();

            replicate_log_lik +=
                -0.5 * spread / noise_variance - 0.5 * (count - 1.0) * log_2pi_noise - 0.5 * count.ln();

            locations.push(location);
            means.push(mean);
            counts.push(count);
        }

        let x = Array1::from(locations);
        let y = Array1::from(means);

        let mut cov = kernel.matrix(x.view(), x.view());
        for (v, count) in cov.diag_mut().iter_mut().zip(&counts) {
            *v += noise_variance / count;
        }

        let chol = cholesky(&cov)?;
        let alpha = solve_upper_transposed(&chol, solve_lower(&chol, y.view()).view());

        trace!(target: "gp",
            "Fitted GP to {} observations at {} locations",
            pairs.len(),
            x.len()
        );

        Ok(Self {
            kernel,
            noise_variance,
            x,
            y,
            chol,
            alpha,
            replicate_log_lik,
        })
    }

    pub fn kernel(&self) -> RbfKernel {
        self.kernel
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Predictive mean and variance at each row of `x_new` (`M x 1`). The variance is that
    /// of a new noisy observation, so it never drops below the noise variance.
    pub fn predict(&self, x_new: &Array2<f64>) -> Result<Prediction, GpError> {
        let x_new = single_column(x_new)?;

        let mut mean = Vec::with_capacity(x_new.len());
        let mut variance = Vec::with_capacity(x_new.len());

        x_new
            .to_vec()
            .into_par_iter()
            .map(|xp| {
                let k_star = self.x.mapv(|xi| self.kernel.eval(xp, xi));
                let v = solve_lower(&self.chol, k_star.view());
                let latent_var = (self.kernel.variance - v.dot(&v)).max(0.0);

                (k_star.dot(&self.alpha), latent_var + self.noise_variance)
            })
            .unzip_into_vecs(&mut mean, &mut variance);

        Ok(Prediction {
            mean: Array1::from(mean),
            variance: Array1::from(variance),
        })
    }

    /// Log likelihood of every fitted observation under the prior and noise model.
    pub fn log_marginal_likelihood(&self) -> f64 {
        let m = self.y.len() as f64;
        let data_fit = -0.5 * self.y.dot(&self.alpha);
        let complexity: f64 = self.chol.diag().iter().map(|d| d.ln()).sum();

        data_fit - complexity - 0.5 * m * (2.0 * std::f64::consts::PI).ln() + self.replicate_log_lik
    }
}

fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>, GpError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for j in 0..n {
        let diag = a[[j, j]] - l.slice(s![j, ..j]).dot(&l.slice(s![j, ..j]));
        if !(diag > 0.0 && diag.is_finite()) {
            return Err(GpError::NotPositiveDefiniteError);
        }
        let l_jj = diag.sqrt();
        l[[j, j]] = l_jj;

        for i in (j + 1)..n {
            let dot = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
            l[[i, j]] = (a[[i, j]] - dot) / l_jj;
        }
    }

    Ok(l)
}

// solves L z = b
fn solve_lower(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let dot = l.slice(s![i, ..i]).dot(&z.slice(s![..i]));
        z[i] = (b[i] - dot) / l[[i, i]];
    }
    z
}

// solves L^T x = z
fn solve_upper_transposed(l: &Array2<f64>, z: ArrayView1<f64>) -> Array1<f64> {
    let n = z.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let dot = l.slice(s![(i + 1).., i]).dot(&x.slice(s![(i + 1)..]));
        x[i] = (z[i] - dot) / l[[i, i]];
    }
    x
}
