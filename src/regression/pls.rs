//! Two-target partial least squares regression (NIPALS, PLS2).

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

const MAX_ITER: usize = 500;
const TOLERANCE: f64 = 1e-6;
const EPS: f64 = f64::EPSILON;

// ---------------------------------------------------------------------------
// Fitted model
// ---------------------------------------------------------------------------

/// A fitted PLS model with two outputs.
///
/// Inputs and outputs are standardised internally; `coefficients` maps
/// standardised inputs to standardised outputs, one row per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlsModel {
    pub n_components: usize,
    pub x_mean: Vec<f64>,
    pub x_std: Vec<f64>,
    pub y_mean: [f64; 2],
    pub y_std: [f64; 2],
    pub coefficients: Vec<[f64; 2]>,
}

impl PlsModel {
    /// Number of inputs the model was trained on.
    pub fn n_features(&self) -> usize {
        self.x_mean.len()
    }

    /// Map one feature vector to the two outputs.
    pub fn predict(&self, features: &[f64]) -> Result<(f64, f64)> {
        if features.len() != self.n_features() {
            return Err(BridgeError::DimensionMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let mut acc = [0.0f64; 2];
        for (i, &x) in features.iter().enumerate() {
            let scaled = (x - self.x_mean[i]) / self.x_std[i];
            acc[0] += scaled * self.coefficients[i][0];
            acc[1] += scaled * self.coefficients[i][1];
        }
        Ok((
            acc[0] * self.y_std[0] + self.y_mean[0],
            acc[1] * self.y_std[1] + self.y_mean[1],
        ))
    }

    /// Check that all per-feature vectors agree in length and values are finite.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let p = self.x_mean.len();
        if p == 0 {
            return Err("model has no features".to_string());
        }
        if self.x_std.len() != p || self.coefficients.len() != p {
            return Err(format!(
                "inconsistent feature count: mean {p}, std {}, coefficients {}",
                self.x_std.len(),
                self.coefficients.len()
            ));
        }
        if self.n_components == 0 || self.n_components > p {
            return Err(format!("invalid component count {}", self.n_components));
        }
        let finite = self
            .x_mean
            .iter()
            .chain(&self.x_std)
            .chain(&self.y_mean)
            .chain(&self.y_std)
            .chain(self.coefficients.iter().flatten())
            .all(|v| v.is_finite());
        if !finite {
            return Err("model contains non-finite values".to_string());
        }
        if self.x_std.iter().chain(&self.y_std).any(|&s| s == 0.0) {
            return Err("zero scale".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fit a PLS2 model with `n_components` latent components.
///
/// `x` is samples × features, `y` is samples × 2.
pub fn fit(x: &DMatrix<f64>, y: &DMatrix<f64>, n_components: usize) -> Result<PlsModel> {
    let (n, p) = x.shape();
    if y.nrows() != n || y.ncols() != 2 {
        return Err(BridgeError::Training(format!(
            "target matrix must be {n}x2, got {}x{}",
            y.nrows(),
            y.ncols()
        )));
    }
    if n < 2 {
        return Err(BridgeError::Training(format!(
            "need at least 2 training rows, got {n}"
        )));
    }
    if n_components == 0 || n_components > p {
        return Err(BridgeError::Training(format!(
            "n_components must be in 1..={p}, got {n_components}"
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(BridgeError::Training("input contains non-finite values".to_string()));
    }

    let (mut xk, x_mean, x_std) = standardize(x);
    let (mut yk, y_mean, y_std) = standardize(y);

    let mut weights = DMatrix::<f64>::zeros(p, n_components);
    let mut x_loadings = DMatrix::<f64>::zeros(p, n_components);
    let mut y_loadings = DMatrix::<f64>::zeros(2, n_components);
    let mut fitted = 0;

    for k in 0..n_components {
        if yk.iter().all(|v| v.abs() < EPS) {
            warn!("Y residual is zero after {k} components; stopping early");
            break;
        }

        let w = first_weights(&xk, &yk)?;
        let t = &xk * &w;
        let tt = t.dot(&t);
        if tt < EPS {
            return Err(BridgeError::Training(format!(
                "component {k}: X scores have no variance"
            )));
        }

        let p_k = xk.transpose() * &t / tt;
        let q_k = yk.transpose() * &t / tt;
        xk -= &t * p_k.transpose();
        yk -= &t * q_k.transpose();

        weights.set_column(k, &w);
        x_loadings.set_column(k, &p_k);
        y_loadings.set_column(k, &q_k);
        fitted += 1;
    }

    if fitted == 0 {
        return Err(BridgeError::Training("targets have no variance".to_string()));
    }

    let w = weights.columns(0, fitted).into_owned();
    let pl = x_loadings.columns(0, fitted).into_owned();
    let ql = y_loadings.columns(0, fitted).into_owned();

    // rotations = W (P'W)^-1, coefficients = rotations Q'
    let ptw = pl.transpose() * &w;
    let inv = ptw.try_inverse().ok_or_else(|| {
        BridgeError::Training("loading/weight product is singular".to_string())
    })?;
    let coef = &w * inv * ql.transpose();

    let model = PlsModel {
        n_components: fitted,
        x_mean: x_mean.iter().copied().collect(),
        x_std: x_std.iter().copied().collect(),
        y_mean: [y_mean[0], y_mean[1]],
        y_std: [y_std[0], y_std[1]],
        coefficients: (0..p).map(|i| [coef[(i, 0)], coef[(i, 1)]]).collect(),
    };
    model.validate().map_err(BridgeError::Training)?;
    Ok(model)
}

/// Dominant X weight vector by NIPALS power iteration.
fn first_weights(xk: &DMatrix<f64>, yk: &DMatrix<f64>) -> Result<DVector<f64>> {
    let start = (0..yk.ncols())
        .find(|&j| yk.column(j).iter().any(|v| v.abs() > EPS))
        .ok_or_else(|| BridgeError::Training("Y residual is zero".to_string()))?;
    let mut u: DVector<f64> = yk.column(start).into_owned();

    let mut w_old = DVector::<f64>::from_element(xk.ncols(), 100.0);
    let mut w = w_old.clone();

    for iter in 0..MAX_ITER {
        w = xk.transpose() * &u / u.dot(&u);
        let norm = w.norm();
        if norm < EPS {
            return Err(BridgeError::Training(
                "X residual is orthogonal to Y".to_string(),
            ));
        }
        w /= norm;

        let t = xk * &w;
        let c = yk.transpose() * &t / t.dot(&t);
        u = yk * &c / (c.dot(&c) + EPS);

        let diff = &w - &w_old;
        if diff.dot(&diff) < TOLERANCE {
            debug!("NIPALS converged after {} iterations", iter + 1);
            return Ok(w);
        }
        w_old = w.clone();
    }

    warn!("NIPALS did not converge within {MAX_ITER} iterations");
    Ok(w)
}

/// Centre each column and divide by its sample standard deviation.
/// Zero-variance columns keep a scale of 1.
fn standardize(m: &DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
    let n = m.nrows() as f64;
    let mean = DVector::from_iterator(m.ncols(), m.column_iter().map(|c| c.sum() / n));
    let std = DVector::from_iterator(
        m.ncols(),
        m.column_iter().zip(mean.iter()).map(|(c, &mu)| {
            let ss: f64 = c.iter().map(|v| (v - mu).powi(2)).sum();
            let s = (ss / (n - 1.0)).sqrt();
            if s > 0.0 { s } else { 1.0 }
        }),
    );

    let mut scaled = m.clone();
    for (j, mut col) in scaled.column_iter_mut().enumerate() {
        for v in col.iter_mut() {
            *v = (*v - mean[j]) / std[j];
        }
    }
    (scaled, mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Targets that are exact linear functions of the features.
    fn linear_data(n: usize) -> (DMatrix<f64>, DMatrix<f64>) {
        let x = DMatrix::from_fn(n, 4, |i, j| ((i * 7 + j * 3) % 11) as f64 + (i as f64) * 0.5);
        let y = DMatrix::from_fn(n, 2, |i, j| {
            let row = x.row(i);
            if j == 0 {
                2.0 * row[0] - row[1] + 5.0
            } else {
                0.5 * row[2] + 0.25 * row[3] - 1.0
            }
        });
        (x, y)
    }

    #[test]
    fn recovers_linear_relationship_with_full_rank() {
        let (x, y) = linear_data(30);
        let model = fit(&x, &y, 4).unwrap();
        for i in 0..30 {
            let features: Vec<f64> = x.row(i).iter().copied().collect();
            let (a, b) = model.predict(&features).unwrap();
            assert_relative_eq!(a, y[(i, 0)], epsilon = 1e-6);
            assert_relative_eq!(b, y[(i, 1)], epsilon = 1e-6);
        }
    }

    #[test]
    fn two_components_predict_the_mean_for_mean_input() {
        let (x, y) = linear_data(20);
        let model = fit(&x, &y, 2).unwrap();
        assert_eq!(model.n_components, 2);
        let (a, b) = model.predict(&model.x_mean.clone()).unwrap();
        assert_relative_eq!(a, model.y_mean[0], epsilon = 1e-9);
        assert_relative_eq!(b, model.y_mean[1], epsilon = 1e-9);
    }

    #[test]
    fn wrong_input_length_is_rejected() {
        let (x, y) = linear_data(10);
        let model = fit(&x, &y, 2).unwrap();
        let err = model.predict(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::DimensionMismatch { expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn degenerate_inputs_fail_to_train() {
        let x = DMatrix::from_element(1, 3, 1.0);
        let y = DMatrix::from_element(1, 2, 1.0);
        assert!(matches!(fit(&x, &y, 2), Err(BridgeError::Training(_))));

        let (x, y) = linear_data(10);
        assert!(matches!(fit(&x, &y, 5), Err(BridgeError::Training(_))));

        let flat_y = DMatrix::from_element(10, 2, 3.0);
        assert!(matches!(fit(&x, &flat_y, 2), Err(BridgeError::Training(_))));
    }

    #[test]
    fn constant_feature_column_is_tolerated() {
        let (mut x, y) = linear_data(25);
        x.set_column(3, &DVector::from_element(25, 7.0));
        let model = fit(&x, &y, 2).unwrap();
        assert_eq!(model.x_std[3], 1.0);
        assert!(model.validate().is_ok());
    }
}
