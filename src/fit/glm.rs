//! Maximum-likelihood fitting of one (feature, family) pair.
//!
//! Each family is fit against the shared design matrix with its natural
//! link: Gaussian and log-normal by QR least squares, Poisson, negative
//! binomial, gamma and beta by IRLS with family-specific working weights,
//! Student-t by reweighted least squares. Nuisance parameters (dispersion,
//! precision, scale) are estimated by method of moments alongside the
//! coefficient updates.
//!
//! Every fitter checks a cooperative deadline once per iteration so a caller
//! can bound the wall-clock cost of an attempt.

use crate::data::DesignMatrix;
use crate::family::FamilySpec;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{Continuous, StudentsT};
use std::time::{Duration, Instant};

/// Maximum IRLS iterations.
const MAX_ITER: usize = 50;

/// Convergence tolerance for relative coefficient changes.
const TOL: f64 = 1e-8;

/// Minimum value for a fitted mean to avoid log(0).
const MIN_MU: f64 = 1e-10;

/// Degrees of freedom for the Student-t family (fixed, heavy-tailed).
const T_DF: f64 = 5.0;

/// Wall-clock bound checked cooperatively inside the fitting loops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now().checked_add(budget))
    }

    /// No bound.
    pub fn unbounded() -> Self {
        Self(None)
    }

    /// True once the budget has elapsed.
    pub fn expired(&self) -> bool {
        self.0.is_some_and(|t| Instant::now() >= t)
    }
}

/// Why a fitting attempt produced no model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFailure {
    /// Too few valid observations to identify the coefficients.
    TooFewObservations,
    /// Iteration limit reached without meeting the tolerance.
    NonConverged,
    /// Weighted cross-product matrix not invertible.
    Singular,
    /// The wall-clock budget expired mid-fit.
    Expired,
}

/// A fitted model for one feature under one family.
#[derive(Debug, Clone)]
pub struct FittedModel {
    /// Family that was fit.
    pub family: FamilySpec,
    /// Fitted coefficients, in design-matrix column order.
    pub coefficients: Vec<f64>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Coefficient covariance, derived from the QR factorization of the
    /// weighted design.
    pub covariance: DMatrix<f64>,
    /// Log-likelihood at the solution.
    pub log_likelihood: f64,
    /// Estimated parameters: coefficients plus nuisance.
    pub n_params: usize,
    /// Number of valid observations used.
    pub n_obs: usize,
    /// Residual degrees of freedom.
    pub df_residual: usize,
    /// Family nuisance parameter (dispersion, precision or scale).
    pub dispersion: f64,
    /// Fitted means, one per valid observation.
    pub fitted_values: Vec<f64>,
    /// Standardized (Pearson) residuals, one per valid observation.
    pub residuals: Vec<f64>,
    /// Iterations to convergence.
    pub iterations: usize,
}

struct RawFit {
    beta: DVector<f64>,
    covariance: DMatrix<f64>,
    log_likelihood: f64,
    dispersion: f64,
    fitted: DVector<f64>,
    residuals: Vec<f64>,
    iterations: usize,
}

/// Fit `family` to the transformed values of one feature.
///
/// `NaN` entries in `y` mark invalid observations; the matching design rows
/// are dropped before fitting. The deadline is checked before work starts
/// and once per iteration.
pub fn attempt_fit(
    y: &[f64],
    design: &DesignMatrix,
    family: FamilySpec,
    deadline: Deadline,
) -> Result<FittedModel, FitFailure> {
    if deadline.expired() {
        return Err(FitFailure::Expired);
    }

    let valid: Vec<usize> = (0..y.len()).filter(|&i| y[i].is_finite()).collect();
    let n = valid.len();
    let p = design.n_coefficients();
    if n <= p {
        return Err(FitFailure::TooFewObservations);
    }

    let x_full = design.matrix();
    let x = DMatrix::from_fn(n, p, |i, j| x_full[(valid[i], j)]);
    let yv = DVector::from_iterator(n, valid.iter().map(|&i| y[i]));

    let raw = match family {
        FamilySpec::Gaussian => fit_gaussian(&yv, &x, deadline)?,
        FamilySpec::LogNormal => fit_lognormal(&yv, &x, deadline)?,
        FamilySpec::Poisson => fit_poisson(&yv, &x, deadline)?,
        FamilySpec::NegativeBinomial => fit_nbinom(&yv, &x, deadline)?,
        FamilySpec::Gamma => fit_gamma(&yv, &x, deadline)?,
        FamilySpec::Beta => fit_beta(&yv, &x, deadline)?,
        FamilySpec::StudentT => fit_student_t(&yv, &x, deadline)?,
    };

    Ok(FittedModel {
        family,
        coefficients: raw.beta.iter().copied().collect(),
        coefficient_names: design.coefficient_names().to_vec(),
        covariance: raw.covariance,
        log_likelihood: raw.log_likelihood,
        n_params: p + family.n_nuisance(),
        n_obs: n,
        df_residual: n - p,
        dispersion: raw.dispersion,
        fitted_values: raw.fitted.iter().copied().collect(),
        residuals: raw.residuals,
        iterations: raw.iterations,
    })
}

/// Solve a weighted least-squares system through the thin QR factorization
/// of `sqrt(W) X`, returning the solution and the unscaled `(X'WX)^-1`.
fn weighted_qr_solve(
    x: &DMatrix<f64>,
    z: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let n = x.nrows();
    let p = x.ncols();
    let mut xw = x.clone();
    let mut zw = z.clone();
    for i in 0..n {
        let s = w[i].max(0.0).sqrt();
        for j in 0..p {
            xw[(i, j)] *= s;
        }
        zw[i] *= s;
    }

    let qr = xw.qr();
    let r = qr.r();
    for j in 0..p {
        if r[(j, j)].abs() < 1e-10 {
            return None;
        }
    }
    let qtz = qr.q().transpose() * zw;
    let beta = r.solve_upper_triangular(&qtz)?;
    let r_inv = r.solve_upper_triangular(&DMatrix::identity(p, p))?;
    let cov = &r_inv * r_inv.transpose();
    Some((beta, cov))
}

/// `(X'WX)^-1` at the final weights, for standard errors.
fn weighted_cross_inverse(x: &DMatrix<f64>, w: &DVector<f64>) -> Option<DMatrix<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    let mut xw = x.clone();
    for i in 0..n {
        let s = w[i].max(0.0).sqrt();
        for j in 0..p {
            xw[(i, j)] *= s;
        }
    }
    let qr = xw.qr();
    let r = qr.r();
    for j in 0..p {
        if r[(j, j)].abs() < 1e-10 {
            return None;
        }
    }
    let r_inv = r.solve_upper_triangular(&DMatrix::identity(p, p))?;
    Some(&r_inv * r_inv.transpose())
}

fn fit_gaussian(y: &DVector<f64>, x: &DMatrix<f64>, deadline: Deadline) -> Result<RawFit, FitFailure> {
    if deadline.expired() {
        return Err(FitFailure::Expired);
    }
    let n = y.len();
    let p = x.ncols();
    let ones = DVector::from_element(n, 1.0);
    let (beta, cov_unscaled) = weighted_qr_solve(x, y, &ones).ok_or(FitFailure::Singular)?;

    let fitted = x * &beta;
    let resid = y - &fitted;
    let rss = resid.norm_squared();
    let df = (n - p) as f64;
    let s2 = rss / df;
    if !(s2 > 0.0) {
        return Err(FitFailure::Singular);
    }
    let sigma = s2.sqrt();
    let sigma2_ml = rss / n as f64;
    let log_likelihood =
        -0.5 * n as f64 * ((2.0 * std::f64::consts::PI * sigma2_ml).ln() + 1.0);

    Ok(RawFit {
        beta,
        covariance: cov_unscaled * s2,
        log_likelihood,
        dispersion: sigma,
        residuals: resid.iter().map(|r| r / sigma).collect(),
        fitted,
        iterations: 1,
    })
}

fn fit_lognormal(
    y: &DVector<f64>,
    x: &DMatrix<f64>,
    deadline: Deadline,
) -> Result<RawFit, FitFailure> {
    // Least squares on the log scale; the Jacobian of the log transform
    // enters the likelihood.
    let ln_y = y.map(|v| v.ln());
    let mut raw = fit_gaussian(&ln_y, x, deadline)?;
    raw.log_likelihood -= ln_y.iter().sum::<f64>();
    raw.fitted = raw.fitted.map(|eta| eta.exp());
    Ok(raw)
}

fn fit_poisson(y: &DVector<f64>, x: &DMatrix<f64>, deadline: Deadline) -> Result<RawFit, FitFailure> {
    let n = y.len();
    let p = x.ncols();
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut beta = DVector::zeros(p);
    beta[0] = y_mean.max(MIN_MU).ln();
    let mut mu = compute_mu(x, &beta);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..MAX_ITER {
        if deadline.expired() {
            return Err(FitFailure::Expired);
        }
        iterations = iter + 1;

        let w = mu.clone();
        let z = working_response(y, &mu);
        let (beta_new, _) = weighted_qr_solve(x, &z, &w).ok_or(FitFailure::Singular)?;

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);
        beta = beta_new;
        mu = compute_mu(x, &beta);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NonConverged);
    }

    let covariance = weighted_cross_inverse(x, &mu).ok_or(FitFailure::Singular)?;
    let log_likelihood: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| yi * mi.ln() - mi - lgamma(yi + 1.0))
        .sum();
    let residuals = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| (yi - mi) / mi.sqrt())
        .collect();

    Ok(RawFit {
        beta,
        covariance,
        log_likelihood,
        dispersion: 1.0,
        fitted: mu,
        residuals,
        iterations,
    })
}

fn fit_nbinom(y: &DVector<f64>, x: &DMatrix<f64>, deadline: Deadline) -> Result<RawFit, FitFailure> {
    let n = y.len();
    let p = x.ncols();
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut beta = DVector::zeros(p);
    beta[0] = y_mean.max(MIN_MU).ln();
    let mut mu = compute_mu(x, &beta);
    let mut theta = estimate_dispersion_mom(y, &mu);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..MAX_ITER {
        if deadline.expired() {
            return Err(FitFailure::Expired);
        }
        iterations = iter + 1;

        // Working weights: W = mu / (1 + mu/theta)
        let w = DVector::from_iterator(n, mu.iter().map(|&m| m / (1.0 + m / theta)));
        let z = working_response(y, &mu);
        let (beta_new, _) = weighted_qr_solve(x, &z, &w).ok_or(FitFailure::Singular)?;

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);
        beta = beta_new;
        mu = compute_mu(x, &beta);
        theta = estimate_dispersion_mom(y, &mu);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NonConverged);
    }

    let w_final = DVector::from_iterator(n, mu.iter().map(|&m| m / (1.0 + m / theta)));
    let covariance = weighted_cross_inverse(x, &w_final).ok_or(FitFailure::Singular)?;
    let log_likelihood = nb_log_likelihood(y, &mu, theta);
    let residuals = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| (yi - mi) / (mi + mi * mi / theta).sqrt())
        .collect();

    Ok(RawFit {
        beta,
        covariance,
        log_likelihood,
        dispersion: theta,
        fitted: mu,
        residuals,
        iterations,
    })
}

fn fit_gamma(y: &DVector<f64>, x: &DMatrix<f64>, deadline: Deadline) -> Result<RawFit, FitFailure> {
    let n = y.len();
    let p = x.ncols();
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut beta = DVector::zeros(p);
    beta[0] = y_mean.max(MIN_MU).ln();
    let mut mu = compute_mu(x, &beta);
    let mut converged = false;
    let mut iterations = 0;

    // Under the log link the gamma working weights are constant, so each
    // step is an unweighted regression of the working response.
    let ones = DVector::from_element(n, 1.0);
    for iter in 0..MAX_ITER {
        if deadline.expired() {
            return Err(FitFailure::Expired);
        }
        iterations = iter + 1;

        let z = working_response(y, &mu);
        let (beta_new, _) = weighted_qr_solve(x, &z, &ones).ok_or(FitFailure::Singular)?;

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);
        beta = beta_new;
        mu = compute_mu(x, &beta);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NonConverged);
    }

    // Pearson dispersion.
    let chi_sq: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| ((yi - mi) / mi).powi(2))
        .sum();
    let phi = (chi_sq / (n - p) as f64).max(1e-10);

    let cov_unscaled = weighted_cross_inverse(x, &ones).ok_or(FitFailure::Singular)?;
    let alpha = 1.0 / phi;
    let log_likelihood: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            alpha * alpha.ln() - alpha * mi.ln() + (alpha - 1.0) * yi.ln() - alpha * yi / mi
                - lgamma(alpha)
        })
        .sum();
    let residuals = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| (yi - mi) / (mi * phi.sqrt()))
        .collect();

    Ok(RawFit {
        beta,
        covariance: cov_unscaled * phi,
        log_likelihood,
        dispersion: phi,
        fitted: mu,
        residuals,
        iterations,
    })
}

fn fit_beta(y: &DVector<f64>, x: &DMatrix<f64>, deadline: Deadline) -> Result<RawFit, FitFailure> {
    let n = y.len();
    let p = x.ncols();
    let y_mean = (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);

    let mut beta = DVector::zeros(p);
    beta[0] = (y_mean / (1.0 - y_mean)).ln();

    // Precision phi: Var(y) = mu(1-mu) / (1 + phi).
    let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
    let mut phi = (y_mean * (1.0 - y_mean) / y_var.max(1e-12) - 1.0).max(0.01);
    let mut mu = compute_mu_logit(x, &beta);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..MAX_ITER {
        if deadline.expired() {
            return Err(FitFailure::Expired);
        }
        iterations = iter + 1;

        let w = DVector::from_iterator(n, mu.iter().map(|&m| m * (1.0 - m) * (1.0 + phi)));
        let eta = x * &beta;
        let z = DVector::from_iterator(
            n,
            (0..n).map(|i| eta[i] + (y[i] - mu[i]) / (mu[i] * (1.0 - mu[i]))),
        );
        let (beta_new, _) = weighted_qr_solve(x, &z, &w).ok_or(FitFailure::Singular)?;

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);
        beta = beta_new;
        mu = compute_mu_logit(x, &beta);

        let chi_sq: f64 = y
            .iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| (yi - mi).powi(2) / (mi * (1.0 - mi)))
            .sum();
        phi = ((n - p) as f64 / chi_sq.max(1e-12) - 1.0).max(0.01);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NonConverged);
    }

    let w_final = DVector::from_iterator(n, mu.iter().map(|&m| m * (1.0 - m) * (1.0 + phi)));
    let covariance = weighted_cross_inverse(x, &w_final).ok_or(FitFailure::Singular)?;
    let log_likelihood: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            lgamma(phi) - lgamma(mi * phi) - lgamma((1.0 - mi) * phi)
                + (mi * phi - 1.0) * yi.ln()
                + ((1.0 - mi) * phi - 1.0) * (1.0 - yi).ln()
        })
        .sum();
    let residuals = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| (yi - mi) / (mi * (1.0 - mi) / (1.0 + phi)).sqrt())
        .collect();

    Ok(RawFit {
        beta,
        covariance,
        log_likelihood,
        dispersion: phi,
        fitted: mu,
        residuals,
        iterations,
    })
}

fn fit_student_t(
    y: &DVector<f64>,
    x: &DMatrix<f64>,
    deadline: Deadline,
) -> Result<RawFit, FitFailure> {
    let n = y.len();
    let ones = DVector::from_element(n, 1.0);
    let (mut beta, _) = weighted_qr_solve(x, y, &ones).ok_or(FitFailure::Singular)?;

    let mut resid = y - x * &beta;
    let mut sigma2 = (resid.norm_squared() / n as f64).max(1e-12);
    let mut w = ones.clone();
    let mut converged = false;
    let mut iterations = 0;

    // EM-style reweighting: downweight observations in the tails.
    for iter in 0..MAX_ITER {
        if deadline.expired() {
            return Err(FitFailure::Expired);
        }
        iterations = iter + 1;

        w = DVector::from_iterator(
            n,
            resid
                .iter()
                .map(|r| (T_DF + 1.0) / (T_DF + r * r / sigma2)),
        );
        let (beta_new, _) = weighted_qr_solve(x, y, &w).ok_or(FitFailure::Singular)?;

        let delta: f64 = (&beta_new - &beta).iter().map(|d| d.abs()).sum();
        let scale: f64 = beta.iter().map(|b| b.abs()).sum::<f64>().max(1.0);
        beta = beta_new;
        resid = y - x * &beta;
        sigma2 = (resid
            .iter()
            .zip(w.iter())
            .map(|(r, wi)| wi * r * r)
            .sum::<f64>()
            / n as f64)
            .max(1e-12);

        if delta / scale < TOL {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NonConverged);
    }

    let sigma = sigma2.sqrt();
    let t_dist = StudentsT::new(0.0, 1.0, T_DF).unwrap();
    let log_likelihood: f64 = resid
        .iter()
        .map(|r| t_dist.ln_pdf(r / sigma) - sigma.ln())
        .sum();
    let cov_unscaled = weighted_cross_inverse(x, &w).ok_or(FitFailure::Singular)?;
    let fitted = x * &beta;

    Ok(RawFit {
        beta,
        covariance: cov_unscaled * sigma2,
        log_likelihood,
        dispersion: sigma,
        residuals: resid.iter().map(|r| r / sigma).collect(),
        fitted,
        iterations,
    })
}

/// Compute mu = exp(X * beta), floored away from zero.
fn compute_mu(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    let eta = x * beta;
    DVector::from_iterator(eta.len(), eta.iter().map(|e| e.exp().max(MIN_MU)))
}

/// Compute mu = logistic(X * beta), clamped inside the open unit interval.
fn compute_mu_logit(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    let eta = x * beta;
    DVector::from_iterator(
        eta.len(),
        eta.iter()
            .map(|e| (1.0 / (1.0 + (-e).exp())).clamp(1e-8, 1.0 - 1e-8)),
    )
}

/// Working response for log-link IRLS: z = eta + (y - mu) / mu.
fn working_response(y: &DVector<f64>, mu: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        y.len(),
        y.iter().zip(mu.iter()).map(|(&yi, &mi)| {
            let m = mi.max(MIN_MU);
            m.ln() + (yi - m) / m
        }),
    )
}

/// Estimate negative binomial dispersion using method of moments from the
/// Pearson chi-squared statistic.
fn estimate_dispersion_mom(y: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    let n = y.len() as f64;
    let pearson_chi_sq: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            let m = mi.max(MIN_MU);
            let resid = yi - m;
            resid * resid / m
        })
        .sum();

    let excess = pearson_chi_sq - n;
    if excess > 0.0 {
        n / excess
    } else {
        // No overdispersion detected, large theta approaches Poisson.
        1e6
    }
}

/// Compute negative binomial log-likelihood.
fn nb_log_likelihood(y: &DVector<f64>, mu: &DVector<f64>, theta: f64) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            let m = mi.max(MIN_MU);
            let t = theta;
            lgamma(yi + t) - lgamma(t) - lgamma(yi + 1.0)
                + t * (t / (t + m)).ln()
                + yi * (m / (t + m)).ln()
        })
        .sum()
}

/// Log gamma function (recurrence for small arguments, Stirling for large).
pub(crate) fn lgamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x < 12.0 {
        let mut result = 0.0;
        let mut z = x;
        while z < 12.0 {
            result -= z.ln();
            z += 1.0;
        }
        result + lgamma(z)
    } else {
        let z = x;
        let c = [1.0 / 12.0, -1.0 / 360.0, 1.0 / 1260.0, -1.0 / 1680.0];
        let mut sum = 0.0;
        let mut zp = z;
        for &ci in &c {
            sum += ci / zp;
            zp *= z * z;
        }
        (z - 0.5) * z.ln() - z + 0.5 * (2.0 * std::f64::consts::PI).ln() + sum
    }
}
