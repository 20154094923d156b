//! # Posterior families
//!
//! Parametric beliefs held by the posterior state:
//!
//! - **GaussianPosterior**: mean/variance belief over a real quantity (hidden
//!   drift variables, regression coefficients)
//! - **GammaPosterior**: shape/rate belief over a noise precision
//! - **DirichletPosterior**: pseudo-count belief over a categorical table row
//!
//! Variances are kept strictly positive by clamping to [`MIN_VARIANCE`]; the
//! clamp is reported to the caller so inference can count degenerate updates.

use crate::engine::errors::LearnError;

/// Variance floor applied to every Gaussian update.
///
/// Keeps 1/variance finite when a node receives an overwhelming amount of
/// evidence within one window.
pub const MIN_VARIANCE: f64 = 1e-9;

/// Minimum Gamma shape/rate to keep the distribution proper.
const MIN_GAMMA_PARAM: f64 = 1e-6;

/// Minimum Dirichlet concentration parameter to enforce a proper prior.
const MIN_DIRICHLET_PARAM: f64 = 0.01;

/// A univariate Gaussian belief N(mean, variance).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianPosterior {
    /// The posterior mean (μ)
    pub mean: f64,
    /// The posterior variance (σ²)
    pub variance: f64,
}

impl GaussianPosterior {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    /// The unit Gaussian N(0, 1), default belief of a hidden variable.
    pub fn standard() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Precision τ = 1/σ² (with the variance floor applied).
    pub fn precision(&self) -> f64 {
        1.0 / self.variance.max(MIN_VARIANCE)
    }

    /// E[x²] = μ² + σ².
    #[inline]
    pub fn second_moment(&self) -> f64 {
        self.mean * self.mean + self.variance
    }

    /// Builds a Gaussian from accumulated natural parameters.
    ///
    /// `precision` is the summed precision and `weighted_mean` the summed
    /// precision-weighted mean. Returns the belief and whether the variance
    /// had to be clamped to [`MIN_VARIANCE`].
    pub fn from_natural(precision: f64, weighted_mean: f64) -> (Self, bool) {
        let raw_variance = if precision > 0.0 && precision.is_finite() {
            1.0 / precision
        } else {
            0.0
        };
        let clamped = raw_variance < MIN_VARIANCE;
        let variance = if clamped { MIN_VARIANCE } else { raw_variance };
        let mean = weighted_mean * variance;
        (Self { mean, variance }, clamped)
    }

    /// Tempers the belief: precision is multiplied by `fading`.
    pub fn fade(&self, fading: f64) -> Self {
        Self {
            mean: self.mean,
            variance: self.variance / fading,
        }
    }

    /// Largest absolute change of mean or variance.
    pub fn max_delta(&self, other: &Self) -> f64 {
        (self.mean - other.mean)
            .abs()
            .max((self.variance - other.variance).abs())
    }
}

/// A Gamma(shape, rate) belief over a precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GammaPosterior {
    pub shape: f64,
    pub rate: f64,
}

impl GammaPosterior {
    pub fn new(shape: f64, rate: f64) -> Self {
        Self {
            shape: shape.max(MIN_GAMMA_PARAM),
            rate: rate.max(MIN_GAMMA_PARAM),
        }
    }

    /// E[τ] = shape / rate.
    pub fn mean(&self) -> f64 {
        self.shape.max(MIN_GAMMA_PARAM) / self.rate.max(MIN_GAMMA_PARAM)
    }

    /// Var[τ] = shape / rate².
    pub fn variance(&self) -> f64 {
        let rate = self.rate.max(MIN_GAMMA_PARAM);
        self.shape.max(MIN_GAMMA_PARAM) / (rate * rate)
    }

    /// Scales the pseudo-observations by `fading`, keeping the mean.
    pub fn fade(&self, fading: f64) -> Self {
        Self::new(self.shape * fading, self.rate * fading)
    }
}

/// A Dirichlet belief over one categorical distribution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirichletPosterior {
    /// Concentration parameters α_k, one per state.
    pub concentrations: Vec<f64>,
}

impl DirichletPosterior {
    /// Creates a Dirichlet from explicit concentrations (all must be > 0).
    pub fn new(concentrations: Vec<f64>) -> Result<Self, LearnError> {
        if concentrations.is_empty() {
            return Err(LearnError::Configuration(
                "Dirichlet posterior requires at least one state".into(),
            ));
        }
        if !concentrations.iter().all(|&a| a > 0.0 && a.is_finite()) {
            return Err(LearnError::Configuration(
                "all Dirichlet concentrations must be finite and > 0".into(),
            ));
        }
        Ok(Self { concentrations })
    }

    /// Symmetric Dirichlet with `pseudo_count` per state.
    pub fn uniform(states: usize, pseudo_count: f64) -> Self {
        Self {
            concentrations: vec![pseudo_count.max(MIN_DIRICHLET_PARAM); states.max(1)],
        }
    }

    pub fn states(&self) -> usize {
        self.concentrations.len()
    }

    /// E[π_k] = α_k / Σ_j α_j.
    pub fn mean_probabilities(&self) -> Vec<f64> {
        let total: f64 = self
            .concentrations
            .iter()
            .map(|a| a.max(MIN_DIRICHLET_PARAM))
            .sum();
        self.concentrations
            .iter()
            .map(|a| a.max(MIN_DIRICHLET_PARAM) / total)
            .collect()
    }

    /// Conjugate update: adds observed counts to the prior concentrations.
    pub fn with_counts(&self, counts: &[f64]) -> Self {
        Self {
            concentrations: self
                .concentrations
                .iter()
                .zip(counts)
                .map(|(alpha, count)| alpha + count)
                .collect(),
        }
    }

    /// Scales the pseudo-counts by `fading`, keeping the mean.
    pub fn fade(&self, fading: f64) -> Self {
        Self {
            concentrations: self
                .concentrations
                .iter()
                .map(|a| (a * fading).max(MIN_DIRICHLET_PARAM))
                .collect(),
        }
    }

    /// Largest absolute change in expected probabilities.
    pub fn max_delta(&self, other: &Self) -> f64 {
        self.mean_probabilities()
            .iter()
            .zip(other.mean_probabilities())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}
