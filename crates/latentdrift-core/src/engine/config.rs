//! Session configuration.
//!
//! [`ModelConfig`] is an immutable value: every `with_*` method returns a new
//! configuration and the learning session decides whether the change
//! invalidates its graph and posterior. Values are validated at the point of
//! use ([`ModelConfig::validate`] runs inside `init_learning`), never clamped.

use latentdrift_data::Attributes;

use crate::engine::errors::LearnError;

const DEFAULT_WINDOW_SIZE: usize = 1000;
const DEFAULT_TRANSITION_VARIANCE: f64 = 0.1;
const DEFAULT_MAX_ITERATIONS: usize = 1000;
const DEFAULT_THRESHOLD: f64 = 0.001;

/// Priors over the parameters of every conditional distribution at window 0.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterPriors {
    /// Variance of the zero-mean Gaussian prior on intercepts and observed-parent coefficients.
    pub coefficient_variance: f64,
    /// Prior mean of the loading of a hidden parent on its child.
    pub hidden_loading_mean: f64,
    /// Prior variance of the loading of a hidden parent on its child.
    pub hidden_loading_variance: f64,
    /// Gamma shape of the noise-precision prior.
    pub precision_shape: f64,
    /// Gamma rate of the noise-precision prior.
    pub precision_rate: f64,
    /// Dirichlet pseudo-count per state of a multinomial table row.
    pub dirichlet_pseudo_count: f64,
}

impl Default for ParameterPriors {
    fn default() -> Self {
        Self {
            coefficient_variance: 100.0,
            hidden_loading_mean: 1.0,
            hidden_loading_variance: 1.0,
            precision_shape: 1.0,
            precision_rate: 1.0,
            dirichlet_pseudo_count: 1.0,
        }
    }
}

impl ParameterPriors {
    fn validate(&self) -> Result<(), LearnError> {
        let positive = [
            ("coefficient_variance", self.coefficient_variance),
            ("hidden_loading_variance", self.hidden_loading_variance),
            ("precision_shape", self.precision_shape),
            ("precision_rate", self.precision_rate),
            ("dirichlet_pseudo_count", self.dirichlet_pseudo_count),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(LearnError::Configuration(format!(
                    "priors: {} must be finite and > 0 (got {})",
                    name, value
                )));
            }
        }
        if !self.hidden_loading_mean.is_finite() {
            return Err(LearnError::Configuration(
                "priors: hidden_loading_mean must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// How replica statistics are evaluated within a window.
///
/// Both modes reduce in the same fixed chunk order, so they produce
/// identical posteriors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Execution {
    Sequential,
    /// Chunks are evaluated on the rayon pool (requires the `parallel` feature;
    /// falls back to sequential evaluation otherwise).
    Parallel,
}

impl Default for Execution {
    fn default() -> Self {
        if cfg!(feature = "parallel") {
            Execution::Parallel
        } else {
            Execution::Sequential
        }
    }
}

/// Structural and numerical parameters of a learning session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelConfig {
    /// Index of the class variable in the full attribute list.
    pub class_index: usize,
    /// Number of global hidden drift variables.
    pub hidden_count: usize,
    /// Whether hidden variables are attached as parents of the attributes.
    pub global_hidden: bool,
    /// Fraction of the previous window's certainty retained, in (0, 1].
    pub fading: f64,
    /// Variance injected into every hidden variable between windows.
    pub transition_variance: f64,
    /// Seed of the inference start-state jitter.
    pub seed: u64,
    /// Records per window when consuming a stream.
    pub window_size: usize,
    /// Sweep budget of the inference engine per window.
    pub max_iterations: usize,
    /// Convergence threshold on the largest posterior-moment change per sweep.
    pub threshold: f64,
    pub priors: ParameterPriors,
}

impl ModelConfig {
    /// Defaults for a schema: the last attribute is the class, one global
    /// hidden variable, no fading, transition variance 0.1.
    pub fn for_attributes(attributes: &Attributes) -> Self {
        Self {
            class_index: attributes.len().saturating_sub(1),
            hidden_count: 1,
            global_hidden: true,
            fading: 1.0,
            transition_variance: DEFAULT_TRANSITION_VARIANCE,
            seed: 0,
            window_size: DEFAULT_WINDOW_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            threshold: DEFAULT_THRESHOLD,
            priors: ParameterPriors::default(),
        }
    }

    pub fn with_class_index(mut self, class_index: usize) -> Self {
        self.class_index = class_index;
        self
    }

    pub fn with_hidden_count(mut self, hidden_count: usize) -> Self {
        self.hidden_count = hidden_count;
        self
    }

    pub fn with_global_hidden(mut self, global_hidden: bool) -> Self {
        self.global_hidden = global_hidden;
        self
    }

    pub fn with_fading(mut self, fading: f64) -> Self {
        self.fading = fading;
        self
    }

    pub fn with_transition_variance(mut self, transition_variance: f64) -> Self {
        self.transition_variance = transition_variance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_priors(mut self, priors: ParameterPriors) -> Self {
        self.priors = priors;
        self
    }

    /// True when switching from `self` to `other` invalidates graph and posterior.
    ///
    /// Only the window size can change without a rebuild.
    pub fn requires_rebuild(&self, other: &ModelConfig) -> bool {
        let mut probe = other.clone();
        probe.window_size = self.window_size;
        probe != *self
    }

    /// Range checks for every parameter against `attributes`.
    pub fn validate(&self, attributes: &Attributes) -> Result<(), LearnError> {
        if self.class_index >= attributes.len() {
            return Err(LearnError::Configuration(format!(
                "class index {} out of range for {} attributes",
                self.class_index,
                attributes.len()
            )));
        }
        if self.global_hidden && self.hidden_count == 0 {
            return Err(LearnError::Configuration(
                "global hidden modelling requires at least one hidden variable".into(),
            ));
        }
        if !(self.fading > 0.0 && self.fading <= 1.0) {
            return Err(LearnError::Configuration(format!(
                "fading must lie in (0, 1] (got {})",
                self.fading
            )));
        }
        if !(self.transition_variance >= 0.0 && self.transition_variance.is_finite()) {
            return Err(LearnError::Configuration(format!(
                "transition variance must be finite and >= 0 (got {})",
                self.transition_variance
            )));
        }
        if self.window_size == 0 {
            return Err(LearnError::Configuration(
                "window size must be >= 1".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(LearnError::Configuration(
                "max_iterations must be >= 1".into(),
            ));
        }
        validate_threshold(self.threshold)?;
        self.priors.validate()
    }
}

/// Thresholds must be strictly positive; `+inf` is allowed and stops after one sweep.
pub(crate) fn validate_threshold(threshold: f64) -> Result<(), LearnError> {
    if threshold > 0.0 {
        Ok(())
    } else {
        Err(LearnError::Configuration(format!(
            "convergence threshold must be > 0 (got {})",
            threshold
        )))
    }
}
