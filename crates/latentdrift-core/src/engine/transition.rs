//! Between-window transition of the posterior.
//!
//! The posterior of window `t` becomes the prior of window `t + 1` after a
//! transition: hidden drift variables diffuse (their variance grows) so the
//! next window can move them, and parameter beliefs are optionally tempered.

use crate::engine::distributions::GaussianPosterior;
use crate::engine::errors::LearnError;
use crate::engine::posterior::ModelPosterior;

/// Strategy turning the previous posterior into the next window's prior.
pub trait TransitionMethod: std::fmt::Debug + Send + Sync {
    /// Prior for window `window` (always >= 1) given the posterior of `window - 1`.
    fn prior_for(&self, window: usize, previous: &ModelPosterior) -> ModelPosterior;
}

/// Gaussian random-walk transition of the hidden variables with fading.
///
/// Hidden: `mean' = mean`, `variance' = variance * fading + transition_variance`.
/// Parameters are tempered by `fading` when it is below one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianHiddenTransition {
    fading: f64,
    transition_variance: f64,
}

impl GaussianHiddenTransition {
    pub fn new(fading: f64, transition_variance: f64) -> Result<Self, LearnError> {
        if !(fading > 0.0 && fading <= 1.0) {
            return Err(LearnError::Configuration(format!(
                "fading must lie in (0, 1] (got {})",
                fading
            )));
        }
        if !(transition_variance >= 0.0 && transition_variance.is_finite()) {
            return Err(LearnError::Configuration(format!(
                "transition variance must be finite and >= 0 (got {})",
                transition_variance
            )));
        }
        Ok(Self {
            fading,
            transition_variance,
        })
    }

    pub fn fading(&self) -> f64 {
        self.fading
    }

    pub fn transition_variance(&self) -> f64 {
        self.transition_variance
    }

    /// Stationary hidden variance `v / (1 - fading)`; `None` without fading.
    pub fn variance_fixed_point(&self) -> Option<f64> {
        (self.fading < 1.0).then(|| self.transition_variance / (1.0 - self.fading))
    }
}

impl TransitionMethod for GaussianHiddenTransition {
    fn prior_for(&self, _window: usize, previous: &ModelPosterior) -> ModelPosterior {
        let hidden = previous
            .hidden
            .iter()
            .map(|h| GaussianPosterior::new(h.mean, h.variance * self.fading + self.transition_variance))
            .collect();
        let parameters = if self.fading < 1.0 {
            previous
                .parameters
                .iter()
                .map(|p| p.fade(self.fading))
                .collect()
        } else {
            previous.parameters.clone()
        };
        ModelPosterior { hidden, parameters }
    }
}
