//! Variational message passing over a replicated window.
//!
//! Coordinate ascent under the mean-field factorization
//!
//! ```text
//! q(h_1) ... q(h_H) * prod_factors q(parameters)
//! ```
//!
//! Each sweep first updates every shared hidden variable from the prior and
//! the messages of the factors it parents, then every factor's parameters
//! from its expected sufficient statistics. The monitored quantity is the
//! largest absolute change of any posterior moment between consecutive
//! sweeps; the first sweep is compared to the start state.
//!
//! ## Termination
//!
//! - change `< threshold` marks the window converged;
//! - otherwise inference stops after `max_iterations` sweeps and reports
//!   `converged = false`, which is a signal rather than an error;
//! - `threshold = +inf` runs exactly one sweep;
//! - `max_iterations = 0` returns the supplied priors unconverged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::config::{validate_threshold, ParameterPriors};
use crate::engine::distributions::GaussianPosterior;
use crate::engine::errors::LearnError;
use crate::engine::plate::PlateModel;
use crate::engine::posterior::ModelPosterior;

/// Relative size (in prior standard deviations) of the start-state jitter.
const JITTER_SCALE: f64 = 1e-2;

/// Runtime diagnostics of one refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmpDiagnostics {
    /// Sweep limit configured for this run.
    pub max_iterations: usize,
    /// Number of sweeps actually executed.
    pub iterations_run: usize,
    /// Whether the threshold was reached before the sweep limit.
    pub converged: bool,
    /// Largest moment change of the last sweep.
    pub final_max_delta: f64,
    /// Variances clamped to the floor across all sweeps.
    pub variance_floor_hits: usize,
    /// Replicas in the window.
    pub replica_count: usize,
    /// Factor-replica pairs skipped for missing values.
    pub skipped_replicas: usize,
}

/// Output of [`VariationalMessagePassing::refine`].
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub posterior: ModelPosterior,
    pub converged: bool,
    pub diagnostics: VmpDiagnostics,
}

/// The inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariationalMessagePassing {
    seed: u64,
    window: usize,
}

impl VariationalMessagePassing {
    pub fn new(seed: u64) -> Self {
        Self { seed, window: 0 }
    }

    /// Engine whose start-state jitter is keyed on `window`.
    pub fn at_window(self, window: usize) -> Self {
        Self { window, ..self }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Refines `priors` against the window held by `plate`.
    pub fn refine(
        &self,
        plate: &PlateModel<'_>,
        priors: &ModelPosterior,
        max_iterations: usize,
        threshold: f64,
    ) -> Result<Refinement, LearnError> {
        validate_threshold(threshold)?;
        let graph = plate.graph();
        let factors = graph.factors();
        let stats = plate.statistics();
        if priors.hidden.len() != graph.hidden().len() || priors.parameters.len() != factors.len() {
            return Err(LearnError::Internal(format!(
                "prior shape ({} hidden, {} factors) does not match the model ({} hidden, {} factors)",
                priors.hidden.len(),
                priors.parameters.len(),
                graph.hidden().len(),
                factors.len()
            )));
        }
        let template = graph.initial_priors(&ParameterPriors::default());
        if let Some(j) = (0..factors.len()).find(|&j| !priors.parameters[j].same_shape(&template[j])) {
            return Err(LearnError::Internal(format!(
                "prior of factor {} does not match the shape of its parameters",
                j
            )));
        }

        let mut diagnostics = VmpDiagnostics {
            max_iterations,
            iterations_run: 0,
            converged: false,
            final_max_delta: f64::INFINITY,
            variance_floor_hits: 0,
            replica_count: plate.replica_count(),
            skipped_replicas: plate.skipped(),
        };
        if max_iterations == 0 {
            return Ok(Refinement {
                posterior: priors.clone(),
                converged: false,
                diagnostics,
            });
        }

        let mut current = priors.clone();
        let mut rng = StdRng::seed_from_u64(self.seed ^ self.window as u64);
        for h in &mut current.hidden {
            h.mean += JITTER_SCALE * h.variance.sqrt() * rng.gen_range(-1.0..1.0);
        }

        for iteration in 0..max_iterations {
            let previous = current.clone();

            for slot in 0..current.hidden.len() {
                let prior = priors.hidden[slot];
                let mut precision = prior.precision();
                let mut weighted_mean = prior.precision() * prior.mean;
                for (j, factor) in factors.iter().enumerate() {
                    if let Some(message) = factor.hidden_message(
                        &stats[j].observed,
                        &current.hidden,
                        slot,
                        &current.parameters[j],
                    ) {
                        precision += message.precision;
                        weighted_mean += message.weighted_mean;
                    }
                }
                let (updated, clamped) = GaussianPosterior::from_natural(precision, weighted_mean);
                if clamped {
                    diagnostics.variance_floor_hits += 1;
                }
                current.hidden[slot] = updated;
            }

            for (j, factor) in factors.iter().enumerate() {
                let update = factor.update_parameters(
                    &stats[j].observed,
                    &current.hidden,
                    &priors.parameters[j],
                    &current.parameters[j],
                )?;
                diagnostics.variance_floor_hits += update.floor_hits;
                current.parameters[j] = update.posterior;
            }

            let delta = current.max_delta(&previous);
            diagnostics.iterations_run = iteration + 1;
            diagnostics.final_max_delta = delta;
            if delta < threshold {
                diagnostics.converged = true;
                break;
            }
        }

        if diagnostics.variance_floor_hits > 0 {
            tracing::warn!(
                window = self.window,
                hits = diagnostics.variance_floor_hits,
                "numerical degeneracy: variances clamped to the floor"
            );
        }
        Ok(Refinement {
            posterior: current,
            converged: diagnostics.converged,
            diagnostics,
        })
    }
}
