//! Posterior state and its query views.

use std::fmt;

use crate::engine::dag::Dag;
use crate::engine::distributions::{DirichletPosterior, GammaPosterior, GaussianPosterior};
use crate::engine::errors::LearnError;
use crate::engine::estimators::{FactorGraph, ParameterPosterior};
use crate::engine::variables::VariableId;

/// Beliefs over every hidden variable and every factor's parameters.
///
/// `hidden` is indexed by hidden slot, `parameters` by factor position in the
/// [`FactorGraph`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelPosterior {
    pub hidden: Vec<GaussianPosterior>,
    pub parameters: Vec<ParameterPosterior>,
}

impl ModelPosterior {
    /// Largest absolute moment change between two posteriors of the same model.
    pub fn max_delta(&self, other: &Self) -> f64 {
        if self.hidden.len() != other.hidden.len() || self.parameters.len() != other.parameters.len() {
            return f64::INFINITY;
        }
        let hidden = self
            .hidden
            .iter()
            .zip(&other.hidden)
            .map(|(a, b)| a.max_delta(b))
            .fold(0.0, f64::max);
        self.parameters
            .iter()
            .zip(&other.parameters)
            .map(|(a, b)| a.max_delta(b))
            .fold(hidden, f64::max)
    }

    /// Labelled snapshot of the posterior.
    pub fn snapshot(&self, graph: &FactorGraph, dag: &Dag, window: usize) -> Result<ModelSnapshot, LearnError> {
        let variables = graph.variables();
        let name_of = |id: VariableId| {
            variables
                .get(id)
                .map(|var| var.name().to_string())
                .ok_or_else(|| LearnError::Internal(format!("unknown variable {:?}", id)))
        };

        let hidden = graph
            .hidden()
            .iter()
            .zip(&self.hidden)
            .map(|(&id, belief)| Ok((name_of(id)?, *belief)))
            .collect::<Result<Vec<_>, LearnError>>()?;

        let mut factors = Vec::with_capacity(graph.factors().len());
        for (factor, parameters) in graph.factors().iter().zip(&self.parameters) {
            let parents = match dag.parent_set(factor.child()) {
                Some(set) => set
                    .parents()
                    .iter()
                    .map(|&p| name_of(p))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            factors.push(FactorSnapshot {
                variable: name_of(factor.child())?,
                parents,
                posterior: PosteriorDistribution::labelled(factor.parameter_labels(), parameters),
            });
        }
        Ok(ModelSnapshot {
            window,
            hidden,
            factors,
        })
    }
}

/// Posterior of one named variable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PosteriorDistribution {
    /// Belief over a hidden drift variable.
    Hidden(GaussianPosterior),
    /// Parameters of a linear-Gaussian conditional.
    LinearGaussian {
        coefficients: Vec<(String, GaussianPosterior)>,
        precision: GammaPosterior,
    },
    /// Parameters of a multinomial conditional, one table per parent configuration.
    Multinomial {
        tables: Vec<(String, DirichletPosterior)>,
    },
}

impl PosteriorDistribution {
    pub(crate) fn labelled(labels: Vec<String>, parameters: &ParameterPosterior) -> Self {
        match parameters {
            ParameterPosterior::LinearGaussian {
                coefficients,
                precision,
            } => PosteriorDistribution::LinearGaussian {
                coefficients: labels.into_iter().zip(coefficients.iter().copied()).collect(),
                precision: *precision,
            },
            ParameterPosterior::Multinomial { tables } => PosteriorDistribution::Multinomial {
                tables: labels.into_iter().zip(tables.iter().cloned()).collect(),
            },
        }
    }

    /// The Gaussian belief of a hidden variable.
    pub fn as_hidden(&self) -> Option<GaussianPosterior> {
        match self {
            PosteriorDistribution::Hidden(g) => Some(*g),
            _ => None,
        }
    }

    /// Belief over the coefficient labelled `label`.
    pub fn coefficient(&self, label: &str) -> Option<GaussianPosterior> {
        match self {
            PosteriorDistribution::LinearGaussian { coefficients, .. } => coefficients
                .iter()
                .find(|(name, _)| name == label)
                .map(|(_, g)| *g),
            _ => None,
        }
    }
}

impl fmt::Display for PosteriorDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PosteriorDistribution::Hidden(g) => write!(f, "Normal({:.4}, {:.4})", g.mean, g.variance),
            PosteriorDistribution::LinearGaussian {
                coefficients,
                precision,
            } => {
                let terms: Vec<String> = coefficients
                    .iter()
                    .map(|(label, g)| format!("{:.4} {}", g.mean, label))
                    .collect();
                write!(
                    f,
                    "Normal({}, 1/{:.4})",
                    terms.join(" + "),
                    precision.mean()
                )
            }
            PosteriorDistribution::Multinomial { tables } => {
                let rows: Vec<String> = tables
                    .iter()
                    .map(|(label, table)| {
                        let probs: Vec<String> = table
                            .mean_probabilities()
                            .iter()
                            .map(|p| format!("{:.4}", p))
                            .collect();
                        format!("{}: [{}]", label, probs.join(", "))
                    })
                    .collect();
                write!(f, "Multinomial({})", rows.join("; "))
            }
        }
    }
}

/// Posterior of one factor together with its structure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FactorSnapshot {
    pub variable: String,
    pub parents: Vec<String>,
    pub posterior: PosteriorDistribution,
}

/// Labelled view of the whole posterior after a window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelSnapshot {
    /// Number of windows learned so far.
    pub window: usize,
    pub hidden: Vec<(String, GaussianPosterior)>,
    pub factors: Vec<FactorSnapshot>,
}

impl ModelSnapshot {
    pub fn hidden_mean(&self, name: &str) -> Option<f64> {
        self.hidden
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g.mean)
    }

    pub fn factor(&self, variable: &str) -> Option<&FactorSnapshot> {
        self.factors.iter().find(|f| f.variable == variable)
    }
}

impl fmt::Display for ModelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "window {}", self.window)?;
        for factor in &self.factors {
            if factor.parents.is_empty() {
                writeln!(f, "P({}) follows {}", factor.variable, factor.posterior)?;
            } else {
                writeln!(
                    f,
                    "P({} | {}) follows {}",
                    factor.variable,
                    factor.parents.join(", "),
                    factor.posterior
                )?;
            }
        }
        for (name, g) in &self.hidden {
            writeln!(f, "P({}) follows Normal({:.4}, {:.4})", name, g.mean, g.variance)?;
        }
        Ok(())
    }
}
