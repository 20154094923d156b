//! Conditional-distribution estimators.
//!
//! One estimator ("factor") per observed variable. Each family knows how to
//! turn a record into sufficient statistics, how to take expectations of them
//! under the current hidden beliefs, how to update its parameter posterior and
//! which message it sends to each of its hidden parents.
//!
//! ## Families
//!
//! - [`LinearGaussianEstimator`]: real child. Features are an intercept, the
//!   observed real parents, one indicator per non-reference state of each
//!   observed finite parent, and then the hidden parents:
//!
//!   ```text
//!   x = w'z + e,   e ~ N(0, 1/lambda)
//!   ```
//!
//!   Statistics are taken over the observed part `o` of `z` only
//!   (`[S_xx, S_xo, S_oo]`); hidden contributions are added analytically,
//!   because hidden variables are shared by every replica of a window.
//! - [`MultinomialEstimator`]: finite child with finite parents. One Dirichlet
//!   table per parent configuration; statistics are the one-hot counts.

use std::fmt;
use std::sync::Arc;

use latentdrift_data::{Attributes, DataInstance};

use crate::engine::config::ParameterPriors;
use crate::engine::dag::Dag;
use crate::engine::distributions::{DirichletPosterior, GammaPosterior, GaussianPosterior};
use crate::engine::errors::LearnError;
use crate::engine::variables::{StateSpaceType, VariableId, Variables};

/// Belief over the parameters of one factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterPosterior {
    LinearGaussian {
        /// One belief per feature, in feature order.
        coefficients: Vec<GaussianPosterior>,
        /// Noise precision.
        precision: GammaPosterior,
    },
    Multinomial {
        /// One table per parent configuration.
        tables: Vec<DirichletPosterior>,
    },
}

impl ParameterPosterior {
    /// Tempers every belief by `fading`, keeping its mean.
    pub fn fade(&self, fading: f64) -> Self {
        match self {
            ParameterPosterior::LinearGaussian {
                coefficients,
                precision,
            } => ParameterPosterior::LinearGaussian {
                coefficients: coefficients.iter().map(|c| c.fade(fading)).collect(),
                precision: precision.fade(fading),
            },
            ParameterPosterior::Multinomial { tables } => ParameterPosterior::Multinomial {
                tables: tables.iter().map(|t| t.fade(fading)).collect(),
            },
        }
    }

    /// Whether `other` has the same family and the same number of
    /// coefficients, tables and states.
    pub fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ParameterPosterior::LinearGaussian { coefficients: a, .. },
                ParameterPosterior::LinearGaussian { coefficients: b, .. },
            ) => a.len() == b.len(),
            (ParameterPosterior::Multinomial { tables: a }, ParameterPosterior::Multinomial { tables: b }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.states() == y.states())
            }
            _ => false,
        }
    }

    /// Largest absolute change of any moment; infinite across families.
    pub fn max_delta(&self, other: &Self) -> f64 {
        match (self, other) {
            (
                ParameterPosterior::LinearGaussian {
                    coefficients: a,
                    precision: pa,
                },
                ParameterPosterior::LinearGaussian {
                    coefficients: b,
                    precision: pb,
                },
            ) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.max_delta(y))
                .fold((pa.mean() - pb.mean()).abs(), f64::max),
            (
                ParameterPosterior::Multinomial { tables: a },
                ParameterPosterior::Multinomial { tables: b },
            ) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.max_delta(y))
                .fold(0.0, f64::max),
            _ => f64::INFINITY,
        }
    }
}

/// Natural-parameter message from a factor to one hidden parent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HiddenMessage {
    pub precision: f64,
    pub weighted_mean: f64,
}

/// Outcome of one parameter update.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterUpdate {
    pub posterior: ParameterPosterior,
    /// Number of variances clamped to the floor during the update.
    pub floor_hits: usize,
}

/// Family-agnostic estimator capability used by the inference engine.
///
/// `hidden` arguments always carry the beliefs of every hidden slot of the
/// model; estimators pick the slots they parent.
pub trait FactorEstimator: fmt::Debug + Send + Sync {
    /// The variable this factor is the conditional distribution of.
    fn child(&self) -> VariableId;

    /// Hidden slots parenting this factor, in parent order.
    fn hidden_slots(&self) -> &[usize];

    /// Length of the vector returned by [`sufficient_statistics`](Self::sufficient_statistics).
    fn statistics_len(&self) -> usize;

    /// Statistics of a single record; `None` when a needed value is missing.
    fn sufficient_statistics(&self, record: &DataInstance) -> Option<Vec<f64>>;

    /// Expected statistics of the full feature vector given summed observed
    /// statistics and the current hidden beliefs.
    fn expected_sufficient_statistics(&self, observed: &[f64], hidden: &[GaussianPosterior]) -> Vec<f64>;

    /// Window-0 prior of the parameters.
    fn initial_prior(&self, priors: &ParameterPriors) -> ParameterPosterior;

    /// One coordinate-ascent update of the parameters.
    fn update_parameters(
        &self,
        observed: &[f64],
        hidden: &[GaussianPosterior],
        prior: &ParameterPosterior,
        current: &ParameterPosterior,
    ) -> Result<ParameterUpdate, LearnError>;

    /// Message to hidden `slot`; `None` when the slot is not a parent.
    fn hidden_message(
        &self,
        observed: &[f64],
        hidden: &[GaussianPosterior],
        slot: usize,
        current: &ParameterPosterior,
    ) -> Option<HiddenMessage>;

    /// Names of the coefficients or tables, aligned with the posterior.
    fn parameter_labels(&self) -> Vec<String>;
}

/// Maps a recorded value to a finite state index.
fn state_of(value: f64, states: usize) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && (value as usize) < states {
        Some(value as usize)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Feature {
    Intercept,
    Real { column: usize },
    Indicator { column: usize, state: usize },
}

/// Linear-Gaussian conditional of a real child.
#[derive(Debug, Clone)]
pub struct LinearGaussianEstimator {
    child: VariableId,
    column: usize,
    features: Vec<Feature>,
    labels: Vec<String>,
    hidden_slots: Vec<usize>,
}

impl LinearGaussianEstimator {
    /// Number of observed features `P`, intercept included.
    pub fn observed_len(&self) -> usize {
        self.features.len()
    }

    /// Number of features `D = P + hidden parents`.
    pub fn feature_len(&self) -> usize {
        self.features.len() + self.hidden_slots.len()
    }

    fn unpack<'s>(&self, observed: &'s [f64]) -> (f64, &'s [f64], &'s [f64]) {
        let p = self.features.len();
        (observed[0], &observed[1..1 + p], &observed[1 + p..1 + p + p * p])
    }

    fn precision_mean(current: &ParameterPosterior) -> f64 {
        match current {
            ParameterPosterior::LinearGaussian { precision, .. } => precision.mean(),
            ParameterPosterior::Multinomial { .. } => 0.0,
        }
    }
}

impl FactorEstimator for LinearGaussianEstimator {
    fn child(&self) -> VariableId {
        self.child
    }

    fn hidden_slots(&self) -> &[usize] {
        &self.hidden_slots
    }

    fn statistics_len(&self) -> usize {
        let p = self.features.len();
        1 + p + p * p
    }

    fn sufficient_statistics(&self, record: &DataInstance) -> Option<Vec<f64>> {
        let x = record.value(self.column);
        if x.is_nan() {
            return None;
        }
        let mut o = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            let value = match *feature {
                Feature::Intercept => 1.0,
                Feature::Real { column } => {
                    let v = record.value(column);
                    if v.is_nan() {
                        return None;
                    }
                    v
                }
                Feature::Indicator { column, state } => {
                    let v = record.value(column);
                    if v.is_nan() {
                        return None;
                    }
                    if v == state as f64 {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            o.push(value);
        }

        let mut stats = Vec::with_capacity(self.statistics_len());
        stats.push(x * x);
        stats.extend(o.iter().map(|v| x * v));
        for a in &o {
            stats.extend(o.iter().map(|b| a * b));
        }
        Some(stats)
    }

    /// Layout: `[S_xx, S_xz (D), S_zz (D x D, row-major)]`.
    fn expected_sufficient_statistics(&self, observed: &[f64], hidden: &[GaussianPosterior]) -> Vec<f64> {
        let p = self.features.len();
        let d = self.feature_len();
        let (s_xx, s_xo, s_oo) = self.unpack(observed);
        let n = s_oo[0];
        let h: Vec<GaussianPosterior> = self.hidden_slots.iter().map(|&s| hidden[s]).collect();

        let mut out = vec![0.0; 1 + d + d * d];
        out[0] = s_xx;
        {
            let s_xz = &mut out[1..1 + d];
            s_xz[..p].copy_from_slice(s_xo);
            for (k, hk) in h.iter().enumerate() {
                s_xz[p + k] = s_xo[0] * hk.mean;
            }
        }
        let s_zz = &mut out[1 + d..];
        for i in 0..p {
            s_zz[i * d..i * d + p].copy_from_slice(&s_oo[i * p..(i + 1) * p]);
            for (k, hk) in h.iter().enumerate() {
                let cross = s_oo[i] * hk.mean;
                s_zz[i * d + p + k] = cross;
                s_zz[(p + k) * d + i] = cross;
            }
        }
        for (k, hk) in h.iter().enumerate() {
            for (l, hl) in h.iter().enumerate() {
                s_zz[(p + k) * d + p + l] = if k == l {
                    n * hk.second_moment()
                } else {
                    n * hk.mean * hl.mean
                };
            }
        }
        out
    }

    fn initial_prior(&self, priors: &ParameterPriors) -> ParameterPosterior {
        let observed = std::iter::repeat(GaussianPosterior::new(0.0, priors.coefficient_variance))
            .take(self.features.len());
        let loadings = std::iter::repeat(GaussianPosterior::new(
            priors.hidden_loading_mean,
            priors.hidden_loading_variance,
        ))
        .take(self.hidden_slots.len());
        ParameterPosterior::LinearGaussian {
            coefficients: observed.chain(loadings).collect(),
            precision: GammaPosterior::new(priors.precision_shape, priors.precision_rate),
        }
    }

    fn update_parameters(
        &self,
        observed: &[f64],
        hidden: &[GaussianPosterior],
        prior: &ParameterPosterior,
        current: &ParameterPosterior,
    ) -> Result<ParameterUpdate, LearnError> {
        let (prior_coefficients, prior_precision, mut coefficients, precision) = match (prior, current) {
            (
                ParameterPosterior::LinearGaussian {
                    coefficients: pc,
                    precision: pp,
                },
                ParameterPosterior::LinearGaussian {
                    coefficients: cc,
                    precision: cp,
                },
            ) => (pc, pp, cc.clone(), cp),
            _ => {
                return Err(LearnError::Internal(
                    "linear-Gaussian factor received a non-Gaussian posterior".into(),
                ))
            }
        };
        let d = self.feature_len();
        if coefficients.len() != d || prior_coefficients.len() != d {
            return Err(LearnError::Internal(format!(
                "coefficient count mismatch: expected {}, got {}",
                d,
                coefficients.len()
            )));
        }

        let stats = self.expected_sufficient_statistics(observed, hidden);
        let s_xx = stats[0];
        let s_xz = &stats[1..1 + d];
        let s_zz = &stats[1 + d..];
        let n = s_zz[0];
        let lambda = precision.mean();
        let mut floor_hits = 0;

        for j in 0..d {
            let row = &s_zz[j * d..(j + 1) * d];
            let others: f64 = coefficients
                .iter()
                .enumerate()
                .filter(|&(e, _)| e != j)
                .map(|(e, c)| c.mean * row[e])
                .sum();
            let prior_j = prior_coefficients[j];
            let tau = prior_j.precision() + lambda * row[j];
            let eta = prior_j.precision() * prior_j.mean + lambda * (s_xz[j] - others);
            let (updated, clamped) = GaussianPosterior::from_natural(tau, eta);
            if clamped {
                floor_hits += 1;
            }
            coefficients[j] = updated;
        }

        let mut residual = s_xx;
        for j in 0..d {
            residual -= 2.0 * coefficients[j].mean * s_xz[j];
            for e in 0..d {
                let second = if e == j {
                    coefficients[j].second_moment()
                } else {
                    coefficients[j].mean * coefficients[e].mean
                };
                residual += second * s_zz[j * d + e];
            }
        }
        let precision = GammaPosterior::new(
            prior_precision.shape + 0.5 * n,
            prior_precision.rate + 0.5 * residual.max(0.0),
        );

        Ok(ParameterUpdate {
            posterior: ParameterPosterior::LinearGaussian {
                coefficients,
                precision,
            },
            floor_hits,
        })
    }

    fn hidden_message(
        &self,
        observed: &[f64],
        hidden: &[GaussianPosterior],
        slot: usize,
        current: &ParameterPosterior,
    ) -> Option<HiddenMessage> {
        let k = self.hidden_slots.iter().position(|&s| s == slot)?;
        let coefficients = match current {
            ParameterPosterior::LinearGaussian { coefficients, .. } => coefficients,
            ParameterPosterior::Multinomial { .. } => return None,
        };
        let p = self.features.len();
        let (_, s_xo, s_oo) = self.unpack(observed);
        let n = s_oo[0];
        let lambda = Self::precision_mean(current);
        let loading = coefficients.get(p + k)?;

        let mut residual = s_xo[0];
        for (e, c) in coefficients.iter().take(p).enumerate() {
            residual -= c.mean * s_oo[e];
        }
        for (l, &other) in self.hidden_slots.iter().enumerate() {
            if l != k {
                residual -= coefficients.get(p + l)?.mean * n * hidden.get(other)?.mean;
            }
        }
        Some(HiddenMessage {
            precision: lambda * loading.second_moment() * n,
            weighted_mean: lambda * loading.mean * residual,
        })
    }

    fn parameter_labels(&self) -> Vec<String> {
        self.labels.clone()
    }
}

/// Dirichlet-multinomial conditional of a finite child.
#[derive(Debug, Clone)]
pub struct MultinomialEstimator {
    child: VariableId,
    column: usize,
    states: usize,
    /// `(column, states)` of each parent, most significant first.
    parents: Vec<(usize, usize)>,
    labels: Vec<String>,
}

impl MultinomialEstimator {
    /// Number of parent configurations (1 without parents).
    pub fn configurations(&self) -> usize {
        self.parents.iter().map(|&(_, k)| k).product()
    }

    /// Configuration index of a record, `None` when a parent value is missing.
    fn configuration_of(&self, record: &DataInstance) -> Option<usize> {
        self.parents.iter().try_fold(0usize, |acc, &(column, states)| {
            state_of(record.value(column), states).map(|s| acc * states + s)
        })
    }
}

impl FactorEstimator for MultinomialEstimator {
    fn child(&self) -> VariableId {
        self.child
    }

    fn hidden_slots(&self) -> &[usize] {
        &[]
    }

    fn statistics_len(&self) -> usize {
        self.configurations() * self.states
    }

    fn sufficient_statistics(&self, record: &DataInstance) -> Option<Vec<f64>> {
        let state = state_of(record.value(self.column), self.states)?;
        let config = self.configuration_of(record)?;
        let mut counts = vec![0.0; self.statistics_len()];
        counts[config * self.states + state] = 1.0;
        Some(counts)
    }

    fn expected_sufficient_statistics(&self, observed: &[f64], _hidden: &[GaussianPosterior]) -> Vec<f64> {
        observed.to_vec()
    }

    fn initial_prior(&self, priors: &ParameterPriors) -> ParameterPosterior {
        ParameterPosterior::Multinomial {
            tables: vec![
                DirichletPosterior::uniform(self.states, priors.dirichlet_pseudo_count);
                self.configurations()
            ],
        }
    }

    fn update_parameters(
        &self,
        observed: &[f64],
        _hidden: &[GaussianPosterior],
        prior: &ParameterPosterior,
        _current: &ParameterPosterior,
    ) -> Result<ParameterUpdate, LearnError> {
        let tables = match prior {
            ParameterPosterior::Multinomial { tables } => tables,
            ParameterPosterior::LinearGaussian { .. } => {
                return Err(LearnError::Internal(
                    "multinomial factor received a Gaussian posterior".into(),
                ))
            }
        };
        if tables.len() != self.configurations() {
            return Err(LearnError::Internal(format!(
                "table count mismatch: expected {}, got {}",
                self.configurations(),
                tables.len()
            )));
        }
        let tables = tables
            .iter()
            .zip(observed.chunks(self.states))
            .map(|(table, counts)| table.with_counts(counts))
            .collect();
        Ok(ParameterUpdate {
            posterior: ParameterPosterior::Multinomial { tables },
            floor_hits: 0,
        })
    }

    fn hidden_message(
        &self,
        _observed: &[f64],
        _hidden: &[GaussianPosterior],
        _slot: usize,
        _current: &ParameterPosterior,
    ) -> Option<HiddenMessage> {
        None
    }

    fn parameter_labels(&self) -> Vec<String> {
        self.labels.clone()
    }
}

/// The factors of a model, one per observed variable, plus the hidden slots.
#[derive(Debug, Clone)]
pub struct FactorGraph {
    attributes: Arc<Attributes>,
    variables: Arc<Variables>,
    hidden: Vec<VariableId>,
    factors: Vec<Arc<dyn FactorEstimator>>,
}

impl FactorGraph {
    /// Derives the factors of `dag`.
    ///
    /// `hidden` lists the hidden variables in slot order; every hidden parent
    /// of the graph must appear in it.
    pub fn from_dag(
        dag: &Dag,
        hidden: &[VariableId],
        attributes: Arc<Attributes>,
    ) -> Result<Self, LearnError> {
        let variables = dag.variables().clone();
        let mut factors: Vec<Arc<dyn FactorEstimator>> = Vec::new();

        for var in variables.observed() {
            let column = var.attribute().ok_or_else(|| {
                LearnError::Internal(format!("observed variable '{}' has no column", var.name()))
            })?;
            let set = dag.parent_set(var.id()).ok_or_else(|| {
                LearnError::Internal(format!("no parent set for '{}'", var.name()))
            })?;

            match var.state_space() {
                StateSpaceType::Real => {
                    let mut features = vec![Feature::Intercept];
                    let mut labels = vec!["intercept".to_string()];
                    let mut hidden_slots = Vec::new();
                    let mut hidden_labels = Vec::new();
                    for &parent_id in set.parents() {
                        let parent = variables.get(parent_id).ok_or_else(|| {
                            LearnError::Internal(format!("unknown parent {:?}", parent_id))
                        })?;
                        match (parent.attribute(), parent.state_space()) {
                            (None, _) => {
                                let slot = hidden.iter().position(|&h| h == parent_id).ok_or_else(|| {
                                    LearnError::Internal(format!(
                                        "hidden parent '{}' has no slot",
                                        parent.name()
                                    ))
                                })?;
                                hidden_slots.push(slot);
                                hidden_labels.push(parent.name().to_string());
                            }
                            (Some(column), StateSpaceType::Real) => {
                                features.push(Feature::Real { column });
                                labels.push(parent.name().to_string());
                            }
                            (Some(column), StateSpaceType::Finite { states }) => {
                                for state in 1..states {
                                    features.push(Feature::Indicator { column, state });
                                    labels.push(format!("{}={}", parent.name(), state));
                                }
                            }
                        }
                    }
                    labels.extend(hidden_labels);
                    factors.push(Arc::new(LinearGaussianEstimator {
                        child: var.id(),
                        column,
                        features,
                        labels,
                        hidden_slots,
                    }));
                }
                StateSpaceType::Finite { states } => {
                    let mut parents = Vec::with_capacity(set.len());
                    let mut names = Vec::with_capacity(set.len());
                    for &parent_id in set.parents() {
                        let parent = variables.get(parent_id).ok_or_else(|| {
                            LearnError::Internal(format!("unknown parent {:?}", parent_id))
                        })?;
                        match (parent.attribute(), parent.state_space()) {
                            (Some(column), StateSpaceType::Finite { states }) => {
                                parents.push((column, states));
                                names.push(parent.name().to_string());
                            }
                            _ => {
                                return Err(LearnError::Configuration(format!(
                                    "finite-state variable '{}' cannot have the real-valued parent '{}'",
                                    var.name(),
                                    parent.name()
                                )))
                            }
                        }
                    }
                    let configurations: usize = parents.iter().map(|&(_, k)| k).product();
                    let labels = (0..configurations)
                        .map(|mut config| {
                            if names.is_empty() {
                                return "marginal".to_string();
                            }
                            let mut parts = vec![String::new(); names.len()];
                            for (i, &(_, k)) in parents.iter().enumerate().rev() {
                                parts[i] = format!("{}={}", names[i], config % k);
                                config /= k;
                            }
                            parts.join(",")
                        })
                        .collect();
                    factors.push(Arc::new(MultinomialEstimator {
                        child: var.id(),
                        column,
                        states,
                        parents,
                        labels,
                    }));
                }
            }
        }

        Ok(Self {
            attributes,
            variables,
            hidden: hidden.to_vec(),
            factors,
        })
    }

    pub fn attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    pub fn variables(&self) -> &Arc<Variables> {
        &self.variables
    }

    /// Hidden variables in slot order.
    pub fn hidden(&self) -> &[VariableId] {
        &self.hidden
    }

    pub fn factors(&self) -> &[Arc<dyn FactorEstimator>] {
        &self.factors
    }

    /// Position of the factor of `child`, if it has one.
    pub fn factor_of(&self, child: VariableId) -> Option<usize> {
        self.factors.iter().position(|f| f.child() == child)
    }

    /// Window-0 prior of every factor, in factor order.
    pub fn initial_priors(&self, priors: &ParameterPriors) -> Vec<ParameterPosterior> {
        self.factors.iter().map(|f| f.initial_prior(priors)).collect()
    }
}
