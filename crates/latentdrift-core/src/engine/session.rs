//! Streaming learning controller.
//!
//! A [`LearningSession`] owns the schema, the configuration, the graph
//! builder and, once initialized, the compiled model and its posterior.
//! Windows are learned strictly in order:
//!
//! ```text
//! Uninitialized --init_learning--> Ready { 0 }
//! Ready { t } --update_model--> Learning { t } --> Ready { t + 1 }
//! any --reset_model / structural reconfigure--> Uninitialized
//! ```
//!
//! Each window runs: transition prior (skipped at window 0), plate expansion,
//! refinement, commit, window advance.

use std::sync::Arc;

use latentdrift_data::{Attributes, DataError, DataOnMemory, DataStream};

use crate::engine::builder::{BuiltGraph, ConceptDriftBuilder, GraphBuilder};
use crate::engine::config::{Execution, ModelConfig};
use crate::engine::dag::Dag;
use crate::engine::distributions::GaussianPosterior;
use crate::engine::errors::LearnError;
use crate::engine::estimators::FactorGraph;
use crate::engine::plate::PlateModel;
use crate::engine::posterior::{ModelPosterior, ModelSnapshot, PosteriorDistribution};
use crate::engine::transition::{GaussianHiddenTransition, TransitionMethod};
use crate::engine::vmp::{VariationalMessagePassing, VmpDiagnostics};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Ready to learn window `window`.
    Ready { window: usize },
    /// Learning window `window`.
    Learning { window: usize },
}

/// Outcome of learning one window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowReport {
    /// Zero-based index of the learned window.
    pub window: usize,
    /// Records in the window.
    pub records: usize,
    pub converged: bool,
    pub diagnostics: VmpDiagnostics,
}

/// Everything derived from the configuration at initialization.
#[derive(Debug)]
struct CompiledModel {
    graph: FactorGraph,
    engine: VariationalMessagePassing,
    transition: Box<dyn TransitionMethod>,
    posterior: ModelPosterior,
}

/// Online learner over a stream of windows.
#[derive(Debug)]
pub struct LearningSession {
    attributes: Arc<Attributes>,
    config: ModelConfig,
    builder: Box<dyn GraphBuilder>,
    execution: Execution,
    state: SessionState,
    built: Option<BuiltGraph>,
    model: Option<CompiledModel>,
    transitions_applied: usize,
    last_report: Option<WindowReport>,
}

impl LearningSession {
    /// Session with the default configuration for `attributes` and the
    /// concept-drift graph layout.
    pub fn new(attributes: Arc<Attributes>) -> Self {
        let config = ModelConfig::for_attributes(&attributes);
        Self::with_config(attributes, config)
    }

    pub fn with_config(attributes: Arc<Attributes>, config: ModelConfig) -> Self {
        Self {
            attributes,
            config,
            builder: Box::new(ConceptDriftBuilder),
            execution: Execution::default(),
            state: SessionState::Uninitialized,
            built: None,
            model: None,
            transitions_applied: 0,
            last_report: None,
        }
    }

    /// Replaces the graph builder; the session returns to `Uninitialized`.
    pub fn with_builder(mut self, builder: Box<dyn GraphBuilder>) -> Self {
        self.set_builder(builder);
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of windows learned since initialization.
    pub fn window_index(&self) -> usize {
        match self.state {
            SessionState::Uninitialized => 0,
            SessionState::Ready { window } | SessionState::Learning { window } => window,
        }
    }

    /// Number of between-window transitions applied since initialization.
    pub fn transitions_applied(&self) -> usize {
        self.transitions_applied
    }

    pub fn last_report(&self) -> Option<&WindowReport> {
        self.last_report.as_ref()
    }

    /// Validates the configuration, builds the graph if absent and creates
    /// the window-0 prior.
    ///
    /// On failure the session is left `Uninitialized`.
    pub fn init_learning(&mut self) -> Result<(), LearnError> {
        match self.compile() {
            Ok(model) => {
                tracing::info!(
                    builder = self.builder.name(),
                    variables = model.graph.variables().len(),
                    hidden = model.graph.hidden().len(),
                    factors = model.graph.factors().len(),
                    "learning session initialized"
                );
                self.model = Some(model);
                self.state = SessionState::Ready { window: 0 };
                self.transitions_applied = 0;
                self.last_report = None;
                Ok(())
            }
            Err(err) => {
                self.invalidate();
                Err(err)
            }
        }
    }

    fn compile(&mut self) -> Result<CompiledModel, LearnError> {
        self.config.validate(&self.attributes)?;
        let built = match self.built.take() {
            Some(built) => built,
            None => self.builder.build(&self.attributes, &self.config)?,
        };
        built.dag.validate()?;
        let graph = FactorGraph::from_dag(&built.dag, &built.hidden, self.attributes.clone())?;
        let transition =
            GaussianHiddenTransition::new(self.config.fading, self.config.transition_variance)?;
        let hidden = built
            .hidden
            .iter()
            .map(|&id| {
                built
                    .variables()
                    .get(id)
                    .and_then(|var| var.default_gaussian())
                    .unwrap_or_else(GaussianPosterior::standard)
            })
            .collect();
        let posterior = ModelPosterior {
            hidden,
            parameters: graph.initial_priors(&self.config.priors),
        };
        self.built = Some(built);
        Ok(CompiledModel {
            graph,
            engine: VariationalMessagePassing::new(self.config.seed),
            transition: Box::new(transition),
            posterior,
        })
    }

    /// Learns one window. Lazily initializes; an empty batch is a no-op.
    pub fn update_model(&mut self, batch: &DataOnMemory) -> Result<Option<WindowReport>, LearnError> {
        if batch.is_empty() {
            return Ok(None);
        }
        if self.model.is_none() {
            self.init_learning()?;
        }
        let window = self.window_index();
        let execution = self.execution;
        let max_iterations = self.config.max_iterations;
        let threshold = self.config.threshold;
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| LearnError::Internal("model missing after initialization".into()))?;

        self.state = SessionState::Learning { window };
        let prior = if window == 0 {
            model.posterior.clone()
        } else {
            model.transition.prior_for(window, &model.posterior)
        };
        let refined = PlateModel::expand(&model.graph, batch, execution).and_then(|plate| {
            model
                .engine
                .at_window(window)
                .refine(&plate, &prior, max_iterations, threshold)
        });
        let refinement = match refined {
            Ok(refinement) => refinement,
            Err(err) => {
                self.state = SessionState::Ready { window };
                return Err(err);
            }
        };

        model.posterior = refinement.posterior;
        if window > 0 {
            self.transitions_applied += 1;
        }
        let report = WindowReport {
            window,
            records: batch.len(),
            converged: refinement.converged,
            diagnostics: refinement.diagnostics,
        };
        tracing::debug!(
            window,
            records = report.records,
            iterations = report.diagnostics.iterations_run,
            delta = report.diagnostics.final_max_delta,
            "window learned"
        );
        if !report.converged {
            tracing::warn!(
                window,
                iterations = report.diagnostics.iterations_run,
                "window did not converge within the iteration budget"
            );
        }
        self.state = SessionState::Ready { window: window + 1 };
        self.last_report = Some(report.clone());
        Ok(Some(report))
    }

    /// Learns every `window_size` batch of `stream` in order.
    pub fn update_from_stream<S: DataStream>(&mut self, stream: S) -> Result<Vec<WindowReport>, LearnError> {
        if stream.attributes().as_ref() != self.attributes.as_ref() {
            return Err(DataError::Schema("stream schema differs from the session schema".into()).into());
        }
        let mut reports = Vec::new();
        for batch in stream.batches(self.config.window_size) {
            if let Some(report) = self.update_model(&batch)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    fn compiled(&self) -> Result<&CompiledModel, LearnError> {
        self.model
            .as_ref()
            .ok_or_else(|| LearnError::NotInitialized("call init_learning or update_model first".into()))
    }

    /// The dependency graph of the initialized model.
    pub fn dag(&self) -> Result<&Dag, LearnError> {
        self.compiled()?;
        self.built
            .as_ref()
            .map(|built| &built.dag)
            .ok_or_else(|| LearnError::Internal("graph missing from an initialized session".into()))
    }

    /// Names of the hidden drift variables, empty before initialization.
    pub fn hidden_variable_names(&self) -> Vec<String> {
        self.built
            .as_ref()
            .map(|built| {
                built
                    .hidden
                    .iter()
                    .filter_map(|&id| built.variables().get(id).map(|var| var.name().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current posterior of the variable called `name`.
    ///
    /// Hidden variables report their Gaussian belief; observed variables the
    /// posterior over the parameters of their conditional distribution.
    pub fn posterior_distribution(&self, name: &str) -> Result<PosteriorDistribution, LearnError> {
        let model = self.compiled()?;
        let var = model
            .graph
            .variables()
            .by_name(name)
            .ok_or_else(|| LearnError::NotFound(format!("no variable named '{}'", name)))?;
        if let Some(slot) = model.graph.hidden().iter().position(|&h| h == var.id()) {
            let belief = model
                .posterior
                .hidden
                .get(slot)
                .ok_or_else(|| LearnError::Internal(format!("no belief for hidden slot {}", slot)))?;
            return Ok(PosteriorDistribution::Hidden(*belief));
        }
        let factor = model
            .graph
            .factor_of(var.id())
            .ok_or_else(|| LearnError::NotFound(format!("variable '{}' has no distribution", name)))?;
        let estimator = &model.graph.factors()[factor];
        let parameters = model
            .posterior
            .parameters
            .get(factor)
            .ok_or_else(|| LearnError::Internal(format!("no posterior for factor {}", factor)))?;
        Ok(PosteriorDistribution::labelled(estimator.parameter_labels(), parameters))
    }

    /// Labelled snapshot of the full posterior.
    pub fn model(&self) -> Result<ModelSnapshot, LearnError> {
        let model = self.compiled()?;
        model
            .posterior
            .snapshot(&model.graph, self.dag()?, self.window_index())
    }

    /// Raw posterior state, indexed by hidden slot and factor position.
    pub fn posterior(&self) -> Result<&ModelPosterior, LearnError> {
        Ok(&self.compiled()?.posterior)
    }

    /// Discards graph and posterior; the session returns to `Uninitialized`.
    pub fn reset_model(&mut self) {
        if self.state != SessionState::Uninitialized {
            tracing::info!(windows = self.window_index(), "learning session reset");
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.state = SessionState::Uninitialized;
        self.built = None;
        self.model = None;
        self.transitions_applied = 0;
        self.last_report = None;
    }

    /// Replaces the configuration. Structural changes invalidate the model.
    pub fn reconfigure(&mut self, config: ModelConfig) {
        if self.config.requires_rebuild(&config) {
            self.reset_model();
        }
        self.config = config;
    }

    /// Replaces the graph builder and invalidates the model.
    pub fn set_builder(&mut self, builder: Box<dyn GraphBuilder>) {
        self.builder = builder;
        self.reset_model();
    }

    pub fn set_execution(&mut self, execution: Execution) {
        self.execution = execution;
    }

    pub fn set_class_index(&mut self, class_index: usize) {
        self.reconfigure(self.config.clone().with_class_index(class_index));
    }

    pub fn set_hidden_count(&mut self, hidden_count: usize) {
        self.reconfigure(self.config.clone().with_hidden_count(hidden_count));
    }

    pub fn set_global_hidden(&mut self, global_hidden: bool) {
        self.reconfigure(self.config.clone().with_global_hidden(global_hidden));
    }

    pub fn set_fading(&mut self, fading: f64) {
        self.reconfigure(self.config.clone().with_fading(fading));
    }

    pub fn set_transition_variance(&mut self, transition_variance: f64) {
        self.reconfigure(self.config.clone().with_transition_variance(transition_variance));
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.reconfigure(self.config.clone().with_seed(seed));
    }

    pub fn set_window_size(&mut self, window_size: usize) {
        self.reconfigure(self.config.clone().with_window_size(window_size));
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.reconfigure(self.config.clone().with_max_iterations(max_iterations));
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.reconfigure(self.config.clone().with_threshold(threshold));
    }
}
