//! Graph builders.
//!
//! A [`GraphBuilder`] turns an attribute schema and a configuration into a
//! DAG plus the list of hidden variables. Builders are strategy objects held
//! by the learning session; swapping the builder swaps the model family.
//!
//! - [`ConceptDriftBuilder`]: class-conditional layout with global hidden
//!   drift parents on every non-class attribute.
//! - [`LinearRegressionBuilder`]: every attribute is a parent of a real-valued
//!   target; optionally attributes are chained to each other.

use std::fmt;
use std::sync::Arc;

use latentdrift_data::Attributes;

use crate::engine::config::ModelConfig;
use crate::engine::dag::Dag;
use crate::engine::errors::LearnError;
use crate::engine::variables::{VariableId, Variables};

/// Prefix of the deterministic hidden variable names.
pub const GLOBAL_HIDDEN_PREFIX: &str = "GlobalHidden_";

/// Output of a graph builder.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub dag: Dag,
    /// Hidden drift variables in slot order.
    pub hidden: Vec<VariableId>,
    /// The designated class or target variable.
    pub class_variable: VariableId,
}

impl BuiltGraph {
    pub fn variables(&self) -> &Arc<Variables> {
        self.dag.variables()
    }
}

/// Strategy that lays out the model structure.
pub trait GraphBuilder: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn build(&self, attributes: &Attributes, config: &ModelConfig) -> Result<BuiltGraph, LearnError>;
}

/// Resolves the class attribute index to its variable.
fn class_variable(
    attributes: &Attributes,
    variables: &Variables,
    class_index: usize,
) -> Result<VariableId, LearnError> {
    let attribute = attributes.get(class_index).ok_or_else(|| {
        LearnError::Configuration(format!(
            "class index {} out of range for {} attributes",
            class_index,
            attributes.len()
        ))
    })?;
    if attribute.is_special() {
        return Err(LearnError::Configuration(format!(
            "class index {} names the special attribute '{}'",
            class_index,
            attribute.name()
        )));
    }
    variables
        .by_name(attribute.name())
        .map(|var| var.id())
        .ok_or_else(|| {
            LearnError::Internal(format!(
                "no variable minted for attribute '{}'",
                attribute.name()
            ))
        })
}

/// Class-conditional layout with global hidden drift variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptDriftBuilder;

impl GraphBuilder for ConceptDriftBuilder {
    fn name(&self) -> &'static str {
        "concept-drift"
    }

    fn build(&self, attributes: &Attributes, config: &ModelConfig) -> Result<BuiltGraph, LearnError> {
        if config.global_hidden && config.hidden_count == 0 {
            return Err(LearnError::Configuration(
                "global hidden modelling requires at least one hidden variable".into(),
            ));
        }

        let mut variables = Variables::from_attributes(attributes);
        let class = class_variable(attributes, &variables, config.class_index)?;
        let hidden = (0..config.hidden_count)
            .map(|i| variables.new_gaussian_variable(&format!("{}{}", GLOBAL_HIDDEN_PREFIX, i)))
            .collect::<Result<Vec<_>, _>>()?;

        let variables = Arc::new(variables);
        let mut dag = Dag::new(variables.clone());
        for var in variables.observed() {
            if var.id() == class {
                continue;
            }
            dag.add_parent(var.id(), class)?;
            if config.global_hidden {
                for &h in &hidden {
                    dag.add_parent(var.id(), h)?;
                }
            }
        }

        tracing::debug!(
            builder = self.name(),
            variables = variables.len(),
            edges = dag.edge_count(),
            "built dependency graph"
        );
        Ok(BuiltGraph {
            dag,
            hidden,
            class_variable: class,
        })
    }
}

/// Bayesian linear regression layout.
///
/// The target (the configured class attribute) receives every other variable
/// as parent. Unless `diagonal`, attribute `i` also receives attribute `j` as
/// parent for every `i < j`, giving a full covariance among the features.
#[derive(Debug, Clone, Copy)]
pub struct LinearRegressionBuilder {
    pub diagonal: bool,
}

impl Default for LinearRegressionBuilder {
    fn default() -> Self {
        Self { diagonal: true }
    }
}

impl GraphBuilder for LinearRegressionBuilder {
    fn name(&self) -> &'static str {
        "linear-regression"
    }

    fn build(&self, attributes: &Attributes, config: &ModelConfig) -> Result<BuiltGraph, LearnError> {
        let variables = Variables::from_attributes(attributes);
        if let Some(var) = variables.iter().find(|var| !var.state_space().is_real()) {
            return Err(LearnError::Configuration(format!(
                "linear regression requires real-valued variables; '{}' is finite",
                var.name()
            )));
        }
        let target = class_variable(attributes, &variables, config.class_index)?;

        let variables = Arc::new(variables);
        let mut dag = Dag::new(variables.clone());
        let features: Vec<VariableId> = variables
            .iter()
            .map(|var| var.id())
            .filter(|&id| id != target)
            .collect();
        for &feature in &features {
            dag.add_parent(target, feature)?;
        }
        if !self.diagonal {
            for (i, &child) in features.iter().enumerate() {
                for &parent in &features[i + 1..] {
                    dag.add_parent(child, parent)?;
                }
            }
        }

        tracing::debug!(
            builder = self.name(),
            variables = variables.len(),
            edges = dag.edge_count(),
            "built dependency graph"
        );
        Ok(BuiltGraph {
            dag,
            hidden: Vec::new(),
            class_variable: target,
        })
    }
}
