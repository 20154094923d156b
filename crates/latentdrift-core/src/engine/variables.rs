//! Variable registry.
//!
//! Observed variables are minted from the non-special attributes of a schema,
//! in column order. Hidden variables are appended afterwards by graph
//! builders. Names are unique; variables are never mutated once created.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use latentdrift_data::{Attributes, ValueDomain};

use crate::engine::distributions::GaussianPosterior;
use crate::engine::errors::LearnError;

/// Dense identifier of a variable within one model.
///
/// VariableId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// State space of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateSpaceType {
    Real,
    Finite { states: usize },
}

impl StateSpaceType {
    pub fn is_real(self) -> bool {
        matches!(self, StateSpaceType::Real)
    }

    pub fn states(self) -> Option<usize> {
        match self {
            StateSpaceType::Real => None,
            StateSpaceType::Finite { states } => Some(states),
        }
    }
}

impl From<&ValueDomain> for StateSpaceType {
    fn from(domain: &ValueDomain) -> Self {
        match domain.cardinality() {
            None => StateSpaceType::Real,
            Some(states) => StateSpaceType::Finite { states },
        }
    }
}

/// A random variable of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    id: VariableId,
    name: Arc<str>,
    state_space: StateSpaceType,
    attribute: Option<usize>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_space(&self) -> StateSpaceType {
        self.state_space
    }

    /// Index of the backing attribute in the full schema, if observed.
    pub fn attribute(&self) -> Option<usize> {
        self.attribute
    }

    pub fn is_observed(&self) -> bool {
        self.attribute.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.attribute.is_none()
    }

    /// Default belief of a continuous variable before any evidence.
    pub fn default_gaussian(&self) -> Option<GaussianPosterior> {
        self.state_space
            .is_real()
            .then(GaussianPosterior::standard)
    }
}

/// Registry of every variable of a model.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    list: Vec<Variable>,
    by_name: FxHashMap<Arc<str>, VariableId>,
}

impl Variables {
    /// Creates one observed variable per non-special attribute.
    pub fn from_attributes(attributes: &Attributes) -> Self {
        let mut vars = Self::default();
        for att in attributes.non_special() {
            // Attribute names are unique within a schema.
            let id = VariableId(vars.list.len() as u32);
            vars.by_name.insert(att.shared_name(), id);
            vars.list.push(Variable {
                id,
                name: att.shared_name(),
                state_space: StateSpaceType::from(att.domain()),
                attribute: Some(att.index()),
            });
        }
        vars
    }

    /// Mints a hidden real-valued variable with a univariate Gaussian default.
    pub fn new_gaussian_variable(&mut self, name: &str) -> Result<VariableId, LearnError> {
        if self.by_name.contains_key(name) {
            return Err(LearnError::Configuration(format!(
                "variable name '{}' is already in use",
                name
            )));
        }
        let id = VariableId(self.list.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(name.clone(), id);
        self.list.push(Variable {
            id,
            name,
            state_space: StateSpaceType::Real,
            attribute: None,
        });
        Ok(id)
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.list.get(id.index())
    }

    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.by_name.get(name).map(|id| &self.list[id.index()])
    }

    /// Variable backed by the attribute at `attribute_index`, if any.
    pub fn by_attribute(&self, attribute_index: usize) -> Option<&Variable> {
        self.list
            .iter()
            .find(|var| var.attribute == Some(attribute_index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.list.iter()
    }

    pub fn hidden(&self) -> impl Iterator<Item = &Variable> {
        self.list.iter().filter(|var| var.is_hidden())
    }

    pub fn observed(&self) -> impl Iterator<Item = &Variable> {
        self.list.iter().filter(|var| var.is_observed())
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latentdrift_data::AttributeSpec;

    #[test]
    fn observed_variables_follow_non_special_order() {
        let atts = Attributes::new([
            AttributeSpec::real("x"),
            AttributeSpec::discrete("SEQUENCE_ID", 10).special(),
            AttributeSpec::categorical("c", ["a", "b", "c"]),
        ])
        .expect("schema");
        let vars = Variables::from_attributes(&atts);
        assert_eq!(vars.len(), 2);
        let c = vars.by_name("c").expect("c");
        assert_eq!(c.id(), VariableId(1));
        assert_eq!(c.attribute(), Some(2));
        assert_eq!(c.state_space(), StateSpaceType::Finite { states: 3 });
        assert!(vars.by_name("SEQUENCE_ID").is_none());
    }

    #[test]
    fn hidden_variables_are_appended_and_unique() {
        let atts = Attributes::real(["a", "b"]).expect("schema");
        let mut vars = Variables::from_attributes(&atts);
        let h = vars.new_gaussian_variable("GlobalHidden_0").expect("hidden");
        assert_eq!(h, VariableId(2));
        assert!(vars.get(h).expect("var").is_hidden());
        assert_eq!(
            vars.get(h).and_then(Variable::default_gaussian),
            Some(GaussianPosterior::standard())
        );
        assert!(vars.new_gaussian_variable("a").is_err());
        assert_eq!(vars.hidden().count(), 1);
        assert_eq!(vars.observed().count(), 2);
    }
}
