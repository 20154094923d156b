//! Attribute schema of a data stream.
//!
//! An [`Attributes`] value describes the fixed set of observed columns: name,
//! value domain and whether the column is "special" (time stamps, sequence ids
//! and similar bookkeeping columns that never become model variables).
//! Schemas are immutable once built and are shared behind an `Arc`.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::errors::DataError;

/// Value domain of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueDomain {
    /// Real-valued column.
    Real,
    /// Finite set of named states, encoded as state indices.
    Categorical { states: Vec<Arc<str>> },
    /// Integer-coded finite column with values `0..cardinality`.
    Discrete { cardinality: usize },
}

impl ValueDomain {
    /// Number of states for finite domains, `None` for real ones.
    pub fn cardinality(&self) -> Option<usize> {
        match self {
            ValueDomain::Real => None,
            ValueDomain::Categorical { states } => Some(states.len()),
            ValueDomain::Discrete { cardinality } => Some(*cardinality),
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ValueDomain::Real)
    }

    /// Returns true if `value` is a legal encoded value for this domain.
    ///
    /// Missing values (`NaN`) are accepted by every domain.
    pub fn accepts(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        match self.cardinality() {
            None => value.is_finite(),
            Some(k) => value >= 0.0 && value.fract() == 0.0 && (value as usize) < k,
        }
    }
}

/// A single column of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    index: usize,
    name: Arc<str>,
    domain: ValueDomain,
    special: bool,
}

impl Attribute {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn domain(&self) -> &ValueDomain {
        &self.domain
    }

    /// Special attributes are carried in records but never modelled.
    pub fn is_special(&self) -> bool {
        self.special
    }
}

/// Column declaration used to build an [`Attributes`] schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    name: Arc<str>,
    domain: ValueDomain,
    special: bool,
}

impl AttributeSpec {
    pub fn real(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            domain: ValueDomain::Real,
            special: false,
        }
    }

    pub fn categorical<I, S>(name: impl Into<Arc<str>>, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            name: name.into(),
            domain: ValueDomain::Categorical {
                states: states.into_iter().map(Into::into).collect(),
            },
            special: false,
        }
    }

    pub fn discrete(name: impl Into<Arc<str>>, cardinality: usize) -> Self {
        Self {
            name: name.into(),
            domain: ValueDomain::Discrete { cardinality },
            special: false,
        }
    }

    /// Marks the column as special (excluded from modelling).
    pub fn special(mut self) -> Self {
        self.special = true;
        self
    }
}

/// Immutable, ordered attribute schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    list: Vec<Attribute>,
    by_name: FxHashMap<Arc<str>, usize>,
}

impl Attributes {
    /// Builds a schema, rejecting duplicate names and empty finite domains.
    pub fn new(specs: impl IntoIterator<Item = AttributeSpec>) -> Result<Self, DataError> {
        let mut list = Vec::new();
        let mut by_name = FxHashMap::default();
        for (index, spec) in specs.into_iter().enumerate() {
            if spec.domain.cardinality() == Some(0) {
                return Err(DataError::Schema(format!(
                    "attribute '{}' declares an empty finite domain",
                    spec.name
                )));
            }
            if by_name.insert(spec.name.clone(), index).is_some() {
                return Err(DataError::Schema(format!(
                    "duplicate attribute name '{}'",
                    spec.name
                )));
            }
            list.push(Attribute {
                index,
                name: spec.name,
                domain: spec.domain,
                special: spec.special,
            });
        }
        Ok(Self { list, by_name })
    }

    /// Convenience constructor for an all-real schema.
    pub fn real<I, S>(names: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(names.into_iter().map(AttributeSpec::real))
    }

    /// Every attribute, special ones included, in column order.
    pub fn full_list(&self) -> &[Attribute] {
        &self.list
    }

    /// Attributes that become model variables.
    pub fn non_special(&self) -> impl Iterator<Item = &Attribute> {
        self.list.iter().filter(|att| !att.special)
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.list.get(index)
    }

    pub fn by_name(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|&idx| &self.list[idx])
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.list.iter().map(|att| att.name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
