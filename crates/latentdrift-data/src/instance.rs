//! Records and in-memory batches.

use std::sync::Arc;

use crate::attributes::Attributes;
use crate::errors::DataError;

/// One observation: a value per schema attribute.
///
/// Finite-state values are stored as state indices; `NaN` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataInstance {
    values: Vec<f64>,
}

impl DataInstance {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Value of the attribute at `index`, `NaN` when out of range.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(f64::NAN)
    }

    #[inline]
    pub fn is_missing(&self, index: usize) -> bool {
        self.value(index).is_nan()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for DataInstance {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// An ordered, finite batch of records sharing one schema.
#[derive(Debug, Clone)]
pub struct DataOnMemory {
    attributes: Arc<Attributes>,
    instances: Vec<DataInstance>,
}

impl DataOnMemory {
    /// Creates an empty batch over `attributes`.
    pub fn new(attributes: Arc<Attributes>) -> Self {
        Self {
            attributes,
            instances: Vec::new(),
        }
    }

    /// Builds a batch, validating every record against the schema.
    pub fn from_instances(
        attributes: Arc<Attributes>,
        instances: Vec<DataInstance>,
    ) -> Result<Self, DataError> {
        let mut batch = Self::new(attributes);
        batch.instances.reserve(instances.len());
        for instance in instances {
            batch.push(instance)?;
        }
        Ok(batch)
    }

    /// Appends a record after checking width and value domains.
    pub fn push(&mut self, instance: DataInstance) -> Result<(), DataError> {
        if instance.len() != self.attributes.len() {
            return Err(DataError::Record(format!(
                "record {} has {} values but the schema has {} attributes",
                self.instances.len(),
                instance.len(),
                self.attributes.len()
            )));
        }
        for att in self.attributes.full_list() {
            let value = instance.value(att.index());
            if !att.domain().accepts(value) {
                return Err(DataError::Record(format!(
                    "record {}: value {} is outside the domain of attribute '{}'",
                    self.instances.len(),
                    value,
                    att.name()
                )));
            }
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    pub fn instances(&self) -> &[DataInstance] {
        &self.instances
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataInstance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl<'a> IntoIterator for &'a DataOnMemory {
    type Item = &'a DataInstance;
    type IntoIter = std::slice::Iter<'a, DataInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeSpec;

    fn schema() -> Arc<Attributes> {
        Arc::new(
            Attributes::new([AttributeSpec::real("x"), AttributeSpec::discrete("c", 2)])
                .expect("schema"),
        )
    }

    #[test]
    fn push_rejects_wrong_width() {
        let mut batch = DataOnMemory::new(schema());
        let err = batch.push(DataInstance::new(vec![1.0])).unwrap_err();
        assert!(matches!(err, DataError::Record(_)));
        assert!(batch.is_empty());
    }

    #[test]
    fn push_rejects_out_of_domain_state() {
        let mut batch = DataOnMemory::new(schema());
        assert!(batch.push(DataInstance::new(vec![0.3, 2.0])).is_err());
        assert!(batch.push(DataInstance::new(vec![0.3, 1.0])).is_ok());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn missing_values_are_accepted() {
        let batch =
            DataOnMemory::from_instances(schema(), vec![DataInstance::new(vec![f64::NAN, 0.0])])
                .expect("batch");
        assert!(batch.instances()[0].is_missing(0));
        assert!(!batch.instances()[0].is_missing(1));
    }
}
