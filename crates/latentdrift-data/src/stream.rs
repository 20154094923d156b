//! Data streams consumed window by window.
//!
//! A stream yields batches of at most `size` records. Batches are handed out
//! exactly once; the final batch may be shorter than the requested size.

use std::sync::Arc;

use crate::attributes::Attributes;
use crate::errors::DataError;
use crate::instance::{DataInstance, DataOnMemory};

/// Source of schema-conformant records.
pub trait DataStream {
    /// Schema shared by every batch of the stream.
    fn attributes(&self) -> &Arc<Attributes>;

    /// Takes the next batch of up to `size` records; `None` once exhausted.
    fn next_batch(&mut self, size: usize) -> Option<DataOnMemory>;

    /// Iterates over the remaining records in batches of `size`.
    fn batches(self, size: usize) -> Batches<Self>
    where
        Self: Sized,
    {
        Batches { stream: self, size }
    }
}

/// Iterator adapter returned by [`DataStream::batches`].
#[derive(Debug)]
pub struct Batches<S> {
    stream: S,
    size: usize,
}

impl<S: DataStream> Iterator for Batches<S> {
    type Item = DataOnMemory;

    fn next(&mut self) -> Option<Self::Item> {
        if self.size == 0 {
            return None;
        }
        self.stream.next_batch(self.size)
    }
}

/// A finite stream over records already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryStream {
    attributes: Arc<Attributes>,
    records: std::vec::IntoIter<DataInstance>,
}

impl InMemoryStream {
    /// Validates every record against the schema up front.
    pub fn new(attributes: Arc<Attributes>, records: Vec<DataInstance>) -> Result<Self, DataError> {
        let validated = DataOnMemory::from_instances(attributes.clone(), records)?;
        Ok(Self {
            attributes,
            records: validated.instances().to_vec().into_iter(),
        })
    }

    /// Records not yet handed out.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl DataStream for InMemoryStream {
    fn attributes(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    fn next_batch(&mut self, size: usize) -> Option<DataOnMemory> {
        if size == 0 || self.records.as_slice().is_empty() {
            return None;
        }
        let mut batch = DataOnMemory::new(self.attributes.clone());
        for record in self.records.by_ref().take(size) {
            // Records were validated in `new`.
            if batch.push(record).is_err() {
                return None;
            }
        }
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_cover_stream_with_short_tail() {
        let atts = Arc::new(Attributes::real(["x"]).expect("schema"));
        let records = (0..7).map(|i| DataInstance::new(vec![i as f64])).collect();
        let stream = InMemoryStream::new(atts, records).expect("stream");
        let sizes: Vec<usize> = stream.batches(3).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn zero_sized_batches_yield_nothing() {
        let atts = Arc::new(Attributes::real(["x"]).expect("schema"));
        let stream =
            InMemoryStream::new(atts, vec![DataInstance::new(vec![1.0])]).expect("stream");
        assert_eq!(stream.batches(0).count(), 0);
    }

    proptest::proptest! {
        #[test]
        fn batches_partition_the_stream(total in 0usize..200, size in 1usize..64) {
            let atts = Arc::new(Attributes::real(["x"]).expect("schema"));
            let records = (0..total).map(|i| DataInstance::new(vec![i as f64])).collect();
            let stream = InMemoryStream::new(atts, records).expect("stream");
            let batches: Vec<DataOnMemory> = stream.batches(size).collect();
            proptest::prop_assert_eq!(batches.len(), (total + size - 1) / size);
            proptest::prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= size));
            let values: Vec<f64> = batches.iter().flat_map(|b| b.iter().map(|r| r.value(0))).collect();
            let expected: Vec<f64> = (0..total).map(|i| i as f64).collect();
            proptest::prop_assert_eq!(values, expected);
        }
    }
}
