//! Plate replication of a factor graph over one window of records.
//!
//! Every record becomes a replica holding its own copy of the observed
//! variables; the hidden variables are shared nodes referenced by every
//! replica. Because the only cross-replica coupling runs through the shared
//! nodes, a window is summarised by the per-factor sums of the replicas'
//! sufficient statistics.
//!
//! ## Reduction order
//!
//! Records are split into fixed chunks of [`REPLICA_CHUNK`] in record order.
//! Each chunk is summed sequentially and the chunk partials are folded in
//! chunk order, so the result does not depend on which thread evaluated which
//! chunk. Sequential and parallel execution produce identical sums.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use latentdrift_data::{DataError, DataInstance, DataOnMemory};

use crate::engine::config::Execution;
use crate::engine::errors::LearnError;
use crate::engine::estimators::FactorGraph;
use crate::engine::variables::VariableId;

/// Records per reduction chunk.
pub const REPLICA_CHUNK: usize = 256;

/// Summed statistics of one factor over the replicas of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorStatistics {
    /// Sum of the replicas' sufficient statistics.
    pub observed: Vec<f64>,
    /// Replicas that contributed.
    pub replicas: usize,
    /// Replicas skipped because a needed value was missing.
    pub skipped: usize,
}

impl FactorStatistics {
    fn zeros(len: usize) -> Self {
        Self {
            observed: vec![0.0; len],
            replicas: 0,
            skipped: 0,
        }
    }

    fn absorb(&mut self, other: &FactorStatistics) {
        for (acc, v) in self.observed.iter_mut().zip(&other.observed) {
            *acc += v;
        }
        self.replicas += other.replicas;
        self.skipped += other.skipped;
    }
}

/// One record of the window with its local view of the factors.
#[derive(Debug, Clone, Copy)]
pub struct Replica<'a> {
    index: usize,
    record: &'a DataInstance,
    graph: &'a FactorGraph,
}

impl<'a> Replica<'a> {
    /// Position of the record in the batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record(&self) -> &'a DataInstance {
        self.record
    }

    /// Local statistics of factor `factor`; `None` when the record misses a value it needs.
    pub fn statistics(&self, factor: usize) -> Option<Vec<f64>> {
        self.graph
            .factors()
            .get(factor)
            .and_then(|f| f.sufficient_statistics(self.record))
    }
}

/// The replicated model of one window.
#[derive(Debug, Clone)]
pub struct PlateModel<'a> {
    graph: &'a FactorGraph,
    batch: &'a DataOnMemory,
    statistics: Vec<FactorStatistics>,
}

impl<'a> PlateModel<'a> {
    /// Replicates `graph` once per record of `batch` and reduces the replica statistics.
    pub fn expand(
        graph: &'a FactorGraph,
        batch: &'a DataOnMemory,
        execution: Execution,
    ) -> Result<Self, LearnError> {
        if batch.attributes().as_ref() != graph.attributes().as_ref() {
            return Err(DataError::Schema(
                "batch schema differs from the model schema".into(),
            )
            .into());
        }
        let width = graph.attributes().len();
        if let Some((i, record)) = batch
            .iter()
            .enumerate()
            .find(|(_, record)| record.len() != width)
        {
            return Err(DataError::Record(format!(
                "record {} has {} values but the schema has {} attributes",
                i,
                record.len(),
                width
            ))
            .into());
        }

        let partials = chunk_partials(graph, batch.instances(), execution);
        let mut statistics: Vec<FactorStatistics> = graph
            .factors()
            .iter()
            .map(|f| FactorStatistics::zeros(f.statistics_len()))
            .collect();
        for partial in &partials {
            for (acc, chunk) in statistics.iter_mut().zip(partial) {
                acc.absorb(chunk);
            }
        }

        let skipped: usize = statistics.iter().map(|s| s.skipped).sum();
        if skipped > 0 {
            tracing::debug!(skipped, "replicas skipped for missing values");
        }
        Ok(Self {
            graph,
            batch,
            statistics,
        })
    }

    pub fn graph(&self) -> &'a FactorGraph {
        self.graph
    }

    pub fn replica_count(&self) -> usize {
        self.batch.len()
    }

    pub fn replica(&self, index: usize) -> Option<Replica<'a>> {
        self.batch.instances().get(index).map(|record| Replica {
            index,
            record,
            graph: self.graph,
        })
    }

    pub fn replicas(&self) -> impl Iterator<Item = Replica<'a>> + '_ {
        let graph = self.graph;
        self.batch
            .iter()
            .enumerate()
            .map(move |(index, record)| Replica {
                index,
                record,
                graph,
            })
    }

    /// Hidden variables shared by every replica, in slot order.
    pub fn shared_hidden(&self) -> &'a [VariableId] {
        self.graph.hidden()
    }

    /// Reduced statistics, one entry per factor.
    pub fn statistics(&self) -> &[FactorStatistics] {
        &self.statistics
    }

    /// Total replica skips across factors.
    pub fn skipped(&self) -> usize {
        self.statistics.iter().map(|s| s.skipped).sum()
    }
}

fn chunk_statistics(graph: &FactorGraph, chunk: &[DataInstance]) -> Vec<FactorStatistics> {
    graph
        .factors()
        .iter()
        .map(|factor| {
            let mut acc = FactorStatistics::zeros(factor.statistics_len());
            for record in chunk {
                match factor.sufficient_statistics(record) {
                    Some(stats) => {
                        for (a, v) in acc.observed.iter_mut().zip(stats) {
                            *a += v;
                        }
                        acc.replicas += 1;
                    }
                    None => acc.skipped += 1,
                }
            }
            acc
        })
        .collect()
}

fn chunk_partials(
    graph: &FactorGraph,
    records: &[DataInstance],
    execution: Execution,
) -> Vec<Vec<FactorStatistics>> {
    match execution {
        #[cfg(feature = "parallel")]
        Execution::Parallel => records
            .par_chunks(REPLICA_CHUNK)
            .map(|chunk| chunk_statistics(graph, chunk))
            .collect(),
        _ => records
            .chunks(REPLICA_CHUNK)
            .map(|chunk| chunk_statistics(graph, chunk))
            .collect(),
    }
}
