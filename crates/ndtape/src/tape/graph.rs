//! Export of a tape as a petgraph dependency graph.

use super::recording::Tape;
use super::record::RecordId;
use crate::memory::CountPolicy;
use crate::scalar::Scalar;
use crate::storage::DynExtents;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

/// Node weight of an exported tape graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub id: RecordId,
    pub what: &'static str,
    pub extents: DynExtents,
}

impl<T: Scalar, P: CountPolicy> Tape<T, P> {
    /// Build the dependency graph of the tape.
    ///
    /// Node `i` of the graph is record `i`; edges run from producer to
    /// consumer.
    pub fn graph(&self) -> DiGraph<RecordSummary, ()> {
        let mut records: Vec<_> = self.iter().collect();
        records.reverse();

        let mut graph = DiGraph::with_capacity(records.len(), records.len());
        for record in &records {
            graph.add_node(RecordSummary {
                id: record.id(),
                what: record.what(),
                extents: record.activation().extents().iter().copied().collect(),
            });
        }
        for record in &records {
            let consumer = NodeIndex::new(record.id().index());
            for producer in record.producers() {
                graph.add_edge(NodeIndex::new(producer.index()), consumer, ());
            }
        }
        graph
    }

    /// Records in an order where producers precede consumers.
    pub fn topological_order(&self) -> Vec<RecordId> {
        let graph = self.graph();
        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|node| graph[node].id).collect(),
            // producers are always older, so the graph is acyclic
            Err(_) => Vec::new(),
        }
    }
}
