//! Genome representation consumed by the decoder.
//!
//! A [`Genome`] is owned by the external evolutionary engine. It stores node and
//! connection genes in `SlotMap` arenas, which keeps insertion order stable and
//! serializes trivially. Decoding only reads it; scoring writes
//! [`Genome::fitness`] and nothing else.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::gene::{ConnectionGene, ConnectionId, NodeGene, NodeId, NodeKey};

/// Identifier the evolutionary engine assigns to each genome in a generation.
pub type GenomeKey = u64;

/// Input/output layout shared by every genome in a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Number of input nodes, and feature columns of the input batch.
    pub num_inputs: usize,
    /// Number of output nodes, and classes scored by the fitness function.
    pub num_outputs: usize,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 2,
        }
    }
}

impl GenomeConfig {
    #[must_use]
    pub const fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
        }
    }

    /// Declared input keys in column order: `-1, -2, ..., -num_inputs`.
    #[must_use]
    pub fn input_keys(&self) -> Vec<NodeKey> {
        (1..=self.num_inputs).map(|i| -(i as NodeKey)).collect()
    }

    /// Declared output keys in class order: `0, 1, ..., num_outputs - 1`.
    #[must_use]
    pub fn output_keys(&self) -> Vec<NodeKey> {
        (0..self.num_outputs).map(|i| i as NodeKey).collect()
    }
}

/// A NEAT genome: node genes, connection genes, and the fitness slot the
/// evolutionary engine reads back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genome {
    /// Arena storage for output and hidden nodes.
    pub nodes: SlotMap<NodeId, NodeGene>,
    /// Arena storage for connections, in the order they were added.
    pub connections: SlotMap<ConnectionId, ConnectionGene>,
    /// Fitness assigned by the last scoring pass.
    #[serde(default)]
    pub fitness: Option<f64>,
}

impl Genome {
    /// Create an empty genome with no nodes and no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a genome holding only the configured output nodes.
    #[must_use]
    pub fn minimal(config: &GenomeConfig) -> Self {
        let mut genome = Self::new();
        for key in config.output_keys() {
            genome.add_node(key);
        }
        genome
    }

    /// Add a node gene and return its arena handle.
    pub fn add_node(&mut self, key: NodeKey) -> NodeId {
        self.nodes.insert(NodeGene::new(key))
    }

    /// Add an enabled connection and return its arena handle.
    pub fn add_connection(&mut self, input: NodeKey, output: NodeKey, weight: f32) -> ConnectionId {
        self.connections
            .insert(ConnectionGene::new(input, output, weight))
    }

    /// Enable or disable an existing connection.
    ///
    /// Returns `false` if the handle does not belong to this genome.
    pub fn set_enabled(&mut self, conn_id: ConnectionId, enabled: bool) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(conn) => {
                conn.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Iterate enabled connections in insertion order.
    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionGene> + '_ {
        self.connections.values().filter(|c| c.enabled)
    }

    /// Get the number of enabled connections.
    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.enabled_connections().count()
    }

    /// Keys of every node gene, in insertion order.
    #[must_use]
    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.nodes.values().map(|n| n.key).collect()
    }
}
