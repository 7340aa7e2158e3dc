//! Gene types for NEAT genomes.
//!
//! This module defines the building blocks a genome is made of:
//! - [`NodeGene`]: a non-input node reported by the evolutionary engine
//! - [`ConnectionGene`]: a weighted, possibly disabled, directed connection
//!
//! Connections refer to nodes by [`NodeKey`], the engine's own identifier, not
//! by arena handle. Input nodes are never stored as genes; they are implied by
//! the [`GenomeConfig`](crate::genome::GenomeConfig).

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Arena handle for a node gene within a genome.
    pub struct NodeId;

    /// Arena handle for a connection gene within a genome.
    pub struct ConnectionId;
}

/// Node identifier as assigned by the evolutionary engine.
///
/// Inputs are `-1, -2, ...`, outputs `0, 1, ...`, hidden nodes anything else.
pub type NodeKey = i64;

/// A node gene for an output or hidden node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    /// Engine-assigned key of this node.
    pub key: NodeKey,
}

impl NodeGene {
    #[must_use]
    pub const fn new(key: NodeKey) -> Self {
        Self { key }
    }
}

/// A connection gene representing a weighted link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Source node.
    pub input: NodeKey,
    /// Destination node.
    pub output: NodeKey,
    /// The connection weight.
    pub weight: f32,
    /// Whether this connection is active.
    /// Disabled connections are skipped during decoding but kept by the engine.
    pub enabled: bool,
}

impl ConnectionGene {
    /// Create a new enabled connection.
    #[must_use]
    pub const fn new(input: NodeKey, output: NodeKey, weight: f32) -> Self {
        Self {
            input,
            output,
            weight,
            enabled: true,
        }
    }

    /// Create a connection that is present in the genome but disabled.
    #[must_use]
    pub const fn disabled(input: NodeKey, output: NodeKey, weight: f32) -> Self {
        Self {
            input,
            output,
            weight,
            enabled: false,
        }
    }
}
