//! # Symbios Fitness
//!
//! Decodes NEAT genomes into feed-forward computation graphs, runs them over a
//! labeled dataset in a single batch, and writes a normalized log-likelihood
//! fitness back onto each genome for the evolutionary engine to select on.
//!
//! ## Features
//!
//! - **Topology Extraction**: inputs first, then layer-by-layer evaluable
//!   nodes, then any dangling structure, always sources before destinations
//! - **Arena + Dense Index**: `SlotMap` genome storage, flat per-node columns and
//!   CSR adjacency at evaluation time
//! - **Batched Evaluation**: the whole dataset goes through a genome at once
//!   on a configurable `candle` device
//! - **Normalized Fitness**: 0 for uniform guessing, 1 for certainty on the
//!   right class
//!
//! ## Quick Start
//!
//! ```rust
//! use candle_core::Device;
//! use symbios_fitness::{eval_genomes, Dataset, FitnessConfig, Genome};
//!
//! let config = FitnessConfig::classifier(2, 2);
//! let dataset = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 1], 2, 2, &Device::Cpu)?;
//!
//! let mut genome = Genome::minimal(&config.genome);
//! genome.add_connection(-1, 0, 3.0);
//! genome.add_connection(-2, 1, 3.0);
//!
//! let mut generation = vec![(1, genome)];
//! eval_genomes(&mut generation, &config, &dataset)?;
//! assert!(generation[0].1.fitness.is_some());
//! # Ok::<(), symbios_fitness::EvalError>(())
//! ```
//!
//! ## Batch-Coupled Activation
//!
//! The default [`Activation::BatchSoftmax`] normalizes each node's activations
//! across the rows of the batch, not across a row's output nodes. A node's
//! value for one sample therefore depends on the other samples in the batch.
//! Fitness values are calibrated against this behavior; the element-wise
//! variants of [`Activation`] are available through [`FitnessConfig`].

pub mod activation;
pub mod device;
pub mod error;
pub mod evaluator;
pub mod fitness;
pub mod gene;
pub mod genome;
pub mod topology;

// Re-exports for convenience
pub use activation::Activation;
pub use device::DeviceConfig;
pub use error::{EvalError, Result};
pub use evaluator::{DecodedNetwork, Edge, GraphEvaluator};
pub use fitness::{
    eval_genomes, genome_fitness, score, score_from_mean_log_likelihood, Dataset, FitnessConfig,
    DEFAULT_EPSILON,
};
pub use gene::{ConnectionGene, ConnectionId, NodeGene, NodeId, NodeKey};
pub use genome::{Genome, GenomeConfig, GenomeKey};
pub use topology::{feed_forward_layers, required_for_output, Topology};
