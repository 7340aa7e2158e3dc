//! Batched forward evaluation of decoded genomes.
//!
//! A genome is decoded once into a [`DecodedNetwork`]: its topological order,
//! a sorted key-to-index table, and its enabled edges. The network is plain
//! data; a single [`GraphEvaluator`] runs any number of them.
//!
//! The activation table is one `(batch,)` column per node in topological order,
//! so dense index and order position are the same thing. Incoming edges are
//! gathered into Compressed Sparse Row (CSR) form on every forward call, keyed
//! by destination.

use candle_core::{DType, IndexOp, Tensor};

use crate::activation::Activation;
use crate::error::{EvalError, Result};
use crate::gene::NodeKey;
use crate::genome::{Genome, GenomeConfig};
use crate::topology::Topology;

/// An enabled connection carried into evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: NodeKey,
    pub destination: NodeKey,
    pub weight: f32,
}

/// A genome decoded into evaluation-ready form.
#[derive(Debug, Clone)]
pub struct DecodedNetwork {
    topology: Topology,
    /// Maps NodeKey to dense index, sorted by key for binary search.
    node_to_idx: Vec<(NodeKey, usize)>,
    /// Enabled edges in genome connection order.
    edges: Vec<Edge>,
    /// Dense indices of the inputs, in column order.
    input_indices: Vec<usize>,
    /// Dense indices of the outputs, in class order.
    output_indices: Vec<usize>,
}

impl DecodedNetwork {
    /// Decode a genome against the generation's input/output layout.
    #[must_use]
    pub fn decode(genome: &Genome, config: &GenomeConfig) -> Self {
        let topology = Topology::extract(genome, config);

        let mut node_to_idx: Vec<(NodeKey, usize)> = topology
            .order
            .iter()
            .enumerate()
            .map(|(i, &key)| (key, i))
            .collect();
        node_to_idx.sort_unstable_by_key(|&(key, _)| key);

        let edges: Vec<Edge> = genome
            .enabled_connections()
            .map(|c| Edge {
                source: c.input,
                destination: c.output,
                weight: c.weight,
            })
            .collect();

        let input_indices = topology
            .input_keys
            .iter()
            .filter_map(|&key| lookup_idx(&node_to_idx, key))
            .collect();
        let output_indices = topology
            .output_keys
            .iter()
            .filter_map(|&key| lookup_idx(&node_to_idx, key))
            .collect();

        log::trace!(
            "decoded genome: {} of {} node genes live, {} nodes ordered, {} enabled edges",
            genome
                .node_keys()
                .iter()
                .filter(|&&key| lookup_idx(&node_to_idx, key).is_some())
                .count(),
            genome.nodes.len(),
            topology.order.len(),
            edges.len()
        );

        Self {
            topology,
            node_to_idx,
            edges,
            input_indices,
            output_indices,
        }
    }

    /// The extracted topological order.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Enabled edges, including any whose endpoints were appended defensively.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get the dense index for a NodeKey.
    #[inline]
    #[must_use]
    pub fn node_index(&self, key: NodeKey) -> Option<usize> {
        lookup_idx(&self.node_to_idx, key)
    }

    /// Number of nodes in the activation table.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.topology.order.len()
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_indices.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }
}

/// Incoming edges per destination in CSR form.
///
/// For node i, incoming edges are at `[offsets[i]..offsets[i + 1])` of
/// `sources` and `weights`, in genome connection order.
struct Adjacency {
    offsets: Vec<usize>,
    sources: Vec<usize>,
    weights: Vec<f32>,
}

impl Adjacency {
    fn build(network: &DecodedNetwork) -> Self {
        let node_count = network.node_count();

        // Edges with an endpoint outside the order are dropped.
        let resolved: Vec<(usize, usize, f32)> = network
            .edges
            .iter()
            .filter_map(|e| {
                Some((
                    network.node_index(e.source)?,
                    network.node_index(e.destination)?,
                    e.weight,
                ))
            })
            .collect();

        let mut counts = vec![0usize; node_count];
        for &(_, to, _) in &resolved {
            counts[to] += 1;
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut running = 0;
        offsets.push(running);
        for &count in &counts {
            running += count;
            offsets.push(running);
        }

        let mut sources = vec![0usize; running];
        let mut weights = vec![0.0f32; running];
        let mut write_pos = offsets[..node_count].to_vec();

        for (from, to, weight) in resolved {
            let pos = write_pos[to];
            sources[pos] = from;
            weights[pos] = weight;
            write_pos[to] += 1;
        }

        Self {
            offsets,
            sources,
            weights,
        }
    }

    #[inline]
    fn incoming(&self, idx: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let start = self.offsets[idx];
        let end = self.offsets[idx + 1];
        self.sources[start..end]
            .iter()
            .copied()
            .zip(self.weights[start..end].iter().copied())
    }
}

/// Runs decoded networks over batches of input rows.
///
/// Holds no per-genome state: the same evaluator serves a whole generation,
/// and identical inputs always give identical outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphEvaluator {
    activation: Activation,
}

impl GraphEvaluator {
    #[must_use]
    pub const fn new(activation: Activation) -> Self {
        Self { activation }
    }

    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Forward a batch through a decoded network.
    ///
    /// `input` has shape `(batch, num_inputs)`; the result has shape
    /// `(batch, num_outputs)` with columns in declared output order. The
    /// result lives on the same device as `input`.
    ///
    /// Nodes without incoming edges keep zero activation: the activation
    /// function is only applied to nodes that receive at least one edge.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InputWidth`] if the column count differs from the
    /// number of inputs, [`EvalError::EmptyBatch`] for zero rows, and
    /// [`EvalError::NoOutputs`] if the network has no outputs.
    pub fn forward(&self, network: &DecodedNetwork, input: &Tensor) -> Result<Tensor> {
        let (batch_size, width) = input.dims2()?;
        if width != network.num_inputs() {
            return Err(EvalError::InputWidth {
                expected: network.num_inputs(),
                got: width,
            });
        }
        if batch_size == 0 {
            return Err(EvalError::EmptyBatch);
        }
        if network.num_outputs() == 0 {
            return Err(EvalError::NoOutputs);
        }

        let input = input.to_dtype(DType::F32)?;
        let zeros = Tensor::zeros(batch_size, DType::F32, input.device())?;
        let mut activations = vec![zeros; network.node_count()];

        for (col, &idx) in network.input_indices.iter().enumerate() {
            activations[idx] = input.i((.., col))?;
        }

        let adjacency = Adjacency::build(network);

        // Dense index equals order position.
        let first = network.num_inputs();
        for (offset, &key) in network.topology().evaluated().iter().enumerate() {
            let idx = first + offset;
            let mut incoming = adjacency.incoming(idx).peekable();
            if incoming.peek().is_none() {
                log::trace!("node {} has no incoming edges; left at zero", key);
                continue;
            }

            let mut sum = activations[idx].zeros_like()?;
            for (from, weight) in incoming {
                sum = (sum + activations[from].affine(f64::from(weight), 0.0)?)?;
            }
            activations[idx] = self.activation.apply(&sum)?;
        }

        let outputs: Vec<&Tensor> = network
            .output_indices
            .iter()
            .map(|&idx| &activations[idx])
            .collect();
        Ok(Tensor::stack(&outputs, 1usize)?)
    }
}

/// Binary search for NodeKey in sorted vec.
fn lookup_idx(sorted: &[(NodeKey, usize)], key: NodeKey) -> Option<usize> {
    sorted
        .binary_search_by_key(&key, |&(k, _)| k)
        .ok()
        .map(|pos| sorted[pos].1)
}
