//! Topological ordering of a genome's nodes.
//!
//! The order has three parts:
//!
//! 1. the declared input keys, in column order;
//! 2. the nodes reachable from the inputs that the outputs depend on, peeled
//!    layer by layer (a node joins a layer once all of its enabled
//!    predecessors are placed);
//! 3. nodes that are still missing: declared outputs first, then any endpoint
//!    of an enabled connection. These are placed by a Kahn pass over the
//!    missing subgraph so that sources still precede destinations.
//!
//! Part 3 is what guarantees that every enabled connection can be looked up
//! during evaluation, even for dangling or unreachable structure.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::gene::NodeKey;
use crate::genome::{Genome, GenomeConfig};

/// Ordered node keys for one genome, plus its declared inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Every node the evaluator touches, sources before destinations.
    pub order: Vec<NodeKey>,
    /// Input keys; always the first `input_keys.len()` entries of `order`.
    pub input_keys: Vec<NodeKey>,
    /// Output keys in class order.
    pub output_keys: Vec<NodeKey>,
}

impl Topology {
    /// Extract the evaluation order of a genome.
    ///
    /// Never fails: genomes without a path from inputs to outputs still get a
    /// complete order, their unreachable nodes simply stay at zero activation.
    #[must_use]
    pub fn extract(genome: &Genome, config: &GenomeConfig) -> Self {
        let input_keys = config.input_keys();
        let output_keys = config.output_keys();
        let edges: Vec<(NodeKey, NodeKey)> = genome
            .enabled_connections()
            .map(|c| (c.input, c.output))
            .collect();

        let mut order = input_keys.clone();
        let mut placed: HashSet<NodeKey> = order.iter().copied().collect();

        for layer in feed_forward_layers(&input_keys, &output_keys, &edges) {
            for key in layer {
                if placed.insert(key) {
                    order.push(key);
                }
            }
        }

        let evaluable = order.len() - input_keys.len();

        let mut pending = Vec::new();
        for &key in output_keys
            .iter()
            .chain(edges.iter().flat_map(|(from, to)| [from, to]))
        {
            if placed.insert(key) {
                pending.push(key);
            }
        }
        append_pending(&mut order, &pending, &edges);

        log::trace!(
            "topology: {} inputs, {} evaluable, {} appended",
            input_keys.len(),
            evaluable,
            pending.len()
        );

        Self {
            order,
            input_keys,
            output_keys,
        }
    }

    /// Number of input nodes at the front of the order.
    #[inline]
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_keys.len()
    }

    /// Number of declared outputs.
    #[inline]
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_keys.len()
    }

    /// Nodes computed by propagation: everything after the input prefix.
    #[inline]
    #[must_use]
    pub fn evaluated(&self) -> &[NodeKey] {
        &self.order[self.num_inputs()..]
    }
}

/// Nodes the outputs depend on, found by walking enabled connections backwards.
///
/// The walk stops at input nodes, which are never part of the result. Outputs
/// are always included, whether or not anything feeds them.
#[must_use]
pub fn required_for_output(
    inputs: &[NodeKey],
    outputs: &[NodeKey],
    edges: &[(NodeKey, NodeKey)],
) -> BTreeSet<NodeKey> {
    let inputs: BTreeSet<NodeKey> = inputs.iter().copied().collect();
    let mut required: BTreeSet<NodeKey> = outputs.iter().copied().collect();
    let mut frontier = required.clone();

    loop {
        let sources: BTreeSet<NodeKey> = edges
            .iter()
            .filter(|(from, to)| frontier.contains(to) && !frontier.contains(from))
            .map(|&(from, _)| from)
            .collect();
        if sources.is_empty() {
            break;
        }

        let hidden: Vec<NodeKey> = sources
            .iter()
            .filter(|key| !inputs.contains(*key))
            .copied()
            .collect();
        if hidden.is_empty() {
            break;
        }

        required.extend(hidden);
        frontier.extend(sources);
    }

    required
}

/// Group required nodes into layers that can be evaluated in sequence.
///
/// A node joins a layer once it is reachable from already-placed nodes and all
/// of its enabled predecessors are placed. Keys within a layer are ascending.
#[must_use]
pub fn feed_forward_layers(
    inputs: &[NodeKey],
    outputs: &[NodeKey],
    edges: &[(NodeKey, NodeKey)],
) -> Vec<Vec<NodeKey>> {
    let required = required_for_output(inputs, outputs, edges);
    let mut placed: BTreeSet<NodeKey> = inputs.iter().copied().collect();
    let mut layers = Vec::new();

    loop {
        let candidates: BTreeSet<NodeKey> = edges
            .iter()
            .filter(|(from, to)| placed.contains(from) && !placed.contains(to))
            .map(|&(_, to)| to)
            .collect();

        let layer: Vec<NodeKey> = candidates
            .into_iter()
            .filter(|node| {
                required.contains(node)
                    && edges
                        .iter()
                        .filter(|(_, to)| to == node)
                        .all(|(from, _)| placed.contains(from))
            })
            .collect();

        if layer.is_empty() {
            break;
        }

        placed.extend(layer.iter().copied());
        layers.push(layer);
    }

    layers
}

/// Append `pending` to `order` so that enabled connections between pending
/// nodes still point forward. Encounter order seeds the queue; nodes caught in
/// a cycle go last, in encounter order.
fn append_pending(order: &mut Vec<NodeKey>, pending: &[NodeKey], edges: &[(NodeKey, NodeKey)]) {
    if pending.is_empty() {
        return;
    }

    let index: HashMap<NodeKey, usize> = pending
        .iter()
        .enumerate()
        .map(|(i, &key)| (key, i))
        .collect();

    let mut in_degree = vec![0usize; pending.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); pending.len()];
    for (from, to) in edges {
        if let (Some(&from_idx), Some(&to_idx)) = (index.get(from), index.get(to)) {
            successors[from_idx].push(to_idx);
            in_degree[to_idx] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..pending.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; pending.len()];

    while let Some(u) = queue.pop_front() {
        emitted[u] = true;
        order.push(pending[u]);
        for &v in &successors[u] {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push_back(v);
            }
        }
    }

    let cyclic: Vec<NodeKey> = pending
        .iter()
        .zip(&emitted)
        .filter(|&(_, &done)| !done)
        .map(|(&key, _)| key)
        .collect();
    if !cyclic.is_empty() {
        log::warn!(
            "{} nodes lie on a cycle of enabled connections; appending them unordered: {:?}",
            cyclic.len(),
            cyclic
        );
        order.extend(cyclic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[NodeKey], key: NodeKey) -> usize {
        order
            .iter()
            .position(|&k| k == key)
            .unwrap_or_else(|| panic!("node {key} missing from order {order:?}"))
    }

    #[test]
    fn test_inputs_lead_the_order() {
        let config = GenomeConfig::new(3, 1);
        let genome = Genome::minimal(&config);

        let topo = Topology::extract(&genome, &config);

        assert_eq!(&topo.order[..3], &[-1, -2, -3]);
        assert_eq!(topo.order, vec![-1, -2, -3, 0]);
        assert_eq!(topo.evaluated(), &[0]);
    }

    #[test]
    fn test_hidden_node_precedes_output() {
        let config = GenomeConfig::new(2, 1);
        let mut genome = Genome::minimal(&config);
        genome.add_node(5);
        genome.add_connection(-1, 5, 1.0);
        genome.add_connection(5, 0, 1.0);
        genome.add_connection(-2, 0, 1.0);

        let topo = Topology::extract(&genome, &config);

        assert_eq!(topo.order, vec![-1, -2, 5, 0]);
    }

    #[test]
    fn test_required_for_output_ignores_dead_ends() {
        // 7 is fed by an input but feeds nothing; it is not required.
        let edges = [(-1, 7), (-1, 3), (3, 0)];
        let required = required_for_output(&[-1], &[0], &edges);

        assert!(required.contains(&0));
        assert!(required.contains(&3));
        assert!(!required.contains(&7));
        assert!(!required.contains(&-1));
    }

    #[test]
    fn test_layers_wait_for_all_predecessors() {
        // 0 depends on -1 directly and on 4 through 3; it must come last.
        let edges = [(-1, 3), (3, 4), (4, 0), (-1, 0)];
        let layers = feed_forward_layers(&[-1], &[0], &edges);

        assert_eq!(layers, vec![vec![3], vec![4], vec![0]]);
    }

    #[test]
    fn test_dead_end_hidden_node_is_appended() {
        let config = GenomeConfig::new(1, 1);
        let mut genome = Genome::minimal(&config);
        genome.add_connection(-1, 0, 1.0);
        genome.add_connection(-1, 9, 1.0);

        let topo = Topology::extract(&genome, &config);

        assert_eq!(topo.order, vec![-1, 0, 9]);
    }

    #[test]
    fn test_unreachable_source_is_placed_before_its_output() {
        // 8 has no incoming connections, so neither 8 nor 0 is evaluable from
        // the inputs. Both are appended, 8 first.
        let config = GenomeConfig::new(1, 1);
        let mut genome = Genome::minimal(&config);
        genome.add_connection(8, 0, 1.0);
        genome.add_connection(-1, 0, 1.0);

        let topo = Topology::extract(&genome, &config);

        assert_eq!(topo.order.len(), 3);
        assert!(position(&topo.order, 8) < position(&topo.order, 0));
    }

    #[test]
    fn test_disabled_connections_do_not_add_nodes() {
        let config = GenomeConfig::new(1, 1);
        let mut genome = Genome::minimal(&config);
        let conn = genome.add_connection(-1, 42, 1.0);
        genome.set_enabled(conn, false);

        let topo = Topology::extract(&genome, &config);

        assert_eq!(topo.order, vec![-1, 0]);
    }

    #[test]
    fn test_cycle_is_appended_without_panicking() {
        let config = GenomeConfig::new(1, 1);
        let mut genome = Genome::minimal(&config);
        genome.add_connection(3, 4, 1.0);
        genome.add_connection(4, 3, 1.0);
        genome.add_connection(4, 0, 1.0);

        let topo = Topology::extract(&genome, &config);

        let unique: HashSet<_> = topo.order.iter().collect();
        assert_eq!(unique.len(), topo.order.len());
        assert_eq!(topo.order.len(), 4);
    }
}
