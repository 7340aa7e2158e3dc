//! Node activation functions.
//!
//! Every function here maps one node's pre-activation column (shape `(batch,)`)
//! to its activation column. [`Activation::BatchSoftmax`] couples the rows of
//! the batch together; the element-wise variants treat each row on its own.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Activation applied to every propagated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Softmax over the batch dimension, independently for each node.
    ///
    /// The rows of a single node's column sum to one, rather than the outputs
    /// of a single row. Fitness values are calibrated against this, so it stays
    /// the default even though per-row normalization is the usual choice for
    /// classifiers.
    #[default]
    BatchSoftmax,
    /// Identity function: f(x) = x
    Identity,
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    Sigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x)
    Tanh,
    /// Rectified Linear Unit: f(x) = max(0, x)
    ReLU,
}

impl Activation {
    /// All available activation functions.
    pub const ALL: [Self; 5] = [
        Self::BatchSoftmax,
        Self::Identity,
        Self::Sigmoid,
        Self::Tanh,
        Self::ReLU,
    ];

    /// Apply this activation to a node's pre-activation column.
    ///
    /// # Errors
    ///
    /// Propagates tensor errors from the compute device.
    pub fn apply(self, x: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::BatchSoftmax => candle_nn::ops::softmax(x, 0usize),
            Self::Identity => Ok(x.clone()),
            Self::Sigmoid => candle_nn::ops::sigmoid(x),
            Self::Tanh => x.tanh(),
            Self::ReLU => x.relu(),
        }
    }

    /// Whether one row's activation depends on the other rows in the batch.
    #[inline]
    #[must_use]
    pub const fn is_batch_coupled(self) -> bool {
        matches!(self, Self::BatchSoftmax)
    }
}
