//! Error type for decoding, evaluation, and scoring.
//!
//! Malformed genomes are not errors; they evaluate to zero activations. The
//! variants here are caller contract violations and tensor runtime failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("input batch has {got} feature columns, network expects {expected}")]
    InputWidth { expected: usize, got: usize },

    #[error("feature buffer of length {len} is not a whole number of rows of {num_features}")]
    RaggedFeatures { len: usize, num_features: usize },

    #[error("{labels} labels supplied for {rows} samples")]
    LabelCount { labels: usize, rows: usize },

    #[error("label {label} at row {row} is outside 0..{num_classes}")]
    LabelOutOfRange {
        row: usize,
        label: u32,
        num_classes: usize,
    },

    #[error("cannot evaluate an empty batch")]
    EmptyBatch,

    #[error("dataset declares {got} classes, config scores {expected}")]
    ClassCount { expected: usize, got: usize },

    #[error("fitness needs at least two classes, got {0}")]
    TooFewClasses(usize),

    #[error("network declares no output nodes")]
    NoOutputs,

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
