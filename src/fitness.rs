//! Fitness scoring for a generation of genomes.
//!
//! Each genome is decoded, run over the whole dataset in one batch, and scored
//! by how much probability it assigns to the correct class:
//!
//! ```text
//! mean  = mean_i ln(outputs[i, label_i] + epsilon)
//! score = clamp(1 + mean / ln(num_classes), 0, 1)
//! ```
//!
//! Uniform guessing (`1 / num_classes` everywhere) scores 0 and a network that
//! puts all of its mass on the right class scores 1. The score is written to
//! [`Genome::fitness`] for the evolutionary engine to read.

use candle_core::{DType, Device, Tensor};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::device::DeviceConfig;
use crate::error::{EvalError, Result};
use crate::evaluator::{DecodedNetwork, GraphEvaluator};
use crate::genome::{Genome, GenomeConfig, GenomeKey};

/// Added to the correct-class output before taking its logarithm.
pub const DEFAULT_EPSILON: f64 = 1e-12;

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// Settings shared by every genome scored in a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessConfig {
    /// Input/output layout; `num_outputs` is also the class count.
    pub genome: GenomeConfig,
    /// Activation applied to propagated nodes.
    #[serde(default)]
    pub activation: Activation,
    /// Guard against ln(0).
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Device the dataset and all forward passes live on.
    #[serde(default)]
    pub device: DeviceConfig,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            genome: GenomeConfig::default(),
            activation: Activation::default(),
            epsilon: DEFAULT_EPSILON,
            device: DeviceConfig::default(),
        }
    }
}

impl FitnessConfig {
    /// Config for a classifier with the given feature and class counts.
    #[must_use]
    pub fn classifier(num_inputs: usize, num_classes: usize) -> Self {
        Self {
            genome: GenomeConfig::new(num_inputs, num_classes),
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.genome.num_outputs
    }
}

/// Labeled samples resident on the compute device.
///
/// Built once per run and shared read-only by every genome evaluation.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// `(rows, num_features)`, f32.
    features: Tensor,
    /// `(rows,)`, u32 class indices.
    labels: Tensor,
    num_classes: usize,
}

impl Dataset {
    /// Build a dataset from a row-major feature buffer and one label per row.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is not a whole number of rows, holds no rows, the
    /// label count differs from the row count, a label is not a valid class,
    /// or fewer than two classes are declared.
    pub fn new(
        features: Vec<f32>,
        labels: Vec<u32>,
        num_features: usize,
        num_classes: usize,
        device: &Device,
    ) -> Result<Self> {
        if num_classes < 2 {
            return Err(EvalError::TooFewClasses(num_classes));
        }
        if num_features == 0 || features.len() % num_features != 0 {
            return Err(EvalError::RaggedFeatures {
                len: features.len(),
                num_features,
            });
        }

        let rows = features.len() / num_features;
        if rows == 0 {
            return Err(EvalError::EmptyBatch);
        }
        if labels.len() != rows {
            return Err(EvalError::LabelCount {
                labels: labels.len(),
                rows,
            });
        }
        if let Some((row, &label)) = labels
            .iter()
            .enumerate()
            .find(|&(_, &label)| label as usize >= num_classes)
        {
            return Err(EvalError::LabelOutOfRange {
                row,
                label,
                num_classes,
            });
        }

        let features = Tensor::from_vec(features, (rows, num_features), device)?;
        let labels = Tensor::from_vec(labels, rows, device)?;
        log::debug!(
            "dataset: {} rows, {} features, {} classes on {:?}",
            rows,
            num_features,
            num_classes,
            device
        );

        Ok(Self {
            features,
            labels,
            num_classes,
        })
    }

    #[must_use]
    pub const fn features(&self) -> &Tensor {
        &self.features
    }

    #[must_use]
    pub const fn labels(&self) -> &Tensor {
        &self.labels
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.features.dims()[0]
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.features.dims()[1]
    }

    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        self.features.device()
    }

    /// Copy the dataset onto `device`.
    ///
    /// # Errors
    ///
    /// Propagates transfer failures from the target device.
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Self {
            features: self.features.to_device(device)?,
            labels: self.labels.to_device(device)?,
            num_classes: self.num_classes,
        })
    }
}

/// Map a mean log-likelihood onto [0, 1].
///
/// `ln(1 / num_classes)` maps to 0 and `0` maps to 1; anything outside is
/// clamped. A NaN mean (from NaN network outputs) scores 0.
///
/// # Errors
///
/// Returns [`EvalError::TooFewClasses`] if `num_classes < 2`.
pub fn score_from_mean_log_likelihood(mean: f64, num_classes: usize) -> Result<f64> {
    if num_classes < 2 {
        return Err(EvalError::TooFewClasses(num_classes));
    }

    #[allow(clippy::cast_precision_loss)] // Class counts are small
    let raw = 1.0 + mean / (num_classes as f64).ln();
    if raw.is_nan() {
        log::warn!("fitness is NaN (mean log-likelihood {}); scoring 0", mean);
        return Ok(0.0);
    }
    Ok(raw.clamp(0.0, 1.0))
}

/// Score a batch of network outputs against the true labels.
///
/// `outputs` is `(rows, classes)`; `labels` is `(rows,)` of class indices.
///
/// # Errors
///
/// Fails on fewer than two classes, an empty batch, a label/row count
/// mismatch, or a label with no matching output column.
pub fn score(outputs: &Tensor, labels: &Tensor, num_classes: usize, epsilon: f64) -> Result<f64> {
    if num_classes < 2 {
        return Err(EvalError::TooFewClasses(num_classes));
    }

    let (rows, columns) = outputs.dims2()?;
    let label_rows = labels.dims1()?;
    if label_rows != rows {
        return Err(EvalError::LabelCount {
            labels: label_rows,
            rows,
        });
    }
    if rows == 0 {
        return Err(EvalError::EmptyBatch);
    }

    let labels = labels.to_dtype(DType::U32)?;
    if let Some((row, &label)) = labels
        .to_vec1::<u32>()?
        .iter()
        .enumerate()
        .find(|&(_, &label)| label as usize >= columns)
    {
        return Err(EvalError::LabelOutOfRange {
            row,
            label,
            num_classes: columns,
        });
    }

    let correct = outputs
        .to_dtype(DType::F32)?
        .contiguous()?
        .gather(&labels.unsqueeze(1)?, 1usize)?
        .squeeze(1usize)?;
    // Reduced in f32, the widest float every candle backend supports.
    let mean = (correct + epsilon)?
        .log()?
        .mean_all()?
        .to_scalar::<f32>()?;

    score_from_mean_log_likelihood(f64::from(mean), num_classes)
}

/// Decode, evaluate, and score a single genome without touching its fitness.
///
/// # Errors
///
/// Propagates input width mismatches and tensor failures.
pub fn genome_fitness(
    genome: &Genome,
    config: &FitnessConfig,
    evaluator: &GraphEvaluator,
    dataset: &Dataset,
) -> Result<f64> {
    let network = DecodedNetwork::decode(genome, &config.genome);
    let outputs = evaluator.forward(&network, dataset.features())?;
    score(&outputs, dataset.labels(), config.num_classes(), config.epsilon)
}

/// Score every genome of a generation and store the result in
/// [`Genome::fitness`].
///
/// The dataset is copied onto `config.device` first if it lives elsewhere.
/// Genomes are evaluated in slice order. On error, genomes before the failing
/// one keep their new fitness and the rest are left untouched.
///
/// # Errors
///
/// Fails before touching any genome if the configured device cannot be
/// opened or the dataset's class count differs from `config.num_classes()`.
/// Otherwise fails fast on the first contract violation, e.g. a dataset whose
/// feature count differs from `config.genome.num_inputs`.
pub fn eval_genomes(
    genomes: &mut [(GenomeKey, Genome)],
    config: &FitnessConfig,
    dataset: &Dataset,
) -> Result<()> {
    if dataset.num_classes() != config.num_classes() {
        return Err(EvalError::ClassCount {
            expected: config.num_classes(),
            got: dataset.num_classes(),
        });
    }

    let device = config.device.resolve()?;
    let placed;
    let dataset = if dataset.device().same_device(&device) {
        dataset
    } else {
        log::debug!(
            "moving dataset from {:?} to {:?}",
            dataset.device(),
            device
        );
        placed = dataset.to_device(&device)?;
        &placed
    };

    if config.activation.is_batch_coupled() {
        log::debug!(
            "{:?} normalizes across the batch; fitness depends on all {} rows together",
            config.activation,
            dataset.num_rows()
        );
    }

    let evaluator = GraphEvaluator::new(config.activation);
    let mut best: Option<(GenomeKey, f64)> = None;

    for (key, genome) in genomes.iter_mut() {
        let fitness = genome_fitness(genome, config, &evaluator, dataset)?;
        genome.fitness = Some(fitness);
        log::debug!(
            "genome {}: fitness {:.6} ({} enabled connections)",
            key,
            fitness,
            genome.num_enabled_connections()
        );

        if best.map_or(true, |(_, best_fitness)| fitness > best_fitness) {
            best = Some((*key, fitness));
        }
    }

    if let Some((key, fitness)) = best {
        log::info!(
            "scored {} genomes; best is {} with fitness {:.6}",
            genomes.len(),
            key,
            fitness
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(rows: &[[f32; 2]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_vec(flat, (rows.len(), 2), &Device::Cpu).unwrap()
    }

    fn labels(values: &[u32]) -> Tensor {
        Tensor::from_slice(values, values.len(), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_perfect_prediction_scores_one() {
        let s = score(
            &outputs(&[[1.0, 0.0], [0.0, 1.0]]),
            &labels(&[0, 1]),
            2,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert!((s - 1.0).abs() < 1e-6, "{s}");
    }

    #[test]
    fn test_uniform_guessing_scores_zero() {
        let s = score(
            &outputs(&[[0.5, 0.5], [0.5, 0.5]]),
            &labels(&[0, 1]),
            2,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert!(s.abs() < 1e-6, "{s}");
    }

    #[test]
    fn test_zero_probability_clamps_to_zero() {
        let s = score(
            &outputs(&[[0.0, 0.0], [0.0, 0.0]]),
            &labels(&[0, 1]),
            2,
            DEFAULT_EPSILON,
        )
        .unwrap();
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_score_is_monotone_in_correct_probability() {
        let mut previous = 0.0;
        for step in 0..=20 {
            let p = step as f32 / 20.0;
            let s = score(
                &outputs(&[[p, 1.0 - p], [p, 1.0 - p]]),
                &labels(&[0, 0]),
                2,
                DEFAULT_EPSILON,
            )
            .unwrap();
            assert!(s >= previous, "score fell from {previous} to {s} at p={p}");
            assert!((0.0..=1.0).contains(&s));
            previous = s;
        }
    }

    #[test]
    fn test_normalization_clamps() {
        assert_eq!(score_from_mean_log_likelihood(-100.0, 3).unwrap(), 0.0);
        assert_eq!(score_from_mean_log_likelihood(5.0, 3).unwrap(), 1.0);
        assert_eq!(score_from_mean_log_likelihood(f64::NAN, 3).unwrap(), 0.0);

        let half = score_from_mean_log_likelihood(-(4f64.ln()) / 2.0, 4).unwrap();
        assert!((half - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_rejected() {
        assert!(matches!(
            score_from_mean_log_likelihood(0.0, 1),
            Err(EvalError::TooFewClasses(1))
        ));
    }

    #[test]
    fn test_label_without_output_column_is_rejected() {
        let err = score(&outputs(&[[0.5, 0.5]]), &labels(&[2]), 3, DEFAULT_EPSILON).unwrap_err();
        assert!(matches!(err, EvalError::LabelOutOfRange { row: 0, label: 2, .. }));
    }

    #[test]
    fn test_dataset_validation() {
        let cpu = Device::Cpu;

        let ok = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 1], 2, 2, &cpu).unwrap();
        assert_eq!(ok.num_rows(), 2);
        assert_eq!(ok.num_features(), 2);

        assert!(matches!(
            Dataset::new(vec![1.0, 0.0, 0.0], vec![0], 2, 2, &cpu),
            Err(EvalError::RaggedFeatures { .. })
        ));
        assert!(matches!(
            Dataset::new(vec![1.0, 0.0], vec![0, 1], 2, 2, &cpu),
            Err(EvalError::LabelCount { labels: 2, rows: 1 })
        ));
        assert!(matches!(
            Dataset::new(vec![1.0, 0.0], vec![5], 2, 2, &cpu),
            Err(EvalError::LabelOutOfRange { label: 5, .. })
        ));
        assert!(matches!(
            Dataset::new(Vec::new(), Vec::new(), 2, 2, &cpu),
            Err(EvalError::EmptyBatch)
        ));
    }

    #[test]
    fn test_eval_genomes_writes_fitness() {
        let config = FitnessConfig::classifier(2, 2);
        let dataset = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 1], 2, 2, &Device::Cpu).unwrap();

        let mut empty = Genome::minimal(&config.genome);
        empty.fitness = Some(0.9);
        let mut wired = Genome::minimal(&config.genome);
        wired.add_connection(-1, 0, 4.0);
        wired.add_connection(-2, 1, 4.0);

        let mut genomes = vec![(1, empty), (2, wired)];
        eval_genomes(&mut genomes, &config, &dataset).unwrap();

        assert_eq!(genomes[0].1.fitness, Some(0.0));
        let wired_fitness = genomes[1].1.fitness.unwrap();
        assert!(wired_fitness > 0.0 && wired_fitness <= 1.0, "{wired_fitness}");
    }

    #[test]
    fn test_class_count_mismatch_is_rejected() {
        let config = FitnessConfig::classifier(2, 2);
        let dataset = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 4], 2, 5, &Device::Cpu).unwrap();

        let mut wired = Genome::minimal(&config.genome);
        wired.add_connection(-1, 0, 4.0);
        let mut genomes = vec![(1, wired)];

        let err = eval_genomes(&mut genomes, &config, &dataset).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ClassCount {
                expected: 2,
                got: 5
            }
        ));
        assert_eq!(genomes[0].1.fitness, None);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_unavailable_device_is_an_error() {
        let mut config = FitnessConfig::classifier(2, 2);
        config.device = DeviceConfig::Cuda(7);
        let dataset = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 1], 2, 2, &Device::Cpu).unwrap();

        let mut genomes = vec![(1, Genome::minimal(&config.genome))];
        let err = eval_genomes(&mut genomes, &config, &dataset).unwrap_err();
        assert!(matches!(err, EvalError::Tensor(_)), "{err}");
        assert_eq!(genomes[0].1.fitness, None);
    }

    #[test]
    fn test_dataset_moves_to_requested_device() {
        let dataset = Dataset::new(vec![1.0, 0.0, 0.0, 1.0], vec![0, 1], 2, 2, &Device::Cpu).unwrap();
        let device = DeviceConfig::Auto.resolve().unwrap();

        let moved = dataset.to_device(&device).unwrap();
        assert!(moved.device().same_device(&device));
        assert!(moved.labels().device().same_device(&device));
        assert_eq!(moved.num_rows(), 2);
        assert_eq!(moved.num_classes(), 2);
        assert_eq!(
            moved.labels().to_vec1::<u32>().unwrap(),
            dataset.labels().to_vec1::<u32>().unwrap()
        );
    }

    #[test]
    fn test_config_serde_defaults() {
        let json = r#"{ "genome": { "num_inputs": 4, "num_outputs": 3 } }"#;
        let config: FitnessConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.genome, GenomeConfig::new(4, 3));
        assert_eq!(config.activation, Activation::BatchSoftmax);
        assert_eq!(config.epsilon, DEFAULT_EPSILON);
        assert_eq!(config.device, DeviceConfig::Cpu);
    }
}
