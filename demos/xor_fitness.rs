//! Scoring a generation of XOR classifiers.
//!
//! Builds a small population of random genomes by hand (standing in for an
//! evolutionary engine), scores them on the XOR truth table as a two-class
//! problem, and prints the resulting fitness values.
//!
//! Run with: `cargo run --example xor_fitness`

use std::error::Error;

use log::LevelFilter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use simplelog::{Config, SimpleLogger};
use symbios_fitness::{eval_genomes, Dataset, FitnessConfig, Genome, GenomeConfig};

/// Two inputs, one hidden node, two outputs (class 0 = "false", 1 = "true"),
/// with every possible forward connection at a random weight.
fn random_xor_genome(config: &GenomeConfig, rng: &mut ChaCha8Rng) -> Genome {
    let mut genome = Genome::minimal(config);
    let hidden = 10;
    genome.add_node(hidden);

    for from in config.input_keys() {
        genome.add_connection(from, hidden, rng.random_range(-3.0..3.0));
        for to in config.output_keys() {
            genome.add_connection(from, to, rng.random_range(-3.0..3.0));
        }
    }
    for to in config.output_keys() {
        genome.add_connection(hidden, to, rng.random_range(-3.0..3.0));
    }
    genome
}

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;

    let config = FitnessConfig::classifier(2, 2);
    let device = config.device.resolve()?;

    let dataset = Dataset::new(
        vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
        vec![0, 1, 1, 0],
        2,
        2,
        &device,
    )?;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut generation: Vec<(u64, Genome)> = (0..32)
        .map(|key| (key, random_xor_genome(&config.genome, &mut rng)))
        .collect();

    eval_genomes(&mut generation, &config, &dataset)?;

    generation.sort_by(|(_, a), (_, b)| {
        b.fitness
            .partial_cmp(&a.fitness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!("Top genomes:");
    for (key, genome) in generation.iter().take(5) {
        println!(
            "  genome {:3}: fitness {:.4}, {} connections",
            key,
            genome.fitness.unwrap_or_default(),
            genome.num_enabled_connections()
        );
    }

    Ok(())
}
