//! `qfed-sim`: runs an encrypted q-FedAvg federation against synthetic
//! participants and reports its fairness.
//!
//! ```bash
//! cargo run --release --bin qfed-sim -- --q 5 --rounds 20 --poly-modulus-degree 8192
//! cargo run --release --bin qfed-sim -- --config federation.json --log-level debug
//! ```

use clap::Parser;
use console::style;
use qfed::{
    checkpoint_name, Coordinator, DatasetKind, FederationConfig, JsonModelStore, ModelKind,
    ModelStore, SyntheticTask,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Encrypted fair federated averaging simulation.
#[derive(Parser, Debug)]
#[command(name = "qfed-sim", version, about, long_about = None)]
struct Args {
    /// JSON configuration file; the other options override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fairness exponent q.
    #[arg(long)]
    q: Option<f64>,

    /// Number of rounds.
    #[arg(long)]
    rounds: Option<usize>,

    /// Size of the participant pool.
    #[arg(long)]
    num_users: Option<usize>,

    /// Fraction of the pool sampled at each round.
    #[arg(long)]
    frac: Option<f64>,

    /// Seed of the participant sampling and of the synthetic task.
    #[arg(long)]
    seed: Option<u64>,

    /// CKKS polynomial modulus degree.
    #[arg(long)]
    poly_modulus_degree: Option<usize>,

    /// CKKS coefficient modulus bit sizes, e.g. `60,40,40,60`.
    #[arg(long, value_delimiter = ',')]
    coeff_mod_bit_sizes: Option<Vec<usize>>,

    /// CKKS encoding scale.
    #[arg(long)]
    global_scale: Option<f64>,

    /// Dataset: mnist or cifar.
    #[arg(long)]
    dataset: Option<DatasetKind>,

    /// Model: mlp or cnn.
    #[arg(long)]
    model: Option<ModelKind>,

    /// Directory where the final weights are saved.
    #[arg(long, value_name = "DIR", default_value = "./weights")]
    weights_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes
    /// precedence.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn federation_config(&self) -> qfed::Result<FederationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                FederationConfig::from_json(path)?
            }
            None => FederationConfig::default(),
        };

        if let Some(q) = self.q {
            config.q = q;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(num_users) = self.num_users {
            config.num_users = num_users;
        }
        if let Some(frac) = self.frac {
            config.frac = frac;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(degree) = self.poly_modulus_degree {
            config.crypto.poly_modulus_degree = degree;
        }
        if let Some(sizes) = &self.coeff_mod_bit_sizes {
            config.crypto.coeff_mod_bit_sizes = sizes.clone();
        }
        if let Some(scale) = self.global_scale {
            config.crypto.global_scale = scale;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> qfed::Result<()> {
    let config = args.federation_config()?;
    info!(
        dataset = %config.dataset,
        model = %config.model,
        degree = config.crypto.poly_modulus_degree,
        moduli = ?config.crypto.coeff_mod_bit_sizes,
        "configuration validated"
    );

    let task = SyntheticTask::new(config.dataset, config.model, config.seed)?;
    let mut coordinator = Coordinator::new(
        config.clone(),
        task.initial_global()?,
        task.trainer(config.learning_rate, config.local_epochs),
        task.evaluator(),
    )?;

    println!(
        "{}",
        style(format!(
            "q-FedAvg over CKKS: {} rounds, {} participants, q = {}",
            config.rounds, config.num_users, config.q
        ))
        .bold()
    );
    for _ in 0..config.rounds {
        let outcome = coordinator.run_round()?;
        let fairness = outcome.fairness;
        println!(
            "\nRound {:3}, Local models: \nTesting accuracy average: {:.2}, Testing accuracy variance: {:.4}, Euclidean Distance: {:.4}",
            outcome.round, fairness.mean_accuracy, fairness.variance, fairness.euclidean_distance
        );
        println!(
            "Round {:3}, Global model testing accuracy: {}",
            outcome.round,
            style(format!("{:.2}", outcome.global_accuracy)).cyan()
        );
    }

    let summary = coordinator.summary()?;
    println!(
        "\nFinal Average Variance (AV): {}",
        style(format!("{:.4}", summary.average_variance)).green()
    );
    println!(
        "Final Average Euclidean Distance (ED): {}",
        style(format!("{:.4}", summary.average_distance)).green()
    );

    let name = checkpoint_name(
        config.dataset,
        config.model,
        config.rounds,
        config.q,
        config.crypto.poly_modulus_degree,
    );
    let path = JsonModelStore::new(&args.weights_dir).save(&name, coordinator.global())?;
    println!("Weights saved successfully in {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
