//! Barnyard demo
//!
//! Runs add/remove operations against an in-memory farm and prints the
//! resulting partitions as JSON.
//!
//! # Commands
//! - `simulate` - Add and remove animals, then report every color
//! - `check` - Print the configuration read from the environment

use anyhow::{Context, Result};
use barnyard_balancer::{Balancer, BalancerConfig};
use barnyard_core::types::{Animal, Color};
use barnyard_storage::MemoryStore;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "barnyard")]
#[command(about = "Barnyard barn balancing demo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add and remove animals on an in-memory farm
    Simulate {
        /// Barn capacity (overrides BARNYARD_BARN_CAPACITY)
        #[arg(long)]
        capacity: Option<u32>,

        /// Animals to add, as COLOR=COUNT (repeatable)
        #[arg(long = "add", value_parser = parse_color_count)]
        adds: Vec<(Color, usize)>,

        /// Animals to remove after adding, as COLOR=COUNT (repeatable)
        #[arg(long = "remove", value_parser = parse_color_count)]
        removes: Vec<(Color, usize)>,

        /// Also add this many animals of random colors
        #[arg(long, default_value = "0")]
        random: usize,

        /// Then remove this many random animals
        #[arg(long, default_value = "0")]
        churn: usize,

        /// Seed for random colors and removals
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Print the effective configuration
    Check,
}

fn parse_color_count(s: &str) -> Result<(Color, usize), String> {
    let (color, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLOR=COUNT, got '{}'", s))?;
    let color = color.parse::<Color>().map_err(|e| e.to_string())?;
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("bad count '{}': {}", count, e))?;
    Ok((color, count))
}

async fn simulate(
    config: BalancerConfig,
    adds: Vec<(Color, usize)>,
    removes: Vec<(Color, usize)>,
    random: usize,
    churn: usize,
    seed: u64,
) -> Result<()> {
    let balancer = Balancer::new(Arc::new(MemoryStore::new()), config);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut animals: Vec<Animal> = adds
        .iter()
        .flat_map(|&(color, count)| {
            (0..count).map(move |i| Animal::new(format!("{}-{}", color, i), color))
        })
        .collect();
    for i in 0..random {
        let color = *Color::ALL.choose(&mut rng).context("no colors")?;
        animals.push(Animal::new(format!("random-{}", i), color));
    }

    let placed = balancer.add_all_to_farm(animals).await?;
    info!(count = placed.len(), "Animals placed");

    for (color, count) in removes {
        let victims: Vec<Animal> = balancer
            .find_all()
            .await?
            .into_iter()
            .filter(|a| a.favorite_color == color)
            .take(count)
            .collect();
        balancer.remove_all_from_farm(&victims).await?;
    }

    if churn > 0 {
        let mut survivors = balancer.find_all().await?;
        survivors.shuffle(&mut rng);
        survivors.truncate(churn);
        balancer.remove_all_from_farm(&survivors).await?;
    }

    let mut reports = Vec::new();
    for color in Color::ALL {
        let report = balancer.partition_report(color).await?;
        if !report.is_empty() {
            info!(summary = %report.summary(), "Partition");
            reports.push(report);
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = BalancerConfig::from_env().context("loading configuration")?;

    match cli.command {
        Commands::Simulate {
            capacity,
            adds,
            removes,
            random,
            churn,
            seed,
        } => {
            let config = match capacity {
                Some(c) => config.with_barn_capacity(c),
                None => config,
            };
            config.validate()?;

            info!(
                barn_capacity = config.barn_capacity,
                max_steps = config.max_redistribution_steps,
                seed,
                "Starting simulation"
            );
            simulate(config, adds, removes, random, churn, seed).await?;
        }
        Commands::Check => {
            println!("barn_capacity = {}", config.barn_capacity);
            println!(
                "max_redistribution_steps = {}",
                config.max_redistribution_steps
            );
        }
    }

    Ok(())
}
