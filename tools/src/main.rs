//! graph-runner: headless AML transaction-graph generator.
//!
//! Usage:
//!   graph-runner --conf conf.json
//!   graph-runner --conf conf.json --sim-name sample --seed 12345
//!   graph-runner conf.json sample
//!
//! Environment:
//!   RANDOM_SEED  overrides the configured seed
//!   DEGREE       logs fan-in/fan-out pattern counts up to this threshold

use amlgraph_core::{
    config::GeneratorConfig, engine::GraphEngine, export::write_dataset, params::GeneratorInputs,
    summary::RunSummary,
};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let positional: Vec<&String> = positional_args(&args);
    let conf = find_arg(&args, "--conf")
        .or_else(|| positional.first().map(|s| s.as_str()))
        .context("usage: graph-runner --conf <conf.json> [--sim-name NAME] [--seed N]")?;
    let sim_name = find_arg(&args, "--sim-name").or_else(|| positional.get(1).map(|s| s.as_str()));
    let seed: Option<u64> = find_arg(&args, "--seed")
        .map(|s| s.parse().with_context(|| format!("--seed '{s}' is not a u64")))
        .transpose()?;

    let mut config = GeneratorConfig::load(conf)?;
    if let Some(name) = sim_name {
        config.general.simulation_name = name.to_string();
    }
    if let Some(seed) = seed {
        config.general.random_seed = Some(seed);
    }

    let out_dir = PathBuf::from(&config.output.directory).join(&config.general.simulation_name);
    println!("graph-runner: AML transaction graph generator");
    println!("  conf:      {conf}");
    println!("  sim name:  {}", config.general.simulation_name);
    println!("  seed:      {}", config.seed());
    println!("  steps:     {}", config.total_steps());
    println!("  output:    {}", out_dir.display());
    println!();

    let inputs = GeneratorInputs::load(&config)?;
    let output = config.output.clone();
    let mut engine = GraphEngine::build(config);
    let dataset = engine.run(inputs)?;

    // Tables are written only once the whole batch has succeeded.
    write_dataset(&out_dir, &output, &dataset)
        .with_context(|| format!("Cannot write output tables to {}", out_dir.display()))?;

    print_summary(&dataset.summary, engine.event_log().len());
    Ok(())
}

fn print_summary(summary: &RunSummary, events: usize) {
    println!("=== RUN SUMMARY ===");
    println!("  accounts:       {} in {} banks", summary.accounts, summary.banks);
    println!("  base edges:     {} ({} self loops dropped)", summary.base_edges, summary.self_loops_dropped);
    println!("  hubs:           {} at threshold {}", summary.hubs, summary.degree_threshold);
    println!("  edges:          {} total, {} active", summary.total_edges, summary.active_edges);
    println!("  sar accounts:   {}", summary.sar_accounts);
    println!("  events logged:  {events}");

    println!();
    println!("=== NORMAL MODELS (realized / requested) ===");
    for (name, f) in &summary.normal_models {
        println!("  {name:<16} {} / {}", f.realized, f.requested);
    }
    println!();
    println!("=== AML TYPOLOGIES (realized / requested) ===");
    for (name, f) in &summary.typologies {
        println!("  {name:<16} {} / {}", f.realized, f.requested);
    }
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&String> {
    let mut out = Vec::new();
    let mut skip = true; // program name
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = true;
            continue;
        }
        out.push(arg);
    }
    out
}
