//! `topd` — branch-and-price solver for the team orienteering problem
//! with Dubins vehicles.
//!
//! Exits nonzero on validation or solver failure; a run that merely hits
//! its time limit reports `optimality_reached: false` and exits zero.

mod args;
mod parse;
mod report;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use topd_core::InstanceBuilder;

use crate::args::Cli;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let params = cli.validate()?;
    let file = Path::new(&cli.instance_path).join(&cli.instance_name);
    let parsed = parse::read_instance(&file)?;
    info!(
        "instance {}: {} targets, {} vehicles, budget {:.3}",
        file.display(),
        parsed.num_targets,
        parsed.num_vehicles,
        parsed.budget
    );

    let instance = Arc::new(
        InstanceBuilder::from_params(parsed.sites, parsed.num_vehicles, parsed.budget, &params)
            .build()?,
    );
    let budget = instance.budget;

    let outcome = topd_branch_price::solve(instance, &params)
        .with_context(|| format!("solving {}", file.display()))?;

    let summary = report::RunSummary::new(cli, &params, budget, &outcome);
    report::write(&summary, Path::new(&cli.output))?;
    info!(
        "results written to {} (bounds [{:.4}, {:.4}], optimal: {})",
        cli.output, outcome.lower_bound, outcome.upper_bound, outcome.optimal
    );
    Ok(())
}
