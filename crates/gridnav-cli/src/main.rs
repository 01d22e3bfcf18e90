//! `gridnav` – solve a grid world and localise a simulated robot in it.
//!
//! 1. Loads the grid configuration (`--config`, `$GRIDNAV_CONFIG` or
//!    `~/.gridnav/config.toml`, falling back to a built-in demo world).
//! 2. Solves the navigation policy by value iteration and prints it.
//! 3. `run` (the default) drives the control loop against a seeded simulated
//!    world until the goal is reached with enough confidence, optionally
//!    streaming telemetry events as JSON lines on stdout.
//!
//! Fatal errors print `error: …` to stderr and exit with status 1.

mod config;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gridnav_hal::sim::{SimDevices, SimWorld};
use gridnav_middleware::{EventBus, Topic, TopicReceiver};
use gridnav_planning::ValueIteration;
use gridnav_runtime::{ControlLoop, CycleOutcome};
use gridnav_types::{Cell, GridConfig, GridModel, GridNavError};
use tracing::{info, warn};

use crate::config::ConfigSource;

/// Temperature events processed before `run` gives up.
const DEFAULT_MAX_CYCLES: u64 = 500;

#[derive(Parser)]
#[command(name = "gridnav", version)]
#[command(about = "MDP grid navigation with Bayesian localisation")]
struct Cli {
    /// Grid configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Solve the policy and run the control loop against the simulator
    Run(RunArgs),
    /// Solve and print the policy only
    Policy {
        /// Also print the converged state values
        #[arg(long)]
        values: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Stop after this many temperature events
    #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
    max_cycles: u64,

    /// Simulator seed (default: $GRIDNAV_SEED, else random)
    #[arg(long)]
    seed: Option<u64>,

    /// Print every telemetry event as a JSON line on stdout
    #[arg(long)]
    telemetry_json: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
            seed: None,
            telemetry_json: false,
        }
    }
}

fn main() {
    let guard = gridnav_runtime::init_tracing("gridnav");
    let cli = Cli::parse();

    let result = match config::load(cli.config.as_deref()) {
        Ok((source, cfg)) => {
            describe_source(&source);
            match cli.command {
                Some(Command::Policy { values }) => print_policy(&cfg, values),
                Some(Command::Run(args)) => run(&cfg, &args),
                None => run(&cfg, &RunArgs::default()),
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "error:".red().bold());
        drop(guard);
        std::process::exit(1);
    }
}

fn describe_source(source: &ConfigSource) {
    match source {
        ConfigSource::File(path) => {
            eprintln!("  Config loaded from {}", path.display().to_string().bold());
        }
        ConfigSource::BuiltIn => {
            eprintln!(
                "  No config at {}; using the built-in demo world.",
                config::config_path().display().to_string().dimmed()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn print_policy(cfg: &GridConfig, with_values: bool) -> Result<(), GridNavError> {
    let grid = GridModel::from_config(cfg)?;
    let solution = ValueIteration::from_config(&grid, cfg)?.solve_with_values();

    println!("{}", render::policy_grid(&solution.policy));
    if with_values {
        println!();
        println!("{}", render::value_grid(&solution.policy, &solution.values));
    }
    let status = if solution.converged {
        "converged".green()
    } else {
        "iteration cap reached".yellow()
    };
    eprintln!("  {} after {} sweep(s)", status, solution.sweeps);
    Ok(())
}

fn run(cfg: &GridConfig, args: &RunArgs) -> Result<(), GridNavError> {
    let seed = args
        .seed
        .or_else(config::seed_from_env)
        .unwrap_or_else(rand::random);
    info!(seed, max_cycles = args.max_cycles, "starting simulated run");

    let grid = Arc::new(GridModel::from_config(cfg)?);
    let world = SimWorld::new(grid, Cell::from(cfg.start), &cfg.sensing, seed)?;
    let SimDevices {
        world,
        mut temperature,
        texture,
        mover,
    } = SimDevices::new(world);

    let bus = EventBus::default();
    let mut telemetry = args
        .telemetry_json
        .then(|| bus.subscribe_to(Topic::Telemetry));

    let mut control = ControlLoop::from_config(cfg, Box::new(texture), Box::new(mover), bus)?;
    println!("{}", render::policy_grid(control.policy()));
    println!();

    let summary = control.run_with(&mut temperature, args.max_cycles, |outcome| {
        if let Some(rx) = telemetry.as_mut() {
            stream_json(rx);
        }
        if let CycleOutcome::Stalled { estimate, label } = outcome {
            eprintln!("  {} stalled at {estimate} ({label})", "•".yellow());
        }
    })?;

    let true_position = gridnav_hal::sim::true_position(&world)?;
    match summary.completion {
        Some(done) => println!(
            "  {} goal {} reached with p = {:.3} after {} cycle(s): {} move(s), {} stall(s); robot is at {}",
            "✓".green().bold(),
            done.goal,
            done.probability,
            done.cycles,
            summary.moves,
            summary.stalls,
            true_position
        ),
        None => {
            warn!(cycles = summary.cycles, "goal not reached");
            println!(
                "  {} goal not confirmed after {} cycle(s); robot is at {}",
                "✗".yellow().bold(),
                summary.cycles,
                true_position
            );
        }
    }
    Ok(())
}

/// Print every buffered event as one JSON line.
fn stream_json(rx: &mut TopicReceiver) {
    for event in rx.drain() {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialise telemetry event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default_subcommand() {
        let cli = Cli::try_parse_from(["gridnav"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "gridnav",
            "run",
            "--max-cycles",
            "12",
            "--seed",
            "5",
            "--telemetry-json",
            "--config",
            "world.toml",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_cycles, 12);
        assert_eq!(args.seed, Some(5));
        assert!(args.telemetry_json);
        assert_eq!(cli.config, Some(PathBuf::from("world.toml")));
    }

    #[test]
    fn run_defaults_match_clap_defaults() {
        let cli = Cli::try_parse_from(["gridnav", "run"]).unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        let defaults = RunArgs::default();
        assert_eq!(args.max_cycles, defaults.max_cycles);
        assert_eq!(args.seed, defaults.seed);
        assert_eq!(args.telemetry_json, defaults.telemetry_json);
    }

    #[test]
    fn policy_subcommand_parses_values_flag() {
        let cli = Cli::try_parse_from(["gridnav", "policy", "--values"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Policy { values: true })));
    }

    #[test]
    fn seeded_run_on_demo_world_succeeds() {
        let args = RunArgs {
            max_cycles: 200,
            seed: Some(17),
            telemetry_json: true,
        };
        run(&GridConfig::default(), &args).unwrap();
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut cfg = GridConfig::default();
        cfg.start = [1, 1];
        assert!(run(&cfg, &RunArgs::default()).is_err());
    }
}
