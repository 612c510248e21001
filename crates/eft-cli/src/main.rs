use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    demo::{self, DemoArgs},
    evaluate::{self, EvaluateArgs},
    export::{self, ExportArgs},
    merge::{self, MergeArgs},
    points::{self, PointsArgs},
    solve::{self, SolveArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "eftscale", about = "EFT scaling-term extraction and evaluation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the reweighting grid and per-point coupling values.
    Points(PointsArgs),
    /// Merge accumulated-statistics documents.
    Merge(MergeArgs),
    /// Solve accumulated statistics into a scaling model.
    Solve(SolveArgs),
    /// Evaluate a scaling model at given coupling values.
    Evaluate(EvaluateArgs),
    /// Render a scaling model in a report or legacy format.
    Export(ExportArgs),
    /// Run a synthetic closure test end to end.
    Demo(DemoArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    match cli.command {
        Command::Points(args) => points::run(&args),
        Command::Merge(args) => merge::run(&args),
        Command::Solve(args) => solve::run(&args),
        Command::Evaluate(args) => evaluate::run(&args),
        Command::Export(args) => export::run(&args),
        Command::Demo(args) => demo::run(&args),
    }
}
