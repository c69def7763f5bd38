mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    compose, init, log, parse, reconstruct, rename, set, status, validate, ComposeArgs, InitArgs,
    LogArgs, ParseArgs, ReconstructArgs, RenameArgs, SetArgs, StatusArgs, ValidateArgs,
};
use stagehand_governance::Direction;
use tracing_subscriber::EnvFilter;

/// Stagehand CLI - layered scene documents with ownership and history
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory holding stagehand.config.json
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Stagehand project
    Init(InitArgs),

    /// Parse one scene document and print its prims
    Parse(ParseArgs),

    /// Compose the project's layer stack
    Compose(ComposeArgs),

    /// Write one property through the ownership guard
    Set(SetArgs),

    /// Rename a prim; references follow
    Rename(RenameArgs),

    /// Promote layers or prims one status step
    Promote(StatusArgs),

    /// Demote layers or prims one status step
    Demote(StatusArgs),

    /// List the change log
    Log(LogArgs),

    /// Rebuild the prims as of one log entry
    Reconstruct(ReconstructArgs),

    /// Check a raw value against a property type
    Validate(ValidateArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project = cli.project.as_str();

    let result = match cli.command {
        Command::Init(args) => init(args, project),
        Command::Parse(args) => parse(args),
        Command::Compose(args) => compose(args, project),
        Command::Set(args) => set(args, project),
        Command::Rename(args) => rename(args, project),
        Command::Promote(args) => status(args, Direction::Promote, project),
        Command::Demote(args) => status(args, Direction::Demote, project),
        Command::Log(args) => log(args, project),
        Command::Reconstruct(args) => reconstruct(args, project),
        Command::Validate(args) => validate(args),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
