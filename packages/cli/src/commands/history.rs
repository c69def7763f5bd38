use super::{open_project, print_tree};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use stagehand_history::LogEntry;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn log(args: LogArgs, project: &str) -> Result<()> {
    let state = open_project(project, None)?;
    let history = state.history();

    if args.json {
        println!("{}", serde_json::to_string_pretty(history.entries())?);
        return Ok(());
    }
    if history.is_empty() {
        println!("   {} No log entries yet", "•".dimmed());
        return Ok(());
    }

    let head = history.head().map(|e| e.id.as_str());
    for entry in history.entries().iter().rev() {
        let marker = if Some(entry.id.as_str()) == head { " (head)".green().to_string() } else { String::new() };
        println!(
            "{} {} {} {}{}",
            format!("#{}", entry.entry).yellow(),
            short_id(entry),
            entry.kind.to_string().bright_white(),
            entry.user,
            marker
        );
        println!("   {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed());
        if !entry.paths.is_empty() {
            println!("   {}", entry.paths.join(" → "));
        }
        if let (Some(from), Some(to)) = (&entry.source_status, &entry.target_status) {
            println!("   {} → {}", from, to);
        }
        if let Some(message) = &entry.message {
            println!("   {}", message.italic());
        }
    }
    Ok(())
}

fn short_id(entry: &LogEntry) -> &str {
    entry.id.get(..8).unwrap_or(&entry.id)
}

#[derive(Args, Debug)]
pub struct ReconstructArgs {
    /// Entry id, id prefix or entry number
    pub commit: String,

    /// Print the reconstruction as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn reconstruct(args: ReconstructArgs, project: &str) -> Result<()> {
    let state = open_project(project, None)?;
    let entries = state.history().entries();

    let number: Option<u64> = args.commit.trim_start_matches('#').parse().ok();
    let entry = entries
        .iter()
        .find(|e| Some(e.entry) == number || e.id == args.commit)
        .or_else(|| {
            let mut matching = entries.iter().filter(|e| e.id.starts_with(&args.commit));
            match (matching.next(), matching.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        })
        .ok_or_else(|| anyhow!("no log entry matches '{}'", args.commit))?;

    let reconstruction = state.reconstruct_at(&entry.id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reconstruction)?);
        return Ok(());
    }

    println!(
        "{} State at entry #{} ({})",
        "✓".green(),
        entry.entry,
        short_id(entry)
    );
    print_tree(&reconstruction.roots, 1);
    if reconstruction.is_lossy() {
        println!();
        println!(
            "{} Filled from current state (no snapshot recorded): {}",
            "⚠".yellow(),
            reconstruction.lossy_paths.join(", ")
        );
    }
    Ok(())
}
