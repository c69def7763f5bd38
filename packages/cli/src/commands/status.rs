use super::{open_project, print_warnings};
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use stagehand_governance::Direction;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Layer ids to move
    #[arg(short, long = "layer", conflicts_with = "prims")]
    pub layers: Vec<String>,

    /// Composed prim paths to move (their parents and descendants follow)
    #[arg(short, long = "prim")]
    pub prims: Vec<String>,

    /// Acting user
    #[arg(short, long)]
    pub user: String,
}

pub fn status(args: StatusArgs, direction: Direction, project: &str) -> Result<()> {
    if args.layers.is_empty() && args.prims.is_empty() {
        bail!("name at least one --layer or --prim");
    }

    let mut state = open_project(project, Some(&args.user))?;
    let verb = match direction {
        Direction::Promote => "Promoted",
        Direction::Demote => "Demoted",
    };

    let before = state.history().len();
    let change = if args.layers.is_empty() {
        match direction {
            Direction::Promote => state.promote_objects(&args.prims)?,
            Direction::Demote => state.demote_objects(&args.prims)?,
        }
    } else {
        match direction {
            Direction::Promote => state.promote_layers(&args.layers)?,
            Direction::Demote => state.demote_layers(&args.layers)?,
        }
    };

    for entry in &state.history().entries()[before..] {
        // Layer entries carry the layer in their message
        let subject = match (&entry.message, entry.paths.first()) {
            (Some(message), _) => message.as_str(),
            (None, Some(path)) => path.as_str(),
            (None, None) => "",
        };
        println!(
            "{} {} {} {} → {}",
            "✓".green(),
            verb,
            subject.bright_white(),
            entry.source_status.as_deref().unwrap_or("?"),
            entry.target_status.as_deref().unwrap_or("?")
        );
    }
    print_warnings(&change.warnings);

    state.save()?;
    Ok(())
}
