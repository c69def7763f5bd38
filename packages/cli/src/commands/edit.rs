use super::{open_project, print_warnings};
use anyhow::{anyhow, bail, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use stagehand_governance::{Resolution, WriteIntent};
use stagehand_parser::PropertyType;
use stagehand_workspace::{ChangeSet, ProjectState, PropertyChange};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResolutionArg {
    KeepCurrent,
    UseNew,
    Cancel,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::KeepCurrent => Resolution::KeepCurrent,
            ResolutionArg::UseNew => Resolution::UseNew,
            ResolutionArg::Cancel => Resolution::Cancel,
        }
    }
}

pub(crate) fn parse_property_type(raw: &str) -> Result<PropertyType, String> {
    PropertyType::from_keyword(raw).ok_or_else(|| format!("unknown property type '{}'", raw))
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Composed prim path
    pub path: String,

    /// Property name
    pub name: String,

    /// Raw value
    pub value: String,

    /// Property type
    #[arg(short = 't', long = "type", default_value = "string", value_parser = parse_property_type)]
    pub value_type: PropertyType,

    /// Acting user
    #[arg(short, long)]
    pub user: String,

    /// Answer to a cross-owner conflict
    #[arg(short, long, value_enum)]
    pub resolution: Option<ResolutionArg>,

    /// Commit message
    #[arg(short, long)]
    pub message: Option<String>,
}

pub fn set(args: SetArgs, project: &str) -> Result<()> {
    let mut state = open_project(project, Some(&args.user))?;
    let intent = WriteIntent::new(args.path.as_str(), args.name.as_str(), args.value.as_str(), args.value_type);

    let change = match state.apply_property_change(intent)? {
        PropertyChange::Applied(change) => change,
        PropertyChange::Denied(decision) => bail!("write denied: {}", decision.reason),
        PropertyChange::NeedsResolution(pending) => {
            println!(
                "{} {}.{} has opinions from other owners:",
                "⚠".yellow(),
                pending.intent.path.bright_white(),
                pending.intent.property
            );
            for layer in &pending.conflict.conflicting_layers {
                println!("   {} ({}) owned by {}", layer.layer_id, layer.file_path, layer.owner);
            }
            if let Some(current) = &pending.conflict.current_value {
                println!("   current: {}  new: {}", current, pending.conflict.new_value);
            }

            let resolution = args
                .resolution
                .ok_or_else(|| anyhow!("conflict needs --resolution keep-current|use-new|cancel"))?;
            match state.resolve_pending(pending, resolution.into())? {
                Some(change) => change,
                None => {
                    println!("   {} Kept the current value", "•".dimmed());
                    return Ok(());
                }
            }
        }
    };

    finish(&mut state, &change, args.message.as_deref())?;
    println!("{} {}.{} = {}", "✓".green(), args.path.bright_white(), args.name, args.value);
    Ok(())
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Composed prim path
    pub path: String,

    /// New prim name
    pub new_name: String,

    /// Acting user
    #[arg(short, long)]
    pub user: String,

    /// Commit message
    #[arg(short, long)]
    pub message: Option<String>,
}

pub fn rename(args: RenameArgs, project: &str) -> Result<()> {
    let mut state = open_project(project, Some(&args.user))?;
    let change = state.rename_prim(&args.path, &args.new_name)?;
    finish(&mut state, &change, args.message.as_deref())?;

    for (old, new) in &change.renamed {
        println!("{} {} → {}", "✓".green(), old, new.bright_white());
    }
    if change.documents.len() > 1 {
        println!("   references updated in {} documents", change.documents.len() - 1);
    }
    Ok(())
}

/// Commit the staged edit and write every changed document
fn finish(state: &mut ProjectState, change: &ChangeSet, message: Option<&str>) -> Result<()> {
    print_warnings(&change.warnings);
    let outcome = state.commit(message)?;
    print_warnings(&outcome.warnings);
    state.save()?;
    for entry in &outcome.entries {
        println!("   {} log entry {}", "•".dimmed(), entry.entry);
    }
    Ok(())
}
