use super::{open_project, print_warnings};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use stagehand_parser::compose as compose_document;

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Print the composed hierarchy as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the composed hierarchy as one flattened document
    #[arg(long, conflicts_with = "json")]
    pub flatten: bool,
}

pub fn compose(args: ComposeArgs, project: &str) -> Result<()> {
    let state = open_project(project, None)?;
    let hierarchy = state.hierarchy();

    if args.json {
        println!("{}", serde_json::to_string_pretty(hierarchy)?);
        return Ok(());
    }
    if args.flatten {
        print!("{}", compose_document(&hierarchy.roots, &state.config().scene_name));
        return Ok(());
    }

    println!("{}", "Layer stack (strongest first)".bright_blue().bold());
    for layer in state.layers() {
        let visibility = if layer.visible { "" } else { " hidden" };
        println!(
            "   {} {} [{}] {}{}",
            layer.id.bright_white(),
            layer.file_path,
            layer.status,
            layer.owner.as_deref().unwrap_or("-"),
            visibility.dimmed()
        );
    }
    println!();

    let mut rebuild = state.outline_rebuild();
    let rows = rebuild.run(hierarchy).map_err(|w| anyhow::anyhow!(w.message))?;
    for row in rows {
        let status = row.status.as_deref().map(|s| format!("[{}]", s)).unwrap_or_default();
        let marker = if row.placeholder { " (placeholder)" } else { "" };
        println!(
            "{}{} {} {}{}",
            "  ".repeat(row.depth),
            row.name.bright_white(),
            row.type_name.as_deref().unwrap_or("").cyan(),
            status.dimmed(),
            marker.dimmed()
        );
    }

    if !hierarchy.collisions.is_empty() {
        println!();
        println!("{}", "Collisions".yellow().bold());
        for collision in &hierarchy.collisions {
            println!(
                "   {} → {} ({})",
                collision.original_path, collision.renamed_path, collision.layer
            );
        }
    }
    if !hierarchy.warnings.is_empty() {
        println!();
        print_warnings(&hierarchy.warnings);
    }
    Ok(())
}
