use super::print_tree;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use stagehand_parser::{format_error, parse as parse_document, serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Scene document to parse
    pub file: PathBuf,

    /// Print the parsed document as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the document re-serialized from its parse
    #[arg(long, conflicts_with = "json")]
    pub serialize: bool,
}

pub fn parse(args: ParseArgs) -> Result<()> {
    let source = fs::read_to_string(&args.file)?;
    let filename = args.file.to_string_lossy();

    let doc = match parse_document(&source) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("{}", format_error(&source, &filename, &err));
            return Err(anyhow!("failed to parse {}", filename));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if args.serialize {
        print!("{}", serialize(&doc));
        return Ok(());
    }

    println!("{} {}", "✓".green(), filename.bright_white());
    if let Some(default_prim) = &doc.default_prim {
        println!("   defaultPrim: {}", default_prim);
    }
    let scene: Vec<_> = doc.scene_prims().cloned().collect();
    print_tree(&scene, 1);
    if let Some(log) = doc.change_log() {
        println!("   {} change log entries", log.children.len());
    }
    Ok(())
}
