use anyhow::Result;
use clap::Args;
use colored::Colorize;
use stagehand_governance::{Role, User};
use stagehand_parser::ast::{Prim, Specifier};
use stagehand_parser::compose as compose_document;
use stagehand_stage::Layer;
use stagehand_workspace::{ProjectConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Name of the root prim
    #[arg(short, long, default_value = "World")]
    pub scene_name: String,

    /// Project manager who owns the first layer
    #[arg(short, long, default_value = "admin")]
    pub user: String,

    /// Directory for layer documents
    #[arg(short, long, default_value = "layers")]
    pub layers_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, project: &str) -> Result<()> {
    let root = PathBuf::from(project);
    let config_path = root.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Stagehand project...".bright_blue().bold());

    let layers_dir = root.join(&args.layers_dir);
    if !layers_dir.exists() {
        fs::create_dir_all(&layers_dir)?;
        println!("  {} Created {}/", "✓".green(), args.layers_dir);
    }

    let layer_file = format!("{}/scene.usda", args.layers_dir);
    let layer_path = root.join(&layer_file);
    if !layer_path.exists() {
        let scene = Prim::new("/", args.scene_name.as_str(), Specifier::Def).with_type("Xform");
        fs::write(&layer_path, compose_document(&[scene], &args.scene_name))?;
        println!("  {} Created {}", "✓".green(), layer_file);
    }

    let config = ProjectConfig {
        scene_name: args.scene_name.clone(),
        layers: vec![Layer::new("scene", layer_file.as_str()).with_owner(args.user.as_str())],
        users: vec![User::new(args.user.as_str(), Role::ProjectManager)],
        ..ProjectConfig::default()
    };
    config.save(&root)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    println!();
    println!("{}", "✨ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Add layers and users to {}", DEFAULT_CONFIG_NAME.bright_white());
    println!("  2. Run {} to inspect the stack", "stagehand compose".bright_white());

    Ok(())
}
