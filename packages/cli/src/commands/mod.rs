pub mod compose;
pub mod edit;
pub mod history;
pub mod init;
pub mod parse;
pub mod status;
pub mod validate;

pub use compose::{compose, ComposeArgs};
pub use edit::{rename, set, RenameArgs, SetArgs};
pub use history::{log, reconstruct, LogArgs, ReconstructArgs};
pub use init::{init, InitArgs};
pub use parse::{parse, ParseArgs};
pub use status::{status, StatusArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::Result;
use colored::Colorize;
use stagehand_common::Warnings;
use stagehand_parser::ast::Prim;
use stagehand_workspace::ProjectState;
use std::path::Path;
use tracing::debug;

/// Open the project in `dir`, optionally acting as `user`
pub(crate) fn open_project(dir: &str, user: Option<&str>) -> Result<ProjectState> {
    debug!(project = %dir, user = ?user, "Opening project");
    let mut state = ProjectState::open_dir(Path::new(dir))?;
    if let Some(user) = user {
        state.set_current_user(user)?;
    }
    Ok(state)
}

pub(crate) fn print_warnings(warnings: &Warnings) {
    for warning in warnings.iter() {
        match &warning.subject {
            Some(subject) => println!(
                "   {} {} ({})",
                "⚠".yellow(),
                warning.message,
                subject.bright_white()
            ),
            None => println!("   {} {}", "⚠".yellow(), warning.message),
        }
    }
}

/// Indented prim tree: name, type and status
pub(crate) fn print_tree(prims: &[Prim], depth: usize) {
    for prim in prims {
        let type_name = prim.type_name.as_deref().unwrap_or("");
        let status = prim.status().map(|s| format!("[{}]", s)).unwrap_or_default();
        let marker = if prim.is_placeholder() {
            " (placeholder)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "{}{} {} {}{}",
            "  ".repeat(depth),
            prim.name.bright_white(),
            type_name.cyan(),
            status.dimmed(),
            marker
        );
        print_tree(&prim.children, depth + 1);
    }
}
