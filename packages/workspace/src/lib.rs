//! # Stagehand Workspace
//!
//! Session state for a Stagehand project.
//!
//! [`ProjectState`] owns the loaded layer documents and keeps the composed
//! hierarchy, history graph and staging area consistent with them. Callers
//! pick a user, issue edits and status changes, and receive a [`ChangeSet`]
//! for every state change.
//!
//! ```rust,ignore
//! use stagehand_workspace::ProjectState;
//!
//! let mut state = ProjectState::open_dir(project_dir)?;
//! state.set_current_user("dana")?;
//! state.rename_prim("/World/Pump", "Pump_A")?;
//! state.commit(Some("rename pump"))?;
//! state.save()?;
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod rebuild;
pub mod state;

pub use config::{ProjectConfig, DEFAULT_CONFIG_NAME};
pub use error::{WorkspaceError, WorkspaceResult};
pub use observer::{ChangeSet, StateObserver};
pub use rebuild::{OutlineRebuild, OutlineRow};
pub use state::{CommitOutcome, ProjectState, PropertyChange};
