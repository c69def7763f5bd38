//! # Stagehand History
//!
//! Every committed change becomes an immutable [`LogEntry`] in an
//! append-only graph. Entries link to their parent, so checking out an older
//! entry and appending creates a branch.
//!
//! The graph is persisted as `Log_N` blocks in the change-log document and
//! can be replayed to rebuild the prims as of any entry.

pub mod entry;
pub mod error;
pub mod graph;
pub mod log;
pub mod reconstruct;

pub use entry::{LogEntry, NewEntry};
pub use error::{HistoryError, HistoryResult};
pub use graph::History;
pub use log::{append_to_log, entry_fields, entry_from_block};
pub use reconstruct::{reconstruct_at, LivePrims, Reconstruction};
