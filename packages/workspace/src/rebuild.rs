//! Chunked outline rebuild
//!
//! Flattens the composed hierarchy into outline rows a slice at a time, so
//! a UI can render between steps. Only one rebuild runs at a time.

use serde::Serialize;
use stagehand_common::{ErrorKind, Warning};
use stagehand_parser::prim_path;
use stagehand_stage::ComposedHierarchy;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRow {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub type_name: Option<String>,
    pub status: Option<String>,
    pub placeholder: bool,
}

#[derive(Debug, Clone)]
pub struct OutlineRebuild {
    chunk_size: usize,
    queue: VecDeque<OutlineRow>,
    rows: Vec<OutlineRow>,
    in_flight: bool,
}

impl OutlineRebuild {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            queue: VecDeque::new(),
            rows: Vec::new(),
            in_flight: false,
        }
    }

    /// Start a rebuild; while one is in flight this is a no-op with a warning
    pub fn begin(&mut self, hierarchy: &ComposedHierarchy) -> Result<(), Warning> {
        if self.in_flight {
            warn!(remaining = self.queue.len(), "Outline rebuild already running - ignoring request");
            return Err(Warning::new(
                ErrorKind::Validation,
                "outline rebuild already in progress",
            ));
        }

        self.rows.clear();
        self.queue = hierarchy
            .flatten()
            .into_iter()
            .map(|prim| OutlineRow {
                path: prim.path.clone(),
                name: prim.name.clone(),
                depth: prim_path::depth(&prim.path),
                type_name: prim.type_name.clone(),
                status: prim.status().map(str::to_string),
                placeholder: prim.is_placeholder(),
            })
            .collect();
        self.in_flight = true;
        Ok(())
    }

    /// Produce the next chunk of rows; `None` once the rebuild is done
    pub fn step(&mut self) -> Option<&[OutlineRow]> {
        if !self.in_flight {
            return None;
        }

        let start = self.rows.len();
        let take = self.chunk_size.min(self.queue.len());
        self.rows.extend(self.queue.drain(..take));
        if self.queue.is_empty() {
            self.in_flight = false;
        }

        if take == 0 {
            None
        } else {
            Some(&self.rows[start..])
        }
    }

    /// Run a whole rebuild and return every row
    pub fn run(&mut self, hierarchy: &ComposedHierarchy) -> Result<&[OutlineRow], Warning> {
        self.begin(hierarchy)?;
        while self.step().is_some() {}
        Ok(&self.rows)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Rows produced so far
    pub fn rows(&self) -> &[OutlineRow] {
        &self.rows
    }
}
