//! Change-log document encoding
//!
//! Each entry is one `def "Log_N"` block under the top-level `ChangeLog`
//! prim. Paths and snapshots are stored as JSON in string properties.

use crate::entry::LogEntry;
use crate::error::{HistoryError, HistoryResult};
use crate::graph::History;
use chrono::{DateTime, Utc};
use stagehand_editor::ChangeKind;
use stagehand_parser::ast::{Prim, PropertyValue, SceneDocument, CHANGE_LOG_BLOCK};
use stagehand_parser::{append_to_document, compose_log_entry, parse, LogFields};
use tracing::debug;

/// Fields written for `entry`, ready for `compose_log_entry`
pub fn entry_fields(entry: &LogEntry) -> HistoryResult<LogFields> {
    let mut fields = LogFields::new(entry.entry)
        .with("id", PropertyValue::string(entry.id.as_str()))
        .with("type", PropertyValue::string(entry.kind.as_str()))
        .with("timestamp", PropertyValue::string(entry.timestamp.to_rfc3339()))
        .with("user", PropertyValue::string(entry.user.as_str()))
        .with("paths", PropertyValue::string(serde_json::to_string(&entry.paths)?));

    if let Some(parent) = &entry.parent {
        fields = fields.with("parent", PropertyValue::string(parent.as_str()));
    }
    if let Some(status) = &entry.source_status {
        fields = fields.with("sourceStatus", PropertyValue::string(status.as_str()));
    }
    if let Some(status) = &entry.target_status {
        fields = fields.with("targetStatus", PropertyValue::string(status.as_str()));
    }
    if let Some(message) = &entry.message {
        fields = fields.with("message", PropertyValue::string(message.as_str()));
    }
    if let Some(snapshot) = &entry.snapshot {
        fields = fields.with("snapshot", PropertyValue::string(serde_json::to_string(snapshot)?));
    }
    Ok(fields)
}

/// Append `entry` to the change-log document text
pub fn append_to_log(log_text: &str, entry: &LogEntry) -> HistoryResult<String> {
    let fragment = compose_log_entry(&entry_fields(entry)?);
    Ok(append_to_document(log_text, &fragment, CHANGE_LOG_BLOCK)?)
}

/// Decode one `Log_N` block
pub fn entry_from_block(block: &Prim) -> HistoryResult<LogEntry> {
    let text = |field: &str| block.text_property(field).map(str::to_string);
    let required = |field: &str| {
        text(field).ok_or_else(|| HistoryError::MissingField {
            block: block.name.clone(),
            field: field.to_string(),
        })
    };
    let invalid = |field: &str, message: String| HistoryError::InvalidField {
        block: block.name.clone(),
        field: field.to_string(),
        message,
    };

    let entry = match block.property("entry").and_then(|p| p.value.as_int()) {
        Some(n) if n >= 0 => n as u64,
        _ => block
            .name
            .strip_prefix("Log_")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| invalid("entry", "no entry number".to_string()))?,
    };

    let kind = required("type")?
        .parse::<ChangeKind>()
        .map_err(|e: String| invalid("type", e))?;

    let timestamp = match text("timestamp") {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| invalid("timestamp", e.to_string()))?
            .with_timezone(&Utc),
        None => DateTime::<Utc>::default(),
    };

    let paths: Vec<String> = match text("paths") {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| invalid("paths", e.to_string()))?,
        None => Vec::new(),
    };

    let snapshot: Option<Prim> = match text("snapshot") {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| invalid("snapshot", e.to_string()))?),
        None => None,
    };

    Ok(LogEntry {
        id: required("id")?,
        entry,
        timestamp,
        kind,
        user: text("user").unwrap_or_default(),
        source_status: text("sourceStatus"),
        target_status: text("targetStatus"),
        paths,
        parent: text("parent"),
        snapshot,
        message: text("message"),
    })
}

impl History {
    /// Rebuild the graph from a parsed change-log document
    ///
    /// Entries are loaded in document order; the last one becomes the head.
    pub fn from_document(doc: &SceneDocument) -> HistoryResult<History> {
        let mut history = History::new();
        if let Some(log) = doc.change_log() {
            for block in &log.children {
                history.insert_loaded(entry_from_block(block)?)?;
            }
        }
        debug!(entries = history.len(), "History loaded from change log");
        Ok(history)
    }

    /// Parse change-log text and rebuild the graph
    pub fn from_text(text: &str) -> HistoryResult<History> {
        Self::from_document(&parse(text)?)
    }
}
