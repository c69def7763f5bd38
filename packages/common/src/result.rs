use crate::error::{CommonError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Common Result type alias
pub type CommonResult<T> = Result<T, CommonError>;

/// A non-fatal problem reported alongside a successful operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
    /// Prim path or layer id the warning is about, when there is one
    pub subject: Option<String>,
}

impl Warning {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            subject: None,
        }
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Collector used by batch operations that continue past per-item failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, warning: Warning) {
        self.items.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

impl IntoIterator for Warnings {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
