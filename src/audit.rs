//! Append-only record of blueprint mutations.
//!
//! Each successful mutation yields one [`AuditRecord`]; when an audit log is
//! configured the records are appended to it as JSON lines.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blueprint::{Advance, Attempts, Status};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upsert,
    Advance,
    Claim,
    Revert,
    Split,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Upsert => write!(f, "upsert"),
            Operation::Advance => write!(f, "advance"),
            Operation::Claim => write!(f, "claim"),
            Operation::Revert => write!(f, "revert"),
            Operation::Split => write!(f, "split"),
        }
    }
}

/// One committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation: Operation,
    /// The item acted on, followed by any items created alongside it.
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Attempts>,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(operation: Operation, labels: Vec<String>) -> Self {
        Self {
            operation,
            labels,
            from: None,
            to: None,
            attempts: None,
            at: Utc::now(),
        }
    }

    pub fn from_advance(operation: Operation, advance: &Advance) -> Self {
        Self {
            from: Some(advance.from),
            to: Some(advance.applied),
            attempts: Some(advance.attempts),
            ..Self::new(operation, vec![advance.label.clone()])
        }
    }

    /// The label the operation targeted.
    pub fn subject(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or("")
    }

    /// One-line summary, also used as the git commit message.
    pub fn summary(&self) -> String {
        match (self.operation, self.from, self.to) {
            (Operation::Split, _, _) => format!(
                "split {} into {}",
                self.subject(),
                self.labels.get(1..).unwrap_or_default().join(", ")
            ),
            (op, Some(from), Some(to)) => format!("{op} {} ({from} -> {to})", self.subject()),
            (op, _, _) => format!("{op} {}", self.labels.join(", ")),
        }
    }
}

/// JSON-lines file of [`AuditRecord`]s.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Reads every record; a missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}
