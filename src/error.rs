use thiserror::Error;

use crate::blueprint::Status;

pub type Result<T> = std::result::Result<T, BlueprintError>;

#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Dependency cycle detected among: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    #[error("Invalid transition for {label}: {from} -> {to} ({reason})")]
    InvalidTransition {
        label: String,
        from: Status,
        to: Status,
        reason: String,
    },

    #[error("Split of {0} needs at least one sub-item")]
    EmptySplit(String),

    #[error("Invalid label `{0}`: labels must be non-empty and contain no whitespace, brackets or commas")]
    InvalidLabel(String),

    #[error("Invalid item {label}: {reason}")]
    InvalidItem { label: String, reason: String },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BlueprintError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        BlueprintError::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_item(label: &str, reason: impl Into<String>) -> Self {
        BlueprintError::InvalidItem {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transition(
        label: &str,
        from: Status,
        to: Status,
        reason: impl Into<String>,
    ) -> Self {
        BlueprintError::InvalidTransition {
            label: label.to_string(),
            from,
            to,
            reason: reason.into(),
        }
    }
}
