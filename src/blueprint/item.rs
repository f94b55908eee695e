use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a work item formalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Definition,
    Lemma,
    Theorem,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Definition => write!(f, "definition"),
            Kind::Lemma => write!(f, "lemma"),
            Kind::Theorem => write!(f, "theorem"),
        }
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "definition" => Ok(Kind::Definition),
            "lemma" => Ok(Kind::Lemma),
            "theorem" => Ok(Kind::Theorem),
            other => Err(format!("unknown item kind `{other}`")),
        }
    }
}

/// Progress of a work item.
///
/// Items flow `todo → partial → done`; `partial → hard` once the attempt
/// budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Partial,
    Done,
    Hard,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Todo => write!(f, "todo"),
            Status::Partial => write!(f, "partial"),
            Status::Done => write!(f, "done"),
            Status::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Status::Todo),
            "partial" => Ok(Status::Partial),
            "done" => Ok(Status::Done),
            "hard" => Ok(Status::Hard),
            other => Err(format!("unknown status `{other}`")),
        }
    }
}

/// Attempt counter: `current` never exceeds `budget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempts {
    pub current: u32,
    pub budget: u32,
}

impl Attempts {
    pub fn new(budget: u32) -> Self {
        Self { current: 0, budget }
    }

    /// Adds `delta` attempts, clamped to the budget.
    pub fn record(&mut self, delta: u32) {
        self.current = self.current.saturating_add(delta).min(self.budget);
    }

    pub fn exhausted(&self) -> bool {
        self.current >= self.budget
    }
}

impl fmt::Display for Attempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.current, self.budget)
    }
}

/// A single definition, lemma or theorem tracked in the blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub label: String,
    pub kind: Kind,
    pub dependencies: BTreeSet<String>,
    pub status: Status,
    pub attempts: Attempts,
    /// Where the formal version lives, once it exists.
    pub location: Option<String>,
    pub informal_statement: String,
    pub informal_proof: String,
    /// Lower values are selected first among eligible items.
    #[serde(default)]
    pub priority: u32,
}

impl WorkItem {
    pub fn new(label: impl Into<String>, kind: Kind, budget: u32) -> Self {
        Self {
            label: label.into(),
            kind,
            dependencies: BTreeSet::new(),
            status: Status::Todo,
            attempts: Attempts::new(budget),
            location: None,
            informal_statement: String::new(),
            informal_proof: String::new(),
            priority: 0,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_statement(mut self, statement: &str) -> Self {
        self.informal_statement = statement.trim().to_string();
        self
    }

    pub fn with_proof(mut self, proof: &str) -> Self {
        self.informal_proof = proof.trim().to_string();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// One step of a split, in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItemSpec {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<Kind>,
    pub statement: String,
    #[serde(default)]
    pub proof: String,
}

impl SubItemSpec {
    pub fn new(statement: &str, proof: &str) -> Self {
        Self {
            statement: statement.to_string(),
            proof: proof.to_string(),
            ..Default::default()
        }
    }

    pub fn labeled(label: &str, statement: &str, proof: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::new(statement, proof)
        }
    }
}
