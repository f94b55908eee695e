//! The persisted blueprint document.
//!
//! A document is a sequence of records:
//!
//! ```text
//! # lemma lem:bound
//! ## meta
//! - label: lem:bound
//! - uses: [[def:seq], [lem:mono]]
//! - file: Bound.lean
//! - status: partial
//! - attempts: 3 / 50
//! ## statement
//! The sequence is bounded.
//! ## proof
//! Monotone and dominated.
//! ```
//!
//! `file` is `(to be created)` until the item is formalized. A non-zero
//! priority is written as an extra `- priority: <n>` meta line. Definitions
//! usually carry no `## proof` section.
//!
//! Statement and proof lines that begin with `#` (after any backslashes)
//! are written with one extra leading `\` so they never read as headings.

use std::collections::BTreeSet;

use tracing::warn;

use super::item::{Attempts, Kind, Status, WorkItem};
use crate::error::{BlueprintError, Result};

const NO_FILE: &str = "(to be created)";

/// Renders items in the given order.
pub fn serialize<'a>(items: impl IntoIterator<Item = &'a WorkItem>) -> String {
    items
        .into_iter()
        .map(render_item)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_item(item: &WorkItem) -> String {
    let uses = item
        .dependencies
        .iter()
        .map(|dep| format!("[{dep}]"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str(&format!("# {} {}\n", item.kind, item.label));
    out.push_str("## meta\n");
    out.push_str(&format!("- label: {}\n", item.label));
    out.push_str(&format!("- uses: [{uses}]\n"));
    out.push_str(&format!(
        "- file: {}\n",
        normalize_location(item.location.as_deref())
            .as_deref()
            .unwrap_or(NO_FILE)
    ));
    out.push_str(&format!("- status: {}\n", item.status));
    out.push_str(&format!("- attempts: {}\n", item.attempts));
    if item.priority != 0 {
        out.push_str(&format!("- priority: {}\n", item.priority));
    }

    push_section(&mut out, "statement", &normalize_text(&item.informal_statement));
    let proof = normalize_text(&item.informal_proof);
    if item.kind != Kind::Definition || !proof.is_empty() {
        push_section(&mut out, "proof", &proof);
    }
    out
}

// `text` is already normalized.
fn push_section(out: &mut String, name: &str, text: &str) {
    out.push_str(&format!("## {name}\n"));
    for line in text.lines() {
        if is_heading_like(line) {
            out.push('\\');
        }
        out.push_str(line);
        out.push('\n');
    }
}

/// Canonical form of free text: trailing whitespace dropped from every
/// line, surrounding blank space trimmed.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Canonical form of a formalization location; blank means not created yet.
pub fn normalize_location(location: Option<&str>) -> Option<String> {
    match location.map(str::trim) {
        None | Some("") | Some(NO_FILE) => None,
        Some(path) => Some(path.to_string()),
    }
}

/// Brings free text and location into the form a save-and-reload keeps.
pub fn normalize_item(mut item: WorkItem) -> WorkItem {
    item.informal_statement = normalize_text(&item.informal_statement);
    item.informal_proof = normalize_text(&item.informal_proof);
    item.location = normalize_location(item.location.as_deref());
    item
}

fn is_heading_like(line: &str) -> bool {
    line.trim_start_matches('\\').starts_with('#')
}

fn unescape(line: &str) -> &str {
    match line.strip_prefix('\\') {
        Some(rest) if is_heading_like(rest) => rest,
        _ => line,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Meta,
    Statement,
    Proof,
}

// One record while it is being read.
struct Draft<'a> {
    line: usize,
    kind: Kind,
    label: &'a str,
    section: Option<Section>,
    seen: Vec<Section>,
    meta_label: Option<&'a str>,
    uses: Option<BTreeSet<String>>,
    file: Option<Option<String>>,
    status: Option<Status>,
    attempts: Option<Attempts>,
    priority: u32,
    statement: Vec<&'a str>,
    proof: Vec<&'a str>,
}

impl<'a> Draft<'a> {
    fn new(line: usize, kind: Kind, label: &'a str) -> Self {
        Self {
            line,
            kind,
            label,
            section: None,
            seen: Vec::new(),
            meta_label: None,
            uses: None,
            file: None,
            status: None,
            attempts: None,
            priority: 0,
            statement: Vec::new(),
            proof: Vec::new(),
        }
    }

    fn enter(&mut self, section: Section, line: usize) -> Result<()> {
        if self.seen.contains(&section) {
            return Err(BlueprintError::parse(
                line,
                format!("duplicate {section:?} section in `{}`", self.label),
            ));
        }
        self.seen.push(section);
        self.section = Some(section);
        Ok(())
    }

    fn meta(&mut self, line: usize, text: &'a str) -> Result<()> {
        let Some(entry) = text.strip_prefix("- ") else {
            return Err(BlueprintError::parse(line, format!("expected `- key: value`, got `{text}`")));
        };
        let Some((key, value)) = entry.split_once(':') else {
            return Err(BlueprintError::parse(line, format!("missing `:` in `{text}`")));
        };
        let value = value.trim();
        match key.trim() {
            "label" => self.meta_label = Some(value),
            "uses" => self.uses = Some(parse_uses(line, value)?),
            "file" => self.file = Some(normalize_location(Some(value))),
            "status" => {
                self.status = Some(value.parse().map_err(|e| BlueprintError::parse(line, e))?)
            }
            "attempts" => self.attempts = Some(parse_attempts(line, value)?),
            "priority" => {
                self.priority = value
                    .parse()
                    .map_err(|_| BlueprintError::parse(line, format!("bad priority `{value}`")))?
            }
            other => warn!(line, key = other, label = self.label, "ignoring unknown meta key"),
        }
        Ok(())
    }

    fn finish(self) -> Result<WorkItem> {
        if !self.seen.contains(&Section::Meta) {
            return Err(BlueprintError::parse(
                self.line,
                format!("`{}` has no meta section", self.label),
            ));
        }
        match self.meta_label {
            Some(label) if label == self.label => {}
            Some(label) => {
                return Err(BlueprintError::parse(
                    self.line,
                    format!("heading says `{}` but meta label is `{label}`", self.label),
                ));
            }
            None => {
                return Err(BlueprintError::parse(
                    self.line,
                    format!("`{}` is missing `label`", self.label),
                ));
            }
        }
        let status = self.status.ok_or_else(|| {
            BlueprintError::parse(self.line, format!("`{}` is missing `status`", self.label))
        })?;
        let attempts = self.attempts.ok_or_else(|| {
            BlueprintError::parse(self.line, format!("`{}` is missing `attempts`", self.label))
        })?;

        Ok(WorkItem {
            label: self.label.to_string(),
            kind: self.kind,
            dependencies: self.uses.unwrap_or_default(),
            status,
            attempts,
            location: self.file.flatten(),
            informal_statement: normalize_text(&self.statement.join("\n")),
            informal_proof: normalize_text(&self.proof.join("\n")),
            priority: self.priority,
        })
    }
}

/// Parses a document into items, in document order.
///
/// Labels must be unique. Dependencies are not resolved here.
pub fn parse(doc: &str) -> Result<Vec<WorkItem>> {
    let mut items: Vec<WorkItem> = Vec::new();
    let mut labels: BTreeSet<String> = BTreeSet::new();
    let mut draft: Option<Draft<'_>> = None;

    let mut push = |draft: Draft<'_>, items: &mut Vec<WorkItem>| -> Result<()> {
        let line = draft.line;
        let item = draft.finish()?;
        if !labels.insert(item.label.clone()) {
            return Err(BlueprintError::parse(line, format!("duplicate label `{}`", item.label)));
        }
        items.push(item);
        Ok(())
    };

    for (idx, raw) in doc.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim_end();

        if let Some((kind, label)) = record_heading(text) {
            if let Some(done) = draft.take() {
                push(done, &mut items)?;
            }
            draft = Some(Draft::new(line, kind, label));
            continue;
        }

        let Some(current) = draft.as_mut() else {
            if text.is_empty() {
                continue;
            }
            return Err(BlueprintError::parse(
                line,
                format!("expected `# <kind> <label>`, got `{text}`"),
            ));
        };

        let section = match text {
            "## meta" => Some(Section::Meta),
            "## statement" => Some(Section::Statement),
            "## proof" => Some(Section::Proof),
            _ => None,
        };
        if let Some(section) = section {
            current.enter(section, line)?;
            continue;
        }

        match current.section {
            Some(Section::Statement) => current.statement.push(unescape(text)),
            Some(Section::Proof) => current.proof.push(unescape(text)),
            Some(Section::Meta) if text.is_empty() => {}
            Some(Section::Meta) => current.meta(line, text)?,
            None if text.is_empty() => {}
            None => {
                return Err(BlueprintError::parse(
                    line,
                    format!("expected `## meta` under `{}`", current.label),
                ));
            }
        }
    }

    if let Some(done) = draft {
        push(done, &mut items)?;
    }
    Ok(items)
}

fn record_heading(text: &str) -> Option<(Kind, &str)> {
    let rest = text.strip_prefix("# ")?;
    let mut parts = rest.split_whitespace();
    let kind = parts.next()?.parse().ok()?;
    let label = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, label))
}

fn parse_uses(line: usize, value: &str) -> Result<BTreeSet<String>> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| BlueprintError::parse(line, format!("`uses` must be a list, got `{value}`")))?;

    let mut deps = BTreeSet::new();
    for piece in inner.split(']') {
        let piece = piece.trim().trim_start_matches(',').trim();
        if piece.is_empty() {
            continue;
        }
        let label = piece
            .strip_prefix('[')
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.contains(char::is_whitespace))
            .ok_or_else(|| BlueprintError::parse(line, format!("bad `uses` entry `{piece}`")))?;
        deps.insert(label.to_string());
    }
    Ok(deps)
}

fn parse_attempts(line: usize, value: &str) -> Result<Attempts> {
    let bad = || BlueprintError::parse(line, format!("`attempts` must be `<current> / <budget>`, got `{value}`"));
    let (current, budget) = value.split_once('/').ok_or_else(bad)?;
    let current: u32 = current.trim().parse().map_err(|_| bad())?;
    let budget: u32 = budget.trim().parse().map_err(|_| bad())?;
    if current > budget {
        return Err(BlueprintError::parse(
            line,
            format!("attempts {current} exceed budget {budget}"),
        ));
    }
    Ok(Attempts { current, budget })
}
