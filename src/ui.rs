//! Interface de terminal do blueprint — saída colorida.
//!
//! Usa a crate `console` para estilização com cores. O [`Printer`]
//! formata itens, transições e resumos para o terminal.

use console::Style;

use crate::audit::AuditRecord;
use crate::blueprint::{Advance, Status, Summary, WorkItem};

/// Formatação colorida da saída da CLI.
///
/// Verde para `done`, amarelo para `partial`, vermelho para `hard`
/// e esmaecido para `todo`.
pub struct Printer {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
    bold: Style,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }

    fn status_style(&self, status: Status) -> &Style {
        match status {
            Status::Done => &self.green,
            Status::Partial => &self.yellow,
            Status::Hard => &self.red,
            Status::Todo => &self.dim,
        }
    }

    /// Uma linha por item: status, rótulo, tipo, tentativas e dependências.
    pub fn item_line(&self, item: &WorkItem) -> String {
        let status = format!("{:<7}", item.status.to_string());
        let mut line = format!(
            "{} {} {} [{}]",
            self.status_style(item.status).apply_to(status),
            self.bold.apply_to(&item.label),
            self.dim.apply_to(item.kind),
            item.attempts,
        );
        if !item.dependencies.is_empty() {
            let deps: Vec<&str> = item.dependencies.iter().map(String::as_str).collect();
            line.push_str(&format!(" <- {}", deps.join(", ")));
        }
        line
    }

    pub fn print_items<'a>(&self, items: impl IntoIterator<Item = &'a WorkItem>) {
        for item in items {
            println!("{}", self.item_line(item));
        }
    }

    /// Exibe um item completo, incluindo enunciado e prova informais.
    pub fn print_item(&self, item: &WorkItem) {
        println!("{}", self.item_line(item));
        println!(
            "  {} {}",
            self.dim.apply_to("file:"),
            item.location.as_deref().unwrap_or("(to be created)")
        );
        if item.priority != 0 {
            println!("  {} {}", self.dim.apply_to("priority:"), item.priority);
        }
        if !item.informal_statement.is_empty() {
            println!("\n{}\n{}", self.bold.apply_to("Statement"), item.informal_statement);
        }
        if !item.informal_proof.is_empty() {
            println!("\n{}\n{}", self.bold.apply_to("Proof"), item.informal_proof);
        }
    }

    /// Exibe o resultado de uma transição; destaca quando o orçamento
    /// de tentativas forçou `hard`.
    pub fn print_advance(&self, step: &Advance) {
        let to = self.status_style(step.applied).apply_to(step.applied);
        println!(
            "  {} {}: {} -> {} [{}]",
            self.green.apply_to("✓"),
            step.label,
            step.from,
            to,
            step.attempts
        );
        if step.forced() {
            println!(
                "  {} attempt budget exhausted; requested {} but marked hard",
                self.red.apply_to("✗"),
                step.requested
            );
        }
    }

    pub fn print_summary(&self, summary: &Summary) {
        println!(
            "{} items: {} done, {} partial, {} todo, {} hard ({} eligible)",
            self.bold.apply_to(summary.total),
            self.green.apply_to(summary.done),
            self.yellow.apply_to(summary.partial),
            self.dim.apply_to(summary.todo),
            self.red.apply_to(summary.hard),
            summary.eligible,
        );
    }

    pub fn print_history(&self, records: &[AuditRecord]) {
        for record in records {
            println!(
                "{} {}",
                self.dim.apply_to(record.at.format("%Y-%m-%d %H:%M:%S")),
                record.summary()
            );
        }
    }

    pub fn success(&self, message: &str) {
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    pub fn notice(&self, message: &str) {
        println!("  {} {message}", self.yellow.apply_to("↻"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::Kind;

    #[test]
    fn item_line_lists_dependencies() {
        console::set_colors_enabled(false);
        let item = WorkItem::new("thm", Kind::Theorem, 5).with_dependencies(["a", "b"]);
        assert_eq!(Printer::new().item_line(&item), "todo    thm theorem [0 / 5] <- a, b");
    }

    #[test]
    fn item_line_without_dependencies() {
        console::set_colors_enabled(false);
        let item = WorkItem::new("def", Kind::Definition, 1);
        assert_eq!(Printer::new().item_line(&item), "todo    def definition [0 / 1]");
    }
}
