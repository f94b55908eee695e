use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use blueprint::cli::{Cli, Command};
use blueprint::config::BlueprintConfig;
use blueprint::ui::Printer;
use blueprint::{BlueprintStore, SubItemSpec, WorkItem};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "blueprint=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = BlueprintConfig::load().context("failed to load blueprint.toml")?;
    if let Some(file) = &cli.file {
        config.blueprint_path = file.clone();
    }
    config.git_commit |= cli.commit;

    let store = BlueprintStore::from_config(&config)
        .with_context(|| format!("failed to open {}", config.blueprint_path.display()))?;
    let printer = Printer::new();
    let json = cli.json;

    match cli.command {
        Command::Init => {
            if store.init()? {
                printer.success(&format!("created {}", store.path().display()));
            } else {
                printer.notice(&format!("{} already exists", store.path().display()));
            }
        }

        Command::Add {
            label,
            kind,
            uses,
            statement,
            proof,
            location,
            budget,
            priority,
        } => {
            let mut item = WorkItem::new(label, kind.into(), budget.unwrap_or(config.default_budget))
                .with_dependencies(uses.into_iter().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()))
                .with_statement(&statement)
                .with_proof(&proof)
                .with_priority(priority);
            item.location = location;
            let label = item.label.clone();
            store.upsert(item)?;
            output(json, &store.get(&label)?, |item| printer.print_item(item))?;
        }

        Command::Show { label } => {
            let item = store.get(&label)?;
            output(json, &item, |item| {
                printer.print_item(item);
                let blocked = store.snapshot().downstream(&item.label);
                if !blocked.is_empty() {
                    let blocked: Vec<&str> = blocked.iter().map(String::as_str).collect();
                    println!("\nNeeded by: {}", blocked.join(", "));
                }
            })?;
        }

        Command::List => {
            let items = store.list();
            output(json, &items, |items| printer.print_items(items))?;
        }

        Command::Next { claim: true } => match store.claim_next()? {
            Some(step) => output(json, &step, |step| printer.print_advance(step))?,
            None => output(json, &Option::<()>::None, |_| printer.notice("no eligible items"))?,
        },

        Command::Next { claim: false } => {
            let items = store.eligible();
            output(json, &items, |items| {
                if items.is_empty() {
                    printer.notice("no eligible items");
                } else {
                    printer.print_items(items);
                }
            })?;
        }

        Command::Order => {
            let order = store.topological_order()?;
            let labels: Vec<&str> = order.iter().map(|i| i.label.as_str()).collect();
            output(json, &labels, |_| printer.print_items(&order))?;
        }

        Command::Advance {
            label,
            status,
            attempts,
        } => {
            let step = store.advance(&label, status.into(), attempts)?;
            output(json, &step, |step| printer.print_advance(step))?;
        }

        Command::Revert { label } => {
            let step = store.revert(&label)?;
            output(json, &step, |step| printer.print_advance(step))?;
        }

        Command::Split {
            label,
            step,
            proof,
            steps,
            budget,
        } => {
            if proof.len() > step.len() {
                bail!("{} --proof values given for {} --step values", proof.len(), step.len());
            }
            let specs = match steps {
                Some(path) => read_steps(&path)?,
                None => step
                    .iter()
                    .enumerate()
                    .map(|(i, statement)| {
                        SubItemSpec::new(statement, proof.get(i).map(String::as_str).unwrap_or(""))
                    })
                    .collect(),
            };
            let created = store.split(&label, &specs, budget.unwrap_or(config.split_budget))?;
            output(json, &created, |created| {
                printer.success(&format!("split {label} into {}", created.join(", ")));
            })?;
        }

        Command::Validate => {
            let snapshot = store.snapshot();
            let summary = snapshot.summary();
            output(json, &summary, |summary| {
                printer.success(&format!(
                    "{} is valid ({} items)",
                    store.path().display(),
                    summary.total
                ));
            })?;
        }

        Command::Status => {
            let summary = store.snapshot().summary();
            output(json, &summary, |summary| printer.print_summary(summary))?;
        }

        Command::History => {
            let Some(log) = store.audit_log() else {
                bail!("no audit_log configured in blueprint.toml");
            };
            let records = log.read_all()?;
            output(json, &records, |records| printer.print_history(records))?;
        }
    }

    Ok(())
}

fn read_steps(path: &Path) -> Result<Vec<SubItemSpec>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid steps file {}", path.display()))
}

// Prints `value` as pretty JSON, or hands it to `human` for terminal output.
fn output<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}
