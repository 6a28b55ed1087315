use std::path::Path;
use std::sync::Arc;

use aka_host::InMemoryHost;
use aka_merge::{AliasService, AssignOutcome, MergeReconciler, ReconcilerConfig};
use aka_types::{AliasSet, Dialect, Record};
use anyhow::Context;
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::cli::*;

/// Input of `aka reconcile`.
#[derive(Deserialize)]
struct MergeGroup {
    primary: Record,
    #[serde(default)]
    secondaries: Vec<Record>,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Parse(args) => cmd_parse(args, &cli.format),
        Command::Extract(args) => cmd_extract(args, &config, &cli.format),
        Command::Reconcile(args) => cmd_reconcile(args, config, &cli.format).await,
        Command::AssignKeys(args) => cmd_assign_keys(args, config, &cli.format).await,
        Command::DetailsNote(args) => cmd_details_note(args, config, &cli.format).await,
        Command::Config => cmd_config(&config, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReconcilerConfig> {
    match path {
        Some(path) => ReconcilerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ReconcilerConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn seeded_host(config: &ReconcilerConfig, records: &[Record]) -> anyhow::Result<Arc<InMemoryHost>> {
    let host = InMemoryHost::with_locator_base(config.locator_base.clone());
    for record in records {
        host.insert(record.clone())?;
    }
    Ok(Arc::new(host))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_parse(args: ParseArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let dialect = if args.legacy { Dialect::Legacy } else { Dialect::Current };
    let aliases = AliasSet::parse(&args.text, dialect);
    match format {
        OutputFormat::Json => print_json(&json!({
            "aliases": aliases.iter().collect::<Vec<_>>(),
            "serialized": aliases.serialize(),
            "changed": aliases.changed(),
        })),
        OutputFormat::Text => {
            let marker = if aliases.changed() { "normalized".yellow() } else { "canonical".green() };
            println!("{} ({})", aliases.serialize().bold(), marker);
            Ok(())
        }
    }
}

fn cmd_extract(args: RecordsArgs, config: &ReconcilerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let records: Vec<Record> = read_json(&args.file)?;
    let extractor = config.extractor();

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        let aliases = extractor.extract(record);
        let derived = record.metadata_text.is_some() && extractor.find_line(record.metadata()).is_none();
        rows.push((record, aliases, derived));
    }

    match format {
        OutputFormat::Json => print_json(&json!(rows
            .iter()
            .map(|(record, aliases, derived)| json!({
                "key": record.key,
                "aliases": aliases.iter().collect::<Vec<_>>(),
                "derived": derived,
            }))
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            for (record, aliases, derived) in &rows {
                let source = if *derived { " (derived)".dimmed().to_string() } else { String::new() };
                println!("{}  {}{}", record.key.as_str().yellow(), aliases, source);
            }
            Ok(())
        }
    }
}

async fn cmd_reconcile(
    args: ReconcileArgs,
    mut config: ReconcilerConfig,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let group: MergeGroup = read_json(&args.file)?;
    if args.no_history {
        config.history_notes = false;
    }
    if args.actor.is_some() {
        config.actor_label = args.actor;
    }

    let mut all = vec![group.primary.clone()];
    all.extend(group.secondaries.iter().cloned());
    let host = seeded_host(&config, &all)?;
    let reconciler = MergeReconciler::new(config, Arc::clone(&host));

    let mut primary = group.primary;
    let (merged, report) = reconciler
        .reconcile_with_report(&mut primary, &group.secondaries, host.as_ref())
        .await;
    let survivor = merged.context("host merge failed")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "primary": primary,
            "aliases": report.aliases,
            "alias_written": report.alias_written,
            "note_created": report.note_created,
            "issues": report.issues.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            "notes": host.notes()?,
        })),
        OutputFormat::Text => {
            println!(
                "{} Merged {} record(s) into {}",
                "✓".green().bold(),
                group.secondaries.len(),
                survivor.as_str().yellow().bold()
            );
            let state = if report.alias_written { "written".green() } else { "unchanged".dimmed() };
            println!("  Aliases: {} ({})", report.aliases, state);
            let note = if report.note_created { "created".green() } else { "none".dimmed() };
            println!("  History note: {}", note);
            for issue in &report.issues {
                println!("  {} {}", "!".red().bold(), issue);
            }
            Ok(())
        }
    }
}

fn outcome_label(outcome: &AssignOutcome) -> (&'static str, Option<String>) {
    match outcome {
        AssignOutcome::Unchanged => ("unchanged", None),
        AssignOutcome::Written => ("written", None),
        AssignOutcome::Skipped => ("skipped", None),
        AssignOutcome::Failed(e) => ("failed", Some(e.to_string())),
    }
}

async fn cmd_assign_keys(args: RecordsArgs, config: ReconcilerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let mut records: Vec<Record> = read_json(&args.file)?;
    let host = seeded_host(&config, &records)?;
    let service = AliasService::new(config, host);
    service.start();
    let results = service.assign_keys(&mut records).await?;
    service.shutdown();

    match format {
        OutputFormat::Json => print_json(&json!({
            "records": records,
            "assignments": results
                .iter()
                .map(|r| {
                    let (outcome, error) = outcome_label(&r.outcome);
                    json!({ "key": r.record, "aliases": r.aliases, "outcome": outcome, "error": error })
                })
                .collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            for result in &results {
                let (outcome, error) = outcome_label(&result.outcome);
                let outcome = match &result.outcome {
                    AssignOutcome::Written => outcome.green(),
                    AssignOutcome::Failed(_) => outcome.red(),
                    _ => outcome.dimmed(),
                };
                println!("{}  {}  {}", result.record.as_str().yellow(), outcome, result.aliases);
                if let Some(error) = error {
                    println!("  {} {}", "!".red().bold(), error);
                }
            }
            Ok(())
        }
    }
}

async fn cmd_details_note(args: RecordsArgs, config: ReconcilerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let records: Vec<Record> = read_json(&args.file)?;
    let host = seeded_host(&config, &records)?;
    let service = AliasService::new(config, Arc::clone(&host));
    service.start();
    let results = service.save_details_note(&records).await?;
    service.shutdown();

    match format {
        OutputFormat::Json => print_json(&json!({
            "notes": host.notes()?,
            "errors": results
                .iter()
                .filter_map(|r| r.note.as_ref().err().map(|e| json!({ "key": r.record, "error": e.to_string() })))
                .collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            for result in &results {
                match &result.note {
                    Ok(note) => println!("{}  note {}", result.record.as_str().yellow(), note.as_str().green()),
                    Err(e) => println!("{}  {} {}", result.record.as_str().yellow(), "!".red().bold(), e),
                }
            }
            Ok(())
        }
    }
}

fn cmd_config(config: &ReconcilerConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(config)?),
        OutputFormat::Text => {
            println!("{} = {}", "tags.legacy".bold(), config.tags.legacy);
            println!("{} = {}", "tags.current".bold(), config.tags.current);
            println!("{} = {}", "locator_base".bold(), config.locator_base);
            println!("{} = {}", "actor_label".bold(), config.actor_label.as_deref().unwrap_or("(not set)"));
            println!("{} = {}", "history_notes".bold(), config.history_notes);
            println!("{} = {}", "audit_field".bold(), config.audit_field);
            Ok(())
        }
    }
}
