use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "aka",
    about = "Alias reconciliation for merged bibliographic records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with reconciler settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse an alias list and print its canonical form
    Parse(ParseArgs),
    /// Show the alias set of each record in a file
    Extract(RecordsArgs),
    /// Merge a group of records, carrying their aliases to the primary
    Reconcile(ReconcileArgs),
    /// Give each record its full alias set
    AssignKeys(RecordsArgs),
    /// Attach an "Item details" note to each record
    DetailsNote(RecordsArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ParseArgs {
    /// The text after the alias tag
    pub text: String,
    /// Parse as the legacy semicolon-separated form
    #[arg(long)]
    pub legacy: bool,
}

#[derive(Args)]
pub struct RecordsArgs {
    /// JSON file holding an array of records
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// JSON file holding `{"primary": .., "secondaries": [..]}`
    pub file: PathBuf,
    /// Skip the history note
    #[arg(long)]
    pub no_history: bool,
    /// Shown as the actor in history notes
    #[arg(long)]
    pub actor: Option<String>,
}
