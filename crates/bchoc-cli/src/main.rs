//! bchoc - chain-of-custody ledger
//!
//! Records evidence custody actions in a hash-chained ledger file and
//! verifies its integrity.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bchoc_core::config::LedgerConfig;
use bchoc_core::{ChainStore, Custody, EvidenceId, RemovalReason};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// bchoc - chain-of-custody ledger
#[derive(Parser, Debug)]
#[command(name = "bchoc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Ledger file (overrides `BCHOC_FILE_PATH` and the config file)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, default_value = "bchoc.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the ledger with its initial block
    Init,

    /// Add new evidence items to a case
    Add {
        /// Case the items belong to
        #[arg(short, long = "case-id")]
        case_id: String,

        /// Item to add (repeatable)
        #[arg(short = 'i', long = "item-id", required = true)]
        item_ids: Vec<EvidenceId>,

        /// Person adding the items
        #[arg(short = 'g', long)]
        handler: String,

        /// Organization the items belong to
        #[arg(short, long)]
        organization: String,
    },

    /// Check out a checked-in item
    Checkout {
        /// Item to check out
        #[arg(short = 'i', long = "item-id")]
        item_id: EvidenceId,

        /// Person taking the item
        #[arg(short = 'g', long)]
        handler: String,

        /// Organization of the handler
        #[arg(short, long)]
        organization: String,
    },

    /// Check a checked-out item back in
    Checkin {
        /// Item to check in
        #[arg(short = 'i', long = "item-id")]
        item_id: EvidenceId,

        /// Person returning the item
        #[arg(short = 'g', long)]
        handler: String,

        /// Organization of the handler
        #[arg(short, long)]
        organization: String,
    },

    /// Remove a checked-in item from custody
    Remove {
        /// Item to remove
        #[arg(short = 'i', long = "item-id")]
        item_id: EvidenceId,

        /// DISPOSED, DESTROYED or RELEASED
        #[arg(short = 'y', long)]
        reason: RemovalReason,

        /// New owner (required for RELEASED)
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Show cases, items or history
    Show {
        #[command(subcommand)]
        what: ShowCommands,
    },

    /// Verify the whole chain
    Verify,
}

#[derive(Subcommand, Debug)]
enum ShowCommands {
    /// List every case
    Cases,

    /// List the items of a case with their current state
    Items {
        /// Case to list
        #[arg(short, long = "case-id")]
        case_id: String,
    },

    /// Show custody actions
    History {
        /// Only actions of this case
        #[arg(short, long = "case-id")]
        case_id: Option<String>,

        /// Only actions of this item
        #[arg(short = 'i', long = "item-id")]
        item_id: Option<EvidenceId>,

        /// Only the most recent N actions (0 shows all)
        #[arg(short = 'n', long = "num-entries")]
        num_entries: Option<usize>,

        /// Newest first
        #[arg(short, long)]
        reverse: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = LedgerConfig::resolve(cli.file, Some(&cli.config), |key| {
        std::env::var(key).ok()
    })
    .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    tracing::debug!(path = %config.path.display(), "using ledger");

    let custody = Custody::new(ChainStore::from_config(&config));

    match cli.command {
        Commands::Init => commands::evidence::init(&custody)?,
        Commands::Add {
            case_id,
            item_ids,
            handler,
            organization,
        } => commands::evidence::add(&custody, &case_id, &item_ids, &handler, &organization)?,
        Commands::Checkout {
            item_id,
            handler,
            organization,
        } => commands::evidence::checkout(&custody, item_id, &handler, &organization)?,
        Commands::Checkin {
            item_id,
            handler,
            organization,
        } => commands::evidence::checkin(&custody, item_id, &handler, &organization)?,
        Commands::Remove {
            item_id,
            reason,
            owner,
        } => commands::evidence::remove(&custody, item_id, reason, owner.as_deref())?,
        Commands::Show { what } => match what {
            ShowCommands::Cases => commands::show::cases(&custody)?,
            ShowCommands::Items { case_id } => commands::show::items(&custody, &case_id)?,
            ShowCommands::History {
                case_id,
                item_id,
                num_entries,
                reverse,
            } => commands::show::history(&custody, case_id, item_id, num_entries, reverse)?,
        },
        Commands::Verify => {
            // An invalid chain is a report, not an error, but still fails
            // the process.
            if !commands::verify::run(&custody)? {
                return Ok(ExitCode::FAILURE);
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}
