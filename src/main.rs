//! # fieldval CLI
//!
//! The `fieldval` binary manages locally captured property-assessment
//! records and their synchronization to a remote document store.
//!
//! ## Usage
//!
//! ```bash
//! fieldval --config ./config/fieldval.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fieldval init` | Create the SQLite database and run schema migrations |
//! | `fieldval import <path>` | Import captured records from JSON files |
//! | `fieldval list` | List records with their sync status |
//! | `fieldval show <id>` | Print one record (and mark it last viewed) |
//! | `fieldval delete <id>` | Delete a record |
//! | `fieldval sync` | Push all pending records to the remote store |
//! | `fieldval convert <id>` | Upload one record's images, all-or-nothing |
//! | `fieldval remote show <id>` | Fetch one synced document from the remote store |
//! | `fieldval remote list` | List synced documents |
//! | `fieldval settings debug` | Show or toggle the debug panel flag |
//! | `fieldval drawing normalize` | Rewrite a drawing payload in canonical form |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fieldval::progress::ProgressMode;
use fieldval::{config, migrate, records, sync};

/// fieldval — a local-first field-assessment capture and sync tool.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fieldval.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fieldval",
    about = "fieldval — local-first capture and sync for property assessments",
    version,
    long_about = "fieldval stores multi-section property-assessment records in a local SQLite \
    database and syncs pending records to a remote document store, uploading embedded images \
    and normalizing their references to durable URLs."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fieldval.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Import records from captured JSON.
    ///
    /// Accepts a single `.json` file holding one record's form data, or a
    /// directory that is walked for `*.json` files. Every imported record
    /// starts pending.
    Import {
        /// File or directory to import from.
        path: PathBuf,
    },

    /// List all records with their sync status.
    List,

    /// Print one record in full.
    ///
    /// Also updates the persisted "last viewed" pointer.
    Show {
        /// Record local id.
        id: String,
    },

    /// Delete a record.
    ///
    /// Clears the "last viewed" pointer when it referenced this record.
    Delete {
        /// Record local id.
        id: String,
    },

    /// Push all pending records to the remote document store.
    ///
    /// Records are synced sequentially and independently: one record's
    /// failure is reported but does not stop the batch, and a failed
    /// record stays pending for the next run.
    Sync {
        /// Identity to stamp onto synced documents (overrides sync.user_id).
        #[arg(long)]
        user: Option<String>,

        /// Show pending counts without uploading or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of records to sync.
        #[arg(long)]
        limit: Option<usize>,

        /// Progress output: off, human, or json. Defaults to human on a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Upload one record's local images and replace them with URLs.
    ///
    /// All-or-nothing: a single failed upload leaves the record unchanged.
    Convert {
        /// Record local id.
        id: String,
    },

    /// Inspect synced documents in the remote store.
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Floor-plan drawing payloads.
    Drawing {
        #[command(subcommand)]
        action: DrawingAction,
    },
}

/// Remote store subcommands.
#[derive(Subcommand)]
enum RemoteAction {
    /// Fetch one document and print its reassembled form data.
    Show {
        /// Document remote id.
        id: String,
    },
    /// List synced documents.
    List {
        /// Filter to one user's documents (defaults to sync.user_id).
        #[arg(long)]
        user: Option<String>,
    },
}

/// Settings subcommands.
#[derive(Subcommand)]
enum SettingsAction {
    /// Show or toggle the debug panel visibility flag.
    Debug {
        /// `on`, `off`, or `show`.
        #[arg(default_value = "show")]
        action: String,
    },
}

/// Drawing subcommands.
#[derive(Subcommand)]
enum DrawingAction {
    /// Rewrite a drawing payload in the canonical `{drawings: [...]}` form.
    ///
    /// Accepts the canonical object, a legacy bare array, or a legacy
    /// object with a `paths` property.
    Normalize {
        /// Input payload file.
        input: PathBuf,
        /// Output file for the canonical payload.
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Drawing normalization is pure file transformation; no config needed.
    if let Commands::Drawing {
        action: DrawingAction::Normalize { input, output },
    } = &cli.command
    {
        records::run_drawing_normalize(input, output)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path } => {
            records::run_import(&cfg, &path).await?;
        }
        Commands::List => {
            records::run_list(&cfg).await?;
        }
        Commands::Show { id } => {
            records::run_show(&cfg, &id).await?;
        }
        Commands::Delete { id } => {
            records::run_delete(&cfg, &id).await?;
        }
        Commands::Sync {
            user,
            dry_run,
            limit,
            progress,
        } => {
            let mode = match progress.as_deref() {
                Some(value) => ProgressMode::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("Unknown progress mode: '{}'", value))?,
                None => ProgressMode::default_for_tty(),
            };
            sync::run_sync(&cfg, user, dry_run, limit, mode).await?;
        }
        Commands::Convert { id } => {
            sync::run_convert(&cfg, &id).await?;
        }
        Commands::Remote { action } => match action {
            RemoteAction::Show { id } => {
                sync::run_remote_show(&cfg, &id).await?;
            }
            RemoteAction::List { user } => {
                sync::run_remote_list(&cfg, user).await?;
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Debug { action } => {
                records::run_settings_debug(&cfg, &action).await?;
            }
        },
        Commands::Drawing { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
