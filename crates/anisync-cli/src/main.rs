use clap::{ArgAction, Parser, Subcommand};
use commands::{bulk, clear, config, import, logs, smart_sync, status};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "anisync")]
#[command(about = "anisync - Keep a local anime library in step with your exported watch-list")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write logs to the rotating log file in the log directory
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare an export file with the library without changing anything
    #[command(long_about = "Reconcile an exported watch-list against the local library and list the changes an import would make: new titles and status changes. Records without a permalink are matched by title; records that cannot be matched are listed as unresolved.")]
    Scan {
        /// Export file (JSON object of category -> entries)
        file: PathBuf,
    },
    /// Scan an export file and apply the resulting changes
    #[command(long_about = "Scan an export file, show the changes, and apply them after confirmation. New titles are fetched from the catalog before they are stored. Each applied or failed change is recorded in the audit log.")]
    Import {
        file: PathBuf,

        /// Apply without asking for confirmation
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Update watch statuses from an export file for titles already in the catalog
    #[command(long_about = "Status-only sync: every entry under a known category gets that category's status. Titles that are not in the local catalog are reported and left alone; run 'anisync scrape' or 'anisync import' to add them.")]
    SmartSync {
        file: PathBuf,
    },
    /// Download the full catalog page by page
    #[command(long_about = "Page through the entire external catalog and overwrite local catalog rows. Raw pages are archived in the cache directory so an interrupted run can continue with --resume. With --export, watch statuses from that file are written for matching titles in the same pass.")]
    Scrape {
        /// Export file whose statuses are applied while scraping
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Continue after the highest page already archived
        #[arg(long, action = ArgAction::SetTrue)]
        resume: bool,

        /// Stop after this many pages
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,
    },
    /// Rebuild the watch-list from an export file
    #[command(long_about = "First-time ingestion: clears the watch-list, then fetches every title linked in the export file from the catalog in batches and stores it with its status.")]
    Ingest {
        file: PathBuf,

        /// Skip the confirmation before the watch-list is cleared
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Set or clear the watch status of a single title
    Status {
        #[command(subcommand)]
        cmd: StatusCommands,
    },
    /// Show the audit log
    Logs {
        /// Number of entries to show, newest first
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: u32,
    },
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
    /// Clear cached pages or the database
    #[command(long_about = "Clear the raw page cache (--cache), delete the local database (--database), or both (--all).")]
    Clear {
        /// Clear cache and database
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,

        /// Clear the raw catalog page cache
        #[arg(long, action = ArgAction::SetTrue)]
        cache: bool,

        /// Delete the local database (catalog, watch-list and audit log)
        #[arg(long, action = ArgAction::SetTrue)]
        database: bool,
    },
}

#[derive(Subcommand)]
enum StatusCommands {
    /// Set the status of a title in the catalog
    Set {
        /// Catalog ID
        id: i64,

        /// TO_WATCH, PLANNING, ON_HOLD, COMPLETED, DROPPED or UNKNOWN (case and '-' are ignored)
        #[arg(value_parser = status::parse_status)]
        status: anisync_models::WatchStatus,
    },
    /// Remove a title from the library (its catalog entry is kept)
    Remove {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = if cli.log_file {
        Some(anisync_config::PathManager::default().log_file())
    } else {
        None
    };
    logging::init_logging(cli.verbose, cli.quiet, log_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let config_path = cli.config;

    match cli.command {
        Commands::Scan { file } => import::run_scan(config_path, file, &output).await,
        Commands::Import { file, yes } => import::run_import(config_path, file, yes, &output).await,
        Commands::SmartSync { file } => smart_sync::run_smart_sync(config_path, file, &output).await,
        Commands::Scrape {
            export,
            resume,
            max_pages,
        } => bulk::run_scrape(config_path, export, resume, max_pages, &output).await,
        Commands::Ingest { file, yes } => bulk::run_ingest(config_path, file, yes, &output).await,
        Commands::Status { cmd } => match cmd {
            StatusCommands::Set { id, status } => status::run_set(config_path, id, status, &output).await,
            StatusCommands::Remove { id } => status::run_remove(config_path, id, &output).await,
        },
        Commands::Logs { limit } => logs::run_logs(config_path, limit, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show);
            config::run_config(config_path, cmd, &output)
        }
        Commands::Clear { all, cache, database } => clear::run_clear(config_path, all, cache, database, &output).await,
    }
}
