//! # Taskmaster
//!
//! A terminal task list with a fast CLI and an interactive TUI, backed by a
//! simulated task API (artificial latency plus random failures) over a JSON
//! file.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive mode
//! taskmaster
//!
//! # Adding and listing
//! taskmaster add "Buy milk"
//! taskmaster list --filter active --sort ascending --search milk
//!
//! # Managing (ids accept a unique prefix)
//! taskmaster toggle 3f2a
//! taskmaster edit 3f2a "Buy oat milk"
//! taskmaster remove 3f2a
//! taskmaster move 0 3
//! taskmaster clear-completed
//! ```
//!
//! ## Configuration
//!
//! *   `TASKMASTER_DIR`: storage directory (default: local data dir + `taskmaster`).
//! *   `TASKMASTER_DELAY_MS`: simulated latency, default 500.
//! *   `TASKMASTER_FAILURE_RATE`: probability of an injected failure, default 0.1.
//! *   `TASKMASTER_SEED`: seed for the failure roll.
//! *   `TASKMASTER_LOG`: log filter, default `warn`.
//!
//! The global flags `--dir`, `--delay-ms`, `--failure-rate` and `--seed`
//! override the environment.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use taskmaster::commands::*;
use taskmaster::config::Config;
use taskmaster::models::{Filter, SortOrder};
use taskmaster::notify::{ConsoleNotifier, NotificationLog};
use taskmaster::open_store;
use taskmaster::tui::run_tui;

#[derive(Parser)]
#[command(name = "taskmaster")]
#[command(about = "Simple terminal task list", long_about = None)]
struct Cli {
    /// Storage directory
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Simulated latency per operation, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
    /// Probability (0.0-1.0) that an operation fails
    #[arg(long, global = true)]
    failure_rate: Option<f64>,
    /// Seed for injected failures
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
    },
    /// List tasks
    List {
        #[arg(short, long, value_enum, default_value_t = Filter::All)]
        filter: Filter,
        #[arg(short = 'o', long, value_enum, default_value_t = SortOrder::Descending)]
        sort: SortOrder,
        /// Case-insensitive title search
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Toggle a task between active and completed
    Toggle {
        id: String,
    },
    /// Rename a task
    Edit {
        id: String,
        /// New title
        title: String,
    },
    /// Remove a task
    Remove {
        id: String,
    },
    /// Move a task within the displayed list
    Move {
        /// Current position (as shown by `list`)
        from: usize,
        /// New position
        to: usize,
        #[arg(short, long, value_enum, default_value_t = Filter::All)]
        filter: Filter,
        #[arg(short = 'o', long, value_enum, default_value_t = SortOrder::Descending)]
        sort: SortOrder,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Remove all completed tasks
    ClearCompleted,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive TUI
    Ui,
}

fn init_logging(config: &Config, to_file: bool) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    if to_file {
        let _ = std::fs::create_dir_all(&config.dir);
        match OpenOptions::new().create(true).append(true).open(config.log_path()) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .try_init();
            }
            Err(e) => eprintln!("Failed to open log file: {}", e),
        }
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let shell_enum = match shell.as_str() {
            "bash" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            "powershell" => Shell::PowerShell,
            "elvish" => Shell::Elvish,
            _ => {
                eprintln!("Unsupported shell: {}", shell);
                return;
            }
        };
        let mut cmd = Cli::command();
        generate(shell_enum, &mut cmd, "taskmaster", &mut io::stdout());
        return;
    }

    let config = match Config::from_env().and_then(|c| c.with_overrides(cli.dir, cli.delay_ms, cli.failure_rate, cli.seed)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    let interactive = matches!(cli.command, Some(Commands::Ui) | None);
    init_logging(&config, interactive);

    if interactive {
        let toasts = Arc::new(NotificationLog::new());
        let (store, storage) = match open_store(&config, toasts.clone()) {
            Ok(opened) => opened,
            Err(e) => {
                eprintln!("Failed to open storage: {}", e);
                return;
            }
        };
        if let Err(e) = run_tui(store, storage, toasts) {
            eprintln!("Error running TUI: {}", e);
        }
        return;
    }

    let (store, _storage) = match open_store(&config, Arc::new(ConsoleNotifier { silent: false })) {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("Failed to open storage: {}", e);
            return;
        }
    };

    match cli.command {
        Some(Commands::Add { title }) => cmd_add(&store, title).await,
        Some(Commands::List { filter, sort, search }) => cmd_list(&store, filter, sort, search).await,
        Some(Commands::Toggle { id }) => cmd_toggle(&store, id).await,
        Some(Commands::Edit { id, title }) => cmd_edit(&store, id, title).await,
        Some(Commands::Remove { id }) => cmd_remove(&store, id).await,
        Some(Commands::Move { from, to, filter, sort, search }) => cmd_move(&store, from, to, filter, sort, search).await,
        Some(Commands::ClearCompleted) => cmd_clear_completed(&store).await,
        Some(Commands::Completions { .. }) | Some(Commands::Ui) | None => {}
    }
}
