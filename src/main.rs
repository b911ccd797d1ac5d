//! ragchat CLI - terminal client for a retrieval-augmented chat backend.

use clap::{Parser, Subcommand};
use ragchat::api::AuthMode;
use ragchat::cli;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Get the version string.
///
/// - Release builds (on a git tag): "0.1.0"
/// - Development builds: "0.1.0-dev (abc1234)"
fn version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const BUILD: &str = env!("RAGCHAT_BUILD");

    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if BUILD.is_empty() {
            VERSION.to_string()
        } else {
            format!("{VERSION}-dev ({BUILD})")
        }
    })
}

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(author, version = version(), about = "Chat with your documents from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token.
    Login {
        /// Account name. Read from stdin when omitted.
        #[arg(short, long)]
        username: Option<String>,

        /// Password. Read from stdin when omitted.
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and log in.
    Register {
        /// Account name. Read from stdin when omitted.
        #[arg(short, long)]
        username: Option<String>,

        /// Password. Read from stdin when omitted.
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session token.
    Logout,

    /// List chats, newest first.
    Chats,

    /// Create a chat.
    New {
        /// Chat title. Defaults to `chat.default_title`.
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Delete a chat.
    Delete {
        /// Chat ID.
        id: i64,
    },

    /// Print the messages of a chat.
    History {
        /// Chat ID.
        id: i64,

        /// Expand the sources of every answer.
        #[arg(short, long)]
        sources: bool,
    },

    /// Ask a question in a chat and print the answer.
    Ask {
        /// Chat ID.
        id: i64,

        /// Question text.
        text: String,

        /// Also search tables.
        #[arg(long)]
        tables: bool,

        /// Search text only, overriding `chat.use_tables`.
        #[arg(long, conflicts_with = "tables")]
        no_tables: bool,
    },

    /// Download a cited source file.
    Source {
        /// File path as shown in the citation.
        filepath: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Interactive chat session.
    Chat,
}

/// Retrieval mode requested by `ask` flags. `None` keeps the configured default.
fn table_choice(tables: bool, no_tables: bool) -> Option<bool> {
    match (tables, no_tables) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RAGCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Login { username, password } => {
            cli::auth::run(AuthMode::Login, username, password).await
        }
        Commands::Register { username, password } => {
            cli::auth::run(AuthMode::Register, username, password).await
        }
        Commands::Logout => cli::auth::logout(),
        Commands::Chats => cli::chats::list().await,
        Commands::New { title } => cli::chats::create(title.as_deref()).await,
        Commands::Delete { id } => cli::chats::delete(id).await,
        Commands::History { id, sources } => cli::conversation::history(id, sources).await,
        Commands::Ask {
            id,
            text,
            tables,
            no_tables,
        } => cli::conversation::ask(id, &text, table_choice(tables, no_tables)).await,
        Commands::Source { filepath, output } => cli::source::run(&filepath, output).await,
        Commands::Chat => cli::repl::run().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ragchat: error: {e}");
            ExitCode::FAILURE
        }
    }
}
