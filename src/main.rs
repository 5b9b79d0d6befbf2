//! Group Sender CLI - main entry point
//!
//! Manage accounts, log in, and broadcast a message to every group.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use group_sender::commands::send::SendArgs;
use group_sender::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "group_sender")]
#[command(about = "Send one message to all Telegram groups of an account", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved accounts
    Accounts {
        #[command(subcommand)]
        action: AccountsAction,
    },

    /// Log an account in with the code Telegram sends
    Login {
        /// Phone number of a saved account
        phone: String,
    },

    /// List the groups of an account
    Groups {
        /// Phone number of a saved account
        phone: String,
    },

    /// Send a message to every group of an account
    Send {
        /// Phone number of a saved account
        phone: String,

        /// Message text
        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// Read the message text from a file
        #[arg(short = 'f', long)]
        message_file: Option<PathBuf>,

        /// Seconds to wait after each successful send
        #[arg(short, long)]
        delay: Option<String>,
    },

    /// Log out and remove the session file
    Logout {
        /// Phone number of a saved account
        phone: String,
    },
}

#[derive(Subcommand)]
enum AccountsAction {
    /// Show saved accounts
    List,

    /// Save a new account
    Add {
        /// Phone number (e.g., +15551234567)
        #[arg(long)]
        phone: String,

        /// API ID from my.telegram.org
        #[arg(long)]
        api_id: String,

        /// API hash from my.telegram.org
        #[arg(long)]
        api_hash: String,
    },

    /// Delete an account and its session
    Delete {
        /// Phone number of the account
        phone: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Accounts { action } => match action {
                AccountsAction::List => "accounts_list",
                AccountsAction::Add { .. } => "accounts_add",
                AccountsAction::Delete { .. } => "accounts_delete",
            },
            Commands::Login { .. } => "login",
            Commands::Groups { .. } => "groups",
            Commands::Send { .. } => "send",
            Commands::Logout { .. } => "logout",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("group_sender=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Accounts { action } => match action {
            AccountsAction::List => commands::accounts::list()?,
            AccountsAction::Add {
                phone,
                api_id,
                api_hash,
            } => commands::accounts::add(&phone, &api_id, &api_hash)?,
            AccountsAction::Delete { phone } => commands::accounts::delete(&phone)?,
        },
        Commands::Login { phone } => {
            commands::login::run(&phone).await?;
        }
        Commands::Groups { phone } => {
            commands::groups::run(&phone).await?;
        }
        Commands::Send {
            phone,
            message,
            message_file,
            delay,
        } => {
            commands::send::run(SendArgs {
                phone,
                message,
                message_file,
                delay,
            })
            .await?;
        }
        Commands::Logout { phone } => {
            commands::logout::run(&phone).await?;
        }
    }

    Ok(())
}
