use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rentdesk_cli::cli::{execute, settle, CliCommand, CliConfig};
use rentdesk_core::tracing_setup::init_tracing_with_default;
use rentdesk_core::CoreRuntime;
use tracing::warn;

#[derive(Parser)]
#[command(name = "rentdesk")]
#[command(about = "Command-line client for the rental management API")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (apiUrl, dataDir, token, useKeyring)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Directory for persisted stores and the stored token
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an API token
    Login {
        #[arg(long)]
        token: String,
    },

    /// Remove stored tokens
    Logout,

    /// Property commands
    #[command(subcommand)]
    Properties(PropertyCommands),

    /// Notification commands
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Local UI preferences
    #[command(subcommand)]
    Ui(UiCommands),
}

#[derive(Subcommand)]
enum PropertyCommands {
    /// List properties
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Filter by status (active, inactive, maintenance)
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one property
    Show { id: String },
    /// Occupancy and revenue summary
    Stats,
    /// Delete a property
    Delete { id: String },
}

#[derive(Subcommand)]
enum NotificationCommands {
    /// List notifications
    List {
        #[arg(long)]
        page: Option<u32>,
        /// Only show unread notifications
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
    /// Counts by category, priority and type
    Stats,
}

#[derive(Subcommand)]
enum UiCommands {
    /// Set the theme (light, dark, system)
    Theme { theme: String },
    /// Dump the current UI state
    Show,
}

impl From<Commands> for CliCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Login { token } => CliCommand::Login { token },
            Commands::Logout => CliCommand::Logout,
            Commands::Properties(PropertyCommands::List {
                page,
                limit,
                status,
                search,
            }) => CliCommand::ListProperties {
                page,
                limit,
                status,
                search,
            },
            Commands::Properties(PropertyCommands::Show { id }) => CliCommand::ShowProperty { id },
            Commands::Properties(PropertyCommands::Stats) => CliCommand::PropertyStats,
            Commands::Properties(PropertyCommands::Delete { id }) => {
                CliCommand::DeleteProperty { id }
            }
            Commands::Notifications(NotificationCommands::List { page, unread }) => {
                CliCommand::ListNotifications {
                    page,
                    unread_only: unread,
                }
            }
            Commands::Notifications(NotificationCommands::Read { id }) => CliCommand::MarkRead { id },
            Commands::Notifications(NotificationCommands::ReadAll) => CliCommand::MarkAllRead,
            Commands::Notifications(NotificationCommands::Stats) => CliCommand::NotificationStats,
            Commands::Ui(UiCommands::Theme { theme }) => CliCommand::SetTheme { theme },
            Commands::Ui(UiCommands::Show) => CliCommand::ShowUi,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing_with_default("warn");

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let runtime = CoreRuntime::new(config.core_config(cli.data_dir.as_deref()))
        .context("Failed to start runtime")?;
    runtime.init();

    if let Some(token) = &config.token {
        runtime.login(token)?;
    }

    let command = CliCommand::from(cli.command);
    if !command.is_local() && !runtime.is_logged_in() {
        warn!("No token stored; requests are sent unauthenticated");
    }

    let result = execute(&runtime, command).await;
    let output = settle(result, runtime.dispose())?;

    if cli.pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}
