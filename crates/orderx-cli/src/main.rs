mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{sync, token, webhook};

#[derive(Parser)]
#[command(name = "orderx")]
#[command(about = "OrderX CLI - Drive menu sync and webhooks on the OrderX integration service")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "API server URL")]
    server: Option<String>,

    #[arg(long, global = true, help = "Admin bearer token")]
    admin_token: Option<String>,

    #[arg(long, global = true, help = "Output format", default_value = "table")]
    format: output::Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Push menus and availability to delivery platforms
    Sync {
        #[command(subcommand)]
        command: sync::Commands,
    },
    /// Inspect and refresh platform OAuth tokens
    Token {
        #[command(subcommand)]
        command: token::Commands,
    },
    /// Sign and deliver webhook payloads
    #[command(alias = "wh")]
    Webhook {
        #[command(subcommand)]
        command: webhook::Commands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration values
    Set {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        admin_token: Option<String>,
    },
    /// Show current configuration
    Show,
    /// Get config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::Config::load()?;

    if let Some(server) = &cli.server {
        cfg.server = server.clone();
    }
    if let Some(token) = &cli.admin_token {
        cfg.admin_token = Some(token.clone());
    }

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Set {
                server,
                admin_token,
            } => {
                if let Some(s) = server {
                    cfg.server = s;
                }
                if let Some(t) = admin_token {
                    cfg.admin_token = Some(t);
                }
                cfg.save()?;
                output::print_success("Configuration saved");
            }
            ConfigCommands::Show => {
                println!("Server:      {}", cfg.server);
                println!(
                    "Admin token: {}",
                    cfg.admin_token
                        .as_ref()
                        .map(|t| format!("{}...", t.chars().take(6).collect::<String>()))
                        .unwrap_or_else(|| "(not set)".into())
                );
            }
            ConfigCommands::Path => {
                println!("{}", config::config_path()?.display());
            }
        },
        Commands::Sync { command } => {
            sync::run(command, &cfg, cli.format).await?;
        }
        Commands::Token { command } => {
            token::run(command, &cfg, cli.format).await?;
        }
        Commands::Webhook { command } => {
            webhook::run(command, &cfg, cli.format).await?;
        }
    }

    Ok(())
}
