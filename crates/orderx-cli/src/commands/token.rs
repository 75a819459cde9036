use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{self, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// Show the cached token state for a platform
    Status {
        #[arg(help = "Platform: ubereats or foodpanda")]
        platform: String,
    },
    /// Fetch a new token now, replacing the cached one
    Refresh {
        #[arg(help = "Platform: ubereats or foodpanda")]
        platform: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Tabled)]
pub struct TokenStatus {
    pub platform: String,
    pub configured: bool,
    pub cached: bool,
    #[tabled(display_with = "display_option")]
    pub valid_until: Option<String>,
    pub refreshing: bool,
}

fn display_option(o: &Option<String>) -> String {
    o.clone().unwrap_or_else(|| "-".into())
}

pub async fn run(cmd: Commands, config: &Config, format: Format) -> Result<()> {
    let client = ApiClient::new(config);

    match cmd {
        Commands::Status { platform } => {
            let status: TokenStatus = client
                .get(&format!("/v1/platforms/{}/token", platform))
                .await?;
            output::print_item(status, format);
        }
        Commands::Refresh { platform } => {
            let status: TokenStatus = client
                .post(&format!("/v1/platforms/{}/token/refresh", platform), &())
                .await?;
            if let Format::Table = format {
                output::print_success("Token refreshed");
            }
            output::print_item(status, format);
        }
    }

    Ok(())
}
