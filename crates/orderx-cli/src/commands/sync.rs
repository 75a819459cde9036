use anyhow::{bail, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::Tabled;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{self, Format};

#[derive(Subcommand)]
pub enum Commands {
    /// Push the store's menu to every enabled platform
    Store {
        #[arg(help = "Brand ID")]
        brand_id: Uuid,
        #[arg(help = "Store ID")]
        store_id: Uuid,
    },
    /// Push every item's availability to every enabled platform
    Availability {
        #[arg(help = "Brand ID")]
        brand_id: Uuid,
        #[arg(help = "Store ID")]
        store_id: Uuid,
    },
    /// Suspend or resume a single item
    Item {
        #[arg(help = "Brand ID")]
        brand_id: Uuid,
        #[arg(help = "Store ID")]
        store_id: Uuid,
        #[arg(help = "Item ID as it appears in the menu")]
        item_id: String,
        #[arg(long, conflicts_with = "resume")]
        suspend: bool,
        #[arg(long)]
        resume: bool,
    },
}

#[derive(Debug, Serialize, Deserialize, Tabled)]
pub struct SyncResult {
    pub platform: String,
    pub external_store_id: String,
    #[tabled(display_with = "display_success")]
    pub success: bool,
    pub retryable: bool,
    #[serde(default)]
    #[tabled(display_with = "display_option")]
    pub error: Option<String>,
    pub synced_at: String,
}

fn display_success(ok: &bool) -> String {
    if *ok { "ok".into() } else { "failed".into() }
}

fn display_option(o: &Option<String>) -> String {
    o.clone().unwrap_or_else(|| "-".into())
}

fn store_path(brand_id: Uuid, store_id: Uuid) -> String {
    format!("/v1/brands/{}/stores/{}", brand_id, store_id)
}

pub async fn run(cmd: Commands, config: &Config, format: Format) -> Result<()> {
    let client = ApiClient::new(config);

    let results: Vec<SyncResult> = match cmd {
        Commands::Store { brand_id, store_id } => {
            client
                .post(&format!("{}/sync", store_path(brand_id, store_id)), &())
                .await?
        }
        Commands::Availability { brand_id, store_id } => {
            client
                .post(
                    &format!("{}/sync/availability", store_path(brand_id, store_id)),
                    &(),
                )
                .await?
        }
        Commands::Item {
            brand_id,
            store_id,
            item_id,
            suspend,
            resume,
        } => {
            if suspend == resume {
                bail!("pass exactly one of --suspend or --resume");
            }
            client
                .put(
                    &format!("{}/items/{}/availability", store_path(brand_id, store_id), item_id),
                    &json!({ "suspended": suspend }),
                )
                .await?
        }
    };

    let failed = results.iter().filter(|r| !r.success).count();
    let total = results.len();
    output::print_items(results, format);

    if let Format::Table = format {
        if failed == 0 {
            output::print_success(&format!("{} platform(s) synced", total));
        } else {
            output::print_failure(&format!("{} of {} platform(s) failed", failed, total));
        }
    }

    Ok(())
}
