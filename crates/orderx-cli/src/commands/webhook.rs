use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{self, Format};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    Ubereats,
    Foodpanda,
    FoodpandaCatalog,
}

impl Target {
    fn path(&self) -> &'static str {
        match self {
            Self::Ubereats => "/webhooks/ubereats",
            Self::Foodpanda => "/webhooks/foodpanda",
            Self::FoodpandaCatalog => "/webhooks/foodpanda/catalog-callback",
        }
    }

    fn signature_header(&self) -> &'static str {
        match self {
            Self::Ubereats => "X-Uber-Signature",
            Self::Foodpanda | Self::FoodpandaCatalog => "X-Foodpanda-Signature",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the hex HMAC-SHA256 of a payload file
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long, help = "Payload file, signed byte for byte")]
        file: PathBuf,
    },
    /// Deliver a payload file to a webhook route, signed when a secret is given
    Send {
        #[arg(value_enum)]
        target: Target,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize, Tabled)]
pub struct WebhookAck {
    pub status: String,
    #[serde(default)]
    #[tabled(display_with = "display_option")]
    pub event_id: Option<String>,
    pub event_type: String,
    pub outcome: String,
}

fn display_option(o: &Option<String>) -> String {
    o.clone().unwrap_or_else(|| "-".into())
}

#[derive(Serialize)]
struct Signature<'a> {
    signature: &'a str,
}

fn sign(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).context("invalid hmac key")?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn read_payload(file: &PathBuf) -> Result<Vec<u8>> {
    fs::read(file).with_context(|| format!("failed to read {}", file.display()))
}

pub async fn run(cmd: Commands, config: &Config, format: Format) -> Result<()> {
    match cmd {
        Commands::Sign { secret, file } => {
            let signature = sign(&read_payload(&file)?, &secret)?;
            match format {
                Format::Json => output::print_json(&Signature { signature: &signature }),
                Format::Table => println!("{}", signature),
            }
        }
        Commands::Send { target, file, secret } => {
            let body = read_payload(&file)?;
            let mut headers = Vec::new();
            if let Some(secret) = secret {
                headers.push((target.signature_header(), sign(&body, &secret)?));
            }

            let client = ApiClient::new(config);
            let ack: WebhookAck = client.post_raw(target.path(), body, &headers).await?;
            if let Format::Table = format {
                output::print_success("Webhook accepted");
            }
            output::print_item(ack, format);
        }
    }

    Ok(())
}
