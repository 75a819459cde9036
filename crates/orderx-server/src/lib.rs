pub mod adapters;
pub mod api;
pub mod collaborators;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod telemetry;
pub mod token_manager;
pub mod verification;
pub mod workers;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, warn};

use crate::adapters::{AdapterRegistry, ApiClient, FoodpandaAdapter, UberEatsAdapter};
use crate::api::routes;
use crate::collaborators::{BindingStore, MenuSource, OrderSink, PgStore};
use crate::config::Config;
use crate::domain::Platform;
use crate::ingest::WebhookIngestPipeline;
use crate::orchestrator::SyncOrchestrator;
use crate::token_manager::TokenManager;
use crate::verification::ReplayGuard;
use crate::workers::token_refresher::TokenRefresher;

/// The external stores the service reads bindings and menus from and hands
/// orders to.
#[derive(Clone)]
pub struct Collaborators {
    pub bindings: Arc<dyn BindingStore>,
    pub menus: Arc<dyn MenuSource>,
    pub orders: Arc<dyn OrderSink>,
}

impl Collaborators {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BindingStore + MenuSource + OrderSink + 'static,
    {
        Self {
            bindings: store.clone(),
            menus: store.clone(),
            orders: store,
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub tokens: TokenManager,
    pub pipeline: WebhookIngestPipeline,
    pub orchestrator: SyncOrchestrator,
    pub bindings: Arc<dyn BindingStore>,
}

pub struct App {
    state: Arc<AppState>,
    _token_refresher: Option<TokenRefresher>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;

        let store = Arc::new(PgStore::new(db));
        Self::from_parts(config, Collaborators::from_store(store))
    }

    /// Builds the service around already constructed collaborators. A zero
    /// `token_refresh_interval` disables the background refresher.
    pub fn from_parts(config: Config, collaborators: Collaborators) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.outbound_timeout)
            .build()?;

        let tokens = TokenManager::new(http.clone(), config.oauth_clients(), config.outbound_timeout);
        warn_on_missing_settings(&config, &tokens);

        let api = |platform: Platform| {
            ApiClient::new(
                platform,
                http.clone(),
                tokens.clone(),
                &config.platform(platform).api_url,
                config.outbound_timeout,
            )
        };
        let adapters = AdapterRegistry::new()
            .register(Arc::new(UberEatsAdapter::new(api(Platform::UberEats))))
            .register(Arc::new(FoodpandaAdapter::new(
                api(Platform::Foodpanda),
                config.catalog_callback_url(),
            )));

        let replay = Arc::new(ReplayGuard::new(
            config.webhooks.max_skew_secs,
            config.webhooks.dedup_capacity,
            config.webhooks.dedup_ttl,
        ));

        let pipeline = WebhookIngestPipeline::new(
            config.webhook_secrets(),
            replay,
            adapters.clone(),
            collaborators.bindings.clone(),
            collaborators.orders.clone(),
        );

        let orchestrator = SyncOrchestrator::new(
            adapters,
            tokens.clone(),
            collaborators.bindings.clone(),
            collaborators.menus.clone(),
            config.outbound_timeout,
        );

        let token_refresher = (!config.token_refresh_interval.is_zero()).then(|| {
            let mut refresher = TokenRefresher::new(tokens.clone(), config.token_refresh_interval);
            refresher.start();
            refresher
        });

        let state = Arc::new(AppState {
            config,
            tokens,
            pipeline,
            orchestrator,
            bindings: collaborators.bindings,
        });

        Ok(Self {
            state,
            _token_refresher: token_refresher,
        })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        routes::build(self.state.clone())
    }
}

fn warn_on_missing_settings(config: &Config, tokens: &TokenManager) {
    for platform in Platform::ALL {
        if !tokens.is_configured(platform) {
            warn!(platform = %platform, "no oauth client configured, outbound calls will fail");
        }
        if !config.platform(platform).webhook_secrets().is_configured() {
            if WebhookIngestPipeline::allows_unsigned(platform) {
                warn!(platform = %platform, "no webhook secret configured, deliveries are accepted unsigned");
            } else {
                error!(platform = %platform, "no webhook secret configured, deliveries will be rejected");
            }
        }
    }
    if config.admin_api_token.is_none() {
        error!("ADMIN_API_TOKEN is not set, admin routes will be rejected");
    }
}
