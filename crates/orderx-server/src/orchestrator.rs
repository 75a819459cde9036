//! Menu and availability fan-out to every platform a store is bound to.
//!
//! Each binding gets its own task and its own timeout. A failing or hanging
//! platform shows up as a failed `SyncResult` and never holds back the rest.
//! Dropping the returned future aborts the outstanding tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{AdapterRegistry, PlatformAdapter, PlatformApiError};
use crate::collaborators::{BindingStore, MenuSource};
use crate::domain::{menu_availability, MenuSnapshot, Platform, PlatformStoreBinding, SyncResult};
use crate::token_manager::TokenManager;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no platform enabled for store {store_id}")]
    NoPlatformEnabled { brand_id: Uuid, store_id: Uuid },

    #[error("no menu found for store {store_id}")]
    MenuNotFound { brand_id: Uuid, store_id: Uuid },

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

struct Target {
    binding: PlatformStoreBinding,
    adapter: Arc<dyn PlatformAdapter>,
}

/// Runs `call` under the per-call timeout.
async fn within<F>(timeout: Duration, platform: Platform, call: F) -> Result<(), PlatformApiError>
where
    F: Future<Output = Result<(), PlatformApiError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(PlatformApiError::Timeout {
            platform,
            seconds: timeout.as_secs(),
        }))
}

pub struct SyncOrchestrator {
    adapters: AdapterRegistry,
    tokens: TokenManager,
    bindings: Arc<dyn BindingStore>,
    menus: Arc<dyn MenuSource>,
    call_timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        adapters: AdapterRegistry,
        tokens: TokenManager,
        bindings: Arc<dyn BindingStore>,
        menus: Arc<dyn MenuSource>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            tokens,
            bindings,
            menus,
            call_timeout,
        }
    }

    /// Pushes the current menu to every active binding of the store.
    pub async fn sync_store(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<SyncResult>, SyncError> {
        let targets = self.targets(brand_id, store_id).await?;
        let menu = Arc::new(self.menu(brand_id, store_id).await?);
        let timeout = self.call_timeout;

        let results = self
            .fan_out("menu", targets, true, move |adapter, binding| {
                let menu = menu.clone();
                async move {
                    let payload = adapter.convert_menu(&menu, &binding)?;
                    within(timeout, adapter.platform(), adapter.push_menu(&binding, &payload)).await
                }
            })
            .await;
        Ok(results)
    }

    /// Pushes the computed suspended state of every dish and option to every
    /// active binding.
    pub async fn sync_availability(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<SyncResult>, SyncError> {
        let targets = self.targets(brand_id, store_id).await?;
        let items = Arc::new(menu_availability(&self.menu(brand_id, store_id).await?));
        let timeout = self.call_timeout;

        let results = self
            .fan_out("availability", targets, true, move |adapter, binding| {
                let items = items.clone();
                async move {
                    let mut first_error = None;
                    let mut failed = 0usize;
                    for item in items.iter() {
                        let call = adapter.set_item_availability(&binding, &item.item_id, item.suspended);
                        if let Err(e) = within(timeout, adapter.platform(), call).await {
                            failed += 1;
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                    match first_error {
                        None => Ok(()),
                        Some(e) => {
                            warn!(
                                platform = %binding.platform,
                                binding_id = %binding.id,
                                failed,
                                total = items.len(),
                                "some availability updates failed"
                            );
                            Err(e)
                        }
                    }
                }
            })
            .await;
        Ok(results)
    }

    /// Suspends or resumes one item on every active binding.
    pub async fn set_item_availability(
        &self,
        brand_id: Uuid,
        store_id: Uuid,
        item_id: &str,
        suspended: bool,
    ) -> Result<Vec<SyncResult>, SyncError> {
        let targets = self.targets(brand_id, store_id).await?;
        let item_id: Arc<str> = Arc::from(item_id);
        let timeout = self.call_timeout;

        let results = self
            .fan_out("item availability", targets, false, move |adapter, binding| {
                let item_id = item_id.clone();
                async move {
                    let call = adapter.set_item_availability(&binding, &item_id, suspended);
                    within(timeout, adapter.platform(), call).await
                }
            })
            .await;
        Ok(results)
    }

    async fn menu(&self, brand_id: Uuid, store_id: Uuid) -> Result<MenuSnapshot, SyncError> {
        self.menus
            .menu_snapshot(brand_id, store_id)
            .await?
            .ok_or(SyncError::MenuNotFound { brand_id, store_id })
    }

    /// Active bindings paired with their adapters. Missing adapters or OAuth
    /// clients fail the whole call before anything is sent.
    async fn targets(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<Target>, SyncError> {
        let bindings = self.bindings.active_bindings(brand_id, store_id).await?;
        if bindings.is_empty() {
            return Err(SyncError::NoPlatformEnabled { brand_id, store_id });
        }

        bindings
            .into_iter()
            .map(|binding| {
                let platform = binding.platform;
                let adapter = self.adapters.get(platform).ok_or_else(|| {
                    error!(platform = %platform, "no adapter registered");
                    SyncError::ConfigurationMissing(format!("{platform} adapter"))
                })?;
                if !self.tokens.is_configured(platform) {
                    error!(platform = %platform, "platform oauth client is not configured");
                    return Err(SyncError::ConfigurationMissing(format!("{platform} oauth client")));
                }
                Ok(Target { binding, adapter })
            })
            .collect()
    }

    async fn fan_out<F, Fut>(&self, operation: &'static str, targets: Vec<Target>, record: bool, call: F) -> Vec<SyncResult>
    where
        F: Fn(Arc<dyn PlatformAdapter>, PlatformStoreBinding) -> Fut,
        Fut: Future<Output = Result<(), PlatformApiError>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for (index, target) in targets.iter().enumerate() {
            let binding = &target.binding;
            if binding.platform_specific.platform() != binding.platform {
                let mismatch = PlatformApiError::InvalidBinding {
                    platform: binding.platform,
                    binding_id: binding.id,
                };
                tasks.spawn(async move { (index, Err(mismatch)) });
                continue;
            }
            let call = call(target.adapter.clone(), binding.clone());
            tasks.spawn(async move { (index, call.await) });
        }

        let mut results: Vec<Option<SyncResult>> = vec![None; targets.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    let binding = &targets[index].binding;
                    results[index] = Some(self.settle(operation, binding, outcome, record).await);
                }
                Err(e) => error!(operation, error = %e, "sync task did not complete"),
            }
        }

        targets
            .iter()
            .zip(results)
            .map(|(target, result)| {
                result.unwrap_or_else(|| SyncResult::failed(&target.binding, "sync task aborted", true))
            })
            .collect()
    }

    async fn settle(
        &self,
        operation: &'static str,
        binding: &PlatformStoreBinding,
        outcome: Result<(), PlatformApiError>,
        record: bool,
    ) -> SyncResult {
        match outcome {
            Ok(()) => {
                let now = Utc::now();
                if record {
                    if let Err(e) = self.bindings.record_sync(binding.id, now).await {
                        warn!(binding_id = %binding.id, error = %e, "failed to record sync time");
                    }
                }
                info!(
                    operation,
                    platform = %binding.platform,
                    external_store_id = %binding.external_store_id,
                    "platform sync succeeded"
                );
                SyncResult::succeeded(binding, now)
            }
            Err(e) => {
                let retryable = e.is_retryable();
                warn!(
                    operation,
                    platform = %binding.platform,
                    external_store_id = %binding.external_store_id,
                    retryable,
                    error = %e,
                    "platform sync failed"
                );
                SyncResult::failed(binding, e.to_string(), retryable)
            }
        }
    }
}
