//! Stores owned by other services that the integration layer reads from or
//! hands results to.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{MenuSnapshot, NormalizedOrder, Platform, PlatformStoreBinding};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Active bindings of one store, any platform.
    async fn active_bindings(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<PlatformStoreBinding>>;

    async fn find_by_external_id(
        &self,
        platform: Platform,
        external_store_id: &str,
    ) -> Result<Option<PlatformStoreBinding>>;

    /// The only write this service makes to a binding.
    async fn record_sync(&self, binding_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn menu_snapshot(&self, brand_id: Uuid, store_id: Uuid) -> Result<Option<MenuSnapshot>>;
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, order: &NormalizedOrder) -> Result<()>;
}
