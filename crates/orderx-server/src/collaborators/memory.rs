use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BindingStore, MenuSource, OrderSink};
use crate::domain::{MenuSnapshot, NormalizedOrder, Platform, PlatformStoreBinding};

/// Process-local stand-in for the binding, menu and order services.
#[derive(Default)]
pub struct InMemoryStore {
    bindings: RwLock<Vec<PlatformStoreBinding>>,
    menus: RwLock<HashMap<(Uuid, Uuid), MenuSnapshot>>,
    orders: RwLock<Vec<NormalizedOrder>>,
    reject_orders: RwLock<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(&self, binding: PlatformStoreBinding) {
        self.bindings.write().push(binding);
    }

    pub fn put_menu(&self, menu: MenuSnapshot) {
        self.menus.write().insert((menu.brand_id, menu.store_id), menu);
    }

    pub fn binding(&self, id: Uuid) -> Option<PlatformStoreBinding> {
        self.bindings.read().iter().find(|b| b.id == id).cloned()
    }

    pub fn orders(&self) -> Vec<NormalizedOrder> {
        self.orders.read().clone()
    }

    /// Makes `submit` fail, to exercise downstream outages.
    pub fn set_reject_orders(&self, reject: bool) {
        *self.reject_orders.write() = reject;
    }
}

#[async_trait]
impl BindingStore for InMemoryStore {
    async fn active_bindings(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<PlatformStoreBinding>> {
        Ok(self
            .bindings
            .read()
            .iter()
            .filter(|b| b.active && b.brand_id == brand_id && b.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn find_by_external_id(
        &self,
        platform: Platform,
        external_store_id: &str,
    ) -> Result<Option<PlatformStoreBinding>> {
        Ok(self
            .bindings
            .read()
            .iter()
            .find(|b| b.platform == platform && b.external_store_id == external_store_id)
            .cloned())
    }

    async fn record_sync(&self, binding_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut bindings = self.bindings.write();
        let binding = bindings
            .iter_mut()
            .find(|b| b.id == binding_id)
            .ok_or_else(|| anyhow!("binding {binding_id} not found"))?;
        binding.last_synced_at = Some(at);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl MenuSource for InMemoryStore {
    async fn menu_snapshot(&self, brand_id: Uuid, store_id: Uuid) -> Result<Option<MenuSnapshot>> {
        Ok(self.menus.read().get(&(brand_id, store_id)).cloned())
    }
}

#[async_trait]
impl OrderSink for InMemoryStore {
    async fn submit(&self, order: &NormalizedOrder) -> Result<()> {
        if *self.reject_orders.read() {
            return Err(anyhow!("order service unavailable"));
        }
        self.orders.write().push(order.clone());
        Ok(())
    }
}
