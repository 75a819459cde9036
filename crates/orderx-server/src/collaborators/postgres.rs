use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{BindingStore, MenuSource, OrderSink};
use crate::domain::{
    MenuSnapshot, NormalizedOrder, OperationalStatus, Platform, PlatformSpecific, PlatformStoreBinding,
};

#[derive(FromRow)]
struct BindingRow {
    id: Uuid,
    brand_id: Uuid,
    store_id: Uuid,
    platform: Platform,
    external_store_id: String,
    operational_status: OperationalStatus,
    prep_time_minutes: i32,
    auto_accept: bool,
    platform_specific: Json<PlatformSpecific>,
    active: bool,
    last_synced_at: Option<DateTime<Utc>>,
}

impl From<BindingRow> for PlatformStoreBinding {
    fn from(row: BindingRow) -> Self {
        Self {
            id: row.id,
            brand_id: row.brand_id,
            store_id: row.store_id,
            platform: row.platform,
            external_store_id: row.external_store_id,
            operational_status: row.operational_status,
            prep_time_minutes: row.prep_time_minutes,
            auto_accept: row.auto_accept,
            platform_specific: row.platform_specific.0,
            active: row.active,
            last_synced_at: row.last_synced_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BindingStore for PgStore {
    async fn active_bindings(&self, brand_id: Uuid, store_id: Uuid) -> Result<Vec<PlatformStoreBinding>> {
        let rows: Vec<BindingRow> = sqlx::query_as(
            r#"
            SELECT * FROM platform_store_bindings
            WHERE brand_id = $1 AND store_id = $2 AND active
            ORDER BY platform, created_at
            "#,
        )
        .bind(brand_id)
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .context("loading platform bindings")?;

        Ok(rows.into_iter().map(PlatformStoreBinding::from).collect())
    }

    async fn find_by_external_id(
        &self,
        platform: Platform,
        external_store_id: &str,
    ) -> Result<Option<PlatformStoreBinding>> {
        let row: Option<BindingRow> = sqlx::query_as(
            "SELECT * FROM platform_store_bindings WHERE platform = $1 AND external_store_id = $2",
        )
        .bind(platform)
        .bind(external_store_id)
        .fetch_optional(&self.pool)
        .await
        .context("looking up binding by external store id")?;

        Ok(row.map(PlatformStoreBinding::from))
    }

    async fn record_sync(&self, binding_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE platform_store_bindings SET last_synced_at = $1, updated_at = NOW() WHERE id = $2")
            .bind(at)
            .bind(binding_id)
            .execute(&self.pool)
            .await
            .context("recording sync time")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MenuSource for PgStore {
    async fn menu_snapshot(&self, brand_id: Uuid, store_id: Uuid) -> Result<Option<MenuSnapshot>> {
        let snapshot: Option<(Json<MenuSnapshot>,)> = sqlx::query_as(
            "SELECT snapshot FROM menu_snapshots WHERE brand_id = $1 AND store_id = $2",
        )
        .bind(brand_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading menu snapshot")?;

        Ok(snapshot.map(|(Json(menu),)| menu))
    }
}

#[async_trait]
impl OrderSink for PgStore {
    /// Upserts by (platform, external order id). Platforms deliver out of
    /// order, so a cancellation is final: a later placed event fills in the
    /// payload but never reopens the order.
    async fn submit(&self, order: &NormalizedOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inbound_orders (
                id, platform, external_order_id, kind, brand_id, store_id,
                external_store_id, auto_accept, payload, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (platform, external_order_id) DO UPDATE
            SET kind = CASE WHEN inbound_orders.kind = 'cancelled'
                    THEN 'cancelled' ELSE EXCLUDED.kind END,
                payload = CASE WHEN EXCLUDED.kind = 'cancelled'
                    THEN inbound_orders.payload ELSE EXCLUDED.payload END,
                brand_id = COALESCE(inbound_orders.brand_id, EXCLUDED.brand_id),
                store_id = COALESCE(inbound_orders.store_id, EXCLUDED.store_id),
                external_store_id = COALESCE(inbound_orders.external_store_id, EXCLUDED.external_store_id),
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.platform)
        .bind(&order.external_order_id)
        .bind(order.kind.as_str())
        .bind(order.brand_id)
        .bind(order.store_id)
        .bind(&order.external_store_id)
        .bind(order.auto_accept)
        .bind(Json(order))
        .execute(&self.pool)
        .await
        .context("storing inbound order")?;
        Ok(())
    }
}
