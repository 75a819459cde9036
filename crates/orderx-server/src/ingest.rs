//! Inbound webhook handling: signature over the raw bytes, replay checks,
//! decode, then the platform adapter and the order service.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::{AdapterRegistry, PlatformApiError};
use crate::collaborators::{BindingStore, OrderSink};
use crate::domain::{InboundWebhookEvent, IngestOutcome, NormalizedOrder, Platform, WebhookRoute};
use crate::verification::signature::verify;
use crate::verification::{ReplayGuard, SecretSlot, WebhookSecrets};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("signature header missing")]
    SignatureMissing,

    #[error("signature does not match")]
    SignatureInvalid,

    #[error("event timestamp outside the accepted window")]
    ReplayTimestampExpired,

    #[error("event {0} was already processed")]
    DuplicateEvent(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Platform(#[from] PlatformApiError),

    #[error("order service failed: {0}")]
    Downstream(#[source] anyhow::Error),
}

/// What the caller gets back for an accepted delivery.
#[derive(Debug)]
pub struct IngestReceipt {
    pub event_id: Option<String>,
    pub event_type: String,
    pub outcome: IngestOutcome,
}

pub struct WebhookIngestPipeline {
    secrets: HashMap<Platform, WebhookSecrets>,
    replay: Arc<ReplayGuard>,
    adapters: AdapterRegistry,
    bindings: Arc<dyn BindingStore>,
    orders: Arc<dyn OrderSink>,
}

impl WebhookIngestPipeline {
    pub fn new(
        secrets: HashMap<Platform, WebhookSecrets>,
        replay: Arc<ReplayGuard>,
        adapters: AdapterRegistry,
        bindings: Arc<dyn BindingStore>,
        orders: Arc<dyn OrderSink>,
    ) -> Self {
        Self {
            secrets,
            replay,
            adapters,
            bindings,
            orders,
        }
    }

    pub fn secrets(&self, platform: Platform) -> Option<&WebhookSecrets> {
        self.secrets.get(&platform).filter(|s| s.is_configured())
    }

    /// Foodpanda deliveries are accepted unsigned when no Foodpanda secret is
    /// configured. UberEats always requires one.
    pub fn allows_unsigned(platform: Platform) -> bool {
        platform == Platform::Foodpanda
    }

    pub async fn ingest(
        &self,
        route: WebhookRoute,
        signature: Option<&str>,
        raw_body: Bytes,
    ) -> Result<IngestReceipt, IngestError> {
        let platform = route.platform();
        self.check_signature(platform, signature, &raw_body)?;

        let payload: Value =
            serde_json::from_slice(&raw_body).map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
        if !payload.is_object() {
            return Err(IngestError::MalformedPayload("expected a JSON object".into()));
        }

        let adapter = self.adapters.get(platform).ok_or_else(|| {
            error!(platform = %platform, "no adapter registered for webhook route");
            IngestError::ConfigurationMissing(format!("{platform} adapter"))
        })?;

        let envelope = adapter.envelope(route, &payload)?;
        if let Some(ts) = envelope.timestamp {
            if !self.replay.is_fresh(ts) {
                info!(platform = %platform, event_id = ?envelope.event_id, timestamp = ts, "rejected stale webhook");
                return Err(IngestError::ReplayTimestampExpired);
            }
        }

        let event = InboundWebhookEvent::new(route, envelope, raw_body, signature.map(str::to_string));
        let claim = event.event_id.as_ref().map(|id| format!("{platform}:{id}"));
        match &claim {
            Some(key) if !self.replay.try_claim(key) => {
                info!(platform = %platform, event_id = %key, "rejected duplicate webhook");
                return Err(IngestError::DuplicateEvent(key.clone()));
            }
            Some(_) => {}
            None => debug!(platform = %platform, event_type = %event.event_type, "webhook has no event id"),
        }

        match self.dispatch(&event, payload).await {
            Ok(outcome) => Ok(IngestReceipt {
                event_id: event.event_id,
                event_type: event.event_type,
                outcome,
            }),
            Err(e) => {
                if let Some(key) = &claim {
                    self.replay.release(key);
                }
                warn!(platform = %platform, event_type = %event.event_type, error = %e, "webhook processing failed");
                Err(e)
            }
        }
    }

    fn check_signature(&self, platform: Platform, signature: Option<&str>, body: &[u8]) -> Result<(), IngestError> {
        let Some(secrets) = self.secrets(platform) else {
            if Self::allows_unsigned(platform) {
                return Ok(());
            }
            error!(platform = %platform, "webhook signing secret is not configured");
            return Err(IngestError::ConfigurationMissing(format!("{platform} webhook secret")));
        };

        if signature.map_or(true, |s| s.trim().is_empty()) {
            return Err(IngestError::SignatureMissing);
        }

        match verify(body, signature, secrets) {
            Some(SecretSlot::Primary) => Ok(()),
            Some(SecretSlot::Secondary) => {
                warn!(platform = %platform, "webhook matched the secondary secret, rotate the primary");
                Ok(())
            }
            None => Err(IngestError::SignatureInvalid),
        }
    }

    async fn dispatch(&self, event: &InboundWebhookEvent, payload: Value) -> Result<IngestOutcome, IngestError> {
        let platform = event.route.platform();
        let adapter = self
            .adapters
            .get(platform)
            .ok_or_else(|| IngestError::ConfigurationMissing(format!("{platform} adapter")))?;

        let outcome = adapter.ingest_order(event, payload).await?;
        if let IngestOutcome::Order(order) = outcome {
            let order = self.enrich(order).await?;
            self.orders.submit(&order).await.map_err(IngestError::Downstream)?;
            info!(
                platform = %platform,
                order_id = %order.external_order_id,
                kind = order.kind.as_str(),
                store_id = ?order.store_id,
                "order handed to order service"
            );
            return Ok(IngestOutcome::Order(order));
        }
        Ok(outcome)
    }

    async fn enrich(&self, mut order: NormalizedOrder) -> Result<NormalizedOrder, IngestError> {
        let Some(external_store_id) = order.external_store_id.as_deref() else {
            return Ok(order);
        };
        let binding = self
            .bindings
            .find_by_external_id(order.platform, external_store_id)
            .await
            .map_err(IngestError::Downstream)?;

        match binding {
            Some(binding) => {
                order.brand_id = Some(binding.brand_id);
                order.store_id = Some(binding.store_id);
                order.auto_accept = binding.auto_accept;
            }
            None => warn!(
                platform = %order.platform,
                external_store_id,
                "order for a store with no binding"
            ),
        }
        Ok(order)
    }
}
