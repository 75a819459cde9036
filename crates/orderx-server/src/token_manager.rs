//! OAuth2 client-credentials tokens for outbound platform calls.
//!
//! One credential is cached per platform. A credential becomes stale five
//! minutes before it expires; the first caller to see it stale starts a
//! refresh and every concurrent caller awaits that same refresh. The slot
//! lock is only held while reading or swapping the cached state, never across
//! the token request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::{info, warn};

use crate::domain::{Platform, PlatformCredential, TokenResponse, TokenStatus};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("no oauth client configured for {0}")]
    NotConfigured(Platform),

    #[error("token fetch for {platform} failed: {message}")]
    FetchFailed {
        platform: Platform,
        status: Option<u16>,
        message: String,
    },
}

impl TokenError {
    fn fetch_failed(platform: Platform, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            platform,
            status,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub token_url: String,
}

type PendingRefresh = Shared<BoxFuture<'static, Result<PlatformCredential, TokenError>>>;

#[derive(Default)]
struct Slot {
    credential: Option<PlatformCredential>,
    in_flight: Option<PendingRefresh>,
}

struct Inner {
    http: Client,
    clients: HashMap<Platform, OAuthClient>,
    slots: [Mutex<Slot>; 2],
    request_timeout: Duration,
}

impl Inner {
    fn slot(&self, platform: Platform) -> &Mutex<Slot> {
        match platform {
            Platform::UberEats => &self.slots[0],
            Platform::Foodpanda => &self.slots[1],
        }
    }

    async fn refresh(&self, platform: Platform) -> Result<PlatformCredential, TokenError> {
        let result = self.fetch(platform).await;

        {
            let mut slot = self.slot(platform).lock();
            slot.in_flight = None;
            if let Ok(credential) = &result {
                slot.credential = Some(credential.clone());
            }
        }

        match &result {
            Ok(credential) => info!(
                platform = %platform,
                expires_at = %credential.expires_at,
                "obtained platform access token"
            ),
            Err(e) => warn!(platform = %platform, error = %e, "platform token refresh failed"),
        }
        result
    }

    async fn fetch(&self, platform: Platform) -> Result<PlatformCredential, TokenError> {
        let client = self
            .clients
            .get(&platform)
            .ok_or(TokenError::NotConfigured(platform))?;

        let response = self
            .http
            .post(&client.token_url)
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", client.scope.as_str()),
            ])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| TokenError::fetch_failed(platform, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::fetch_failed(
                platform,
                Some(status.as_u16()),
                format!("token endpoint returned {}: {}", status, truncate(&body, 256)),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::fetch_failed(platform, None, format!("invalid token response: {e}")))?;

        Ok(token.into_credential(platform, Utc::now()))
    }
}

#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(http: Client, clients: HashMap<Platform, OAuthClient>, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                clients,
                slots: Default::default(),
                request_timeout,
            }),
        }
    }

    pub fn is_configured(&self, platform: Platform) -> bool {
        self.inner.clients.contains_key(&platform)
    }

    pub fn configured_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_configured(*p))
            .collect()
    }

    /// Returns the cached token, refreshing it first when absent or stale.
    ///
    /// If the refresh fails while the old token has not actually expired yet,
    /// the old token is returned.
    pub async fn get_token(&self, platform: Platform) -> Result<String, TokenError> {
        if !self.is_configured(platform) {
            return Err(TokenError::NotConfigured(platform));
        }

        let now = Utc::now();
        let (pending, fallback) = {
            let mut slot = self.inner.slot(platform).lock();
            if let Some(credential) = &slot.credential {
                if !credential.is_stale_at(now) {
                    return Ok(credential.access_token.clone());
                }
            }
            let fallback = slot
                .credential
                .as_ref()
                .filter(|c| !c.is_expired_at(now))
                .map(|c| c.access_token.clone());
            (self.join_or_start(platform, &mut slot), fallback)
        };

        match pending.await {
            Ok(credential) => Ok(credential.access_token),
            Err(e) => match fallback {
                Some(token) => {
                    warn!(platform = %platform, error = %e, "using stale token after failed refresh");
                    Ok(token)
                }
                None => Err(e),
            },
        }
    }

    /// Refreshes regardless of the cached token's age. Joins a refresh that
    /// is already running instead of starting a second one.
    pub async fn force_refresh(&self, platform: Platform) -> Result<String, TokenError> {
        if !self.is_configured(platform) {
            return Err(TokenError::NotConfigured(platform));
        }

        let pending = {
            let mut slot = self.inner.slot(platform).lock();
            self.join_or_start(platform, &mut slot)
        };
        pending.await.map(|c| c.access_token)
    }

    /// Drops the cached token, e.g. after the platform rejected it.
    pub fn invalidate(&self, platform: Platform) {
        self.inner.slot(platform).lock().credential = None;
    }

    pub fn needs_refresh(&self, platform: Platform) -> bool {
        let slot = self.inner.slot(platform).lock();
        match &slot.credential {
            Some(credential) => credential.is_stale_at(Utc::now()),
            None => true,
        }
    }

    pub fn status(&self, platform: Platform) -> TokenStatus {
        let slot = self.inner.slot(platform).lock();
        let now = Utc::now();
        let valid_until: Option<DateTime<Utc>> = slot
            .credential
            .as_ref()
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.expires_at);

        TokenStatus {
            platform,
            configured: self.is_configured(platform),
            cached: slot.credential.is_some(),
            valid_until,
            refreshing: slot.in_flight.is_some(),
        }
    }

    fn join_or_start(&self, platform: Platform, slot: &mut Slot) -> PendingRefresh {
        if let Some(pending) = &slot.in_flight {
            return pending.clone();
        }

        // Spawned so the refresh completes even if the caller that started
        // it is cancelled. It clears `in_flight` under the slot lock, which
        // this caller still holds.
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.refresh(platform).await });
        let pending = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(TokenError::fetch_failed(
                    platform,
                    None,
                    format!("refresh task aborted: {e}"),
                )),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(pending.clone());
        pending
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("訂單錯誤", 2), "訂單");
    }

    #[tokio::test]
    async fn unconfigured_platform_fails_fast() {
        let manager = TokenManager::new(Client::new(), HashMap::new(), Duration::from_secs(1));
        let err = manager.get_token(Platform::UberEats).await.unwrap_err();
        assert!(matches!(err, TokenError::NotConfigured(Platform::UberEats)));

        let status = manager.status(Platform::Foodpanda);
        assert!(!status.configured);
        assert!(!status.cached);
        assert!(manager.configured_platforms().is_empty());
    }
}
