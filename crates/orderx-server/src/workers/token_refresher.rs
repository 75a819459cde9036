use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::token_manager::TokenManager;

/// Renews platform tokens ahead of their refresh margin so request paths
/// rarely wait on the OAuth endpoint.
pub struct TokenRefresher {
    tokens: TokenManager,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl TokenRefresher {
    pub fn new(tokens: TokenManager, interval: Duration) -> Self {
        Self {
            tokens,
            interval,
            handle: None,
        }
    }

    pub fn start(&mut self) {
        let tokens = self.tokens.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            loop {
                refresh_due(&tokens).await;
                tokio::time::sleep(interval).await;
            }
        });

        self.handle = Some(handle);
    }
}

impl Drop for TokenRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn refresh_due(tokens: &TokenManager) {
    for platform in tokens.configured_platforms() {
        if !tokens.needs_refresh(platform) {
            continue;
        }
        debug!(platform = %platform, "refreshing platform token ahead of use");
        if let Err(e) = tokens.get_token(platform).await {
            error!(platform = %platform, error = %e, "background token refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::Platform;
    use crate::token_manager::OAuthClient;

    #[tokio::test]
    async fn fetches_missing_token_and_stops_on_drop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "bg-token",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut clients = HashMap::new();
        clients.insert(
            Platform::Foodpanda,
            OAuthClient {
                client_id: "client".into(),
                client_secret: "secret".into(),
                scope: "catalog orders".into(),
                token_url: format!("{}/token", server.uri()),
            },
        );
        let tokens = TokenManager::new(reqwest::Client::new(), clients, Duration::from_secs(5));

        let mut refresher = TokenRefresher::new(tokens.clone(), Duration::from_millis(20));
        refresher.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(refresher);

        assert!(tokens.status(Platform::Foodpanda).cached);
        assert!(!tokens.status(Platform::UberEats).cached);
        server.verify().await;
    }
}
