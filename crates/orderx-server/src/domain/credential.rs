use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Tokens are treated as stale this long before their declared expiry, or
/// halfway through their lifetime when that comes later.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

#[derive(Clone)]
pub struct PlatformCredential {
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub refresh_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl PlatformCredential {
    pub fn refresh_due_at(&self) -> DateTime<Utc> {
        self.refresh_at
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_due_at()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Keeps access tokens out of logs.
impl std::fmt::Debug for PlatformCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredential")
            .field("platform", &self.platform)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Token response of the OAuth2 client-credentials grant.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn into_credential(self, platform: Platform, now: DateTime<Utc>) -> PlatformCredential {
        let mut metadata = HashMap::new();
        if let Some(token_type) = self.token_type {
            metadata.insert("token_type".to_string(), token_type);
        }
        if let Some(scope) = self.scope {
            metadata.insert("scope".to_string(), scope);
        }

        let lifetime = Duration::seconds(self.expires_in.max(0));
        let margin = Duration::seconds(REFRESH_MARGIN_SECS).min(lifetime / 2);
        let expires_at = now + lifetime;

        PlatformCredential {
            platform,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            refresh_at: expires_at - margin,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatus {
    pub platform: Platform,
    pub configured: bool,
    pub cached: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub refreshing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_goes_stale_five_minutes_early() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "tok".into(),
            expires_in: 3600,
            refresh_token: None,
            token_type: Some("Bearer".into()),
            scope: None,
        };
        let credential = response.into_credential(Platform::UberEats, now);

        assert!(!credential.is_stale_at(now));
        assert!(!credential.is_stale_at(now + Duration::minutes(54)));
        assert!(credential.is_stale_at(now + Duration::minutes(55)));
        assert!(!credential.is_expired_at(now + Duration::minutes(55)));
        assert_eq!(credential.metadata.get("token_type").map(String::as_str), Some("Bearer"));
    }

    #[test]
    fn short_lived_credential_is_fresh_for_half_its_lifetime() {
        let now = Utc::now();
        let credential = TokenResponse {
            access_token: "tok".into(),
            expires_in: 240,
            refresh_token: None,
            token_type: None,
            scope: None,
        }
        .into_credential(Platform::Foodpanda, now);

        assert!(!credential.is_stale_at(now));
        assert!(!credential.is_stale_at(now + Duration::seconds(119)));
        assert!(credential.is_stale_at(now + Duration::seconds(120)));
        assert!(!credential.is_expired_at(now + Duration::seconds(120)));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let credential = TokenResponse {
            access_token: "super-secret".into(),
            expires_in: 60,
            refresh_token: None,
            token_type: None,
            scope: None,
        }
        .into_credential(Platform::Foodpanda, Utc::now());

        assert!(!format!("{:?}", credential).contains("super-secret"));
    }
}
