use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    UberEats,
    Foodpanda,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::UberEats, Platform::Foodpanda];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UberEats => "ubereats",
            Self::Foodpanda => "foodpanda",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ubereats" | "uber_eats" | "uber-eats" => Ok(Self::UberEats),
            "foodpanda" => Ok(Self::Foodpanda),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationalStatus {
    Online,
    Busy,
    Offline,
}

/// Settings only one platform's adapter reads. Sync rejects a binding whose
/// tag disagrees with `PlatformStoreBinding::platform`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlatformSpecific {
    UberEats {
        #[serde(default)]
        menu_id: Option<String>,
    },
    Foodpanda {
        chain_code: String,
    },
}

impl PlatformSpecific {
    pub fn platform(&self) -> Platform {
        match self {
            Self::UberEats { .. } => Platform::UberEats,
            Self::Foodpanda { .. } => Platform::Foodpanda,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStoreBinding {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub store_id: Uuid,
    pub platform: Platform,
    pub external_store_id: String,
    pub operational_status: OperationalStatus,
    pub prep_time_minutes: i32,
    pub auto_accept: bool,
    pub platform_specific: PlatformSpecific,
    pub active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl PlatformStoreBinding {
    pub fn foodpanda_chain_code(&self) -> Option<&str> {
        match &self.platform_specific {
            PlatformSpecific::Foodpanda { chain_code } => Some(chain_code),
            _ => None,
        }
    }

    pub fn ubereats_menu_id(&self) -> Option<&str> {
        match &self.platform_specific {
            PlatformSpecific::UberEats { menu_id } => menu_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_route_segments() {
        assert_eq!("ubereats".parse::<Platform>().unwrap(), Platform::UberEats);
        assert_eq!("Foodpanda".parse::<Platform>().unwrap(), Platform::Foodpanda);
        assert!("grubhub".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_specific_is_tagged() {
        let value = serde_json::json!({ "type": "foodpanda", "chain_code": "cx9" });
        let specific: PlatformSpecific = serde_json::from_value(value).unwrap();
        assert_eq!(specific.platform(), Platform::Foodpanda);

        let uber: PlatformSpecific = serde_json::from_value(serde_json::json!({ "type": "ubereats" })).unwrap();
        assert_eq!(uber, PlatformSpecific::UberEats { menu_id: None });
    }
}
