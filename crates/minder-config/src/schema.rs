//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Child profiles
    #[serde(default)]
    pub profiles: Vec<RawProfile>,

    /// Restricted items (apps, sites, programs)
    #[serde(default)]
    pub items: Vec<RawItem>,

    /// Per-(profile, item) limit rows
    #[serde(default)]
    pub limits: Vec<RawLimitRow>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Socket path (default: $XDG_RUNTIME_DIR/minderd/minderd.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the usage ledger
    pub data_dir: Option<PathBuf>,

    /// Paired device credentials
    #[serde(default)]
    pub credentials: Vec<RawCredential>,
}

/// One paired device credential
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCredential {
    /// Opaque per-device token presented at Hello
    pub token: String,

    /// Device this token belongs to
    pub device_id: String,

    /// Surface role: "kiosk", "content", or "admin"
    pub role: String,
}

/// Raw profile definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawProfile {
    /// Unique stable ID
    pub id: String,

    /// Display name
    pub display_name: String,
}

/// Raw item definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawItem {
    /// Unique stable ID
    pub id: String,

    /// Display label
    pub label: String,
}

/// One limit row scoping a profile's use of one item.
///
/// Absent fields mean "no limit of that kind". `max_daily_minutes = 0`
/// also means no hard cap.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLimitRow {
    pub profile: String,
    pub item: String,

    pub daily_limit_minutes: Option<u32>,
    pub weekly_limit_minutes: Option<u32>,

    #[serde(default)]
    pub max_daily_minutes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_limit_rows() {
        let toml_str = r#"
            config_version = 1

            [[profiles]]
            id = "kid-a"
            display_name = "Kid A"

            [[items]]
            id = "minecraft"
            label = "Minecraft"

            [[limits]]
            profile = "kid-a"
            item = "minecraft"
            daily_limit_minutes = 60
            max_daily_minutes = 90
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.limits.len(), 1);
        assert_eq!(config.limits[0].daily_limit_minutes, Some(60));
        assert_eq!(config.limits[0].weekly_limit_minutes, None);
        assert_eq!(config.limits[0].max_daily_minutes, 90);
    }

    #[test]
    fn parse_credentials() {
        let toml_str = r#"
            config_version = 1

            [service]
            socket_path = "/tmp/minderd.sock"

            [[service.credentials]]
            token = "tok-kiosk"
            device_id = "kiosk-1"
            role = "kiosk"

            [[service.credentials]]
            token = "tok-admin"
            device_id = "parent-phone"
            role = "admin"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.credentials.len(), 2);
        assert_eq!(config.service.credentials[1].role, "admin");
    }
}
