//! Validated catalog ready for use by the daemon

use crate::schema::{RawConfig, RawServiceConfig};
use crate::validation::parse_role;
use minder_api::SurfaceRole;
use minder_budget::LimitSet;
use minder_util::{DeviceId, ItemId, ProfileId};
use std::collections::HashMap;
use std::path::PathBuf;

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Service settings
    pub service: ServiceConfig,

    /// Known profiles
    pub profiles: Vec<Profile>,

    /// Known items
    pub items: Vec<Item>,

    limits: HashMap<(ProfileId, ItemId), LimitSet>,
    credentials: HashMap<String, Credential>,
}

impl Catalog {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let profiles = raw
            .profiles
            .into_iter()
            .map(|p| Profile {
                id: ProfileId::new(p.id),
                display_name: p.display_name,
            })
            .collect();

        let items = raw
            .items
            .into_iter()
            .map(|i| Item {
                id: ItemId::new(i.id),
                label: i.label,
            })
            .collect();

        let limits = raw
            .limits
            .into_iter()
            .map(|row| {
                (
                    (ProfileId::new(row.profile), ItemId::new(row.item)),
                    LimitSet {
                        daily_limit_minutes: row.daily_limit_minutes,
                        weekly_limit_minutes: row.weekly_limit_minutes,
                        max_daily_minutes: row.max_daily_minutes,
                    },
                )
            })
            .collect();

        let credentials = raw
            .service
            .credentials
            .iter()
            .map(|c| {
                (
                    c.token.clone(),
                    Credential {
                        device_id: DeviceId::new(c.device_id.clone()),
                        // Unknown roles are rejected during validation
                        role: parse_role(&c.role).unwrap_or(SurfaceRole::Kiosk),
                    },
                )
            })
            .collect();

        Self {
            service: ServiceConfig::from_raw(raw.service),
            profiles,
            items,
            limits,
            credentials,
        }
    }

    /// Limits for one (profile, item) pair. A pair with no configured row
    /// is unlimited.
    pub fn limit_set(&self, profile: &ProfileId, item: &ItemId) -> LimitSet {
        self.limits
            .get(&(profile.clone(), item.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a device token presented at Hello
    pub fn resolve_token(&self, token: &str) -> Option<&Credential> {
        self.credentials.get(token)
    }

    pub fn profile(&self, id: &ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| &p.id == id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }
}

/// Service settings with defaults applied
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(minder_util::socket_path_without_env),
            data_dir: raw.data_dir.unwrap_or_else(minder_util::data_dir_without_env),
        }
    }
}

/// A child identity
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
}

/// A restricted application, website, or native program
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub label: String,
}

/// A resolved device credential
#[derive(Debug, Clone)]
pub struct Credential {
    pub device_id: DeviceId,
    pub role: SurfaceRole,
}
