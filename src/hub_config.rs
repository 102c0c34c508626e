// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! The hub configuration context
//!
//! [`HubConfig`] owns everything resolved for one configuration session:
//! the role registry, the hub identity, the global settings and the
//! override source that was loaded last. It is created with compiled
//! defaults, updated by [`HubConfig::load`] and then read by the
//! descriptor builder and the token engine.

use crate::{
    defaults::*,
    registry::RoleRegistry,
    role::{DatabaseRole, Tier},
    source::ConfigurationSource,
};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

/// Hub roles and users, plus the runtime credentials
#[derive(Clone, PartialEq, Eq)]
pub struct HubIdentity {
    pub hub_role_name: String,
    pub hub_user_name: String,
    pub hub_admin_role_name: String,
    pub hub_admin_user_name: String,
    /// Runtime user, only ever set from the override source
    pub ml_username: Option<String>,
    pub ml_password: Option<String>,
}

impl Default for HubIdentity {
    fn default() -> Self {
        HubIdentity {
            hub_role_name: DEFAULT_ROLE_NAME.to_string(),
            hub_user_name: DEFAULT_USER_NAME.to_string(),
            hub_admin_role_name: DEFAULT_ADMIN_ROLE_NAME.to_string(),
            hub_admin_user_name: DEFAULT_ADMIN_USER_NAME.to_string(),
            ml_username: None,
            ml_password: None,
        }
    }
}

impl fmt::Debug for HubIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubIdentity")
            .field("hub_role_name", &self.hub_role_name)
            .field("hub_user_name", &self.hub_user_name)
            .field("hub_admin_role_name", &self.hub_admin_role_name)
            .field("hub_admin_user_name", &self.hub_admin_user_name)
            .field("ml_username", &self.ml_username)
            .field(
                "ml_password",
                &self.ml_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    /// Host of the staging application servers
    pub host: String,
    pub custom_forest_path: String,
    pub module_permissions: String,
    pub load_balancer_hosts: Option<Vec<String>>,
    pub project_dir: Option<PathBuf>,
    pub hub_version: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            host: DEFAULT_HOST.to_string(),
            custom_forest_path: DEFAULT_CUSTOM_FOREST_PATH.to_string(),
            module_permissions: DEFAULT_MODULE_PERMISSIONS.to_string(),
            load_balancer_hosts: None,
            project_dir: None,
            hub_version: DEFAULT_HUB_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubConfig {
    pub(crate) registry: RoleRegistry,
    pub(crate) identity: HubIdentity,
    pub(crate) globals: GlobalSettings,
    pub(crate) source: ConfigurationSource,
}

impl HubConfig {
    pub fn new() -> Self {
        HubConfig::default()
    }

    /// Context whose staging and final databases default to
    /// `forests_per_host` forests per host
    pub fn with_forests_per_host(forests_per_host: u32) -> Self {
        HubConfig {
            registry: RoleRegistry::with_forests_per_host(forests_per_host),
            ..HubConfig::default()
        }
    }

    /// Set the hub version reported in the token map
    pub fn with_hub_version(mut self, version: impl Into<String>) -> Self {
        self.globals.hub_version = version.into();
        self
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RoleRegistry {
        &mut self.registry
    }

    pub fn identity(&self) -> &HubIdentity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut HubIdentity {
        &mut self.identity
    }

    pub fn globals(&self) -> &GlobalSettings {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalSettings {
        &mut self.globals
    }

    /// The override source applied by the last successful load
    pub fn source(&self) -> &ConfigurationSource {
        &self.source
    }

    /// Forests per host for each database deployed with the tier's
    /// application server, keyed by database name
    pub fn forest_counts(&self, tier: Tier) -> BTreeMap<String, u32> {
        let own = DatabaseRole::STORED
            .into_iter()
            .filter(|role| !role.capabilities().app_server)
            .filter(|role| role.tier() == tier);

        [DatabaseRole::Staging, DatabaseRole::Final, DatabaseRole::Job]
            .into_iter()
            .chain(own)
            .map(|role| {
                (
                    self.registry.database_name(role).to_string(),
                    self.registry.forests_per_host(role),
                )
            })
            .collect()
    }

    fn tmp_file(&self, name: &str) -> Option<PathBuf> {
        self.globals
            .project_dir
            .as_deref()
            .map(|dir| dir.join(".tmp").join(name))
    }

    pub fn hub_modules_deploy_timestamp_file(&self) -> Option<PathBuf> {
        self.tmp_file(HUB_MODULES_DEPLOY_TIMESTAMPS_PROPERTIES)
    }

    pub fn user_modules_deploy_timestamp_file(&self) -> Option<PathBuf> {
        self.tmp_file(USER_MODULES_DEPLOY_TIMESTAMPS_PROPERTIES)
    }

    pub fn user_content_deploy_timestamp_file(&self) -> Option<PathBuf> {
        self.tmp_file(USER_CONTENT_DEPLOY_TIMESTAMPS_PROPERTIES)
    }

    pub fn set_project_dir(&mut self, dir: impl AsRef<Path>) {
        self.globals.project_dir = Some(dir.as_ref().to_path_buf());
    }
}
