// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Applies override sources to a [`HubConfig`]
//!
//! Every recognized key is parsed and every piece of derived security
//! material is built on a copy of the context. The copy replaces the
//! context only when all of that succeeded, so a malformed value leaves
//! the context exactly as it was.

use crate::{
    error::{HubConfigError, Result},
    hub_config::HubConfig,
    role::{AuthMethod, DatabaseRole, Scheme},
    security::simple_ssl_material,
    source::ConfigurationSource,
};
use log::*;
use std::{path::PathBuf, str::FromStr};

pub static HOST_KEY: &str = "mlHost";
pub static HUB_USER_ROLE_KEY: &str = "mlHubUserRole";
pub static HUB_USER_NAME_KEY: &str = "mlHubUserName";
pub static HUB_ADMIN_ROLE_KEY: &str = "mlHubAdminRole";
pub static HUB_ADMIN_NAME_KEY: &str = "mlHubAdminName";
pub static USERNAME_KEY: &str = "mlUsername";
pub static PASSWORD_KEY: &str = "mlPassword";
pub static LOAD_BALANCER_HOSTS_KEY: &str = "mlLoadBalancerHosts";
pub static CUSTOM_FOREST_PATH_KEY: &str = "mlCustomForestPath";
pub static STAGING_MODULE_PERMISSIONS_KEY: &str =
    "mlStagingModulePermissions";
pub static FINAL_MODULE_PERMISSIONS_KEY: &str = "mlFinalModulePermissions";
pub static PROJECT_DIR_KEY: &str = "hubProjectDir";

/// Key suffixes read for every role, after the role's property prefix
const ROLE_KEY_SUFFIXES: [&str; 2] = ["DbName", "ForestsPerHost"];
/// Key suffixes read for roles with an application server
const APP_SERVER_KEY_SUFFIXES: [&str; 4] =
    ["AppserverName", "Port", "Auth", "Scheme"];
/// Key suffixes read for roles with a security bundle
const SECURITY_KEY_SUFFIXES: [&str; 4] =
    ["SimpleSsl", "CertFile", "CertPassword", "ExternalName"];

fn global_keys() -> [&'static str; 12] {
    [
        HOST_KEY,
        HUB_USER_ROLE_KEY,
        HUB_USER_NAME_KEY,
        HUB_ADMIN_ROLE_KEY,
        HUB_ADMIN_NAME_KEY,
        USERNAME_KEY,
        PASSWORD_KEY,
        LOAD_BALANCER_HOSTS_KEY,
        CUSTOM_FOREST_PATH_KEY,
        STAGING_MODULE_PERMISSIONS_KEY,
        FINAL_MODULE_PERMISSIONS_KEY,
        PROJECT_DIR_KEY,
    ]
}

/// Whether `load` reads `key` into a typed setting
///
/// The token engine does not pass these keys through, their values reach
/// the token map only through the settings they were parsed into.
pub fn is_recognized_key(key: &str) -> bool {
    if global_keys().contains(&key) {
        return true;
    }
    DatabaseRole::STORED.iter().any(|role| {
        let caps = role.capabilities();
        key.strip_prefix(role.property_prefix())
            .is_some_and(|suffix| {
                ROLE_KEY_SUFFIXES.contains(&suffix)
                    || (caps.app_server
                        && APP_SERVER_KEY_SUFFIXES.contains(&suffix))
                    || (caps.security
                        && SECURITY_KEY_SUFFIXES.contains(&suffix))
            })
    })
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| HubConfigError::parse(key, raw))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(HubConfigError::parse(key, raw)),
    }
}

fn split_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect()
}

impl HubConfig {
    /// Apply the overrides in `source`
    ///
    /// Keys that are absent or blank leave the current value untouched.
    /// Any malformed value aborts the load with
    /// [`HubConfigError::ConfigurationParse`] and nothing is applied. On
    /// success the source is retained for the token engine.
    pub fn load(&mut self, source: Option<ConfigurationSource>) -> Result<()> {
        let Some(source) = source else {
            warn!("No configuration source given, keeping current hub configuration");
            return Ok(());
        };

        let mut staged = self.clone();
        for role in DatabaseRole::STORED {
            apply_role_overrides(&mut staged, role, &source)?;
        }
        apply_global_overrides(&mut staged, &source);
        staged.source = source;

        *self = staged;
        Ok(())
    }
}

fn apply_role_overrides(
    config: &mut HubConfig,
    role: DatabaseRole,
    source: &ConfigurationSource,
) -> Result<()> {
    let prefix = role.property_prefix();
    let caps = role.capabilities();
    let registry = &mut config.registry;

    let key = format!("{prefix}DbName");
    if let Some(value) = source.get_trimmed(&key) {
        debug!("Setting {role} database name to {value} from {key}");
        registry.set_database_name(role, value);
    }

    let key = format!("{prefix}ForestsPerHost");
    if let Some(value) = source.get_trimmed(&key) {
        let forests: u32 = parse_value(&key, value)?;
        debug!("Setting {role} forests per host to {forests} from {key}");
        registry.set_forests_per_host(role, forests);
    }

    if caps.app_server {
        let key = format!("{prefix}AppserverName");
        if let Some(value) = source.get_trimmed(&key) {
            debug!("Setting {role} app server name to {value} from {key}");
            registry.set_server_name(role, value)?;
        }

        let key = format!("{prefix}Port");
        if let Some(value) = source.get_trimmed(&key) {
            let port: u16 = parse_value(&key, value)?;
            debug!("Setting {role} port to {port} from {key}");
            registry.set_port(role, port)?;
        }

        let key = format!("{prefix}Auth");
        if let Some(value) = source.get_trimmed(&key) {
            let auth: AuthMethod = parse_value(&key, value)?;
            debug!("Setting {role} auth method to {auth} from {key}");
            registry.set_auth_method(role, auth)?;
        }

        let key = format!("{prefix}Scheme");
        if let Some(value) = source.get_trimmed(&key) {
            let scheme: Scheme = parse_value(&key, value)?;
            debug!("Setting {role} scheme to {scheme} from {key}");
            registry.set_scheme(role, scheme)?;
        }
    }

    if caps.security {
        let key = format!("{prefix}SimpleSsl");
        if let Some(value) = source.get_trimmed(&key) {
            let simple_ssl = parse_bool(&key, value)?;
            if simple_ssl {
                let material = simple_ssl_material()?;
                warn!("Simple SSL enabled for {role}: server certificates and host names are not verified");
                registry.apply_security_material(role, material)?;
            }
            registry.set_simple_ssl(role, simple_ssl)?;
        }

        let key = format!("{prefix}CertFile");
        if let Some(value) = source.get_trimmed(&key) {
            debug!("Setting {role} certificate file to {value} from {key}");
            registry.set_cert_file(role, Some(value.to_string()))?;
        }

        let key = format!("{prefix}CertPassword");
        if let Some(value) = source.get_trimmed(&key) {
            debug!("Setting {role} certificate password from {key}");
            registry.set_cert_password(role, Some(value.to_string()))?;
        }

        let key = format!("{prefix}ExternalName");
        if let Some(value) = source.get_trimmed(&key) {
            debug!("Setting {role} external name to {value} from {key}");
            registry.set_external_name(role, Some(value.to_string()))?;
        }
    }

    Ok(())
}

fn apply_global_overrides(
    config: &mut HubConfig,
    source: &ConfigurationSource,
) {
    let identity = &mut config.identity;
    if let Some(value) = source.get_trimmed(HUB_USER_ROLE_KEY) {
        identity.hub_role_name = value.to_string();
    }
    if let Some(value) = source.get_trimmed(HUB_USER_NAME_KEY) {
        identity.hub_user_name = value.to_string();
    }
    if let Some(value) = source.get_trimmed(HUB_ADMIN_ROLE_KEY) {
        identity.hub_admin_role_name = value.to_string();
    }
    if let Some(value) = source.get_trimmed(HUB_ADMIN_NAME_KEY) {
        identity.hub_admin_user_name = value.to_string();
    }
    if let Some(value) = source.get_trimmed(USERNAME_KEY) {
        identity.ml_username = Some(value.to_string());
    }
    // Passwords are taken as written, surrounding spaces included
    if let Some(value) = source.get(PASSWORD_KEY).filter(|v| !v.is_empty()) {
        identity.ml_password = Some(value.to_string());
    }

    let globals = &mut config.globals;
    if let Some(value) = source.get_trimmed(HOST_KEY) {
        globals.host = value.to_string();
    }
    if let Some(value) = source.get_trimmed(LOAD_BALANCER_HOSTS_KEY) {
        let hosts = split_hosts(value);
        debug!("Using load balancer hosts {hosts:?}");
        globals.load_balancer_hosts = Some(hosts);
    }
    if let Some(value) = source.get_trimmed(CUSTOM_FOREST_PATH_KEY) {
        globals.custom_forest_path = value.to_string();
    }
    // Both keys feed the same setting, the final one wins
    for key in [STAGING_MODULE_PERMISSIONS_KEY, FINAL_MODULE_PERMISSIONS_KEY]
    {
        if let Some(value) = source.get_trimmed(key) {
            globals.module_permissions = value.to_string();
        }
    }
    if let Some(value) = source.get_trimmed(PROJECT_DIR_KEY) {
        info!("Hub project directory: {value}");
        globals.project_dir = Some(PathBuf::from(value));
    }
}
