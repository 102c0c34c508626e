// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! JSON dump of a hub configuration for troubleshooting
//!
//! Passwords never appear in the dump. TLS contexts and trust stores are
//! only reported as present or absent.

use crate::{
    error::Result,
    hub_config::HubConfig,
    registry::{AppServerSettings, RoleAttributes},
    role::{AuthMethod, DatabaseRole, Scheme},
    security::{HostnameVerifier, SecurityBundle},
};
use serde_derive::Serialize;
use std::{collections::BTreeMap, fmt, path::Path};

static REDACTED: &str = "********";

#[derive(Serialize)]
struct ServerInfo<'a> {
    server_name: &'a str,
    port: u16,
    auth_method: AuthMethod,
    scheme: Scheme,
}

#[derive(Serialize)]
struct SecurityInfo<'a> {
    simple_ssl: bool,
    ssl_context: bool,
    ssl_hostname_verifier: Option<HostnameVerifier>,
    cert_file: Option<&'a str>,
    cert_password: Option<&'static str>,
    external_name: Option<&'a str>,
    trust_manager: Option<&'static str>,
}

#[derive(Serialize)]
struct RoleInfo<'a> {
    database_name: &'a str,
    forests_per_host: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_server: Option<ServerInfo<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security: Option<SecurityInfo<'a>>,
}

#[derive(Serialize)]
struct IdentityInfo<'a> {
    hub_role_name: &'a str,
    hub_user_name: &'a str,
    hub_admin_role_name: &'a str,
    hub_admin_user_name: &'a str,
    ml_username: Option<&'a str>,
    ml_password: Option<&'static str>,
}

#[derive(Serialize)]
struct GlobalsInfo<'a> {
    host: &'a str,
    custom_forest_path: &'a str,
    module_permissions: &'a str,
    load_balancer_hosts: Option<&'a [String]>,
    project_dir: Option<&'a Path>,
    hub_version: &'a str,
}

#[derive(Serialize)]
struct HubInfo<'a> {
    roles: BTreeMap<&'static str, RoleInfo<'a>>,
    identity: IdentityInfo<'a>,
    globals: GlobalsInfo<'a>,
    source_keys: Vec<&'a str>,
}

impl<'a> From<&'a AppServerSettings> for ServerInfo<'a> {
    fn from(s: &'a AppServerSettings) -> Self {
        ServerInfo {
            server_name: &s.server_name,
            port: s.port,
            auth_method: s.auth_method,
            scheme: s.scheme,
        }
    }
}

impl<'a> From<&'a SecurityBundle> for SecurityInfo<'a> {
    fn from(b: &'a SecurityBundle) -> Self {
        SecurityInfo {
            simple_ssl: b.simple_ssl,
            ssl_context: b.ssl_context.is_some(),
            ssl_hostname_verifier: b.ssl_hostname_verifier,
            cert_file: b.cert_file.as_deref(),
            cert_password: b.cert_password.as_ref().map(|_| REDACTED),
            external_name: b.external_name.as_deref(),
            trust_manager: b.trust_manager.as_ref().map(|t| t.label()),
        }
    }
}

impl<'a> From<&'a RoleAttributes> for RoleInfo<'a> {
    fn from(a: &'a RoleAttributes) -> Self {
        RoleInfo {
            database_name: &a.database_name,
            forests_per_host: a.forests_per_host,
            app_server: a.app_server().map(ServerInfo::from),
            security: a.security().map(SecurityInfo::from),
        }
    }
}

impl HubConfig {
    /// Pretty printed JSON describing the resolved configuration
    pub fn info(&self) -> Result<String> {
        let identity = self.identity();
        let globals = self.globals();

        let info = HubInfo {
            roles: DatabaseRole::STORED
                .into_iter()
                .map(|role| {
                    (role.name(), RoleInfo::from(self.registry().attributes(role)))
                })
                .collect(),
            identity: IdentityInfo {
                hub_role_name: &identity.hub_role_name,
                hub_user_name: &identity.hub_user_name,
                hub_admin_role_name: &identity.hub_admin_role_name,
                hub_admin_user_name: &identity.hub_admin_user_name,
                ml_username: identity.ml_username.as_deref(),
                ml_password: identity.ml_password.as_ref().map(|_| REDACTED),
            },
            globals: GlobalsInfo {
                host: &globals.host,
                custom_forest_path: &globals.custom_forest_path,
                module_permissions: &globals.module_permissions,
                load_balancer_hosts: globals.load_balancer_hosts.as_deref(),
                project_dir: globals.project_dir.as_deref(),
                hub_version: &globals.hub_version,
            },
            source_keys: self.source().iter().map(|(k, _)| k).collect(),
        };

        Ok(serde_json::to_string_pretty(&info)?)
    }
}

impl fmt::Display for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Ok(info) => f.write_str(&info),
            Err(e) => write!(f, "{e}"),
        }
    }
}
