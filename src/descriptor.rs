// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Connection descriptors handed to the database client
//!
//! A [`ConnectionDescriptor`] carries everything the client library needs
//! to open a connection for a role. Building one does not touch the
//! network; hosts come from a [`DeploymentTarget`].

use crate::{
    error::{HubConfigError, Result},
    hub_config::HubConfig,
    role::{AuthMethod, DatabaseRole, Scheme, Tier},
    security::SecurityBundle,
};
use std::fmt;

/// Source of the host name serving each tier
pub trait DeploymentTarget {
    fn host(&self, tier: Tier) -> &str;
}

/// A deployment whose tiers are served from fixed hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTarget {
    pub staging_host: String,
    pub final_host: String,
}

impl StaticTarget {
    /// Both tiers served by `host`
    pub fn single(host: impl Into<String>) -> Self {
        let host = host.into();
        StaticTarget {
            staging_host: host.clone(),
            final_host: host,
        }
    }
}

impl DeploymentTarget for StaticTarget {
    fn host(&self, tier: Tier) -> &str {
        match tier {
            Tier::Staging => &self.staging_host,
            Tier::Final => &self.final_host,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub scheme: Scheme,
    pub auth_method: AuthMethod,
    pub username: String,
    pub password: String,
    /// TLS material, absent for roles connecting without it
    pub security: Option<SecurityBundle>,
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("scheme", &self.scheme)
            .field("auth_method", &self.auth_method)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .finish()
    }
}

impl HubConfig {
    /// Build the connection descriptor for `role`
    ///
    /// * Staging and Job/Trace connect to their own application server on
    ///   the staging host with their own security material.
    /// * Final connects to its application server on the final host. It has
    ///   no security material of its own and uses Staging's.
    /// * Every other role connects through the staging application server
    ///   (staging host, port and scheme) with Final's auth method, no security
    ///   material, and its own database name.
    ///
    /// Fails with [`HubConfigError::MissingCredentials`] when the runtime
    /// username or password is unset or empty.
    pub fn build_connection_descriptor(
        &self,
        role: DatabaseRole,
        target: &dyn DeploymentTarget,
    ) -> Result<ConnectionDescriptor> {
        let (username, password) = self.runtime_credentials()?;
        let registry = &self.registry;
        // Only Final has its own application server on the final tier
        let tier = match role {
            DatabaseRole::Final => Tier::Final,
            _ => Tier::Staging,
        };
        let host = target.host(tier).to_string();
        let database = registry.database_name(role).to_string();

        let (port, scheme, auth_method, security) = match role.canonical() {
            DatabaseRole::Staging | DatabaseRole::Job => (
                registry.port(role)?,
                registry.scheme(role)?,
                registry.auth_method(role)?,
                Some(registry.security_bundle(role)?.clone()),
            ),
            DatabaseRole::Final => (
                registry.port(role)?,
                registry.scheme(role)?,
                registry.auth_method(role)?,
                Some(
                    registry
                        .security_bundle(DatabaseRole::Staging)?
                        .clone(),
                ),
            ),
            _ => (
                registry.port(DatabaseRole::Staging)?,
                registry.scheme(DatabaseRole::Staging)?,
                registry.auth_method(DatabaseRole::Final)?,
                None,
            ),
        };

        Ok(ConnectionDescriptor {
            host,
            port,
            database,
            scheme,
            auth_method,
            username: username.to_string(),
            password: password.to_string(),
            security,
        })
    }

    fn runtime_credentials(&self) -> Result<(&str, &str)> {
        let username = self
            .identity
            .ml_username
            .as_deref()
            .filter(|u| !u.is_empty());
        let password = self
            .identity
            .ml_password
            .as_deref()
            .filter(|p| !p.is_empty());
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(HubConfigError::MissingCredentials),
        }
    }
}
