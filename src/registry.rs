// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Role-indexed attribute store
//!
//! The registry keeps one [`RoleAttributes`] record per storage slot. The
//! optional sections of a record exist exactly for the roles whose
//! [`RoleCapabilities`](crate::role::RoleCapabilities) allow them, so
//! asking for an attribute a role does not carry fails with
//! [`HubConfigError::UnsupportedRoleOperation`] instead of returning some
//! other role's value. `Trace` shares the `Job` record.

use crate::{
    defaults::*,
    error::{HubConfigError, Result},
    role::{AuthMethod, DatabaseRole, Scheme},
    security::{
        simple_ssl_material, HostnameVerifier, SecurityBundle,
        SecurityMaterial, SslContextHandle, TrustManager,
    },
};
use log::*;

/// Application server settings of a role
#[derive(Debug, Clone, PartialEq)]
pub struct AppServerSettings {
    pub server_name: String,
    pub port: u16,
    pub auth_method: AuthMethod,
    pub scheme: Scheme,
}

/// All attributes stored for one role
#[derive(Debug, Clone, PartialEq)]
pub struct RoleAttributes {
    pub database_name: String,
    pub forests_per_host: u32,
    app_server: Option<AppServerSettings>,
    security: Option<SecurityBundle>,
}

impl RoleAttributes {
    fn defaults(role: DatabaseRole, content_forests: u32) -> Self {
        let caps = role.capabilities();
        let forests_per_host = match role.canonical() {
            DatabaseRole::Staging | DatabaseRole::Final => content_forests,
            _ => DEFAULT_AUX_FORESTS_PER_HOST,
        };
        let app_server = match default_port(role) {
            Some(port) if caps.app_server => Some(AppServerSettings {
                server_name: default_database_name(role).to_string(),
                port,
                auth_method: DEFAULT_AUTH_METHOD,
                scheme: DEFAULT_SCHEME,
            }),
            _ => None,
        };

        RoleAttributes {
            database_name: default_database_name(role).to_string(),
            forests_per_host,
            app_server,
            security: caps.security.then(SecurityBundle::default),
        }
    }

    pub fn app_server(&self) -> Option<&AppServerSettings> {
        self.app_server.as_ref()
    }

    pub fn security(&self) -> Option<&SecurityBundle> {
        self.security.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleRegistry {
    slots: [RoleAttributes; 9],
}

impl Default for RoleRegistry {
    fn default() -> Self {
        RoleRegistry::new()
    }
}

impl RoleRegistry {
    pub fn new() -> Self {
        RoleRegistry::with_forests_per_host(DEFAULT_FORESTS_PER_HOST)
    }

    /// Create a registry using `content_forests` as the platform default
    /// forest count of the staging and final databases
    pub fn with_forests_per_host(content_forests: u32) -> Self {
        RoleRegistry {
            slots: std::array::from_fn(|i| {
                RoleAttributes::defaults(
                    DatabaseRole::STORED[i],
                    content_forests,
                )
            }),
        }
    }

    pub fn attributes(&self, role: DatabaseRole) -> &RoleAttributes {
        &self.slots[role.slot()]
    }

    fn attributes_mut(&mut self, role: DatabaseRole) -> &mut RoleAttributes {
        &mut self.slots[role.slot()]
    }

    fn server(
        &self,
        role: DatabaseRole,
        operation: &'static str,
    ) -> Result<&AppServerSettings> {
        self.attributes(role)
            .app_server
            .as_ref()
            .ok_or_else(|| HubConfigError::unsupported(role, operation))
    }

    fn server_mut(
        &mut self,
        role: DatabaseRole,
        operation: &'static str,
    ) -> Result<&mut AppServerSettings> {
        self.attributes_mut(role)
            .app_server
            .as_mut()
            .ok_or_else(|| HubConfigError::unsupported(role, operation))
    }

    fn bundle(
        &self,
        role: DatabaseRole,
        operation: &'static str,
    ) -> Result<&SecurityBundle> {
        self.attributes(role)
            .security
            .as_ref()
            .ok_or_else(|| HubConfigError::unsupported(role, operation))
    }

    fn bundle_mut(
        &mut self,
        role: DatabaseRole,
        operation: &'static str,
    ) -> Result<&mut SecurityBundle> {
        self.attributes_mut(role)
            .security
            .as_mut()
            .ok_or_else(|| HubConfigError::unsupported(role, operation))
    }

    pub fn database_name(&self, role: DatabaseRole) -> &str {
        &self.attributes(role).database_name
    }

    pub fn set_database_name(
        &mut self,
        role: DatabaseRole,
        name: impl Into<String>,
    ) {
        self.attributes_mut(role).database_name = name.into();
    }

    pub fn forests_per_host(&self, role: DatabaseRole) -> u32 {
        self.attributes(role).forests_per_host
    }

    pub fn set_forests_per_host(&mut self, role: DatabaseRole, forests: u32) {
        self.attributes_mut(role).forests_per_host = forests;
    }

    pub fn server_name(&self, role: DatabaseRole) -> Result<&str> {
        Ok(&self.server(role, "get app server name")?.server_name)
    }

    pub fn set_server_name(
        &mut self,
        role: DatabaseRole,
        name: impl Into<String>,
    ) -> Result<()> {
        self.server_mut(role, "set app server name")?.server_name =
            name.into();
        Ok(())
    }

    pub fn port(&self, role: DatabaseRole) -> Result<u16> {
        Ok(self.server(role, "get app port")?.port)
    }

    pub fn set_port(&mut self, role: DatabaseRole, port: u16) -> Result<()> {
        self.server_mut(role, "set app port")?.port = port;
        Ok(())
    }

    pub fn auth_method(&self, role: DatabaseRole) -> Result<AuthMethod> {
        Ok(self.server(role, "get auth method")?.auth_method)
    }

    pub fn set_auth_method(
        &mut self,
        role: DatabaseRole,
        auth_method: AuthMethod,
    ) -> Result<()> {
        self.server_mut(role, "set auth method")?.auth_method = auth_method;
        Ok(())
    }

    pub fn scheme(&self, role: DatabaseRole) -> Result<Scheme> {
        Ok(self.server(role, "get scheme")?.scheme)
    }

    pub fn set_scheme(
        &mut self,
        role: DatabaseRole,
        scheme: Scheme,
    ) -> Result<()> {
        self.server_mut(role, "set scheme")?.scheme = scheme;
        Ok(())
    }

    /// The whole security bundle of a role
    pub fn security_bundle(
        &self,
        role: DatabaseRole,
    ) -> Result<&SecurityBundle> {
        self.bundle(role, "get security bundle")
    }

    pub fn simple_ssl(&self, role: DatabaseRole) -> Result<bool> {
        Ok(self.bundle(role, "get simple ssl")?.simple_ssl)
    }

    pub fn set_simple_ssl(
        &mut self,
        role: DatabaseRole,
        simple_ssl: bool,
    ) -> Result<()> {
        self.bundle_mut(role, "set simple ssl")?.simple_ssl = simple_ssl;
        Ok(())
    }

    pub fn ssl_context(
        &self,
        role: DatabaseRole,
    ) -> Result<Option<&SslContextHandle>> {
        Ok(self.bundle(role, "get ssl context")?.ssl_context.as_ref())
    }

    pub fn set_ssl_context(
        &mut self,
        role: DatabaseRole,
        ssl_context: Option<SslContextHandle>,
    ) -> Result<()> {
        self.bundle_mut(role, "set ssl context")?.ssl_context = ssl_context;
        Ok(())
    }

    pub fn ssl_hostname_verifier(
        &self,
        role: DatabaseRole,
    ) -> Result<Option<HostnameVerifier>> {
        Ok(self
            .bundle(role, "get ssl hostname verifier")?
            .ssl_hostname_verifier)
    }

    pub fn set_ssl_hostname_verifier(
        &mut self,
        role: DatabaseRole,
        verifier: Option<HostnameVerifier>,
    ) -> Result<()> {
        self.bundle_mut(role, "set ssl hostname verifier")?
            .ssl_hostname_verifier = verifier;
        Ok(())
    }

    pub fn cert_file(&self, role: DatabaseRole) -> Result<Option<&str>> {
        Ok(self.bundle(role, "get cert file")?.cert_file.as_deref())
    }

    pub fn set_cert_file(
        &mut self,
        role: DatabaseRole,
        cert_file: Option<String>,
    ) -> Result<()> {
        self.bundle_mut(role, "set certificate file")?.cert_file = cert_file;
        Ok(())
    }

    pub fn cert_password(&self, role: DatabaseRole) -> Result<Option<&str>> {
        Ok(self
            .bundle(role, "get cert password")?
            .cert_password
            .as_deref())
    }

    pub fn set_cert_password(
        &mut self,
        role: DatabaseRole,
        cert_password: Option<String>,
    ) -> Result<()> {
        self.bundle_mut(role, "set certificate password")?
            .cert_password = cert_password;
        Ok(())
    }

    pub fn external_name(&self, role: DatabaseRole) -> Result<Option<&str>> {
        Ok(self
            .bundle(role, "get external name")?
            .external_name
            .as_deref())
    }

    pub fn set_external_name(
        &mut self,
        role: DatabaseRole,
        external_name: Option<String>,
    ) -> Result<()> {
        self.bundle_mut(role, "set external name")?.external_name =
            external_name;
        Ok(())
    }

    pub fn trust_manager(
        &self,
        role: DatabaseRole,
    ) -> Result<Option<&TrustManager>> {
        Ok(self
            .bundle(role, "get trust manager")?
            .trust_manager
            .as_ref())
    }

    pub fn set_trust_manager(
        &mut self,
        role: DatabaseRole,
        trust_manager: Option<TrustManager>,
    ) -> Result<()> {
        self.bundle_mut(role, "set trust manager")?.trust_manager =
            trust_manager;
        Ok(())
    }

    /// Install prepared TLS material on a role
    pub fn apply_security_material(
        &mut self,
        role: DatabaseRole,
        material: SecurityMaterial,
    ) -> Result<()> {
        self.bundle_mut(role, "set security material")?.apply(material);
        Ok(())
    }

    /// Switch a role to simple SSL, replacing its TLS context, hostname
    /// verifier and trust manager with the trust-everything material
    pub fn enable_simple_ssl(&mut self, role: DatabaseRole) -> Result<()> {
        // Reject the role before building anything
        let _ = self.bundle(role, "enable simple ssl")?;
        let material = simple_ssl_material()?;
        warn!("Simple SSL enabled for {role}: server certificates and host names are not verified");
        let bundle = self.bundle_mut(role, "enable simple ssl")?;
        bundle.simple_ssl = true;
        bundle.apply(material);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::simple_ssl_material;

    fn server_roles() -> [DatabaseRole; 4] {
        [
            DatabaseRole::Staging,
            DatabaseRole::Final,
            DatabaseRole::Job,
            DatabaseRole::Trace,
        ]
    }

    fn security_roles() -> [DatabaseRole; 3] {
        [DatabaseRole::Staging, DatabaseRole::Job, DatabaseRole::Trace]
    }

    #[test]
    fn test_defaults() {
        let registry = RoleRegistry::new();
        assert_eq!(
            registry.database_name(DatabaseRole::Staging),
            DEFAULT_STAGING_NAME
        );
        assert_eq!(
            registry.database_name(DatabaseRole::Trace),
            DEFAULT_JOB_NAME
        );
        assert_eq!(
            registry.database_name(DatabaseRole::FinalSchemas),
            DEFAULT_FINAL_SCHEMAS_DB_NAME
        );
        assert_eq!(
            registry.forests_per_host(DatabaseRole::Staging),
            DEFAULT_FORESTS_PER_HOST
        );
        assert_eq!(registry.forests_per_host(DatabaseRole::Job), 1);
        assert_eq!(
            registry.forests_per_host(DatabaseRole::StagingTriggers),
            1
        );
        assert_eq!(
            registry.port(DatabaseRole::Staging).unwrap(), //#[allow_ci]
            DEFAULT_STAGING_PORT
        );
        assert_eq!(
            registry.port(DatabaseRole::Final).unwrap(), //#[allow_ci]
            DEFAULT_FINAL_PORT
        );
        assert_eq!(
            registry.server_name(DatabaseRole::Job).unwrap(), //#[allow_ci]
            DEFAULT_JOB_NAME
        );
        assert_eq!(
            registry.auth_method(DatabaseRole::Final).unwrap(), //#[allow_ci]
            AuthMethod::Digest
        );
        assert_eq!(
            registry.scheme(DatabaseRole::Staging).unwrap(), //#[allow_ci]
            Scheme::Http
        );
        assert!(!registry.simple_ssl(DatabaseRole::Staging).unwrap()); //#[allow_ci]
        assert!(registry
            .ssl_context(DatabaseRole::Job)
            .unwrap() //#[allow_ci]
            .is_none());
    }

    #[test]
    fn test_platform_forest_default() {
        let registry = RoleRegistry::with_forests_per_host(6);
        assert_eq!(registry.forests_per_host(DatabaseRole::Staging), 6);
        assert_eq!(registry.forests_per_host(DatabaseRole::Final), 6);
        assert_eq!(registry.forests_per_host(DatabaseRole::Job), 1);
    }

    #[test]
    fn test_round_trip_all_roles() {
        let mut registry = RoleRegistry::new();
        for (i, role) in DatabaseRole::ALL.iter().copied().enumerate() {
            let name = format!("db-{i}");
            registry.set_database_name(role, name.clone());
            assert_eq!(registry.database_name(role), name);

            registry.set_forests_per_host(role, i as u32 + 10);
            assert_eq!(registry.forests_per_host(role), i as u32 + 10);
        }

        for (i, role) in server_roles().iter().copied().enumerate() {
            let name = format!("server-{i}");
            registry.set_server_name(role, name.clone()).unwrap(); //#[allow_ci]
            assert_eq!(registry.server_name(role).unwrap(), name); //#[allow_ci]

            registry.set_port(role, 9000 + i as u16).unwrap(); //#[allow_ci]
            assert_eq!(registry.port(role).unwrap(), 9000 + i as u16); //#[allow_ci]

            registry.set_auth_method(role, AuthMethod::Basic).unwrap(); //#[allow_ci]
            assert_eq!(registry.auth_method(role).unwrap(), AuthMethod::Basic); //#[allow_ci]

            registry.set_scheme(role, Scheme::Https).unwrap(); //#[allow_ci]
            assert_eq!(registry.scheme(role).unwrap(), Scheme::Https); //#[allow_ci]
        }

        for role in security_roles() {
            let material = simple_ssl_material().unwrap(); //#[allow_ci]

            registry.set_simple_ssl(role, true).unwrap(); //#[allow_ci]
            assert!(registry.simple_ssl(role).unwrap()); //#[allow_ci]

            registry
                .set_ssl_context(role, Some(material.ssl_context.clone()))
                .unwrap(); //#[allow_ci]
            assert_eq!(
                registry.ssl_context(role).unwrap(), //#[allow_ci]
                Some(&material.ssl_context)
            );

            registry
                .set_ssl_hostname_verifier(
                    role,
                    Some(HostnameVerifier::Strict),
                )
                .unwrap(); //#[allow_ci]
            assert_eq!(
                registry.ssl_hostname_verifier(role).unwrap(), //#[allow_ci]
                Some(HostnameVerifier::Strict)
            );

            let file = format!("/certs/{role}.p12");
            registry.set_cert_file(role, Some(file.clone())).unwrap(); //#[allow_ci]
            assert_eq!(
                registry.cert_file(role).unwrap(), //#[allow_ci]
                Some(file.as_str())
            );

            registry
                .set_cert_password(role, Some("changeit".into()))
                .unwrap(); //#[allow_ci]
            assert_eq!(
                registry.cert_password(role).unwrap(), //#[allow_ci]
                Some("changeit")
            );

            registry
                .set_external_name(role, Some("hub.example.org".into()))
                .unwrap(); //#[allow_ci]
            assert_eq!(
                registry.external_name(role).unwrap(), //#[allow_ci]
                Some("hub.example.org")
            );

            registry
                .set_trust_manager(role, Some(TrustManager::SystemDefault))
                .unwrap(); //#[allow_ci]
            assert_eq!(
                registry.trust_manager(role).unwrap(), //#[allow_ci]
                Some(&TrustManager::SystemDefault)
            );
        }
    }

    #[test]
    fn test_trace_aliases_job() {
        let mut registry = RoleRegistry::new();
        let pairs = [
            (DatabaseRole::Trace, DatabaseRole::Job, "trace"),
            (DatabaseRole::Job, DatabaseRole::Trace, "job"),
        ];

        for (port, (writer, reader, tag)) in (9100..).zip(pairs) {
            let context = simple_ssl_material().unwrap().ssl_context; //#[allow_ci]
            let verifier = if tag == "trace" {
                HostnameVerifier::Strict
            } else {
                HostnameVerifier::Common
            };
            let trust = if tag == "trace" {
                TrustManager::SystemDefault
            } else {
                TrustManager::AcceptAny
            };
            let simple_ssl = tag == "trace";
            let auth = if simple_ssl {
                AuthMethod::Basic
            } else {
                AuthMethod::Certificate
            };
            let scheme = if simple_ssl { Scheme::Https } else { Scheme::Http };

            registry.set_database_name(writer, format!("{tag}-db"));
            registry.set_forests_per_host(writer, port as u32);
            registry
                .set_server_name(writer, format!("{tag}-server"))
                .unwrap(); //#[allow_ci]
            registry.set_port(writer, port).unwrap(); //#[allow_ci]
            registry.set_auth_method(writer, auth).unwrap(); //#[allow_ci]
            registry.set_scheme(writer, scheme).unwrap(); //#[allow_ci]
            registry.set_simple_ssl(writer, simple_ssl).unwrap(); //#[allow_ci]
            registry
                .set_ssl_context(writer, Some(context.clone()))
                .unwrap(); //#[allow_ci]
            registry
                .set_ssl_hostname_verifier(writer, Some(verifier))
                .unwrap(); //#[allow_ci]
            registry
                .set_cert_file(writer, Some(format!("/certs/{tag}.p12")))
                .unwrap(); //#[allow_ci]
            registry
                .set_cert_password(writer, Some(format!("{tag}-pass")))
                .unwrap(); //#[allow_ci]
            registry
                .set_external_name(writer, Some(format!("{tag}.example.org")))
                .unwrap(); //#[allow_ci]
            registry
                .set_trust_manager(writer, Some(trust.clone()))
                .unwrap(); //#[allow_ci]

            assert_eq!(registry.database_name(reader), format!("{tag}-db"));
            assert_eq!(registry.forests_per_host(reader), port as u32);
            assert_eq!(
                registry.server_name(reader).unwrap(), //#[allow_ci]
                format!("{tag}-server")
            );
            assert_eq!(registry.port(reader).unwrap(), port); //#[allow_ci]
            assert_eq!(registry.auth_method(reader).unwrap(), auth); //#[allow_ci]
            assert_eq!(registry.scheme(reader).unwrap(), scheme); //#[allow_ci]
            assert_eq!(registry.simple_ssl(reader).unwrap(), simple_ssl); //#[allow_ci]
            assert_eq!(
                registry.ssl_context(reader).unwrap(), //#[allow_ci]
                Some(&context)
            );
            assert_eq!(
                registry.ssl_hostname_verifier(reader).unwrap(), //#[allow_ci]
                Some(verifier)
            );
            assert_eq!(
                registry.cert_file(reader).unwrap(), //#[allow_ci]
                Some(format!("/certs/{tag}.p12").as_str())
            );
            assert_eq!(
                registry.cert_password(reader).unwrap(), //#[allow_ci]
                Some(format!("{tag}-pass").as_str())
            );
            assert_eq!(
                registry.external_name(reader).unwrap(), //#[allow_ci]
                Some(format!("{tag}.example.org").as_str())
            );
            assert_eq!(
                registry.trust_manager(reader).unwrap(), //#[allow_ci]
                Some(&trust)
            );
        }
    }

    #[test]
    fn test_final_has_no_security_bundle() {
        let mut registry = RoleRegistry::new();
        let r = registry.ssl_context(DatabaseRole::Final);
        assert!(matches!(
            r,
            Err(HubConfigError::UnsupportedRoleOperation {
                role: DatabaseRole::Final,
                operation: "get ssl context",
            })
        ));
        assert!(registry
            .set_cert_password(DatabaseRole::Final, Some("x".into()))
            .is_err());
        assert!(registry.trust_manager(DatabaseRole::Final).is_err());
        assert!(registry.enable_simple_ssl(DatabaseRole::Final).is_err());
    }

    #[test]
    fn test_unsupported_operations_rejected() {
        let mut registry = RoleRegistry::new();
        for role in DatabaseRole::ALL {
            let caps = role.capabilities();

            assert_eq!(registry.port(role).is_ok(), caps.app_server);
            assert_eq!(registry.set_port(role, 1).is_ok(), caps.app_server);
            assert_eq!(
                registry.server_name(role).is_ok(),
                caps.app_server
            );
            assert_eq!(
                registry.set_scheme(role, Scheme::Https).is_ok(),
                caps.app_server
            );
            assert_eq!(
                registry.auth_method(role).is_ok(),
                caps.app_server
            );

            assert_eq!(registry.simple_ssl(role).is_ok(), caps.security);
            assert_eq!(registry.cert_file(role).is_ok(), caps.security);
            assert_eq!(
                registry.set_ssl_hostname_verifier(role, None).is_ok(),
                caps.security
            );
            assert_eq!(
                registry.set_external_name(role, None).is_ok(),
                caps.security
            );
            assert_eq!(
                registry.security_bundle(role).is_ok(),
                caps.security
            );
        }
    }

    #[test]
    fn test_enable_simple_ssl() {
        let mut registry = RoleRegistry::new();
        registry.enable_simple_ssl(DatabaseRole::Trace).unwrap(); //#[allow_ci]

        let bundle = registry.security_bundle(DatabaseRole::Job).unwrap(); //#[allow_ci]
        assert!(bundle.simple_ssl);
        assert!(bundle.ssl_context.is_some());
        assert_eq!(bundle.ssl_hostname_verifier, Some(HostnameVerifier::Any));
        assert_eq!(bundle.trust_manager, Some(TrustManager::AcceptAny));

        let staging =
            registry.security_bundle(DatabaseRole::Staging).unwrap(); //#[allow_ci]
        assert!(!staging.simple_ssl);
        assert!(staging.ssl_context.is_none());
    }
}
