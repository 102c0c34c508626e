// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! TLS material for the roles that talk to an application server
//!
//! The material is prepared here and handed to the client library as
//! opaque handles; nothing in this module opens a connection. Two ways of
//! producing it exist:
//!
//! * [`simple_ssl_material`] trusts every certificate and every host name.
//!   It is meant for development clusters with self-signed certificates
//!   and must not be used where the server identity matters.
//! * [`certificate_material`] loads a PKCS#12 client certificate and
//!   verifies the server against either the given CA files or the system
//!   trust roots.

use crate::error::{HubConfigError, Result};
use log::*;
use openssl::{
    pkcs12::Pkcs12,
    ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode},
    x509::{store::X509StoreBuilder, store::X509Store, X509},
};
use serde_derive::Serialize;
use std::{fmt, path::Path, sync::Arc};

/// Shared handle to a client TLS context
///
/// Two handles compare equal only if they point to the same context.
#[derive(Clone)]
pub struct SslContextHandle(Arc<SslConnector>);

impl SslContextHandle {
    pub fn new(connector: SslConnector) -> Self {
        SslContextHandle(Arc::new(connector))
    }

    pub fn connector(&self) -> &SslConnector {
        &self.0
    }
}

impl PartialEq for SslContextHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SslContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SslContextHandle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Host name check applied to the server certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostnameVerifier {
    /// Accept any host name
    Any,
    /// Match the host against the common name or a subject alternative
    /// name, wildcards allowed
    Common,
    /// Like `Common`, but a wildcard matches a single label only
    Strict,
}

/// Source of trust for server certificates
#[derive(Clone)]
pub enum TrustManager {
    /// Every certificate is accepted
    AcceptAny,
    /// The platform's default trust roots
    SystemDefault,
    /// An explicit store of CA certificates
    Trusted(Arc<X509Store>),
}

impl TrustManager {
    pub fn is_permissive(&self) -> bool {
        matches!(self, TrustManager::AcceptAny)
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            TrustManager::AcceptAny => "accept-any",
            TrustManager::SystemDefault => "system-default",
            TrustManager::Trusted(_) => "trusted-store",
        }
    }
}

impl PartialEq for TrustManager {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TrustManager::AcceptAny, TrustManager::AcceptAny) => true,
            (TrustManager::SystemDefault, TrustManager::SystemDefault) => {
                true
            }
            (TrustManager::Trusted(a), TrustManager::Trusted(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for TrustManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrustManager({})", self.label())
    }
}

/// Per-role security settings, held for the lifetime of the session
#[derive(Clone, Default, PartialEq)]
pub struct SecurityBundle {
    pub simple_ssl: bool,
    pub ssl_context: Option<SslContextHandle>,
    pub ssl_hostname_verifier: Option<HostnameVerifier>,
    pub cert_file: Option<String>,
    pub cert_password: Option<String>,
    pub external_name: Option<String>,
    pub trust_manager: Option<TrustManager>,
}

impl SecurityBundle {
    /// Install prepared material, leaving the certificate settings alone
    pub fn apply(&mut self, material: SecurityMaterial) {
        self.ssl_context = Some(material.ssl_context);
        self.ssl_hostname_verifier = Some(material.hostname_verifier);
        self.trust_manager = Some(material.trust_manager);
    }
}

impl fmt::Debug for SecurityBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityBundle")
            .field("simple_ssl", &self.simple_ssl)
            .field("ssl_context", &self.ssl_context)
            .field("ssl_hostname_verifier", &self.ssl_hostname_verifier)
            .field("cert_file", &self.cert_file)
            .field(
                "cert_password",
                &self.cert_password.as_ref().map(|_| "<redacted>"),
            )
            .field("external_name", &self.external_name)
            .field("trust_manager", &self.trust_manager)
            .finish()
    }
}

/// TLS context, host name verifier and trust manager built together
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityMaterial {
    pub ssl_context: SslContextHandle,
    pub hostname_verifier: HostnameVerifier,
    pub trust_manager: TrustManager,
}

fn connector_builder() -> Result<SslConnectorBuilder> {
    SslConnector::builder(SslMethod::tls_client()).map_err(|source| {
        HubConfigError::tls("failed to create SSL connector builder", source)
    })
}

/// Build the permissive trust-everything material used by simple SSL
pub fn simple_ssl_material() -> Result<SecurityMaterial> {
    let mut builder = connector_builder()?;
    builder.set_verify(SslVerifyMode::NONE);

    Ok(SecurityMaterial {
        ssl_context: SslContextHandle::new(builder.build()),
        hostname_verifier: HostnameVerifier::Any,
        trust_manager: TrustManager::AcceptAny,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| HubConfigError::CertificateFile {
        path: path.display().to_string(),
        source,
    })
}

/// Load every certificate from a list of PEM files
pub fn load_trusted_certs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<X509>> {
    let mut certs = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let pem = read_file(path)?;
        let stack = X509::stack_from_pem(&pem).map_err(|source| {
            HubConfigError::tls(
                format!(
                    "failed to load certificates from PEM file {}",
                    path.display()
                ),
                source,
            )
        })?;
        debug!(
            "Loaded {} trusted certificate(s) from {}",
            stack.len(),
            path.display()
        );
        certs.extend(stack);
    }
    Ok(certs)
}

fn build_store(certs: &[X509]) -> Result<X509Store> {
    let mut store = X509StoreBuilder::new().map_err(|source| {
        HubConfigError::tls(
            "failed to create X509 certificate store builder object",
            source,
        )
    })?;
    for cert in certs {
        store.add_cert(cert.clone()).map_err(|source| {
            HubConfigError::tls(
                "failed to add certificate to X509 trusted certificate store",
                source,
            )
        })?;
    }
    Ok(store.build())
}

/// Build material from a PKCS#12 client certificate
///
/// # Arguments
///
/// * `cert_file` - PKCS#12 file holding the client key and certificate
/// * `cert_password` - password protecting `cert_file`
/// * `trusted_ca` - PEM files with the CAs to trust; when empty the
///   system default trust roots are used
/// * `hostname_verifier` - host name check to record for the connection
pub fn certificate_material<P: AsRef<Path>>(
    cert_file: &Path,
    cert_password: &str,
    trusted_ca: &[P],
    hostname_verifier: HostnameVerifier,
) -> Result<SecurityMaterial> {
    let der = read_file(cert_file)?;
    let parsed = Pkcs12::from_der(&der)
        .and_then(|p| p.parse2(cert_password))
        .map_err(|source| {
            HubConfigError::tls(
                format!(
                    "failed to parse PKCS#12 file {}",
                    cert_file.display()
                ),
                source,
            )
        })?;

    let mut builder = connector_builder()?;
    if let Some(cert) = &parsed.cert {
        builder.set_certificate(cert).map_err(|source| {
            HubConfigError::tls("failed to set SSL client certificate", source)
        })?;
    }
    if let Some(pkey) = &parsed.pkey {
        builder.set_private_key(pkey).map_err(|source| {
            HubConfigError::tls("failed to set SSL client private key", source)
        })?;
    }
    if let Some(chain) = parsed.ca {
        for cert in chain {
            builder.add_extra_chain_cert(cert).map_err(|source| {
                HubConfigError::tls(
                    "failed to add certificate to SSL client chain",
                    source,
                )
            })?;
        }
    }

    let trust_manager = if trusted_ca.is_empty() {
        TrustManager::SystemDefault
    } else {
        let certs = load_trusted_certs(trusted_ca)?;
        for cert in &certs {
            builder.cert_store_mut().add_cert(cert.clone()).map_err(
                |source| {
                    HubConfigError::tls(
                        "failed to add certificate to SSL client trust store",
                        source,
                    )
                },
            )?;
        }
        TrustManager::Trusted(Arc::new(build_store(&certs)?))
    };
    builder.set_verify(SslVerifyMode::PEER);

    Ok(SecurityMaterial {
        ssl_context: SslContextHandle::new(builder.build()),
        hostname_verifier,
        trust_manager,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use openssl::{
        asn1::Asn1Time,
        hash::MessageDigest,
        nid::Nid,
        pkcs12::Pkcs12,
        pkey::{PKey, Private},
        rsa::Rsa,
        x509::{X509NameBuilder, X509},
    };
    use std::{fs, path::Path};

    pub(crate) fn self_signed(cn: &str) -> (PKey<Private>, X509) {
        let rsa = Rsa::generate(2048).unwrap(); //#[allow_ci]
        let pkey = PKey::from_rsa(rsa).unwrap(); //#[allow_ci]

        let mut name = X509NameBuilder::new().unwrap(); //#[allow_ci]
        name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap(); //#[allow_ci]
        let name = name.build();

        let mut builder = X509::builder().unwrap(); //#[allow_ci]
        builder.set_version(2).unwrap(); //#[allow_ci]
        builder.set_subject_name(&name).unwrap(); //#[allow_ci]
        builder.set_issuer_name(&name).unwrap(); //#[allow_ci]
        builder.set_pubkey(&pkey).unwrap(); //#[allow_ci]
        let not_before = Asn1Time::days_from_now(0).unwrap(); //#[allow_ci]
        let not_after = Asn1Time::days_from_now(30).unwrap(); //#[allow_ci]
        builder.set_not_before(&not_before).unwrap(); //#[allow_ci]
        builder.set_not_after(&not_after).unwrap(); //#[allow_ci]
        builder.sign(&pkey, MessageDigest::sha256()).unwrap(); //#[allow_ci]

        (pkey, builder.build())
    }

    /// Write a PKCS#12 client certificate and a CA PEM file into `dir`
    pub(crate) fn write_client_files(
        dir: &Path,
        password: &str,
    ) -> (std::path::PathBuf, std::path::PathBuf) {
        let (pkey, cert) = self_signed("hub-client");
        let p12 = Pkcs12::builder()
            .name("hub-client")
            .pkey(&pkey)
            .cert(&cert)
            .build2(password)
            .unwrap(); //#[allow_ci]
        let p12_path = dir.join("client.p12");
        fs::write(&p12_path, p12.to_der().unwrap()).unwrap(); //#[allow_ci]

        let (_, ca) = self_signed("hub-ca");
        let ca_path = dir.join("ca.pem");
        fs::write(&ca_path, ca.to_pem().unwrap()).unwrap(); //#[allow_ci]

        (p12_path, ca_path)
    }
}
