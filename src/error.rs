// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

use crate::role::DatabaseRole;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubConfigError>;

#[derive(Error, Debug)]
pub enum HubConfigError {
    /// Attribute is not defined for the role
    #[error("Cannot {operation} for database role {role}")]
    UnsupportedRoleOperation {
        role: DatabaseRole,
        operation: &'static str,
    },

    /// Malformed override value in the configuration source
    #[error("Failed to parse configuration option '{key}' with value '{raw_value}'")]
    ConfigurationParse { key: String, raw_value: String },

    /// Runtime credentials were not supplied before building a connection
    #[error("Runtime credentials 'mlUsername' and 'mlPassword' must be set to build a connection")]
    MissingCredentials,

    /// Error producing the diagnostic dump
    #[error("Hub configuration could not be serialized")]
    Serialization(#[from] serde_json::Error),

    /// Error from OpenSSL while preparing security material
    #[error("TLS error: {message}")]
    Tls {
        message: String,
        source: openssl::error::ErrorStack,
    },

    /// Error reading a certificate or trust store file
    #[error("Failed to read certificate file {path}")]
    CertificateFile {
        path: String,
        source: std::io::Error,
    },

    /// Error reading a properties file
    #[error("Failed to load properties file {path}")]
    PropertiesFile {
        path: String,
        source: ini::Error,
    },

    /// Unusable password policy or pass-through pattern
    #[error("Invalid token policy: {0}")]
    InvalidPolicy(String),

    /// Shared configuration lock poisoned by a panicking writer
    #[error("Shared hub configuration lock poisoned")]
    LockPoisoned,
}

impl HubConfigError {
    pub(crate) fn unsupported(
        role: DatabaseRole,
        operation: &'static str,
    ) -> Self {
        HubConfigError::UnsupportedRoleOperation { role, operation }
    }

    pub(crate) fn parse(key: &str, raw_value: &str) -> Self {
        HubConfigError::ConfigurationParse {
            key: key.to_string(),
            raw_value: raw_value.to_string(),
        }
    }

    pub(crate) fn tls(
        message: impl Into<String>,
        source: openssl::error::ErrorStack,
    ) -> Self {
        HubConfigError::Tls {
            message: message.into(),
            source,
        }
    }
}
