// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Database roles and the per-role capability table
//!
//! Every logical database slot of a hub deployment is a [`DatabaseRole`].
//! The roles differ in which attributes they carry: only the roles backed
//! by an application server have a port, an auth method and a scheme, and
//! only Staging and Job carry TLS material. [`RoleCapabilities`] records
//! this once per role so the registry can be laid out accordingly.

use serde_derive::Serialize;
use std::{fmt, str::FromStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseRole {
    Staging,
    Final,
    Job,
    /// Trace records live in the job database
    Trace,
    StagingModules,
    FinalModules,
    StagingTriggers,
    FinalTriggers,
    StagingSchemas,
    FinalSchemas,
}

/// Which attribute sections a role carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCapabilities {
    /// Server name, port, auth method and scheme
    pub app_server: bool,
    /// Simple SSL flag, SSL context, hostname verifier, client
    /// certificate, external name and trust manager
    pub security: bool,
}

/// Deployment tier an application server belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Staging,
    Final,
}

impl DatabaseRole {
    /// All roles, including the `Trace` alias
    pub const ALL: [DatabaseRole; 10] = [
        DatabaseRole::Staging,
        DatabaseRole::Final,
        DatabaseRole::Job,
        DatabaseRole::Trace,
        DatabaseRole::StagingModules,
        DatabaseRole::FinalModules,
        DatabaseRole::StagingTriggers,
        DatabaseRole::FinalTriggers,
        DatabaseRole::StagingSchemas,
        DatabaseRole::FinalSchemas,
    ];

    /// Roles with their own storage, in slot order
    pub const STORED: [DatabaseRole; 9] = [
        DatabaseRole::Staging,
        DatabaseRole::Final,
        DatabaseRole::Job,
        DatabaseRole::StagingModules,
        DatabaseRole::FinalModules,
        DatabaseRole::StagingTriggers,
        DatabaseRole::FinalTriggers,
        DatabaseRole::StagingSchemas,
        DatabaseRole::FinalSchemas,
    ];

    /// The role whose storage backs this one. `Trace` resolves to `Job`,
    /// every other role resolves to itself.
    pub fn canonical(self) -> DatabaseRole {
        match self {
            DatabaseRole::Trace => DatabaseRole::Job,
            other => other,
        }
    }

    /// Index of the role's storage slot in [`DatabaseRole::STORED`]
    pub(crate) fn slot(self) -> usize {
        match self.canonical() {
            DatabaseRole::Staging => 0,
            DatabaseRole::Final => 1,
            DatabaseRole::Job | DatabaseRole::Trace => 2,
            DatabaseRole::StagingModules => 3,
            DatabaseRole::FinalModules => 4,
            DatabaseRole::StagingTriggers => 5,
            DatabaseRole::FinalTriggers => 6,
            DatabaseRole::StagingSchemas => 7,
            DatabaseRole::FinalSchemas => 8,
        }
    }

    pub fn capabilities(self) -> RoleCapabilities {
        match self.canonical() {
            DatabaseRole::Staging | DatabaseRole::Job => RoleCapabilities {
                app_server: true,
                security: true,
            },
            // Final has an application server but no TLS material of its
            // own; connections to it borrow Staging's.
            DatabaseRole::Final => RoleCapabilities {
                app_server: true,
                security: false,
            },
            _ => RoleCapabilities {
                app_server: false,
                security: false,
            },
        }
    }

    /// Prefix of the configuration keys and placeholders for the role
    pub fn property_prefix(self) -> &'static str {
        match self.canonical() {
            DatabaseRole::Staging => "mlStaging",
            DatabaseRole::Final => "mlFinal",
            DatabaseRole::Job | DatabaseRole::Trace => "mlJob",
            DatabaseRole::StagingModules => "mlStagingModules",
            DatabaseRole::FinalModules => "mlFinalModules",
            DatabaseRole::StagingTriggers => "mlStagingTriggers",
            DatabaseRole::FinalTriggers => "mlFinalTriggers",
            DatabaseRole::StagingSchemas => "mlStagingSchemas",
            DatabaseRole::FinalSchemas => "mlFinalSchemas",
        }
    }

    /// Tier whose application server deploys the role's database
    pub fn tier(self) -> Tier {
        match self {
            DatabaseRole::Final
            | DatabaseRole::FinalModules
            | DatabaseRole::FinalTriggers
            | DatabaseRole::FinalSchemas => Tier::Final,
            _ => Tier::Staging,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DatabaseRole::Staging => "staging",
            DatabaseRole::Final => "final",
            DatabaseRole::Job => "job",
            DatabaseRole::Trace => "trace",
            DatabaseRole::StagingModules => "staging-modules",
            DatabaseRole::FinalModules => "final-modules",
            DatabaseRole::StagingTriggers => "staging-triggers",
            DatabaseRole::FinalTriggers => "final-triggers",
            DatabaseRole::StagingSchemas => "staging-schemas",
            DatabaseRole::FinalSchemas => "final-schemas",
        }
    }
}

impl fmt::Display for DatabaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Security context type used to authenticate against an app server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Basic,
    Digest,
    Certificate,
    Kerberos,
    Saml,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Basic => "basic",
            AuthMethod::Digest => "digest",
            AuthMethod::Certificate => "certificate",
            AuthMethod::Kerberos => "kerberos",
            AuthMethod::Saml => "saml",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl FromStr for AuthMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthMethod::Basic),
            "digest" => Ok(AuthMethod::Digest),
            "certificate" => Ok(AuthMethod::Certificate),
            "kerberos" => Ok(AuthMethod::Kerberos),
            "saml" => Ok(AuthMethod::Saml),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}
